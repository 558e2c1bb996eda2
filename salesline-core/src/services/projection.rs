//! Row projector - reattributed raw rows into canonical sale records

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::domain::extract::sale_fields as f;
use crate::domain::value::{normalize_branch, parse_amount, parse_date, parse_quantity};
use crate::domain::{RawRow, SaleRecord};
use crate::services::lookup::{ClientMaster, ProductMaster};

const NOT_AVAILABLE: &str = "N/A";

/// Order date, replaced by the ship date when its month lags the ship month
fn effective_order_date(order: Option<NaiveDate>, ship: Option<NaiveDate>) -> Option<NaiveDate> {
    match (order, ship) {
        (Some(o), Some(s)) if (o.year(), o.month()) < (s.year(), s.month()) => Some(s),
        _ => order,
    }
}

/// Map one reattributed row into the output schema
pub fn project_sale(row: &RawRow, clients: &ClientMaster, products: &ProductMaster) -> SaleRecord {
    let client_code = row.trimmed(f::CLIENT_CODE);
    let client = clients.get(&client_code);
    let product_code = row.trimmed(f::PRODUCT_CODE);

    let quantity = parse_quantity(row.get(f::QUANTITY));
    let master_pack = products.master_pack(&product_code);

    let ship_date = parse_date(row.get(f::SHIP_DATE));
    let order_date = effective_order_date(parse_date(row.get(f::ORDER_DATE)), ship_date);

    let (client_name, city, neighborhood) = match client {
        Some(c) => (c.display_name.clone(), c.city.clone(), c.neighborhood.clone()),
        None => (
            NOT_AVAILABLE.to_string(),
            NOT_AVAILABLE.to_string(),
            NOT_AVAILABLE.to_string(),
        ),
    };

    SaleRecord {
        order_id: row.text(f::ORDER_ID),
        rep_name: row.text(f::REP_NAME),
        supervisor: row.text(f::SUPERVISOR),
        description: row.text(f::DESCRIPTION),
        supplier_name: row.text(f::SUPPLIER_NAME),
        supplier_note: row.trimmed(f::SUPPLIER_NOTE),
        supplier_code: row.trimmed(f::SUPPLIER_CODE),
        rep_code: row.text(f::REP_CODE),
        client_name,
        city,
        neighborhood,
        client_code,
        quantity,
        gross_amount: parse_amount(row.get(f::GROSS_AMOUNT)),
        bonus_amount: parse_amount(row.get(f::BONUS_AMOUNT)),
        return_amount: parse_amount(row.get(f::RETURN_AMOUNT)),
        net_weight: parse_amount(row.get(f::NET_WEIGHT)),
        order_date,
        ship_date,
        status: row.text(f::STATUS),
        branch: normalize_branch(&row.text(f::BRANCH)),
        supervisor_code: row.trimmed(f::SUPERVISOR_CODE),
        unit_stock: parse_amount(row.get(f::UNIT_STOCK)),
        master_pack_units: Decimal::from(quantity) / Decimal::from(master_pack),
        sale_type: row.trimmed(f::SALE_TYPE),
        product_code,
    }
}
