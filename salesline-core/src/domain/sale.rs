//! Sale domain models: owner identity and the canonical sale record

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Who owns a sale: rep code, rep name and supervisor name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub rep_code: String,
    pub name: String,
    pub supervisor: String,
}

impl Owner {
    pub fn new(
        rep_code: impl Into<String>,
        name: impl Into<String>,
        supervisor: impl Into<String>,
    ) -> Self {
        Self {
            rep_code: rep_code.into(),
            name: name.into(),
            supervisor: supervisor.into(),
        }
    }
}

/// A normalized, ownership-corrected sale row
///
/// Append-only fact; serialized names are the storage column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    #[serde(rename = "pedido")]
    pub order_id: String,
    #[serde(rename = "nome")]
    pub rep_name: String,
    #[serde(rename = "superv")]
    pub supervisor: String,
    #[serde(rename = "produto")]
    pub product_code: String,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "fornecedor")]
    pub supplier_name: String,
    #[serde(rename = "observacaofor")]
    pub supplier_note: String,
    #[serde(rename = "codfor")]
    pub supplier_code: String,
    #[serde(rename = "codusur")]
    pub rep_code: String,
    #[serde(rename = "codcli")]
    pub client_code: String,
    #[serde(rename = "cliente_nome")]
    pub client_name: String,
    #[serde(rename = "cidade")]
    pub city: String,
    #[serde(rename = "bairro")]
    pub neighborhood: String,
    #[serde(rename = "qtvenda")]
    pub quantity: i64,
    #[serde(rename = "vlvenda")]
    pub gross_amount: Decimal,
    #[serde(rename = "vlbonific")]
    pub bonus_amount: Decimal,
    #[serde(rename = "vldevolucao")]
    pub return_amount: Decimal,
    #[serde(rename = "totpesoliq")]
    pub net_weight: Decimal,
    #[serde(rename = "dtped")]
    pub order_date: Option<NaiveDate>,
    #[serde(rename = "dtsaida")]
    pub ship_date: Option<NaiveDate>,
    #[serde(rename = "posicao")]
    pub status: String,
    #[serde(rename = "filial")]
    pub branch: String,
    #[serde(rename = "codsupervisor")]
    pub supervisor_code: String,
    #[serde(rename = "estoqueunit")]
    pub unit_stock: Decimal,
    /// Quantity expressed in master packs
    #[serde(rename = "qtvenda_embalagem_master")]
    pub master_pack_units: Decimal,
    #[serde(rename = "tipovenda")]
    pub sale_type: String,
}
