//! Client master domain model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::extract::client_fields as f;
use super::row::RawRow;
use super::value::parse_date;

const NOT_AVAILABLE: &str = "N/A";

/// A client master entry, also the payload of the clients table
///
/// Serialized names are the storage column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "codigo_cliente")]
    pub code: String,
    #[serde(rename = "rca1")]
    pub route_rep_1: String,
    #[serde(rename = "rca2")]
    pub route_rep_2: String,
    #[serde(rename = "cidade")]
    pub city: String,
    /// Fantasy name, falling back to the legal name
    #[serde(rename = "nomecliente")]
    pub display_name: String,
    #[serde(rename = "bairro")]
    pub neighborhood: String,
    #[serde(rename = "razaosocial")]
    pub legal_name: String,
    #[serde(rename = "fantasia")]
    pub fantasy_name: String,
    #[serde(rename = "ramo")]
    pub category: String,
    #[serde(rename = "ultimacompra")]
    pub last_purchase: Option<NaiveDate>,
    #[serde(rename = "bloqueio")]
    pub block_status: String,
}

impl Client {
    /// Build a client from a client-extract row
    ///
    /// Returns `None` when the row has no client code.
    pub fn from_row(row: &RawRow) -> Option<Self> {
        let code = row.trimmed(f::CODE);
        if code.is_empty() {
            return None;
        }

        let fantasy = row.text(f::FANTASY_NAME);
        let legal = row.text(f::LEGAL_NAME);
        let display_name = if !fantasy.is_empty() {
            fantasy.clone()
        } else if !legal.is_empty() {
            legal.clone()
        } else {
            NOT_AVAILABLE.to_string()
        };

        Some(Self {
            code,
            route_rep_1: row.text(f::ROUTE_REP_1),
            route_rep_2: row.text(f::ROUTE_REP_2),
            city: or_not_available(row.text(f::CITY)),
            display_name,
            neighborhood: or_not_available(row.text(f::NEIGHBORHOOD)),
            legal_name: or_not_available(legal),
            fantasy_name: or_not_available(fantasy),
            category: or_not_available(row.text(f::CATEGORY)),
            last_purchase: parse_date(row.get(f::LAST_PURCHASE)),
            block_status: row.trimmed(f::BLOCK).to_uppercase(),
        })
    }

    /// Primary route-rep code, trimmed
    pub fn primary_rep(&self) -> &str {
        self.route_rep_1.trim()
    }
}

fn or_not_available(value: String) -> String {
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_without_code_is_dropped() {
        let row = RawRow::from_pairs([("Código", "  "), ("Cliente", "ACME")]);
        assert!(Client::from_row(&row).is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_legal_name() {
        let row = RawRow::from_pairs([("Código", " 42 "), ("Cliente", "MERCADO SILVA LTDA")]);
        let client = Client::from_row(&row).unwrap();
        assert_eq!(client.code, "42");
        assert_eq!(client.display_name, "MERCADO SILVA LTDA");
        assert_eq!(client.legal_name, "MERCADO SILVA LTDA");
        assert_eq!(client.fantasy_name, "N/A");
        assert_eq!(client.city, "N/A");
    }

    #[test]
    fn test_fantasy_name_wins_and_block_is_uppercased() {
        let row = RawRow::from_pairs([
            ("Código", "7"),
            ("Fantasia", "SILVA"),
            ("Cliente", "MERCADO SILVA LTDA"),
            ("Bloqueio", " s "),
            ("Data da Última Compra", "03/02/2024"),
        ]);
        let client = Client::from_row(&row).unwrap();
        assert_eq!(client.display_name, "SILVA");
        assert_eq!(client.block_status, "S");
        assert_eq!(client.last_purchase, NaiveDate::from_ymd_opt(2024, 2, 3));
    }

    #[test]
    fn test_serializes_with_storage_column_names() {
        let row = RawRow::from_pairs([("Código", "1"), ("RCA 1", "10")]);
        let json = serde_json::to_value(Client::from_row(&row).unwrap()).unwrap();
        assert_eq!(json["codigo_cliente"], "1");
        assert_eq!(json["rca1"], "10");
        assert!(json["ultimacompra"].is_null());
    }
}
