//! Extract kinds and the field vocabulary of each extract

use serde::{Deserialize, Serialize};

/// The five input extracts of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractKind {
    PreviousYear,
    CurrentYearHistory,
    CurrentMonth,
    Clients,
    Products,
}

impl ExtractKind {
    pub const ALL: [ExtractKind; 5] = [
        ExtractKind::PreviousYear,
        ExtractKind::CurrentYearHistory,
        ExtractKind::CurrentMonth,
        ExtractKind::Clients,
        ExtractKind::Products,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractKind::PreviousYear => "previous_year",
            ExtractKind::CurrentYearHistory => "current_year_history",
            ExtractKind::CurrentMonth => "current_month",
            ExtractKind::Clients => "clients",
            ExtractKind::Products => "products",
        }
    }

    pub fn is_sales(&self) -> bool {
        matches!(
            self,
            ExtractKind::PreviousYear | ExtractKind::CurrentYearHistory | ExtractKind::CurrentMonth
        )
    }
}

impl std::fmt::Display for ExtractKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column names of the three sales extracts
pub mod sale_fields {
    pub const ORDER_ID: &str = "PEDIDO";
    pub const REP_CODE: &str = "CODUSUR";
    pub const REP_NAME: &str = "NOME";
    pub const SUPERVISOR: &str = "SUPERV";
    pub const CLIENT_CODE: &str = "CODCLI";
    pub const PRODUCT_CODE: &str = "PRODUTO";
    pub const DESCRIPTION: &str = "DESCRICAO";
    pub const SUPPLIER_NAME: &str = "FORNECEDOR";
    pub const SUPPLIER_NOTE: &str = "OBSERVACAOFOR";
    pub const SUPPLIER_CODE: &str = "CODFOR";
    pub const QUANTITY: &str = "QTVENDA";
    pub const GROSS_AMOUNT: &str = "VLVENDA";
    pub const BONUS_AMOUNT: &str = "VLBONIFIC";
    pub const RETURN_AMOUNT: &str = "VLDEVOLUCAO";
    pub const NET_WEIGHT: &str = "TOTPESOLIQ";
    pub const ORDER_DATE: &str = "DTPED";
    pub const SHIP_DATE: &str = "DTSAIDA";
    pub const STATUS: &str = "POSICAO";
    pub const BRANCH: &str = "FILIAL";
    pub const SUPERVISOR_CODE: &str = "CODSUPERVISOR";
    pub const UNIT_STOCK: &str = "ESTOQUEUNIT";
    pub const SALE_TYPE: &str = "TIPOVENDA";
    pub const MUNICIPALITY: &str = "MUNICIPIO";

    /// Client name columns some sales exports carry, in lookup order
    pub const CLIENT_NAME_FALLBACKS: [&str; 3] = ["CLIENTE", "NOMECLIENTE", "RAZAOSOCIAL"];
}

/// Column names of the client extract
pub mod client_fields {
    pub const CODE: &str = "Código";
    pub const ROUTE_REP_1: &str = "RCA 1";
    pub const ROUTE_REP_2: &str = "RCA 2";
    pub const CITY: &str = "Nome da Cidade";
    pub const LAST_PURCHASE: &str = "Data da Última Compra";
    pub const NEIGHBORHOOD: &str = "Bairro";
    pub const LEGAL_NAME: &str = "Cliente";
    pub const FANTASY_NAME: &str = "Fantasia";
    pub const CATEGORY: &str = "Descricao";
    pub const BLOCK: &str = "Bloqueio";
}

/// Column names of the product extract
pub mod product_fields {
    pub const CODE: &str = "Código";
    pub const MASTER_PACK_QUANTITY: &str = "Qtde embalagem master(Compra)";
}
