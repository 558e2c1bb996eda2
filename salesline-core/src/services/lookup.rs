//! Lookup builders
//!
//! Cross-reference maps derived from the full input set before any row is
//! reattributed. Each builder makes one pass over its inputs; the maps are
//! read-only afterwards.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::config::RuleConfig;
use crate::domain::extract::{product_fields, sale_fields as f};
use crate::domain::value::{normalize_branch, parse_date, parse_quantity};
use crate::domain::{Client, Owner, RawRow};

const NOT_AVAILABLE: &str = "N/A";

/// Order date used for chronological sorting; unparseable dates sort first
fn order_date_key(row: &RawRow) -> NaiveDate {
    parse_date(row.get(f::ORDER_DATE)).unwrap_or_default()
}

/// Rows in ascending order-date order, stable for equal dates
fn chronological<'a>(rows: impl IntoIterator<Item = &'a RawRow>) -> Vec<&'a RawRow> {
    let mut sorted: Vec<&RawRow> = rows.into_iter().collect();
    sorted.sort_by_key(|row| order_date_key(row));
    sorted
}

/// Client code -> client master entry; the last entry for a code wins
#[derive(Debug, Clone, Default)]
pub struct ClientMaster {
    entries: HashMap<String, Client>,
}

impl ClientMaster {
    pub fn from_clients(clients: &[Client]) -> Self {
        let entries = clients
            .iter()
            .map(|client| (client.code.clone(), client.clone()))
            .collect();
        Self { entries }
    }

    pub fn get(&self, code: &str) -> Option<&Client> {
        self.entries.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Product code -> master-pack quantity
#[derive(Debug, Clone, Default)]
pub struct ProductMaster {
    pack_sizes: HashMap<String, i64>,
}

impl ProductMaster {
    pub fn build(rows: &[RawRow]) -> Self {
        let mut pack_sizes = HashMap::new();
        for row in rows {
            let code = row.trimmed(product_fields::CODE);
            if code.is_empty() {
                continue;
            }
            let quantity = parse_quantity(row.get(product_fields::MASTER_PACK_QUANTITY));
            pack_sizes.insert(code, if quantity > 0 { quantity } else { 1 });
        }
        Self { pack_sizes }
    }

    /// Units per master pack, 1 for unknown products
    pub fn master_pack(&self, product_code: &str) -> i64 {
        self.pack_sizes.get(product_code).copied().unwrap_or(1)
    }

    pub fn len(&self) -> usize {
        self.pack_sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pack_sizes.is_empty()
    }
}

/// Rep code -> latest known owner identity
#[derive(Debug, Clone, Default)]
pub struct OwnerMap {
    owners: HashMap<String, Owner>,
}

impl OwnerMap {
    /// Build from every sales row, oldest order date first
    ///
    /// The first row for a rep code creates the entry (`N/A` for empty
    /// values); later rows overwrite name and supervisor only with non-empty
    /// values.
    pub fn build<'a>(rows: impl IntoIterator<Item = &'a RawRow>, rules: &RuleConfig) -> Self {
        let mut owners: HashMap<String, Owner> = HashMap::new();

        for row in chronological(rows) {
            let rep_code = row.trimmed(f::REP_CODE);
            if rep_code.is_empty() {
                continue;
            }
            let name = row.trimmed(f::REP_NAME);
            let supervisor = rules.canonical_supervisor(&row.trimmed(f::SUPERVISOR));

            match owners.get_mut(&rep_code) {
                None => {
                    let owner = Owner::new(
                        rep_code.clone(),
                        or_not_available(name),
                        or_not_available(supervisor),
                    );
                    owners.insert(rep_code, owner);
                }
                Some(owner) => {
                    if !name.is_empty() {
                        owner.name = name;
                    }
                    if !supervisor.is_empty() {
                        owner.supervisor = supervisor;
                    }
                }
            }
        }

        Self { owners }
    }

    pub fn get(&self, rep_code: &str) -> Option<&Owner> {
        self.owners.get(rep_code)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

fn or_not_available(value: String) -> String {
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value
    }
}

/// Uppercased municipality -> predominant branch
#[derive(Debug, Clone, Default)]
pub struct CityBranchMap {
    branches: HashMap<String, String>,
}

impl CityBranchMap {
    /// Majority vote of branch occurrences per municipality
    ///
    /// Feed it current-year history and current month. Ties go to the branch
    /// counted first.
    pub fn build<'a>(rows: impl IntoIterator<Item = &'a RawRow>) -> Self {
        // Insertion-ordered counts per city
        let mut stats: HashMap<String, Vec<(String, usize)>> = HashMap::new();

        for row in rows {
            let city = row.trimmed(f::MUNICIPALITY).to_uppercase();
            let branch = normalize_branch(&row.text(f::BRANCH));
            if city.is_empty() || branch.is_empty() {
                continue;
            }
            let counts = stats.entry(city).or_default();
            match counts.iter_mut().find(|(b, _)| *b == branch) {
                Some((_, count)) => *count += 1,
                None => counts.push((branch, 1)),
            }
        }

        let branches = stats
            .into_iter()
            .filter_map(|(city, counts)| {
                let mut best: Option<(String, usize)> = None;
                for (branch, count) in counts {
                    if best.as_ref().map_or(true, |(_, max)| count > *max) {
                        best = Some((branch, count));
                    }
                }
                best.map(|(branch, _)| (city, branch))
            })
            .collect();

        Self { branches }
    }

    /// Predominant branch for a municipality (any casing)
    pub fn get(&self, municipality: &str) -> Option<&str> {
        self.branches
            .get(&municipality.trim().to_uppercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

/// Branch -> supervisor most recently seen there
#[derive(Debug, Clone, Default)]
pub struct BranchSupervisorMap {
    supervisors: HashMap<String, String>,
}

impl BranchSupervisorMap {
    /// Latest supervisor per branch among current-month sales of known clients
    ///
    /// Inactive and counter pseudo-supervisors never become a branch's
    /// supervisor.
    pub fn build(current_month: &[RawRow], clients: &ClientMaster, rules: &RuleConfig) -> Self {
        let mut supervisors = HashMap::new();

        for row in chronological(current_month) {
            if !clients.contains(&row.trimmed(f::CLIENT_CODE)) {
                continue;
            }
            let branch = normalize_branch(&row.text(f::BRANCH));
            let raw_supervisor = row.trimmed(f::SUPERVISOR);
            if branch.is_empty() || raw_supervisor.is_empty() {
                continue;
            }
            if rules.is_inactive_supervisor(&raw_supervisor)
                || rules.is_counter_supervisor(&raw_supervisor)
            {
                continue;
            }
            let supervisor = rules.canonical_supervisor(&raw_supervisor);
            if rules.is_counter_supervisor(&supervisor) {
                continue;
            }
            supervisors.insert(branch, supervisor);
        }

        Self { supervisors }
    }

    pub fn get(&self, branch: &str) -> Option<&str> {
        self.supervisors.get(branch).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }
}

/// Predominant branch of a municipality and that branch's supervisor, if known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Territory<'a> {
    pub branch: &'a str,
    pub supervisor: Option<&'a str>,
}

/// Every map the reattribution engine and projector read
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    pub clients: ClientMaster,
    pub products: ProductMaster,
    pub owners: OwnerMap,
    pub city_branches: CityBranchMap,
    pub branch_supervisors: BranchSupervisorMap,
}

impl Lookups {
    /// Territory for a municipality via the city and branch maps
    pub fn territory(&self, municipality: &str) -> Option<Territory<'_>> {
        let branch = self.city_branches.get(municipality)?;
        Some(Territory {
            branch,
            supervisor: self.branch_supervisors.get(branch),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(pairs: &[(&str, &str)]) -> RawRow {
        RawRow::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_owner_map_keeps_last_non_empty_values() {
        let rows = vec![
            sale(&[("CODUSUR", "R"), ("NOME", ""), ("DTPED", "01/01/2024")]),
            sale(&[("CODUSUR", "R"), ("NOME", "Alice"), ("SUPERV", "JANE"), ("DTPED", "02/01/2024")]),
            sale(&[("CODUSUR", "R"), ("NOME", ""), ("SUPERV", ""), ("DTPED", "03/01/2024")]),
        ];
        let owners = OwnerMap::build(&rows, &RuleConfig::default());
        let owner = owners.get("R").unwrap();
        assert_eq!(owner.name, "Alice");
        assert_eq!(owner.supervisor, "JANE");
    }

    #[test]
    fn test_owner_map_orders_by_date_not_position() {
        let rows = vec![
            sale(&[("CODUSUR", "7"), ("NOME", "NEW NAME"), ("DTPED", "10/03/2024")]),
            sale(&[("CODUSUR", "7"), ("NOME", "OLD NAME"), ("DTPED", "10/01/2024")]),
        ];
        let owners = OwnerMap::build(&rows, &RuleConfig::default());
        assert_eq!(owners.get("7").unwrap().name, "NEW NAME");
        assert_eq!(owners.get("7").unwrap().supervisor, "N/A");
    }

    #[test]
    fn test_owner_map_canonicalizes_supervisors() {
        let rows = vec![sale(&[("CODUSUR", "1"), ("SUPERV", "Oséas Santos OL")])];
        let owners = OwnerMap::build(&rows, &RuleConfig::default());
        assert_eq!(owners.get("1").unwrap().supervisor, "OSVALDO NUNES O");
        assert_eq!(owners.get("1").unwrap().name, "N/A");
    }

    #[test]
    fn test_city_majority_wins() {
        let mut rows = Vec::new();
        for _ in 0..2 {
            rows.push(sale(&[("MUNICIPIO", "Recife"), ("FILIAL", "8")]));
        }
        for _ in 0..3 {
            rows.push(sale(&[("MUNICIPIO", "RECIFE "), ("FILIAL", "05")]));
        }
        let map = CityBranchMap::build(&rows);
        assert_eq!(map.get("recife"), Some("05"));
    }

    #[test]
    fn test_city_tie_goes_to_first_counted() {
        let rows = vec![
            sale(&[("MUNICIPIO", "OLINDA"), ("FILIAL", "02")]),
            sale(&[("MUNICIPIO", "OLINDA"), ("FILIAL", "01")]),
            sale(&[("MUNICIPIO", ""), ("FILIAL", "01")]),
        ];
        let map = CityBranchMap::build(&rows);
        assert_eq!(map.get("OLINDA"), Some("02"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_branch_supervisor_latest_known_client() {
        let clients = ClientMaster::from_clients(&[
            Client::from_row(&RawRow::from_pairs([("Código", "1")])).unwrap(),
        ]);
        let rows = vec![
            sale(&[("CODCLI", "1"), ("FILIAL", "1"), ("SUPERV", "LATER"), ("DTPED", "20/01/2024")]),
            sale(&[("CODCLI", "1"), ("FILIAL", "1"), ("SUPERV", "EARLIER"), ("DTPED", "05/01/2024")]),
            sale(&[("CODCLI", "1"), ("FILIAL", "1"), ("SUPERV", "INATIVOS"), ("DTPED", "25/01/2024")]),
            sale(&[("CODCLI", "1"), ("FILIAL", "1"), ("SUPERV", "Balcão"), ("DTPED", "26/01/2024")]),
            sale(&[("CODCLI", "2"), ("FILIAL", "1"), ("SUPERV", "STRANGER"), ("DTPED", "27/01/2024")]),
        ];
        let map = BranchSupervisorMap::build(&rows, &clients, &RuleConfig::default());
        assert_eq!(map.get("01"), Some("LATER"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_product_master_defaults_to_one() {
        let rows = vec![
            RawRow::from_pairs([("Código", "A"), ("Qtde embalagem master(Compra)", "12")]),
            RawRow::from_pairs([("Código", "B"), ("Qtde embalagem master(Compra)", "0")]),
            RawRow::from_pairs([("Código", "C"), ("Qtde embalagem master(Compra)", "x")]),
            RawRow::from_pairs([("Código", " "), ("Qtde embalagem master(Compra)", "6")]),
        ];
        let products = ProductMaster::build(&rows);
        assert_eq!(products.master_pack("A"), 12);
        assert_eq!(products.master_pack("B"), 1);
        assert_eq!(products.master_pack("C"), 1);
        assert_eq!(products.master_pack("unknown"), 1);
        assert_eq!(products.len(), 3);
    }

    #[test]
    fn test_territory_combines_maps() {
        let clients = ClientMaster::from_clients(&[
            Client::from_row(&RawRow::from_pairs([("Código", "1")])).unwrap(),
        ]);
        let month = vec![sale(&[
            ("CODCLI", "1"),
            ("FILIAL", "01"),
            ("SUPERV", "JANE"),
            ("MUNICIPIO", "SPRINGFIELD"),
        ])];
        let lookups = Lookups {
            city_branches: CityBranchMap::build(&month),
            branch_supervisors: BranchSupervisorMap::build(&month, &clients, &RuleConfig::default()),
            clients,
            ..Default::default()
        };
        let territory = lookups.territory("springfield").unwrap();
        assert_eq!(territory.branch, "01");
        assert_eq!(territory.supervisor, Some("JANE"));
        assert!(lookups.territory("SHELBYVILLE").is_none());
    }
}
