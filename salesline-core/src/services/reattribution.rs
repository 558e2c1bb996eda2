//! Reattribution engine
//!
//! Decides the final owner of every sale row. Rules are evaluated in a fixed
//! order and the first one that matches returns a [`Resolution`]; later rules
//! are never consulted.

use std::collections::{BTreeMap, HashMap};

use crate::config::RuleConfig;
use crate::domain::extract::sale_fields as f;
use crate::domain::{Client, Owner, RawRow};
use crate::services::lookup::{Lookups, Territory};

/// Outcome of the first matching rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Pinned (client, rep) pair: counter identity under another client code
    PinnedException { owner: Owner, client_code: String },
    /// Client in the counter-sale set
    CounterSale(Owner),
    /// National-account chain; `branch` is set when the municipality resolved
    NationalAccount { owner: Owner, branch: Option<String> },
    /// Inactive client placed in the municipality's predominant branch
    InactiveByBranch { owner: Owner, branch: String },
    /// Generic inactive identity
    Unattributed(Owner),
    /// Active client moved to its route rep's current identity
    Realigned(Owner),
}

impl Resolution {
    pub fn kind(&self) -> &'static str {
        match self {
            Resolution::PinnedException { .. } => "pinned_exception",
            Resolution::CounterSale(_) => "counter_sale",
            Resolution::NationalAccount { .. } => "national_account",
            Resolution::InactiveByBranch { .. } => "inactive_by_branch",
            Resolution::Unattributed(_) => "unattributed",
            Resolution::Realigned(_) => "realigned",
        }
    }

    /// Write the owner fields (and client code or branch, when rewritten)
    pub fn apply(self, row: &mut RawRow) {
        let (owner, client_code, branch) = match self {
            Resolution::PinnedException { owner, client_code } => (owner, Some(client_code), None),
            Resolution::NationalAccount { owner, branch } => (owner, None, branch),
            Resolution::InactiveByBranch { owner, branch } => (owner, None, Some(branch)),
            Resolution::CounterSale(owner)
            | Resolution::Unattributed(owner)
            | Resolution::Realigned(owner) => (owner, None, None),
        };

        row.set_text(f::REP_CODE, owner.rep_code);
        row.set_text(f::REP_NAME, owner.name);
        row.set_text(f::SUPERVISOR, owner.supervisor);
        if let Some(code) = client_code {
            row.set_text(f::CLIENT_CODE, code);
        }
        if let Some(branch) = branch {
            row.set_text(f::BRANCH, branch);
        }
    }
}

/// Per-run allocation of synthetic rep codes for chain branches
///
/// A branch keeps the code it was first given for the rest of the run.
#[derive(Debug, Clone)]
pub struct SyntheticCodeAllocator {
    next: u64,
    codes: HashMap<String, String>,
}

impl SyntheticCodeAllocator {
    pub fn new(seed: u64) -> Self {
        Self {
            next: seed,
            codes: HashMap::new(),
        }
    }

    pub fn code_for(&mut self, branch: &str) -> String {
        if let Some(code) = self.codes.get(branch) {
            return code.clone();
        }
        let code = self.next.to_string();
        self.next += 1;
        self.codes.insert(branch.to_string(), code.clone());
        code
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// What the rules look at, computed once per row
struct RowFacts<'r, 'l> {
    row: &'r RawRow,
    client_code: String,
    rep_code: String,
    client: Option<&'l Client>,
    territory: Option<Territory<'l>>,
}

/// Rewrites sale ownership using the lookups of one run
pub struct ReattributionEngine<'l> {
    lookups: &'l Lookups,
    rules: &'l RuleConfig,
    allocator: SyntheticCodeAllocator,
    hits: BTreeMap<String, usize>,
}

impl<'l> ReattributionEngine<'l> {
    pub fn new(lookups: &'l Lookups, rules: &'l RuleConfig) -> Self {
        Self {
            lookups,
            rules,
            allocator: SyntheticCodeAllocator::new(rules.chain_code_seed),
            hits: BTreeMap::new(),
        }
    }

    /// Reattribute rows in order, returning rewritten copies
    pub fn reattribute_all(&mut self, rows: &[RawRow]) -> Vec<RawRow> {
        rows.iter().map(|row| self.reattribute(row)).collect()
    }

    /// Canonicalize the supervisor, then apply the first matching rule
    pub fn reattribute(&mut self, row: &RawRow) -> RawRow {
        let mut out = row.clone();
        let supervisor = self.rules.canonical_supervisor(&out.text(f::SUPERVISOR));
        out.set_text(f::SUPERVISOR, supervisor);

        let resolution = self.resolve(&out);
        *self.hits.entry(resolution.kind().to_string()).or_default() += 1;
        resolution.apply(&mut out);
        out
    }

    /// Evaluate the rules for one row without touching it
    pub fn resolve(&mut self, row: &RawRow) -> Resolution {
        let lookups = self.lookups;
        let client_code = row.trimmed(f::CLIENT_CODE);
        let facts = RowFacts {
            row,
            client: lookups.clients.get(&client_code),
            territory: lookups.territory(&row.text(f::MUNICIPALITY)),
            rep_code: row.trimmed(f::REP_CODE),
            client_code,
        };

        // Precedence order; the first rule returning a resolution wins
        let rules: [fn(&mut Self, &RowFacts<'_, 'l>) -> Option<Resolution>; 5] = [
            Self::pinned_exception,
            Self::counter_sale,
            Self::national_account,
            Self::inactive_client,
            Self::active_realignment,
        ];
        rules
            .iter()
            .find_map(|rule| rule(self, &facts))
            .unwrap_or_else(|| self.unattributed())
    }

    /// Rule hit counts by resolution kind
    pub fn rule_hits(&self) -> &BTreeMap<String, usize> {
        &self.hits
    }

    pub fn allocated_codes(&self) -> usize {
        self.allocator.len()
    }

    fn unattributed(&self) -> Resolution {
        Resolution::Unattributed(self.rules.inactive_identity.clone())
    }

    fn pinned_exception(&mut self, facts: &RowFacts<'_, 'l>) -> Option<Resolution> {
        self.rules
            .pinned_exceptions
            .iter()
            .find(|p| p.client_code == facts.client_code && p.rep_code == facts.rep_code)
            .map(|p| Resolution::PinnedException {
                owner: self.rules.counter_identity.clone(),
                client_code: p.target_client_code.clone(),
            })
    }

    fn counter_sale(&mut self, facts: &RowFacts<'_, 'l>) -> Option<Resolution> {
        self.rules
            .counter_clients
            .contains(&facts.client_code)
            .then(|| Resolution::CounterSale(self.rules.counter_identity.clone()))
    }

    fn national_account(&mut self, facts: &RowFacts<'_, 'l>) -> Option<Resolution> {
        let marker = self.rules.chain_marker.to_uppercase();
        if marker.is_empty() {
            return None;
        }
        let is_chain = match facts.client {
            Some(client) => {
                client.display_name.to_uppercase().contains(&marker)
                    || client.legal_name.to_uppercase().contains(&marker)
            }
            None => raw_client_name(facts.row).to_uppercase().contains(&marker),
        };
        if !is_chain {
            return None;
        }

        let resolution = match facts.territory {
            Some(territory) => Resolution::NationalAccount {
                owner: Owner::new(
                    self.allocator.code_for(territory.branch),
                    self.rules.chain_name(territory.branch),
                    territory.supervisor.unwrap_or_default(),
                ),
                branch: Some(territory.branch.to_string()),
            },
            None => {
                let current = facts.row.text(f::SUPERVISOR);
                let supervisor = if current.is_empty() {
                    "N/A".to_string()
                } else {
                    current
                };
                Resolution::NationalAccount {
                    owner: Owner::new(
                        self.rules.chain_fallback_code.clone(),
                        self.rules.chain_fallback_name.clone(),
                        supervisor,
                    ),
                    branch: None,
                }
            }
        };
        Some(resolution)
    }

    fn inactive_client(&mut self, facts: &RowFacts<'_, 'l>) -> Option<Resolution> {
        let inactive = match facts.client {
            None => true,
            Some(client) => client.primary_rep() == self.rules.inactive_route,
        };
        if !inactive {
            return None;
        }

        let by_branch = facts.territory.and_then(|territory| {
            territory.supervisor.map(|supervisor| Resolution::InactiveByBranch {
                owner: self.rules.inactive_owner_for_branch(territory.branch, supervisor),
                branch: territory.branch.to_string(),
            })
        });
        Some(by_branch.unwrap_or_else(|| self.unattributed()))
    }

    fn active_realignment(&mut self, facts: &RowFacts<'_, 'l>) -> Option<Resolution> {
        let route_rep = facts.client.map(Client::primary_rep).unwrap_or_default();
        let resolution = match self.lookups.owners.get(route_rep) {
            Some(owner) if !route_rep.is_empty() => Resolution::Realigned(Owner::new(
                route_rep,
                owner.name.clone(),
                owner.supervisor.clone(),
            )),
            _ => self.unattributed(),
        };
        Some(resolution)
    }
}

/// Client name carried by the sale row itself, first non-empty column wins
fn raw_client_name(row: &RawRow) -> String {
    f::CLIENT_NAME_FALLBACKS
        .iter()
        .map(|field| row.text(field))
        .find(|name| !name.is_empty())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lookup::{BranchSupervisorMap, CityBranchMap, ClientMaster, OwnerMap};

    fn client(code: &str, rca: &str, fantasy: &str) -> Client {
        Client::from_row(&RawRow::from_pairs([
            ("Código", code),
            ("RCA 1", rca),
            ("Fantasia", fantasy),
        ]))
        .unwrap()
    }

    fn sale(pairs: &[(&str, &str)]) -> RawRow {
        RawRow::from_pairs(pairs.iter().copied())
    }

    /// Clients 100 (route 10), 200 (route 53), 300 (route 99, no owner),
    /// 400 (a chain store); SPRINGFIELD -> 01 / JANE, OGDENVILLE -> 02 / no supervisor
    fn lookups(rules: &RuleConfig) -> Lookups {
        let clients = ClientMaster::from_clients(&[
            client("100", "10", "MERCADO"),
            client("200", "53", "PADARIA"),
            client("300", "99", "BAR"),
            client("400", "10", "LOJAS AMERICANAS S.A"),
        ]);
        let history = vec![
            sale(&[("CODUSUR", "10"), ("NOME", "ALICE"), ("SUPERV", "JANE"), ("DTPED", "01/01/2024")]),
            sale(&[("CODCLI", "100"), ("MUNICIPIO", "SPRINGFIELD"), ("FILIAL", "1"), ("SUPERV", "JANE")]),
            sale(&[("CODCLI", "999"), ("MUNICIPIO", "OGDENVILLE"), ("FILIAL", "2"), ("SUPERV", "BOB")]),
        ];
        Lookups {
            owners: OwnerMap::build(&history, rules),
            city_branches: CityBranchMap::build(&history),
            branch_supervisors: BranchSupervisorMap::build(&history, &clients, rules),
            clients,
            ..Default::default()
        }
    }

    #[test]
    fn test_pinned_exception_takes_precedence_over_counter_set() {
        let mut rules = RuleConfig::default();
        rules.counter_clients.insert("9569".to_string());
        let lookups = lookups(&rules);
        let mut engine = ReattributionEngine::new(&lookups, &rules);

        let out = engine.reattribute(&sale(&[("CODCLI", "9569"), ("CODUSUR", "53")]));
        assert_eq!(out.text("CODCLI"), "7706");
        assert_eq!(out.text("CODUSUR"), "BALCAO_SP");
        assert_eq!(engine.rule_hits().get("pinned_exception"), Some(&1));

        let out = engine.reattribute(&sale(&[("CODCLI", "9569"), ("CODUSUR", "54")]));
        assert_eq!(out.text("CODCLI"), "9569");
        assert_eq!(engine.rule_hits().get("counter_sale"), Some(&1));
    }

    #[test]
    fn test_counter_client_keeps_client_code() {
        let rules = RuleConfig::default();
        let lookups = lookups(&rules);
        let mut engine = ReattributionEngine::new(&lookups, &rules);

        let out = engine.reattribute(&sale(&[("CODCLI", " 7706 "), ("CODUSUR", "10"), ("NOME", "ALICE")]));
        assert_eq!(out.text("CODUSUR"), "BALCAO_SP");
        assert_eq!(out.text("NOME"), "BALCAO");
        assert_eq!(out.text("SUPERV"), "BALCAO");
        assert_eq!(out.text("CODCLI"), " 7706 ");
    }

    #[test]
    fn test_chain_codes_are_stable_per_branch() {
        let rules = RuleConfig::default();
        let lookups = lookups(&rules);
        let mut engine = ReattributionEngine::new(&lookups, &rules);

        let springfield = sale(&[("CODCLI", "400"), ("MUNICIPIO", "springfield")]);
        let ogdenville = sale(&[("CODCLI", "555"), ("CLIENTE", "Americanas 12"), ("MUNICIPIO", "OGDENVILLE")]);

        let first = engine.reattribute(&springfield);
        assert_eq!(first.text("CODUSUR"), "1001");
        assert_eq!(first.text("NOME"), "AMERICANAS 01");
        assert_eq!(first.text("SUPERV"), "JANE");
        assert_eq!(first.text("FILIAL"), "01");

        let second = engine.reattribute(&ogdenville);
        assert_eq!(second.text("CODUSUR"), "1002");
        assert_eq!(second.text("SUPERV"), "");
        assert_eq!(second.text("FILIAL"), "02");

        assert_eq!(engine.reattribute(&springfield).text("CODUSUR"), "1001");
        assert_eq!(engine.allocated_codes(), 2);
    }

    #[test]
    fn test_chain_without_city_match_falls_back() {
        let rules = RuleConfig::default();
        let lookups = lookups(&rules);
        let mut engine = ReattributionEngine::new(&lookups, &rules);

        let out = engine.reattribute(&sale(&[("CODCLI", "400"), ("MUNICIPIO", "NOWHERE")]));
        assert_eq!(out.text("CODUSUR"), "1001");
        assert_eq!(out.text("NOME"), "AMERICANAS");
        assert_eq!(out.text("SUPERV"), "N/A");

        let out = engine.reattribute(&sale(&[("CODCLI", "400"), ("SUPERV", "balcão")]));
        assert_eq!(out.text("SUPERV"), "BALCAO");
        assert_eq!(engine.allocated_codes(), 0);
    }

    #[test]
    fn test_unknown_client_in_known_territory() {
        let rules = RuleConfig::default();
        let lookups = lookups(&rules);
        let mut engine = ReattributionEngine::new(&lookups, &rules);

        let out = engine.reattribute(&sale(&[("CODCLI", "99999"), ("MUNICIPIO", "SPRINGFIELD"), ("FILIAL", "7")]));
        assert_eq!(out.text("CODUSUR"), "INATIVOS_01");
        assert_eq!(out.text("NOME"), "INATIVOS 01");
        assert_eq!(out.text("SUPERV"), "JANE");
        assert_eq!(out.text("FILIAL"), "01");
    }

    #[test]
    fn test_inactive_without_branch_supervisor_is_generic() {
        let rules = RuleConfig::default();
        let lookups = lookups(&rules);
        let mut engine = ReattributionEngine::new(&lookups, &rules);

        // OGDENVILLE resolves to 02, which has no supervisor
        let out = engine.reattribute(&sale(&[("CODCLI", "200"), ("MUNICIPIO", "OGDENVILLE"), ("FILIAL", "9")]));
        assert_eq!(out.text("CODUSUR"), "INATIVO");
        assert_eq!(out.text("NOME"), "Inativo");
        assert_eq!(out.text("SUPERV"), "INATIVOS");
        assert_eq!(out.text("FILIAL"), "9");
    }

    #[test]
    fn test_active_client_realigned_to_route_owner() {
        let rules = RuleConfig::default();
        let lookups = lookups(&rules);
        let mut engine = ReattributionEngine::new(&lookups, &rules);

        let out = engine.reattribute(&sale(&[("CODCLI", "100"), ("CODUSUR", "77"), ("NOME", "GONE")]));
        assert_eq!(out.text("CODUSUR"), "10");
        assert_eq!(out.text("NOME"), "ALICE");
        assert_eq!(out.text("SUPERV"), "JANE");
    }

    #[test]
    fn test_active_client_without_owner_is_unattributed() {
        let rules = RuleConfig::default();
        let lookups = lookups(&rules);
        let mut engine = ReattributionEngine::new(&lookups, &rules);

        let resolution = engine.resolve(&sale(&[("CODCLI", "300")]));
        assert_eq!(resolution, Resolution::Unattributed(rules.inactive_identity.clone()));
    }

    #[test]
    fn test_fresh_engine_gets_fresh_allocator() {
        let rules = RuleConfig::default();
        let lookups = lookups(&rules);
        let row = sale(&[("CODCLI", "555"), ("CLIENTE", "AMERICANAS"), ("MUNICIPIO", "OGDENVILLE")]);

        let mut first = ReattributionEngine::new(&lookups, &rules);
        first.reattribute(&sale(&[("CODCLI", "400"), ("MUNICIPIO", "SPRINGFIELD")]));
        assert_eq!(first.reattribute(&row).text("CODUSUR"), "1002");

        let mut second = ReattributionEngine::new(&lookups, &rules);
        assert_eq!(second.reattribute(&row).text("CODUSUR"), "1001");
    }
}
