//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "supplier": "PEPSICO",
//!   "batchSize": 1000,
//!   "rules": { "counterClients": ["6421", "7706"], ... }
//! }
//! ```
//! Every key is optional; missing keys take the defaults below.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::Owner;

pub const DEFAULT_SUPPLIER: &str = "PEPSICO";
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rules: Option<RuleConfig>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Salesline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Only sales whose supplier observation equals this name are kept
    pub supplier: String,
    /// Rows per emitted chunk
    pub batch_size: usize,
    pub rules: RuleConfig,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supplier: DEFAULT_SUPPLIER.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            rules: RuleConfig::default(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// Supplier and batch size can be overridden with SALESLINE_SUPPLIER and
    /// SALESLINE_BATCH_SIZE.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings in {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        let config = Self::from_raw(raw).with_overrides(
            std::env::var("SALESLINE_SUPPLIER").ok(),
            std::env::var("SALESLINE_BATCH_SIZE").ok(),
        );
        Ok(config)
    }

    fn from_raw(raw: SettingsFile) -> Self {
        Self {
            supplier: raw
                .supplier
                .clone()
                .unwrap_or_else(|| DEFAULT_SUPPLIER.to_string()),
            batch_size: raw.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            rules: raw.rules.clone().unwrap_or_default(),
            _raw_settings: raw,
        }
    }

    /// Apply environment-style overrides; unparseable or empty values are ignored
    fn with_overrides(mut self, supplier: Option<String>, batch_size: Option<String>) -> Self {
        if let Some(supplier) = supplier.filter(|s| !s.trim().is_empty()) {
            self.supplier = supplier;
        }
        if let Some(size) = batch_size.and_then(|s| s.trim().parse::<usize>().ok()) {
            self.batch_size = size;
        }
        self.batch_size = self.batch_size.max(1);
        self
    }

    /// Normalized supplier name the filter compares against
    pub fn supplier_key(&self) -> String {
        self.supplier.trim().to_uppercase()
    }

    /// Save config to the data directory
    /// Preserves other settings we don't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.supplier = Some(self.supplier.clone());
        settings.batch_size = Some(self.batch_size);
        settings.rules = Some(self.rules.clone());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}

/// A (client, rep) pair pinned to the counter identity under another client code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedException {
    pub client_code: String,
    pub rep_code: String,
    pub target_client_code: String,
}

/// Rewrites branch `from` to `to` for clients last seen at `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchOverrideRule {
    pub from: String,
    pub to: String,
}

/// Reps under one supervisor code that always belong to a fixed branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerBranchRule {
    pub supervisor_code: String,
    pub rep_codes: BTreeSet<String>,
    pub branch: String,
}

/// Fixed constants of the reattribution and post-processing rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleConfig {
    pub pinned_exceptions: Vec<PinnedException>,
    pub counter_identity: Owner,
    pub counter_clients: BTreeSet<String>,
    /// Substring of the client name marking the national-account chain
    pub chain_marker: String,
    /// First synthetic rep code handed out to chain branches
    pub chain_code_seed: u64,
    pub chain_fallback_code: String,
    pub chain_fallback_name: String,
    /// Primary route-rep code that marks a client as inactive
    pub inactive_route: String,
    pub inactive_identity: Owner,
    /// Supervisor label of inactive pseudo-owners
    pub inactive_supervisor: String,
    /// Prefix of the per-branch inactive rep code and name
    pub inactive_branch_prefix: String,
    /// Canonical spelling of the counter supervisor
    pub counter_supervisor: String,
    /// Uppercased spellings that canonicalize to `counter_supervisor`
    pub counter_supervisor_variants: BTreeSet<String>,
    /// Uppercased misspelling -> canonical supervisor name
    pub supervisor_aliases: BTreeMap<String, String>,
    pub branch_override: BranchOverrideRule,
    pub seller_branch: SellerBranchRule,
}

impl Default for RuleConfig {
    fn default() -> Self {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            pinned_exceptions: vec![PinnedException {
                client_code: "9569".to_string(),
                rep_code: "53".to_string(),
                target_client_code: "7706".to_string(),
            }],
            counter_identity: Owner::new("BALCAO_SP", "BALCAO", "BALCAO"),
            counter_clients: set(&["6421", "7706", "9814", "11405", "9763"]),
            chain_marker: "AMERICANAS".to_string(),
            chain_code_seed: 1001,
            chain_fallback_code: "1001".to_string(),
            chain_fallback_name: "AMERICANAS".to_string(),
            inactive_route: "53".to_string(),
            inactive_identity: Owner::new("INATIVO", "Inativo", "INATIVOS"),
            inactive_supervisor: "INATIVOS".to_string(),
            inactive_branch_prefix: "INATIVOS".to_string(),
            counter_supervisor: "BALCAO".to_string(),
            counter_supervisor_variants: set(&["BALCAO", "BALCÃO"]),
            supervisor_aliases: BTreeMap::from([(
                "OSÉAS SANTOS OL".to_string(),
                "OSVALDO NUNES O".to_string(),
            )]),
            branch_override: BranchOverrideRule {
                from: "05".to_string(),
                to: "08".to_string(),
            },
            seller_branch: SellerBranchRule {
                supervisor_code: "12".to_string(),
                rep_codes: set(&["291", "292", "293", "284", "289", "287", "286"]),
                branch: "08".to_string(),
            },
        }
    }
}

impl RuleConfig {
    /// Correct known misspellings and fold counter-label variants
    ///
    /// Names that match neither are returned unchanged.
    pub fn canonical_supervisor(&self, raw: &str) -> String {
        let key = raw.trim().to_uppercase();
        if let Some(canonical) = self.supervisor_aliases.get(&key) {
            return canonical.clone();
        }
        if self.counter_supervisor_variants.contains(&key) {
            return self.counter_supervisor.clone();
        }
        raw.to_string()
    }

    /// True for any spelling of the counter supervisor
    pub fn is_counter_supervisor(&self, name: &str) -> bool {
        self.counter_supervisor_variants
            .contains(&name.trim().to_uppercase())
    }

    /// True for the inactive pseudo-supervisor label
    pub fn is_inactive_supervisor(&self, name: &str) -> bool {
        name.trim().to_uppercase() == self.inactive_supervisor.to_uppercase()
    }

    /// Synthetic owner for a national-account sale attributed to a branch
    pub fn chain_name(&self, branch: &str) -> String {
        format!("{} {}", self.chain_marker, branch)
    }

    /// Synthetic inactive owner for a branch
    pub fn inactive_owner_for_branch(&self, branch: &str, supervisor: &str) -> Owner {
        Owner::new(
            format!("{}_{}", self.inactive_branch_prefix, branch),
            format!("{} {}", self.inactive_branch_prefix, branch),
            supervisor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_settings_yield_defaults() {
        let config = Config::from_raw(serde_json::from_str("{}").unwrap());
        assert_eq!(config.supplier, "PEPSICO");
        assert_eq!(config.batch_size, 1000);
        assert!(config.rules.counter_clients.contains("7706"));
    }

    #[test]
    fn test_invalid_settings_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn test_partial_rules_keep_other_defaults() {
        let raw: SettingsFile = serde_json::from_str(
            r#"{ "supplier": "elma", "rules": { "chainMarker": "LOJAS" } }"#,
        )
        .unwrap();
        let config = Config::from_raw(raw);
        assert_eq!(config.supplier_key(), "ELMA");
        assert_eq!(config.rules.chain_marker, "LOJAS");
        assert_eq!(config.rules.inactive_route, "53");
    }

    #[test]
    fn test_overrides() {
        let config = Config::default().with_overrides(Some("ACME".into()), Some("250".into()));
        assert_eq!(config.supplier, "ACME");
        assert_eq!(config.batch_size, 250);

        let config = Config::default().with_overrides(Some("  ".into()), Some("zero".into()));
        assert_eq!(config.supplier, "PEPSICO");
        assert_eq!(config.batch_size, 1000);

        let config = Config::default().with_overrides(None, Some("0".into()));
        assert_eq!(config.batch_size, 1);
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "theme": "dark", "batchSize": 10 }"#).unwrap();

        let mut config = Config::default();
        config.batch_size = 20;
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["theme"], "dark");
        assert_eq!(saved["batchSize"], 20);
        assert_eq!(saved["rules"]["inactiveRoute"], "53");
    }

    #[test]
    fn test_canonical_supervisor() {
        let rules = RuleConfig::default();
        assert_eq!(rules.canonical_supervisor(" oséas santos ol "), "OSVALDO NUNES O");
        assert_eq!(rules.canonical_supervisor("Balcão"), "BALCAO");
        assert_eq!(rules.canonical_supervisor("JANE"), "JANE");
        assert!(rules.is_counter_supervisor("balcao"));
        assert!(rules.is_inactive_supervisor("Inativos"));
    }

    #[test]
    fn test_synthetic_inactive_owner() {
        let owner = RuleConfig::default().inactive_owner_for_branch("01", "JANE");
        assert_eq!(owner, Owner::new("INATIVOS_01", "INATIVOS 01", "JANE"));
    }

    #[test]
    fn test_inactive_prefix_is_independent_of_supervisor_label() {
        let rules: RuleConfig =
            serde_json::from_str(r#"{"inactiveSupervisor": "DESATIVADOS"}"#).unwrap();
        assert!(rules.is_inactive_supervisor("desativados"));
        assert!(!rules.is_inactive_supervisor("INATIVOS"));
        assert_eq!(
            rules.inactive_owner_for_branch("02", "JANE"),
            Owner::new("INATIVOS_02", "INATIVOS 02", "JANE")
        );

        let rules: RuleConfig =
            serde_json::from_str(r#"{"inactiveBranchPrefix": "INAT"}"#).unwrap();
        assert!(rules.is_inactive_supervisor("INATIVOS"));
        assert_eq!(rules.inactive_owner_for_branch("02", "JANE").rep_code, "INAT_02");
    }
}
