//! Post-processors over the merged, projected sales
//!
//! Both only ever rewrite the branch field; rows are never dropped or
//! reordered.

use std::collections::{HashMap, HashSet};

use crate::config::{BranchOverrideRule, RuleConfig, SellerBranchRule};
use crate::domain::SaleRecord;

/// Rows rewritten by each post-processor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostProcessCounts {
    pub branch_overrides: usize,
    pub seller_corrections: usize,
}

/// Run the branch override, then the seller correction, across all collections
///
/// `collections` must be in merge order (previous year, current-year history,
/// current month); "last seen" follows that order.
pub fn post_process(collections: &mut [&mut [SaleRecord]], rules: &RuleConfig) -> PostProcessCounts {
    let relocated = relocated_clients(
        collections.iter().flat_map(|c| c.iter()),
        &rules.branch_override,
    );

    let mut counts = PostProcessCounts::default();
    for sale in collections.iter_mut().flat_map(|c| c.iter_mut()) {
        if sale.branch == rules.branch_override.from && relocated.contains(&sale.client_code) {
            sale.branch = rules.branch_override.to.clone();
            counts.branch_overrides += 1;
        }
        if applies_seller_rule(sale, &rules.seller_branch) && sale.branch != rules.seller_branch.branch {
            sale.branch = rules.seller_branch.branch.clone();
            counts.seller_corrections += 1;
        }
    }
    counts
}

/// Clients with any sale at `from` whose last sale is at `to`
fn relocated_clients<'a>(
    sales: impl IntoIterator<Item = &'a SaleRecord>,
    rule: &BranchOverrideRule,
) -> HashSet<String> {
    let mut last_branch: HashMap<&str, &str> = HashMap::new();
    let mut seen_at_from: HashSet<&str> = HashSet::new();

    for sale in sales {
        if sale.client_code.is_empty() || sale.branch.is_empty() {
            continue;
        }
        last_branch.insert(&sale.client_code, &sale.branch);
        if sale.branch == rule.from {
            seen_at_from.insert(&sale.client_code);
        }
    }

    seen_at_from
        .into_iter()
        .filter(|client| last_branch.get(client) == Some(&rule.to.as_str()))
        .map(str::to_string)
        .collect()
}

fn applies_seller_rule(sale: &SaleRecord, rule: &SellerBranchRule) -> bool {
    sale.supervisor_code == rule.supervisor_code && rule.rep_codes.contains(&sale.rep_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn sale(client: &str, branch: &str) -> SaleRecord {
        SaleRecord {
            order_id: String::new(),
            rep_name: String::new(),
            supervisor: String::new(),
            product_code: String::new(),
            description: String::new(),
            supplier_name: String::new(),
            supplier_note: String::new(),
            supplier_code: String::new(),
            rep_code: String::new(),
            client_code: client.to_string(),
            client_name: String::new(),
            city: String::new(),
            neighborhood: String::new(),
            quantity: 0,
            gross_amount: Decimal::ZERO,
            bonus_amount: Decimal::ZERO,
            return_amount: Decimal::ZERO,
            net_weight: Decimal::ZERO,
            order_date: None,
            ship_date: None,
            status: String::new(),
            branch: branch.to_string(),
            supervisor_code: String::new(),
            unit_stock: Decimal::ZERO,
            master_pack_units: Decimal::ZERO,
            sale_type: String::new(),
        }
    }

    fn branches(sales: &[SaleRecord]) -> Vec<&str> {
        sales.iter().map(|s| s.branch.as_str()).collect()
    }

    #[test]
    fn test_relocated_client_rows_move_across_collections() {
        let mut history = vec![sale("A", "05"), sale("B", "08"), sale("A", "05")];
        let mut month = vec![sale("B", "05"), sale("A", "08")];

        let counts = post_process(&mut [history.as_mut_slice(), month.as_mut_slice()], &RuleConfig::default());

        // A ends at 08: every 05 row moves; B ends at 05: untouched
        assert_eq!(branches(&history), vec!["08", "08", "08"]);
        assert_eq!(branches(&month), vec!["05", "08"]);
        assert_eq!(counts.branch_overrides, 2);
    }

    #[test]
    fn test_last_seen_follows_iteration_order() {
        let mut rows = vec![sale("C", "08"), sale("C", "05")];
        post_process(&mut [rows.as_mut_slice()], &RuleConfig::default());
        assert_eq!(branches(&rows), vec!["08", "05"]);
    }

    #[test]
    fn test_seller_rule_applies_after_override() {
        let mut rows = vec![sale("D", "03"), sale("E", "03"), sale("F", "08")];
        rows[0].supervisor_code = "12".into();
        rows[0].rep_code = "291".into();
        rows[1].supervisor_code = "11".into();
        rows[1].rep_code = "291".into();
        rows[2].supervisor_code = "12".into();
        rows[2].rep_code = "286".into();

        let counts = post_process(&mut [rows.as_mut_slice()], &RuleConfig::default());
        assert_eq!(branches(&rows), vec!["08", "03", "08"]);
        assert_eq!(counts.seller_corrections, 1);
    }
}
