//! Pipeline service - extracts in, ownership-corrected collections out

use std::path::{Path, PathBuf};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::config::{Config, RuleConfig};
use crate::domain::extract::sale_fields as f;
use crate::domain::result::{Error, Result};
use crate::domain::{
    Client, ExtractKind, PipelineEvent, PipelineOutput, ProgressEvent, RawRow, RunStats,
    SaleRecord,
};
use crate::ports::{ChannelReporter, ProgressReporter};
use crate::services::lookup::{
    BranchSupervisorMap, CityBranchMap, ClientMaster, Lookups, OwnerMap, ProductMaster,
};
use crate::services::parse::read_extract;
use crate::services::postprocess::post_process;
use crate::services::projection::project_sale;
use crate::services::reattribution::ReattributionEngine;

/// Paths of the five extracts of a run
///
/// Each is optional here; a run refuses to start unless all five are set.
#[derive(Debug, Clone, Default)]
pub struct InputBundle {
    pub previous_year: Option<PathBuf>,
    pub current_year_history: Option<PathBuf>,
    pub current_month: Option<PathBuf>,
    pub clients: Option<PathBuf>,
    pub products: Option<PathBuf>,
}

impl InputBundle {
    pub fn path(&self, kind: ExtractKind) -> Option<&Path> {
        match kind {
            ExtractKind::PreviousYear => self.previous_year.as_deref(),
            ExtractKind::CurrentYearHistory => self.current_year_history.as_deref(),
            ExtractKind::CurrentMonth => self.current_month.as_deref(),
            ExtractKind::Clients => self.clients.as_deref(),
            ExtractKind::Products => self.products.as_deref(),
        }
    }

    /// Extracts with no path
    pub fn missing(&self) -> Vec<ExtractKind> {
        ExtractKind::ALL
            .into_iter()
            .filter(|kind| self.path(*kind).is_none())
            .collect()
    }
}

/// Parsed rows of the five extracts
#[derive(Debug, Clone, Default)]
pub struct ExtractSet {
    pub previous_year: Vec<RawRow>,
    pub current_year_history: Vec<RawRow>,
    pub current_month: Vec<RawRow>,
    pub clients: Vec<RawRow>,
    pub products: Vec<RawRow>,
}

/// Orchestrates a single run
///
/// Every run builds its own lookups and synthetic-code allocator; nothing is
/// shared between runs.
pub struct PipelineService {
    supplier: String,
    rules: RuleConfig,
}

impl PipelineService {
    pub fn new(supplier: impl Into<String>, rules: RuleConfig) -> Self {
        Self {
            supplier: supplier.into().trim().to_uppercase(),
            rules,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.supplier_key(), config.rules.clone())
    }

    /// Read all five extracts concurrently, then process them
    pub async fn run(
        &self,
        inputs: &InputBundle,
        reporter: &dyn ProgressReporter,
    ) -> Result<PipelineOutput> {
        let missing = inputs.missing();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|k| k.as_str()).collect();
            return Err(Error::validation(format!(
                "missing input extracts: {}",
                names.join(", ")
            )));
        }

        reporter.report(ProgressEvent::new("Reading files", 5));
        let extracts = Self::read_all(inputs).await?;
        Ok(self.process(extracts, reporter))
    }

    /// Run and report everything, including the terminal event, on a channel
    pub async fn run_to_channel(&self, inputs: &InputBundle, sender: UnboundedSender<PipelineEvent>) {
        let reporter = ChannelReporter::new(sender.clone());
        let event = match self.run(inputs, &reporter).await {
            Ok(output) => PipelineEvent::Result(Box::new(output)),
            Err(e) => PipelineEvent::from_error(&e),
        };
        let _ = sender.send(event);
    }

    async fn read_all(inputs: &InputBundle) -> Result<ExtractSet> {
        let (previous_year, current_year_history, current_month, clients, products) = tokio::try_join!(
            read_extract(inputs.path(ExtractKind::PreviousYear)),
            read_extract(inputs.path(ExtractKind::CurrentYearHistory)),
            read_extract(inputs.path(ExtractKind::CurrentMonth)),
            read_extract(inputs.path(ExtractKind::Clients)),
            read_extract(inputs.path(ExtractKind::Products)),
        )?;

        Ok(ExtractSet {
            previous_year,
            current_year_history,
            current_month,
            clients,
            products,
        })
    }

    fn is_supplier_sale(&self, row: &RawRow) -> bool {
        row.trimmed(f::SUPPLIER_NOTE).to_uppercase() == self.supplier
    }

    /// Filter, build lookups, reattribute, project and post-process
    ///
    /// Synchronous and infallible: bad values degrade, lookup misses fall
    /// back to generic owners.
    pub fn process(&self, extracts: ExtractSet, reporter: &dyn ProgressReporter) -> PipelineOutput {
        let mut stats = RunStats::default();

        reporter.report(ProgressEvent::new("Filtering supplier sales", 15));
        let mut sales = [
            (ExtractKind::PreviousYear, extracts.previous_year),
            (ExtractKind::CurrentYearHistory, extracts.current_year_history),
            (ExtractKind::CurrentMonth, extracts.current_month),
        ];
        for (kind, rows) in sales.iter_mut() {
            stats.raw_rows.insert(kind.to_string(), rows.len());
            rows.retain(|row| self.is_supplier_sale(row));
            stats.kept_rows.insert(kind.to_string(), rows.len());
        }
        let [(_, previous_year), (_, current_year), (_, current_month)] = sales;
        info!(
            previous_year = previous_year.len(),
            current_year = current_year.len(),
            current_month = current_month.len(),
            supplier = %self.supplier,
            "Filtered supplier sales"
        );

        reporter.report(ProgressEvent::new("Processing clients", 20));
        let clients: Vec<Client> = extracts.clients.iter().filter_map(Client::from_row).collect();
        let client_master = ClientMaster::from_clients(&clients);

        reporter.report(ProgressEvent::new("Mapping products", 30));
        let products = ProductMaster::build(&extracts.products);

        let city_branches = CityBranchMap::build(current_year.iter().chain(&current_month));
        let branch_supervisors = BranchSupervisorMap::build(&current_month, &client_master, &self.rules);

        reporter.report(ProgressEvent::new("Building owner map", 40));
        let owners = OwnerMap::build(
            previous_year.iter().chain(&current_year).chain(&current_month),
            &self.rules,
        );

        let lookups = Lookups {
            clients: client_master,
            products,
            owners,
            city_branches,
            branch_supervisors,
        };
        stats.clients = clients.len();
        stats.products = lookups.products.len();
        stats.owners = lookups.owners.len();
        stats.cities = lookups.city_branches.len();
        stats.branch_supervisors = lookups.branch_supervisors.len();
        debug!(?stats, "Lookups built");

        reporter.report(ProgressEvent::new("Reattributing sales", 50));
        let mut engine = ReattributionEngine::new(&lookups, &self.rules);
        let mut project = |rows: &[RawRow]| -> Vec<SaleRecord> {
            engine
                .reattribute_all(rows)
                .iter()
                .map(|row| project_sale(row, &lookups.clients, &lookups.products))
                .collect()
        };
        let mut previous_year = project(previous_year.as_slice());
        let mut current_year = project(current_year.as_slice());
        let mut current_month = project(current_month.as_slice());
        stats.rule_hits = engine.rule_hits().clone();

        let counts = post_process(
            &mut [
                previous_year.as_mut_slice(),
                current_year.as_mut_slice(),
                current_month.as_mut_slice(),
            ],
            &self.rules,
        );
        stats.branch_overrides = counts.branch_overrides;
        stats.seller_branch_corrections = counts.seller_corrections;
        info!(
            rule_hits = ?stats.rule_hits,
            branch_overrides = counts.branch_overrides,
            seller_corrections = counts.seller_corrections,
            "Reattribution complete"
        );

        reporter.report(ProgressEvent::new("Preparing output", 90));
        let mut history = previous_year;
        history.extend(current_year);

        let output = PipelineOutput {
            history,
            detailed: current_month,
            clients,
            stats,
        };
        reporter.report(ProgressEvent::new("Done", 100));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn pepsico(pairs: &[(&str, &str)]) -> RawRow {
        let mut row = RawRow::from_pairs(pairs.iter().copied());
        row.set_text("OBSERVACAOFOR", "pepsico ");
        row
    }

    #[test]
    fn test_missing_inputs_are_reported() {
        let inputs = InputBundle {
            clients: Some(PathBuf::from("clientes.csv")),
            ..Default::default()
        };
        let missing = inputs.missing();
        assert_eq!(missing.len(), 4);
        assert!(!missing.contains(&ExtractKind::Clients));
    }

    #[tokio::test]
    async fn test_run_refuses_incomplete_bundle() {
        let service = PipelineService::new("PEPSICO", RuleConfig::default());
        let err = service
            .run(&InputBundle::default(), &crate::ports::NoopReporter)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_supplier_filter_and_progress() {
        let service = PipelineService::new("PEPSICO", RuleConfig::default());
        let mut other = RawRow::from_pairs([("PEDIDO", "2")]);
        other.set_text("OBSERVACAOFOR", "ELMA");
        let extracts = ExtractSet {
            current_month: vec![pepsico(&[("PEDIDO", "1")]), other],
            ..Default::default()
        };

        let events = Mutex::new(Vec::new());
        let reporter = |event: ProgressEvent| events.lock().unwrap().push(event.percentage);
        let output = service.process(extracts, &reporter);

        assert_eq!(output.detailed.len(), 1);
        assert_eq!(output.detailed[0].order_id, "1");
        assert_eq!(output.stats.raw_rows["current_month"], 2);
        assert_eq!(output.stats.kept_rows["current_month"], 1);
        assert_eq!(*events.lock().unwrap(), vec![15, 20, 30, 40, 50, 90, 100]);
    }

    #[test]
    fn test_history_is_previous_then_current_year() {
        let service = PipelineService::new("pepsico", RuleConfig::default());
        let extracts = ExtractSet {
            previous_year: vec![pepsico(&[("PEDIDO", "p1")]), pepsico(&[("PEDIDO", "p2")])],
            current_year_history: vec![pepsico(&[("PEDIDO", "c1")])],
            ..Default::default()
        };
        let output = service.process(extracts, &crate::ports::NoopReporter);
        let ids: Vec<&str> = output.history.iter().map(|s| s.order_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "c1"]);
        assert!(output.detailed.is_empty());
    }
}
