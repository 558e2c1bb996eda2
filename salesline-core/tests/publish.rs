//! Publishing output into sinks: chunking, progress and failure handling

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use salesline_core::domain::result::{Error, Result};
use salesline_core::ports::{NoopReporter, RowBatch, TableSink};
use salesline_core::services::PublishService;
use salesline_core::{
    Client, OutputTable, PipelineOutput, ProgressEvent, SaleRecord, SaleslineContext,
};
use tempfile::TempDir;

fn sale(order_id: &str, branch: &str) -> SaleRecord {
    SaleRecord {
        order_id: order_id.to_string(),
        rep_name: "ALICE".into(),
        supervisor: "JANE".into(),
        product_code: "P1".into(),
        description: "SALGADINHO 40G".into(),
        supplier_name: "PEPSICO DO BRASIL".into(),
        supplier_note: "PEPSICO".into(),
        supplier_code: "77".into(),
        rep_code: "10".into(),
        client_code: "100".into(),
        client_name: "MERCADO".into(),
        city: "RECIFE".into(),
        neighborhood: "CENTRO".into(),
        quantity: 6,
        gross_amount: Decimal::new(123456, 2),
        bonus_amount: Decimal::ZERO,
        return_amount: Decimal::ZERO,
        net_weight: Decimal::new(24, 1),
        order_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 1),
        ship_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 2),
        status: "F".into(),
        branch: branch.to_string(),
        supervisor_code: "3".into(),
        unit_stock: Decimal::ZERO,
        master_pack_units: Decimal::ONE,
        sale_type: "1".into(),
    }
}

fn client(code: &str) -> Client {
    Client {
        code: code.to_string(),
        route_rep_1: "10".into(),
        route_rep_2: String::new(),
        city: "RECIFE".into(),
        display_name: "MERCADO".into(),
        neighborhood: "CENTRO".into(),
        legal_name: "MERCADO LTDA".into(),
        fantasy_name: "MERCADO".into(),
        category: "N/A".into(),
        last_purchase: None,
        block_status: "N".into(),
    }
}

fn output(history: usize, detailed: usize, clients: usize) -> PipelineOutput {
    PipelineOutput {
        history: (0..history).map(|i| sale(&format!("h{i}"), "01")).collect(),
        detailed: (0..detailed).map(|i| sale(&format!("d{i}"), "05")).collect(),
        clients: (0..clients).map(|i| client(&i.to_string())).collect(),
        stats: Default::default(),
    }
}

/// Records every call; optionally fails one of them
#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<String>>,
    fail_insert_on: Option<(OutputTable, usize)>,
    fail_refresh: bool,
}

#[async_trait]
impl TableSink for RecordingSink {
    async fn clear_table(&self, table: OutputTable) -> Result<()> {
        self.calls.lock().unwrap().push(format!("clear {}", table.label()));
        Ok(())
    }

    async fn insert_batch(&self, table: OutputTable, batch: RowBatch<'_>) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        let sent = calls
            .iter()
            .filter(|c| c.starts_with(&format!("insert {}", table.label())))
            .count();
        if self.fail_insert_on == Some((table, sent)) {
            return Err(Error::Other("connection reset".into()));
        }
        calls.push(format!("insert {} {}", table.label(), batch.len()));
        Ok(())
    }

    async fn refresh_cache(&self) -> Result<()> {
        self.calls.lock().unwrap().push("refresh".into());
        if self.fail_refresh {
            return Err(Error::Database("cache table missing".into()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_tables_are_cleared_then_filled_in_chunks() {
    let sink = Arc::new(RecordingSink::default());
    let service = PublishService::new(sink.clone(), 1000);

    let events = Mutex::new(Vec::<ProgressEvent>::new());
    let reporter = |event: ProgressEvent| events.lock().unwrap().push(event);
    let summary = service.publish(&output(2500, 10, 3), &reporter).await.unwrap();

    assert_eq!(
        *sink.calls.lock().unwrap(),
        vec![
            "clear history",
            "insert history 1000",
            "insert history 1000",
            "insert history 500",
            "clear detailed",
            "insert detailed 10",
            "clear clients",
            "insert clients 3",
            "refresh",
        ]
    );
    assert_eq!(summary.total_rows(), 2513);
    assert_eq!(summary.tables[0].batches, 3);
    assert!(summary.cache_refreshed);

    let progress: Vec<(String, u8)> = events
        .lock()
        .unwrap()
        .iter()
        .map(|e| (e.label.clone(), e.percentage))
        .collect();
    assert_eq!(progress[0], ("Clearing history".to_string(), 10));
    assert_eq!(progress[1], ("Sending history".to_string(), 40));
    assert_eq!(progress[2], ("Sending history".to_string(), 80));
    assert_eq!(progress[3], ("Sending history".to_string(), 100));
    assert_eq!(progress[4], ("Clearing detailed".to_string(), 40));
    assert_eq!(progress[6], ("Clearing clients".to_string(), 70));
    assert_eq!(progress.last().unwrap(), &("Refreshing cache".to_string(), 90));
}

#[tokio::test]
async fn test_empty_collections_leave_tables_alone() {
    let sink = Arc::new(RecordingSink::default());
    let service = PublishService::new(sink.clone(), 1000);

    let summary = service.publish(&output(0, 2, 0), &NoopReporter).await.unwrap();

    assert_eq!(
        *sink.calls.lock().unwrap(),
        vec!["clear detailed", "insert detailed 2", "refresh"]
    );
    assert_eq!(summary.skipped, vec![OutputTable::History, OutputTable::Clients]);
}

#[tokio::test]
async fn test_failed_chunk_aborts_with_transport_error() {
    let sink = Arc::new(RecordingSink {
        fail_insert_on: Some((OutputTable::History, 1)),
        ..Default::default()
    });
    let service = PublishService::new(sink.clone(), 2);

    let err = service.publish(&output(5, 1, 1), &NoopReporter).await.unwrap_err();

    assert_eq!(err.kind(), "transport");
    let message = err.to_string();
    assert!(message.contains("data_history"));
    assert!(message.contains("connection reset"));
    // Nothing after the failed chunk is sent, and no refresh happens
    assert_eq!(
        *sink.calls.lock().unwrap(),
        vec!["clear history", "insert history 2"]
    );
}

#[tokio::test]
async fn test_refresh_failure_does_not_fail_publish() {
    let sink = Arc::new(RecordingSink {
        fail_refresh: true,
        ..Default::default()
    });
    let service = PublishService::new(sink, 1000);

    let summary = service.publish(&output(1, 1, 1), &NoopReporter).await.unwrap();
    assert!(!summary.cache_refreshed);
    assert_eq!(summary.tables.len(), 3);
}

#[tokio::test]
async fn test_publish_into_duckdb_replaces_tables() {
    let dir = TempDir::new().unwrap();
    let ctx = SaleslineContext::new(dir.path()).unwrap();

    ctx.publish_service
        .publish(&output(3, 2, 4), &NoopReporter)
        .await
        .unwrap();
    let status = ctx.status_service.get_status().unwrap();
    assert_eq!(status.total_rows, 9);
    assert!(status.last_refresh.is_some());

    // A second publish replaces history but keeps detailed (empty collection)
    ctx.publish_service
        .publish(&output(1, 0, 4), &NoopReporter)
        .await
        .unwrap();
    let counts = ctx.repository.table_counts().unwrap();
    assert_eq!(counts.history, 1);
    assert_eq!(counts.detailed, 2);
    assert_eq!(counts.clients, 4);

    let branches = ctx.repository.column_values(OutputTable::Detailed, "filial").unwrap();
    assert_eq!(branches, vec![Some("05".to_string()), Some("05".to_string())]);
    let amounts = ctx.repository.column_values(OutputTable::History, "vlvenda").unwrap();
    assert_eq!(amounts[0].as_deref(), Some("1234.56"));
    let dates = ctx.repository.column_values(OutputTable::History, "dtped").unwrap();
    assert_eq!(dates[0].as_deref(), Some("2024-02-01"));
}

#[tokio::test]
async fn test_context_reopens_existing_database() {
    let dir = TempDir::new().unwrap();
    {
        let ctx = SaleslineContext::new(dir.path()).unwrap();
        ctx.publish_service
            .publish(&output(0, 0, 2), &NoopReporter)
            .await
            .unwrap();
    }
    let ctx = SaleslineContext::new(dir.path()).unwrap();
    assert_eq!(ctx.repository.table_counts().unwrap().clients, 2);
    assert_eq!(ctx.config.batch_size, salesline_core::config::DEFAULT_BATCH_SIZE);
}
