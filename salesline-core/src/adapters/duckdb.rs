//! DuckDB storage adapter

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use duckdb::{params, Connection};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result as CoreResult};
use crate::domain::{Client, OutputTable, SaleRecord};
use crate::ports::{RowBatch, TableSink};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of attempts when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Whether an open error is a file lock that may clear up on its own
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

const INSERT_SALE: &str = "(
    pedido, nome, superv, produto, descricao, fornecedor, observacaofor, codfor,
    codusur, codcli, cliente_nome, cidade, bairro, qtvenda, vlvenda, vlbonific,
    vldevolucao, totpesoliq, dtped, dtsaida, posicao, filial, codsupervisor,
    estoqueunit, qtvenda_embalagem_master, tipovenda
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const INSERT_CLIENT: &str = "INSERT INTO data_clients (
    codigo_cliente, rca1, rca2, cidade, nomecliente, bairro, razaosocial,
    fantasia, ramo, ultimacompra, bloqueio
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const REBUILD_FILTER_CACHE: &str = r#"
    DELETE FROM cache_dashboard_filters;
    INSERT INTO cache_dashboard_filters (superv, nome, fornecedor, cidade, filial, ano)
    SELECT DISTINCT superv, nome, fornecedor, cidade, filial, CAST(year(dtped) AS INTEGER)
    FROM (
        SELECT superv, nome, fornecedor, cidade, filial, dtped FROM data_history
        UNION ALL
        SELECT superv, nome, fornecedor, cidade, filial, dtped FROM data_detailed
    );
"#;

fn date_param(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn money(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Row counts of the output tables
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableCounts {
    pub history: i64,
    pub detailed: i64,
    pub clients: i64,
}

impl TableCounts {
    pub fn get(&self, table: OutputTable) -> i64 {
        match table {
            OutputTable::History => self.history,
            OutputTable::Detailed => self.detailed,
            OutputTable::Clients => self.clients,
        }
    }
}

/// DuckDB-backed storage for the output tables
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Lock errors are retried with exponential backoff; another process may
    /// be holding the file briefly.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            error = %err_msg,
                            "Database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Cached extensions in ~/.duckdb may not match the bundled engine
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)
            .with_context(|| format!("Failed to open {}", db_path.display()))?;
        Ok(conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Create or upgrade the schema
    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            debug!(applied = ?result.applied, "Migrations applied");
        }
        Ok(())
    }

    pub fn clear(&self, table: OutputTable) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(&format!("DELETE FROM {}", table.table_name()), [])?;
        Ok(deleted)
    }

    /// Insert sales in one transaction; nothing is kept if any row fails
    pub fn insert_sales(&self, table: OutputTable, sales: &[SaleRecord]) -> Result<()> {
        if table == OutputTable::Clients {
            bail!("{} does not hold sales", table);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare(&format!("INSERT INTO {} {}", table.table_name(), INSERT_SALE))?;
            for s in sales {
                stmt.execute(params![
                    s.order_id,
                    s.rep_name,
                    s.supervisor,
                    s.product_code,
                    s.description,
                    s.supplier_name,
                    s.supplier_note,
                    s.supplier_code,
                    s.rep_code,
                    s.client_code,
                    s.client_name,
                    s.city,
                    s.neighborhood,
                    s.quantity,
                    money(s.gross_amount),
                    money(s.bonus_amount),
                    money(s.return_amount),
                    money(s.net_weight),
                    date_param(s.order_date),
                    date_param(s.ship_date),
                    s.status,
                    s.branch,
                    s.supervisor_code,
                    money(s.unit_stock),
                    money(s.master_pack_units),
                    s.sale_type,
                ])
                .with_context(|| format!("Failed to insert order {}", s.order_id))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_clients(&self, clients: &[Client]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(INSERT_CLIENT)?;
            for c in clients {
                stmt.execute(params![
                    c.code,
                    c.route_rep_1,
                    c.route_rep_2,
                    c.city,
                    c.display_name,
                    c.neighborhood,
                    c.legal_name,
                    c.fantasy_name,
                    c.category,
                    date_param(c.last_purchase),
                    c.block_status,
                ])
                .with_context(|| format!("Failed to insert client {}", c.code))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Rebuild the dashboard filter cache and stamp the refresh time
    pub fn rebuild_filter_cache(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute_batch(REBUILD_FILTER_CACHE)?;
        tx.execute(
            "INSERT OR REPLACE INTO cache_refreshed_at (id, refreshed_at) VALUES (1, ?)",
            [Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()],
        )?;
        let rows: i64 =
            tx.query_row("SELECT COUNT(*) FROM cache_dashboard_filters", [], |row| row.get(0))?;
        tx.commit()?;
        Ok(rows as usize)
    }

    pub fn table_counts(&self) -> Result<TableCounts> {
        let conn = self.conn()?;
        let count = |table: OutputTable| -> Result<i64> {
            let n: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", table.table_name()),
                [],
                |row| row.get(0),
            )?;
            Ok(n)
        };
        Ok(TableCounts {
            history: count(OutputTable::History)?,
            detailed: count(OutputTable::Detailed)?,
            clients: count(OutputTable::Clients)?,
        })
    }

    /// When the filter cache was last rebuilt (UTC)
    pub fn last_refresh(&self) -> Result<Option<NaiveDateTime>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT CAST(refreshed_at AS VARCHAR) FROM cache_refreshed_at WHERE id = 1",
            [],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(s) => {
                // DuckDB may render fractional seconds
                let trimmed = s.split('.').next().unwrap_or(&s);
                Ok(NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT).ok())
            }
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Values of one column in insertion order, rendered as text
    pub fn column_values(&self, table: OutputTable, column: &str) -> Result<Vec<Option<String>>> {
        if column.is_empty() || !column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("Invalid column name: {}", column);
        }
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT CAST({} AS VARCHAR) FROM {} ORDER BY rowid",
            column,
            table.table_name()
        ))?;
        let values = stmt
            .query_map([], |row| row.get::<_, Option<String>>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(values)
    }
}

#[async_trait]
impl TableSink for DuckDbRepository {
    async fn clear_table(&self, table: OutputTable) -> CoreResult<()> {
        let deleted = self
            .clear(table)
            .map_err(|e| Error::transport(table.table_name(), format!("{:#}", e)))?;
        debug!(%table, deleted, "Table cleared");
        Ok(())
    }

    async fn insert_batch(&self, table: OutputTable, batch: RowBatch<'_>) -> CoreResult<()> {
        let result = match batch {
            RowBatch::Sales(rows) => self.insert_sales(table, rows),
            RowBatch::Clients(rows) if table == OutputTable::Clients => self.insert_clients(rows),
            RowBatch::Clients(_) => Err(anyhow!("{} does not hold clients", table)),
        };
        result.map_err(|e| Error::transport(table.table_name(), format!("{:#}", e)))
    }

    async fn refresh_cache(&self) -> CoreResult<()> {
        let rows = self
            .rebuild_filter_cache()
            .map_err(|e| Error::Database(format!("{:#}", e)))?;
        debug!(rows, "Filter cache rebuilt");
        Ok(())
    }
}
