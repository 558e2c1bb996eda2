//! Run log database migrations, embedded at compile time
//!
//! Applied to `logs.duckdb` only, never to the storage database.

pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_run_log.sql", include_str!("001_run_log.sql")),
];
