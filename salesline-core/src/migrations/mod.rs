//! Storage database migrations, embedded at compile time
//!
//! Each entry is `(file name, sql)`; entries are applied in list order.
//! New migrations get a new `NNN_description.sql` file and an entry here.

pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
    ("002_filter_cache.sql", include_str!("002_filter_cache.sql")),
];
