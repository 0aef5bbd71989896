pub mod enum_def;

// The per-backend table definitions (sqlite.rs / postgres.rs) are mounted by
// `database::_sqlite_schema` / `database::_postgres_schema` via `#[path]`, so
// they are intentionally not declared here.
