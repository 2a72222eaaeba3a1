use super::{DialectAdapter, Endpoint, IntrospectionStrategy, RowLimit};
use crate::connection::{ConnectionDescriptor, Dialect};
use crate::error::{AgentError, Result};

const TABLES_QUERY: &str = r#"
    SELECT name
    FROM sqlite_master
    WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
    ORDER BY name
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT
        p.name,
        p.type,
        p."notnull" = 0,
        p.pk > 0,
        (
            SELECT f."table" || '.' || f."to"
            FROM pragma_foreign_key_list(?1) f
            WHERE f."from" = p.name
            LIMIT 1
        )
    FROM pragma_table_info(?1) p
    ORDER BY p.cid
"#;

/// Counts recorded by the last `ANALYZE`. The leading integer of `stat` is the table's row count.
const ROW_COUNTS_QUERY: &str = r#"
    SELECT tbl, MAX(CAST(substr(stat, 1, instr(stat || ' ', ' ') - 1) AS INTEGER))
    FROM sqlite_stat1
    GROUP BY tbl
"#;

pub struct SqliteAdapter;

impl DialectAdapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn default_port(&self) -> Option<u16> {
        None
    }

    /// SQLite is path based: no host, port or credentials.
    fn build_endpoint(
        &self,
        descriptor: &ConnectionDescriptor,
        _password: Option<&str>,
    ) -> Result<Endpoint> {
        let path = descriptor.database().trim();
        if path.is_empty() {
            return Err(AgentError::Config(
                "SQLite connections need a database file path".to_string(),
            ));
        }
        let address = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", path)
        };
        Ok(Endpoint::new(Dialect::Sqlite, address.clone(), address))
    }

    fn row_limit(&self, n: usize) -> RowLimit {
        RowLimit::Limit(n)
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn tables_query(&self) -> &'static str {
        TABLES_QUERY
    }

    fn introspection(&self) -> IntrospectionStrategy {
        IntrospectionStrategy::PerTable {
            columns_query: COLUMNS_QUERY,
        }
    }

    fn approximate_row_counts_query(&self) -> Option<&'static str> {
        Some(ROW_COUNTS_QUERY)
    }

    fn generation_rules(&self) -> &'static str {
        "Limit rows with a trailing LIMIT clause. \
         Use date('now', '-7 days'), datetime() and strftime() for dates. \
         Avoid RIGHT JOIN and FULL OUTER JOIN."
    }
}
