use super::{DialectAdapter, Endpoint, IntrospectionStrategy, RowLimit};
use crate::connection::{ConnectionDescriptor, Dialect};
use crate::error::Result;

const TABLES_QUERY: &str = r#"
    SELECT TABLE_NAME
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = 'dbo' AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
"#;

// Single round trip for the whole catalog: per-table queries are far too slow
// on databases with thousands of tables. At most one row per column: a column
// in several foreign keys reports the first constraint's target.
const BATCH_CATALOG_QUERY: &str = r#"
    SELECT
        t.TABLE_NAME,
        c.COLUMN_NAME,
        c.DATA_TYPE,
        CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END AS IS_NULLABLE,
        CASE WHEN pk.COLUMN_NAME IS NOT NULL THEN 1 ELSE 0 END AS IS_PRIMARY_KEY,
        fk.FK_TARGET
    FROM INFORMATION_SCHEMA.TABLES t
    JOIN INFORMATION_SCHEMA.COLUMNS c
        ON t.TABLE_NAME = c.TABLE_NAME AND t.TABLE_SCHEMA = c.TABLE_SCHEMA
    LEFT JOIN (
        SELECT ku.TABLE_NAME, ku.COLUMN_NAME
        FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
        JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE ku
            ON tc.CONSTRAINT_NAME = ku.CONSTRAINT_NAME AND tc.TABLE_SCHEMA = ku.TABLE_SCHEMA
        WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
            AND tc.TABLE_SCHEMA = 'dbo'
    ) pk ON c.TABLE_NAME = pk.TABLE_NAME AND c.COLUMN_NAME = pk.COLUMN_NAME
    OUTER APPLY (
        SELECT TOP 1
            OBJECT_NAME(fkc.referenced_object_id) + '.' + rc.name AS FK_TARGET
        FROM sys.foreign_key_columns fkc
        JOIN sys.columns pc
            ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
        JOIN sys.columns rc
            ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
        WHERE fkc.parent_object_id = OBJECT_ID(QUOTENAME(t.TABLE_SCHEMA) + '.' + QUOTENAME(t.TABLE_NAME))
            AND pc.name = c.COLUMN_NAME
        ORDER BY fkc.constraint_object_id
    ) fk
    WHERE t.TABLE_SCHEMA = 'dbo' AND t.TABLE_TYPE = 'BASE TABLE'
    ORDER BY t.TABLE_NAME, c.ORDINAL_POSITION
"#;

const ROW_COUNTS_QUERY: &str = r#"
    SELECT t.name, CAST(SUM(p.rows) AS BIGINT)
    FROM sys.tables t
    JOIN sys.partitions p ON p.object_id = t.object_id AND p.index_id IN (0, 1)
    WHERE SCHEMA_NAME(t.schema_id) = 'dbo'
    GROUP BY t.name
"#;

pub struct MssqlAdapter;

impl MssqlAdapter {
    /// ADO.NET values containing separators or quotes must be double-quoted.
    fn ado_value(value: &str) -> String {
        if value.contains([';', '=', '"', '\'']) || value.trim() != value {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

impl DialectAdapter for MssqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn default_port(&self) -> Option<u16> {
        Some(1433)
    }

    fn build_endpoint(
        &self,
        descriptor: &ConnectionDescriptor,
        password: Option<&str>,
    ) -> Result<Endpoint> {
        let host = descriptor.host().unwrap_or("localhost");
        let port = self.resolve_port(descriptor).unwrap_or(1433);

        let mut base = format!(
            "server=tcp:{},{};database={}",
            host,
            port,
            Self::ado_value(descriptor.database())
        );
        if let Some(user) = descriptor.username() {
            base.push_str(&format!(";user={}", Self::ado_value(user)));
        }

        // Without TLS the login is still encrypted but the session is not.
        let tail = format!(
            ";encrypt={};TrustServerCertificate=true",
            if descriptor.tls() { "true" } else { "false" }
        );

        let (address, redacted) = match password {
            Some(pass) if !pass.is_empty() => (
                format!("{};password={}{}", base, Self::ado_value(pass), tail),
                format!("{};password=***{}", base, tail),
            ),
            _ => (format!("{}{}", base, tail), format!("{}{}", base, tail)),
        };
        Ok(Endpoint::new(Dialect::Mssql, address, redacted))
    }

    fn row_limit(&self, n: usize) -> RowLimit {
        RowLimit::Top(n)
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn tables_query(&self) -> &'static str {
        TABLES_QUERY
    }

    fn introspection(&self) -> IntrospectionStrategy {
        IntrospectionStrategy::BatchCatalog {
            query: BATCH_CATALOG_QUERY,
        }
    }

    fn approximate_row_counts_query(&self) -> Option<&'static str> {
        Some(ROW_COUNTS_QUERY)
    }

    fn generation_rules(&self) -> &'static str {
        "Limit rows with SELECT TOP n; never use LIMIT. \
         Use DATEADD, DATEDIFF, GETDATE() and CONVERT for dates. \
         Quote identifiers with square brackets only when required."
    }
}
