use super::{network_url, DialectAdapter, Endpoint, IntrospectionStrategy, RowLimit};
use crate::connection::{ConnectionDescriptor, Dialect};
use crate::error::Result;

// MySQL 8 reports some information_schema columns as binary strings, hence the casts.
const TABLES_QUERY: &str = r#"
    SELECT CAST(TABLE_NAME AS CHAR)
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA = DATABASE()
      AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT
        CAST(c.COLUMN_NAME AS CHAR),
        CAST(c.COLUMN_TYPE AS CHAR),
        c.IS_NULLABLE = 'YES',
        c.COLUMN_KEY = 'PRI',
        (
            SELECT CAST(CONCAT(k.REFERENCED_TABLE_NAME, '.', k.REFERENCED_COLUMN_NAME) AS CHAR)
            FROM information_schema.KEY_COLUMN_USAGE k
            WHERE k.TABLE_SCHEMA = c.TABLE_SCHEMA
              AND k.TABLE_NAME = c.TABLE_NAME
              AND k.COLUMN_NAME = c.COLUMN_NAME
              AND k.REFERENCED_TABLE_NAME IS NOT NULL
            LIMIT 1
        )
    FROM information_schema.COLUMNS c
    WHERE c.TABLE_SCHEMA = DATABASE()
      AND c.TABLE_NAME = ?
    ORDER BY c.ORDINAL_POSITION
"#;

const ROW_COUNTS_QUERY: &str = r#"
    SELECT CAST(TABLE_NAME AS CHAR), CAST(TABLE_ROWS AS SIGNED)
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA = DATABASE()
      AND TABLE_TYPE = 'BASE TABLE'
"#;

pub struct MysqlAdapter;

impl DialectAdapter for MysqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn default_port(&self) -> Option<u16> {
        Some(3306)
    }

    fn build_endpoint(
        &self,
        descriptor: &ConnectionDescriptor,
        password: Option<&str>,
    ) -> Result<Endpoint> {
        let (mut address, mut redacted) =
            network_url("mysql", descriptor, password, self.resolve_port(descriptor));
        if descriptor.tls() {
            address.push_str("?ssl-mode=REQUIRED");
            redacted.push_str("?ssl-mode=REQUIRED");
        }
        Ok(Endpoint::new(Dialect::Mysql, address, redacted))
    }

    fn row_limit(&self, n: usize) -> RowLimit {
        RowLimit::Limit(n)
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
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
         Use DATE_SUB(NOW(), INTERVAL 7 DAY), DATE_FORMAT and YEAR()/MONTH() for dates. \
         Quote identifiers with backticks only when required."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_without_credentials() {
        let d = ConnectionDescriptor::builder(2, Dialect::Mysql, "shop")
            .host("mysql.local")
            .port(Some(3307))
            .build();
        let endpoint = MysqlAdapter.build_endpoint(&d, None).unwrap();
        assert_eq!(endpoint.address(), "mysql://mysql.local:3307/shop");
    }

    #[test]
    fn test_backtick_quoting() {
        assert_eq!(MysqlAdapter.quote_identifier("we`ird"), "`we``ird`");
    }
}
