//! Schema rendering for prompts.
//!
//! The same text is used for SQL generation, parameter detection and query
//! suggestions, so output must stay deterministic for a given table list.

use super::TableInfo;
use itertools::Itertools;

/// Render tables as:
///
/// ```text
/// Table: orders (1,204 rows)
///   - id: integer (PK)
///   - customer_id: integer -> customers.id
/// ```
pub fn format_schema(tables: &[TableInfo]) -> String {
    let mut lines = Vec::new();

    for table in tables {
        let mut header = format!("Table: {}", table.name);
        if let Some(rows) = table.row_count {
            header.push_str(&format!(" ({} rows)", group_thousands(rows)));
        }
        lines.push(header);

        for col in &table.columns {
            let mut line = format!("  - {}: {}", col.name, col.data_type);
            if col.primary_key {
                line.push_str(" (PK)");
            }
            if let Some(ref fk) = col.foreign_key {
                line.push_str(&format!(" -> {}", fk));
            }
            lines.push(line);
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// One line per table with only its first `max_columns` column names.
/// Used where full column lists would not fit, e.g. relevance filtering.
pub fn compact_table_list(tables: &[TableInfo], max_columns: usize) -> String {
    tables
        .iter()
        .map(|t| {
            let cols = t.columns.iter().take(max_columns).map(|c| c.name.as_str()).join(", ");
            format!("{}({})", t.name, cols)
        })
        .join("\n")
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnInfo;

    fn col(name: &str, ty: &str, pk: bool, fk: Option<&str>) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: ty.to_string(),
            nullable: !pk,
            primary_key: pk,
            foreign_key: fk.map(String::from),
        }
    }

    #[test]
    fn test_format_schema() {
        let tables = vec![
            TableInfo {
                name: "customers".into(),
                columns: vec![col("id", "integer", true, None), col("name", "text", false, None)],
                row_count: Some(1204),
            },
            TableInfo {
                name: "orders".into(),
                columns: vec![
                    col("id", "integer", true, None),
                    col("customer_id", "integer", false, Some("customers.id")),
                ],
                row_count: None,
            },
        ];

        let text = format_schema(&tables);
        let expected = "Table: customers (1,204 rows)\n  - id: integer (PK)\n  - name: text\n\nTable: orders\n  - id: integer (PK)\n  - customer_id: integer -> customers.id\n";
        assert_eq!(text, expected);
        assert_eq!(format_schema(&tables), text);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(12345678), "12,345,678");
        assert_eq!(group_thousands(-4200), "-4,200");
    }

    #[test]
    fn test_compact_table_list_truncates_columns() {
        let table = TableInfo {
            name: "wide".into(),
            columns: (0..8).map(|i| col(&format!("c{}", i), "int", false, None)).collect(),
            row_count: None,
        };
        assert_eq!(compact_table_list(&[table], 3), "wide(c0, c1, c2)");
    }
}
