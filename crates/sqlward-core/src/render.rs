//! SQL text assembly with dialect-specific placeholders.

use sqlward_types::{Dialect, Value};

use crate::expr::{ColumnRef, Condition};

/// Rendered SQL plus the parameters to bind, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Count `?` placeholders outside single-quoted literals.
pub fn count_raw_placeholders(sql: &str) -> usize {
    let mut in_literal = false;
    let mut count = 0;
    for ch in sql.chars() {
        match ch {
            '\'' => in_literal = !in_literal,
            '?' if !in_literal => count += 1,
            _ => {}
        }
    }
    count
}

pub(crate) struct SqlWriter<'a> {
    dialect: Dialect,
    table: &'a str,
    qualify: bool,
    sql: String,
    params: Vec<Value>,
}

impl<'a> SqlWriter<'a> {
    /// `qualify` prefixes unqualified columns with `table` (needed once joins
    /// are possible; `UPDATE`/`DELETE`/`INSERT` render bare names).
    pub(crate) fn new(dialect: Dialect, table: &'a str, qualify: bool) -> Self {
        Self {
            dialect,
            table,
            qualify,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    pub(crate) fn push_ident(&mut self, ident: &str) {
        self.sql.push_str(&quote_ident(ident));
    }

    pub(crate) fn push_column(&mut self, column: &ColumnRef) {
        match (&column.table, self.qualify) {
            (Some(table), _) => {
                self.push_ident(table);
                self.push(".");
            }
            (None, true) => {
                let table = self.table;
                self.push_ident(table);
                self.push(".");
            }
            (None, false) => {}
        }
        self.push_ident(&column.name);
    }

    /// Bind `value`. Nulls are written as a literal so no parameter type has
    /// to be inferred for them.
    pub(crate) fn push_param(&mut self, value: Value) {
        if value.is_null() {
            self.sql.push_str("NULL");
            return;
        }
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
    }

    /// Comma-separated list, each item written by `f`.
    pub(crate) fn push_list<T>(&mut self, items: impl IntoIterator<Item = T>, mut f: impl FnMut(&mut Self, T)) {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            f(self, item);
        }
    }

    pub(crate) fn push_condition(&mut self, condition: &Condition) {
        match condition {
            Condition::Compare { column, op, value } => {
                use crate::expr::CompareOp;
                self.push_column(column);
                match (op, value) {
                    (CompareOp::Eq, Value::Null) => self.push(" IS NULL"),
                    (CompareOp::Ne, Value::Null) => self.push(" IS NOT NULL"),
                    _ => {
                        self.push(" ");
                        self.push(op.as_sql());
                        self.push(" ");
                        self.push_param(value.clone());
                    }
                }
            }
            Condition::ColumnEq(a, b) => {
                self.push_column(a);
                self.push(" = ");
                self.push_column(b);
            }
            Condition::IsNull(column) => {
                self.push_column(column);
                self.push(" IS NULL");
            }
            Condition::IsNotNull(column) => {
                self.push_column(column);
                self.push(" IS NOT NULL");
            }
            Condition::In { column, values } => {
                if values.is_empty() {
                    // Empty IN list matches nothing.
                    self.push("1 = 0");
                    return;
                }
                self.push_column(column);
                self.push(" IN (");
                self.push_list(values, |w, v| w.push_param(v.clone()));
                self.push(")");
            }
            Condition::And(items) => self.push_junction(items, " AND ", "1 = 1"),
            Condition::Or(items) => self.push_junction(items, " OR ", "1 = 0"),
            Condition::Not(inner) => {
                self.push("NOT (");
                self.push_condition(inner);
                self.push(")");
            }
            Condition::Raw { sql, params } => self.push_raw(sql, params),
        }
    }

    fn push_junction(&mut self, items: &[Condition], sep: &str, empty: &str) {
        match items {
            [] => self.push(empty),
            [single] => self.push_condition(single),
            _ => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.push(sep);
                    }
                    self.push("(");
                    self.push_condition(item);
                    self.push(")");
                }
            }
        }
    }

    fn push_raw(&mut self, sql: &str, params: &[Value]) {
        let mut params = params.iter();
        let mut in_literal = false;
        for ch in sql.chars() {
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    self.sql.push(ch);
                }
                '?' if !in_literal => match params.next() {
                    Some(value) => self.push_param(value.clone()),
                    None => self.sql.push(ch),
                },
                _ => self.sql.push(ch),
            }
        }
    }

    /// `WHERE` clause joining every condition with `AND`; nothing when empty.
    pub(crate) fn push_where(&mut self, conditions: &[Condition]) {
        if conditions.is_empty() {
            return;
        }
        self.push(" WHERE ");
        self.push_junction(conditions, " AND ", "1 = 1");
    }

    pub(crate) fn finish(self) -> CompiledStatement {
        CompiledStatement {
            sql: self.sql,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;

    fn render(dialect: Dialect, qualify: bool, cond: &Condition) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect, "users", qualify);
        w.push_condition(cond);
        w.finish()
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_compare_sqlite() {
        let out = render(Dialect::Sqlite, false, &col("name").eq("a"));
        assert_eq!(out.sql, "\"name\" = ?");
        assert_eq!(out.params, vec![Value::Text("a".into())]);
    }

    #[test]
    fn test_positional_postgres() {
        let cond = col("a").gt(1).and(col("b").lte(2));
        let out = render(Dialect::Postgres, true, &cond);
        assert_eq!(out.sql, "(\"users\".\"a\" > $1) AND (\"users\".\"b\" <= $2)");
        assert_eq!(out.params.len(), 2);
    }

    #[test]
    fn test_null_comparisons() {
        let none: Option<String> = None;
        assert_eq!(render(Dialect::Sqlite, false, &col("x").eq(none.clone())).sql, "\"x\" IS NULL");
        assert_eq!(render(Dialect::Sqlite, false, &col("x").ne(none)).sql, "\"x\" IS NOT NULL");
    }

    #[test]
    fn test_null_param_is_literal() {
        let none: Option<i64> = None;
        let out = render(Dialect::Postgres, false, &col("a").gt(none).or(col("b").eq(1)));
        assert_eq!(out.sql, "(\"a\" > NULL) OR (\"b\" = $1)");
        assert_eq!(out.params, vec![Value::Int(1)]);
    }

    #[test]
    fn test_in_list() {
        let out = render(Dialect::Postgres, false, &col("id").is_in([1, 2, 3]));
        assert_eq!(out.sql, "\"id\" IN ($1, $2, $3)");
        let empty: Vec<i64> = Vec::new();
        assert_eq!(render(Dialect::Sqlite, false, &col("id").is_in(empty)).sql, "1 = 0");
    }

    #[test]
    fn test_not_and_empty_junctions() {
        assert_eq!(
            render(Dialect::Sqlite, false, &!col("a").is_null()).sql,
            "NOT (\"a\" IS NULL)"
        );
        assert_eq!(render(Dialect::Sqlite, false, &Condition::all([])).sql, "1 = 1");
        assert_eq!(render(Dialect::Sqlite, false, &Condition::any([])).sql, "1 = 0");
    }

    #[test]
    fn test_raw_rewrites_placeholders_outside_literals() {
        let cond = Condition::raw("length(name) > ? AND tag <> '?'", vec![Value::Int(3)]);
        let out = render(Dialect::Postgres, false, &cond);
        assert_eq!(out.sql, "length(name) > $1 AND tag <> '?'");
        assert_eq!(count_raw_placeholders("a = ? and b = '?' and c = ?"), 2);
    }

    #[test]
    fn test_qualified_column_kept() {
        let out = render(Dialect::Sqlite, false, &col("posts.user_id").eq_col(col("id")));
        assert_eq!(out.sql, "\"posts\".\"user_id\" = \"id\"");
    }
}
