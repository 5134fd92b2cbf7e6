//! Column references, filter conditions and orderings.

use std::fmt;

use sqlward_types::Value;

/// Sort direction for ordering clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

/// A column, optionally qualified by a table name (`posts.user_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

/// Reference a column. A single dot splits the table qualifier from the name.
pub fn col(name: &str) -> ColumnRef {
    match name.split_once('.') {
        Some((table, column)) => ColumnRef {
            table: Some(table.to_string()),
            name: column.to_string(),
        },
        None => ColumnRef {
            table: None,
            name: name.to_string(),
        },
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{table}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// A boolean filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: Value,
    },
    /// Column-to-column equality, used for join predicates.
    ColumnEq(ColumnRef, ColumnRef),
    IsNull(ColumnRef),
    IsNotNull(ColumnRef),
    In {
        column: ColumnRef,
        values: Vec<Value>,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    /// Raw SQL fragment with `?` placeholders, bound in order.
    Raw { sql: String, params: Vec<Value> },
}

impl Condition {
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Condition::Raw {
            sql: sql.into(),
            params,
        }
    }

    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::And(conditions.into_iter().collect())
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::Or(conditions.into_iter().collect())
    }

    /// Conjunction, flattening nested `And`s.
    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut items) => {
                items.push(other);
                Condition::And(items)
            }
            this => Condition::And(vec![this, other]),
        }
    }

    /// Disjunction, flattening nested `Or`s.
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut items) => {
                items.push(other);
                Condition::Or(items)
            }
            this => Condition::Or(vec![this, other]),
        }
    }

    /// Every column referenced by this condition.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Condition::Compare { column, .. }
            | Condition::IsNull(column)
            | Condition::IsNotNull(column)
            | Condition::In { column, .. } => out.push(column),
            Condition::ColumnEq(a, b) => {
                out.push(a);
                out.push(b);
            }
            Condition::And(items) | Condition::Or(items) => {
                for item in items {
                    item.collect_columns(out);
                }
            }
            Condition::Not(inner) => inner.collect_columns(out),
            Condition::Raw { .. } => {}
        }
    }
}

impl std::ops::Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

impl ColumnRef {
    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Condition {
        Condition::Compare {
            column: self,
            op,
            value: value.into(),
        }
    }

    /// `column = value`; a null value renders as `IS NULL`.
    pub fn eq(self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Eq, value)
    }

    /// `column <> value`; a null value renders as `IS NOT NULL`.
    pub fn ne(self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Gt, value)
    }

    pub fn gte(self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Gte, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Lt, value)
    }

    pub fn lte(self, value: impl Into<Value>) -> Condition {
        self.compare(CompareOp::Lte, value)
    }

    pub fn like(self, pattern: impl Into<String>) -> Condition {
        self.compare(CompareOp::Like, Value::Text(pattern.into()))
    }

    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        Condition::In {
            column: self,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(self) -> Condition {
        Condition::IsNull(self)
    }

    pub fn is_not_null(self) -> Condition {
        Condition::IsNotNull(self)
    }

    pub fn eq_col(self, other: ColumnRef) -> Condition {
        Condition::ColumnEq(self, other)
    }

    pub fn asc(self) -> OrderBy {
        OrderBy {
            column: self,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(self) -> OrderBy {
        OrderBy {
            column: self,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub order: SortOrder,
}
