//! Select / insert / update / delete statements over one entity table.
//!
//! Statements are plain values: every refinement consumes the statement and
//! returns a new one, so a partially built query can be cloned and reused.
//! Column names are checked against the table metadata as they are added.

use sqlward_types::{Dialect, Value, Values};

use crate::ddl::default_sql;
use crate::error::QueryError;
use crate::schema::ColumnDefault;
use crate::expr::{ColumnRef, Condition, OrderBy, col};
use crate::render::{CompiledStatement, SqlWriter, count_raw_placeholders};
use crate::schema::TableMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: Condition,
}

/// Conflict handling for inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnConflict {
    /// Skip rows that violate any unique constraint.
    DoNothing,
    /// Overwrite the listed columns of the row with the same primary key.
    DoUpdate(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table: &'static TableMeta,
    pub columns: Vec<ColumnRef>,
    pub joins: Vec<Join>,
    pub conditions: Vec<Condition>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: &'static TableMeta,
    pub rows: Vec<Values>,
    pub on_conflict: Option<OnConflict>,
    pub returning: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: &'static TableMeta,
    pub values: Values,
    pub conditions: Vec<Condition>,
    pub returning: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: &'static TableMeta,
    pub conditions: Vec<Condition>,
    pub returning: bool,
}

/// Check a column against `table`. Columns qualified with another table
/// (joined tables) are not checked.
pub fn validate_column(table: &TableMeta, column: &ColumnRef) -> Result<(), QueryError> {
    match column.table.as_deref() {
        None => table.check_column(&column.name),
        Some(name) if name == table.name => table.check_column(&column.name),
        Some(_) => Ok(()),
    }
}

pub fn validate_condition(table: &TableMeta, condition: &Condition) -> Result<(), QueryError> {
    match condition {
        Condition::Raw { sql, params } => {
            let placeholders = count_raw_placeholders(sql);
            if placeholders != params.len() {
                return Err(QueryError::RawParameterCount {
                    placeholders,
                    params: params.len(),
                });
            }
            Ok(())
        }
        Condition::And(items) | Condition::Or(items) => items
            .iter()
            .try_for_each(|item| validate_condition(table, item)),
        Condition::Not(inner) => validate_condition(table, inner),
        other => other
            .columns()
            .into_iter()
            .try_for_each(|c| validate_column(table, c)),
    }
}

fn validate_values(table: &TableMeta, values: &Values) -> Result<(), QueryError> {
    values.columns().try_for_each(|c| table.check_column(c))
}

/// `filter_by` helper: equality on every pair of `values`.
pub fn equalities(values: &Values) -> Condition {
    Condition::all(values.iter().map(|(c, v)| col(c).eq(v.clone())))
}

impl SelectStatement {
    /// Every column of `table`, default ordering applied at render time.
    pub fn new(table: &'static TableMeta) -> Self {
        Self {
            table,
            columns: table.column_names().map(col).collect(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
        }
    }

    /// The explicit ordering, or the table's default when none was given.
    pub fn effective_order(&self) -> Vec<OrderBy> {
        if !self.order.is_empty() {
            return self.order.clone();
        }
        match self.table.default_order {
            Some((column, order)) => vec![OrderBy {
                column: col(column),
                order,
            }],
            None => Vec::new(),
        }
    }

    pub fn compile(&self, dialect: Dialect) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect, self.table.name, true);
        self.write(&mut w, dialect);
        w.finish()
    }

    fn write(&self, w: &mut SqlWriter<'_>, dialect: Dialect) {
        w.push(if self.distinct { "SELECT DISTINCT " } else { "SELECT " });
        w.push_list(&self.columns, |w, c| w.push_column(c));
        w.push(" FROM ");
        w.push_ident(self.table.name);
        for join in &self.joins {
            w.push(" ");
            w.push(join.kind.as_sql());
            w.push(" ");
            w.push_ident(&join.table);
            w.push(" ON ");
            w.push_condition(&join.on);
        }
        w.push_where(&self.conditions);

        let order = self.effective_order();
        if !order.is_empty() {
            w.push(" ORDER BY ");
            w.push_list(&order, |w, o| {
                w.push_column(&o.column);
                w.push(" ");
                w.push(o.order.as_sql());
            });
        }

        match (self.limit, self.offset, dialect) {
            (Some(limit), offset, _) => {
                w.push(&format!(" LIMIT {limit}"));
                if let Some(offset) = offset {
                    w.push(&format!(" OFFSET {offset}"));
                }
            }
            // SQLite only accepts OFFSET after a LIMIT.
            (None, Some(offset), Dialect::Sqlite) => w.push(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, Some(offset), Dialect::Postgres) => w.push(&format!(" OFFSET {offset}")),
            (None, None, _) => {}
        }
    }

    /// `SELECT COUNT(*)` over this statement as a subquery.
    pub fn compile_count(&self, dialect: Dialect) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect, self.table.name, true);
        w.push("SELECT COUNT(*) FROM (");
        self.write(&mut w, dialect);
        w.push(") AS \"counted\"");
        w.finish()
    }
}

impl InsertStatement {
    /// Insert one or more rows. All rows must set the same columns; a single
    /// empty row inserts server defaults only.
    pub fn new(table: &'static TableMeta, rows: Vec<Values>) -> Result<Self, QueryError> {
        let first = rows.first().ok_or(QueryError::EmptyValues("insert"))?;
        if first.is_empty() && rows.len() > 1 {
            return Err(QueryError::EmptyValues("insert"));
        }
        for row in &rows {
            validate_values(table, row)?;
            if row.len() != first.len() || !first.columns().all(|c| row.contains(c)) {
                return Err(QueryError::MismatchedRows);
            }
        }
        Ok(Self {
            table,
            rows,
            on_conflict: None,
            returning: true,
        })
    }

    /// Insert-or-update keyed on the primary key. `set` defaults to every
    /// non-key column present in the first row.
    pub fn upsert(
        table: &'static TableMeta,
        rows: Vec<Values>,
        set: Option<Vec<String>>,
    ) -> Result<Self, QueryError> {
        if table.primary_key().next().is_none() {
            return Err(QueryError::MissingPrimaryKey(table.name.to_string()));
        }
        let mut stmt = Self::new(table, rows)?;
        if stmt.rows[0].is_empty() {
            return Err(QueryError::EmptyValues("upsert"));
        }
        let set = match set {
            Some(set) => {
                set.iter().try_for_each(|c| table.check_column(c))?;
                set
            }
            None => stmt.rows[0]
                .columns()
                .filter(|c| table.column(c).is_some_and(|def| !def.primary_key))
                .map(str::to_string)
                .collect(),
        };
        stmt.on_conflict = Some(if set.is_empty() {
            OnConflict::DoNothing
        } else {
            OnConflict::DoUpdate(set)
        });
        Ok(stmt)
    }

    pub fn compile(&self, dialect: Dialect) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect, self.table.name, false);
        w.push("INSERT INTO ");
        w.push_ident(self.table.name);

        let columns: Vec<&str> = self.rows[0].columns().collect();
        if columns.is_empty() {
            w.push(" DEFAULT VALUES");
        } else {
            w.push(" (");
            w.push_list(&columns, |w, c| w.push_ident(c));
            w.push(") VALUES ");
            w.push_list(&self.rows, |w, row| {
                w.push("(");
                w.push_list(&columns, |w, c| {
                    w.push_param(row.get(c).cloned().unwrap_or(Value::Null))
                });
                w.push(")");
            });
        }

        match &self.on_conflict {
            None => {}
            Some(OnConflict::DoNothing) => w.push(" ON CONFLICT DO NOTHING"),
            Some(OnConflict::DoUpdate(set)) => {
                w.push(" ON CONFLICT (");
                w.push_list(self.table.primary_key(), |w, pk| w.push_ident(pk.name));
                w.push(") DO UPDATE SET ");
                w.push_list(set, |w, c| {
                    w.push_ident(c);
                    w.push(" = excluded.");
                    w.push_ident(c);
                });
                for (column, value) in on_update_columns(self.table, |c| set.iter().any(|s| s == c)) {
                    w.push(", ");
                    w.push_ident(column);
                    w.push(" = ");
                    w.push(&default_sql(value, dialect));
                }
            }
        }

        if self.returning {
            push_returning(&mut w, self.table);
        }
        w.finish()
    }
}

/// Columns with an `on_update` value that the statement does not set itself.
fn on_update_columns(
    table: &'static TableMeta,
    is_set: impl Fn(&str) -> bool,
) -> impl Iterator<Item = (&'static str, &'static ColumnDefault)> {
    table
        .columns
        .iter()
        .filter(move |c| !is_set(c.name))
        .filter_map(|c| c.on_update.as_ref().map(|value| (c.name, value)))
}

impl UpdateStatement {
    pub fn new(table: &'static TableMeta, values: Values) -> Result<Self, QueryError> {
        if values.is_empty() {
            return Err(QueryError::EmptyValues("update"));
        }
        validate_values(table, &values)?;
        Ok(Self {
            table,
            values,
            conditions: Vec::new(),
            returning: false,
        })
    }

    pub fn compile(&self, dialect: Dialect) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect, self.table.name, false);
        w.push("UPDATE ");
        w.push_ident(self.table.name);
        w.push(" SET ");
        w.push_list(self.values.iter(), |w, (c, v)| {
            w.push_ident(c);
            w.push(" = ");
            w.push_param(v.clone());
        });
        for (column, value) in on_update_columns(self.table, |c| self.values.contains(c)) {
            w.push(", ");
            w.push_ident(column);
            w.push(" = ");
            w.push(&default_sql(value, dialect));
        }
        w.push_where(&self.conditions);
        if self.returning {
            push_returning(&mut w, self.table);
        }
        w.finish()
    }
}

impl DeleteStatement {
    pub fn new(table: &'static TableMeta) -> Self {
        Self {
            table,
            conditions: Vec::new(),
            returning: false,
        }
    }

    pub fn compile(&self, dialect: Dialect) -> CompiledStatement {
        let mut w = SqlWriter::new(dialect, self.table.name, false);
        w.push("DELETE FROM ");
        w.push_ident(self.table.name);
        w.push_where(&self.conditions);
        if self.returning {
            push_returning(&mut w, self.table);
        }
        w.finish()
    }
}

fn push_returning(w: &mut SqlWriter<'_>, table: &TableMeta) {
    w.push(" RETURNING ");
    w.push_list(table.column_names(), |w, c| w.push_ident(c));
}

/// Any statement over one entity table.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl From<SelectStatement> for Statement {
    fn from(s: SelectStatement) -> Self {
        Statement::Select(s)
    }
}

impl From<InsertStatement> for Statement {
    fn from(s: InsertStatement) -> Self {
        Statement::Insert(s)
    }
}

impl From<UpdateStatement> for Statement {
    fn from(s: UpdateStatement) -> Self {
        Statement::Update(s)
    }
}

impl From<DeleteStatement> for Statement {
    fn from(s: DeleteStatement) -> Self {
        Statement::Delete(s)
    }
}

impl Statement {
    pub fn table(&self) -> &'static TableMeta {
        match self {
            Statement::Select(s) => s.table,
            Statement::Insert(s) => s.table,
            Statement::Update(s) => s.table,
            Statement::Delete(s) => s.table,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
        }
    }

    /// Whether executing the statement yields entity rows.
    pub fn returns_rows(&self) -> bool {
        match self {
            Statement::Select(_) => true,
            Statement::Insert(s) => s.returning,
            Statement::Update(s) => s.returning,
            Statement::Delete(s) => s.returning,
        }
    }

    fn unsupported(&self, operation: &'static str) -> QueryError {
        QueryError::Unsupported {
            operation,
            statement: self.kind(),
        }
    }

    pub fn filter(self, condition: Condition) -> Result<Self, QueryError> {
        validate_condition(self.table(), &condition)?;
        match self {
            Statement::Select(mut s) => {
                s.conditions.push(condition);
                Ok(Statement::Select(s))
            }
            Statement::Update(mut s) => {
                s.conditions.push(condition);
                Ok(Statement::Update(s))
            }
            Statement::Delete(mut s) => {
                s.conditions.push(condition);
                Ok(Statement::Delete(s))
            }
            other => Err(other.unsupported("filter")),
        }
    }

    pub fn join(self, kind: JoinKind, table: &str, on: Condition) -> Result<Self, QueryError> {
        validate_condition(self.table(), &on)?;
        match self {
            Statement::Select(mut s) => {
                s.joins.push(Join {
                    kind,
                    table: table.to_string(),
                    on,
                });
                Ok(Statement::Select(s))
            }
            other => Err(other.unsupported("join")),
        }
    }

    pub fn order_by(self, order: OrderBy) -> Result<Self, QueryError> {
        validate_column(self.table(), &order.column)?;
        match self {
            Statement::Select(mut s) => {
                s.order.push(order);
                Ok(Statement::Select(s))
            }
            other => Err(other.unsupported("order_by")),
        }
    }

    pub fn limit(self, limit: u64) -> Result<Self, QueryError> {
        match self {
            Statement::Select(mut s) => {
                s.limit = Some(limit);
                Ok(Statement::Select(s))
            }
            other => Err(other.unsupported("limit")),
        }
    }

    pub fn offset(self, offset: u64) -> Result<Self, QueryError> {
        match self {
            Statement::Select(mut s) => {
                s.offset = Some(offset);
                Ok(Statement::Select(s))
            }
            other => Err(other.unsupported("offset")),
        }
    }

    pub fn distinct(self) -> Result<Self, QueryError> {
        match self {
            Statement::Select(mut s) => {
                s.distinct = true;
                Ok(Statement::Select(s))
            }
            other => Err(other.unsupported("distinct")),
        }
    }

    /// Restrict the selected columns (for scalar queries).
    pub fn only(self, columns: Vec<ColumnRef>) -> Result<Self, QueryError> {
        if columns.is_empty() {
            return Err(QueryError::EmptyValues("select"));
        }
        for c in &columns {
            validate_column(self.table(), c)?;
        }
        match self {
            Statement::Select(mut s) => {
                s.columns = columns;
                Ok(Statement::Select(s))
            }
            other => Err(other.unsupported("only")),
        }
    }

    pub fn returning(self, returning: bool) -> Result<Self, QueryError> {
        match self {
            Statement::Insert(mut s) => {
                s.returning = returning;
                Ok(Statement::Insert(s))
            }
            Statement::Update(mut s) => {
                s.returning = returning;
                Ok(Statement::Update(s))
            }
            Statement::Delete(mut s) => {
                s.returning = returning;
                Ok(Statement::Delete(s))
            }
            other => Err(other.unsupported("returning")),
        }
    }

    pub fn ignore_conflicts(self) -> Result<Self, QueryError> {
        match self {
            Statement::Insert(s) if s.rows[0].is_empty() => {
                Err(Statement::Insert(s).unsupported("ignore_conflicts on DEFAULT VALUES"))
            }
            Statement::Insert(mut s) => {
                s.on_conflict = Some(OnConflict::DoNothing);
                Ok(Statement::Insert(s))
            }
            other => Err(other.unsupported("ignore_conflicts")),
        }
    }

    pub fn compile(&self, dialect: Dialect) -> CompiledStatement {
        match self {
            Statement::Select(s) => s.compile(dialect),
            Statement::Insert(s) => s.compile(dialect),
            Statement::Update(s) => s.compile(dialect),
            Statement::Delete(s) => s.compile(dialect),
        }
    }

    pub fn compile_count(&self, dialect: Dialect) -> Result<CompiledStatement, QueryError> {
        match self {
            Statement::Select(s) => Ok(s.compile_count(dialect)),
            other => Err(other.unsupported("count")),
        }
    }
}
