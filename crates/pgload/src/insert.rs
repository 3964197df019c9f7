//! Multi-row INSERT generation.

use crate::error::{OrmError, OrmResult};
use crate::extract::{ExtractedRow, quote_column};
use crate::param::ParamList;
use crate::schema::{Mapper, Record};
use crate::statement::Statement;

/// INSERT of one or more record instances.
///
/// Builder methods return a new value; an insert can be kept as a template.
///
/// ```ignore
/// let stmt = StructInsert::new("users", &[&alice, &bob])
///     .with_conflict("(email) DO NOTHING")
///     .with_returning_columns(["id"])
///     .generate(&mapper)?;
/// // INSERT INTO users ("name", "email") VALUES ($1, $2), ($3, $4)
/// //     ON CONFLICT (email) DO NOTHING RETURNING "id"
/// ```
#[derive(Debug)]
pub struct StructInsert<'a, R> {
    table: String,
    data: Vec<&'a R>,
    conflict: Option<String>,
    returning: Option<String>,
}

impl<R> Clone for StructInsert<'_, R> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            data: self.data.clone(),
            conflict: self.conflict.clone(),
            returning: self.returning.clone(),
        }
    }
}

/// Join column names into a quoted list: `"a", "b"`.
pub fn column_list<I, S>(columns: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    columns
        .into_iter()
        .map(|c| quote_column(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl<'a, R: Record> StructInsert<'a, R> {
    pub fn new(table: impl Into<String>, data: &[&'a R]) -> Self {
        Self {
            table: table.into(),
            data: data.to_vec(),
            conflict: None,
            returning: None,
        }
    }

    /// Insert a single instance.
    pub fn one(table: impl Into<String>, record: &'a R) -> Self {
        Self::new(table, &[record])
    }

    /// Replace the instances to insert.
    pub fn with_data(mut self, data: &[&'a R]) -> Self {
        self.data = data.to_vec();
        self
    }

    /// Append `ON CONFLICT <clause>`.
    pub fn with_conflict(mut self, clause: impl Into<String>) -> Self {
        self.conflict = Some(clause.into());
        self
    }

    /// Append `RETURNING <expr>`.
    pub fn with_returning(mut self, expr: impl Into<String>) -> Self {
        self.returning = Some(expr.into());
        self
    }

    pub fn with_returning_columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.with_returning(column_list(columns))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn generate(&self, mapper: &Mapper) -> OrmResult<Statement> {
        let Some((first, rest)) = self.data.split_first() else {
            return Err(OrmError::input("missing input to insert"));
        };

        let extractor = mapper.extractor::<R>()?;
        let head = extractor.extract(*first)?;
        let mut rows = Vec::with_capacity(self.data.len());
        for (idx, record) in rest.iter().enumerate() {
            let row = extractor.extract(*record)?;
            check_same_columns(&head, &row, idx + 1)?;
            rows.push(row);
        }

        let mut sql = format!("INSERT INTO {}", self.table);
        let mut params = ParamList::new();

        if head.is_empty() {
            if !rows.is_empty() {
                return Err(OrmError::input(
                    "cannot insert several rows without any column values",
                ));
            }
            sql.push_str(" DEFAULT VALUES");
        } else {
            sql.push(' ');
            sql.push_str(&head.insert_column_syntax());
            sql.push_str(" VALUES ");
            let values: Vec<String> = std::iter::once(&head)
                .chain(rows.iter())
                .map(|row| row.push_insert_values(&mut params))
                .collect();
            sql.push_str(&values.join(", "));
        }

        if let Some(conflict) = &self.conflict {
            sql.push_str(" ON CONFLICT ");
            sql.push_str(conflict);
        }
        if let Some(returning) = &self.returning {
            sql.push_str(" RETURNING ");
            sql.push_str(returning);
        }

        tracing::debug!(
            table = %self.table,
            rows = self.data.len(),
            params = params.len(),
            "generated insert"
        );
        Ok(Statement::new(sql, params))
    }
}

fn check_same_columns(head: &ExtractedRow, row: &ExtractedRow, idx: usize) -> OrmResult<()> {
    if head.columns() != row.columns() {
        return Err(OrmError::input(format!(
            "insert row {idx} has columns ({}) but row 0 has ({})",
            row.columns().join(", "),
            head.columns().join(", ")
        )));
    }
    Ok(())
}
