//! UPDATE generation from a record instance.

use crate::error::{OrmError, OrmResult};
use crate::extract::quote_column;
use crate::insert::column_list;
use crate::param::ParamList;
use crate::schema::{Mapper, Record};
use crate::statement::Statement;

/// UPDATE of one table row (or rows) from one record instance.
#[derive(Debug)]
pub struct StructUpdate<'a, R> {
    table: String,
    data: &'a R,
    returning: Option<String>,
}

impl<R> Clone for StructUpdate<'_, R> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            data: self.data,
            returning: self.returning.clone(),
        }
    }
}

impl<'a, R: Record> StructUpdate<'a, R> {
    pub fn new(table: impl Into<String>, data: &'a R) -> Self {
        Self {
            table: table.into(),
            data,
            returning: None,
        }
    }

    /// Append `RETURNING <expr>` to the match-column form.
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

    /// `UPDATE <table> SET ... <suffix>`.
    ///
    /// The SET list binds `$1..$n`. `suffix` is passed through untouched; placeholders in it
    /// are the caller's responsibility and must start at [`Statement::next_placeholder`].
    /// Bind their values by pushing onto the list from [`Statement::into_parts`].
    pub fn generate_generic_update(&self, mapper: &Mapper, suffix: &str) -> OrmResult<Statement> {
        let suffix = suffix.trim();
        if suffix.is_empty() {
            return Err(OrmError::input("missing after update statement"));
        }

        let row = mapper.extractor::<R>()?.extract(self.data)?;
        if row.is_empty() {
            return Err(OrmError::input("no columns to update"));
        }

        let mut params = ParamList::new();
        let assignments = row.push_update_assignments(&mut params);
        let sql = format!("UPDATE {} SET {assignments} {suffix}", self.table);

        tracing::debug!(table = %self.table, params = params.len(), "generated update");
        Ok(Statement::new(sql, params))
    }

    /// `UPDATE <table> SET ... WHERE <column> = $n+1 [RETURNING ...]`.
    ///
    /// The match value is read from the record before any tag policy and must be present.
    pub fn generate_exact_update(&self, mapper: &Mapper, column: &str) -> OrmResult<Statement> {
        let column = column.trim();
        if column.is_empty() {
            return Err(OrmError::input("missing column to match"));
        }

        let extractor = mapper.extractor::<R>()?.with_omit_columns([column]);
        let match_value = extractor.extract_raw_column_data(self.data, column)?;
        if match_value.is_absent() {
            return Err(OrmError::input(format!(
                "failed to locate column to match: {column} is empty"
            )));
        }

        let row = extractor.extract(self.data)?;
        if row.is_empty() {
            return Err(OrmError::input("no columns to update"));
        }

        let mut params = ParamList::new();
        let assignments = row.push_update_assignments(&mut params);
        let idx = params.push_param(match_value.to_param());

        let mut sql = format!(
            "UPDATE {} SET {assignments} WHERE {} = ${idx}",
            self.table,
            quote_column(column)
        );
        if let Some(returning) = &self.returning {
            sql.push_str(" RETURNING ");
            sql.push_str(returning);
        }

        tracing::debug!(
            table = %self.table,
            column,
            params = params.len(),
            "generated update"
        );
        Ok(Statement::new(sql, params))
    }
}
