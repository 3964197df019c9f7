//! Generated SQL plus its bind parameters.

use crate::client::GenericClient;
use crate::error::OrmResult;
use crate::param::ParamList;
use tokio_postgres::types::ToSql;

/// SQL text with positional parameters; `$k` binds the k-th parameter.
#[derive(Debug, Clone)]
pub struct Statement {
    sql: String,
    params: ParamList,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: ParamList) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &ParamList {
        &self.params
    }

    /// Parameters as references for tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.as_refs()
    }

    /// Number of the first placeholder not used by this statement.
    pub fn next_placeholder(&self) -> usize {
        self.params.len() + 1
    }

    pub fn into_parts(self) -> (String, ParamList) {
        (self.sql, self.params)
    }

    /// Execute and return the number of affected rows.
    pub async fn execute(&self, conn: &impl GenericClient) -> OrmResult<u64> {
        tracing::debug!(sql = %self.sql, params = self.params.len(), "executing statement");
        conn.execute(&self.sql, &self.params_ref()).await
    }
}
