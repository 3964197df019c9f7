//! Bind values for generated statements.
//!
//! Extraction reads values out of borrowed records, so each one is copied into a shared
//! [`Param`] once and the resulting [`Statement`](crate::Statement) owns everything it binds.

use bytes::BytesMut;
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};

/// One bind value, shared between clones of the statement that holds it.
#[derive(Clone)]
pub struct Param(pub(crate) Arc<dyn ToSql + Send + Sync>);

impl Param {
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// A parameter that binds SQL `NULL` for any column type.
    pub fn null() -> Self {
        Param(Arc::new(Null))
    }

    /// The value in the form `tokio-postgres` binds.
    pub fn as_ref(&self) -> &(dyn ToSql + Sync) {
        &*self.0 as &(dyn ToSql + Sync)
    }
}

impl std::fmt::Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Param").field(&self.0).finish()
    }
}

/// Untyped SQL `NULL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Null;

impl ToSql for Null {
    fn to_sql(&self, _ty: &Type, _out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// An ordered list of bind parameters; the k-th entry binds `$k`.
#[derive(Clone, Debug, Default)]
pub struct ParamList {
    params: Vec<Param>,
}

impl ParamList {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Append `value`; the returned number is its `$n` placeholder.
    pub fn push<T: ToSql + Send + Sync + 'static>(&mut self, value: T) -> usize {
        self.params.push(Param::new(value));
        self.params.len()
    }

    /// Like [`ParamList::push`], for a value that is already a [`Param`].
    pub fn push_param(&mut self, param: Param) -> usize {
        self.params.push(param);
        self.params.len()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The parameter at `index`, counted from zero (`$1` is index 0).
    pub fn get(&self, index: usize) -> Option<&Param> {
        self.params.get(index)
    }

    /// Borrowed slice-ready view for `query` / `execute`.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}
