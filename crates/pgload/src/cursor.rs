//! Result cursors and low-level column decoding.
//!
//! A [`Cursor`] walks the rows of one result set. The scanner only needs three things from
//! it: advance to the next row, the column names, and decoding of one column of the current
//! row into a [`ScanTarget`].

use crate::client::RowStream;
use crate::error::{OrmError, OrmResult};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::error::Error;
use std::future::Future;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

/// Undecoded column value: its Postgres type and binary payload (`None` for NULL).
#[derive(Debug)]
pub struct RawValue<'a> {
    ty: Type,
    raw: Option<&'a [u8]>,
}

impl<'a> RawValue<'a> {
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn raw(&self) -> Option<&'a [u8]> {
        self.raw
    }
}

impl<'a> FromSql<'a> for RawValue<'a> {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Self {
            ty: ty.clone(),
            raw: Some(raw),
        })
    }

    fn from_sql_null(ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Self {
            ty: ty.clone(),
            raw: None,
        })
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// A place a single column can be decoded into.
///
/// Every owned [`FromSql`] type is a scan target.
pub trait ScanTarget: Send {
    fn scan_value(
        &mut self,
        ty: &Type,
        raw: Option<&[u8]>,
    ) -> Result<(), Box<dyn Error + Sync + Send>>;
}

impl<T> ScanTarget for T
where
    T: for<'a> FromSql<'a> + Send,
{
    fn scan_value(
        &mut self,
        ty: &Type,
        raw: Option<&[u8]>,
    ) -> Result<(), Box<dyn Error + Sync + Send>> {
        if !T::accepts(ty) {
            return Err(format!(
                "cannot convert between the Rust type `{}` and the Postgres type `{}`",
                std::any::type_name::<T>(),
                ty
            )
            .into());
        }
        *self = T::from_sql_nullable(ty, raw)?;
        Ok(())
    }
}

/// Destination that discards its column.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Ignore;

impl<'a> FromSql<'a> for Ignore {
    fn from_sql(_ty: &Type, _raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Ignore)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Ignore)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// An in-flight result set.
pub trait Cursor: Send {
    /// Move to the next row. `Ok(false)` once the rows are exhausted.
    fn advance(&mut self) -> impl Future<Output = OrmResult<bool>> + Send;

    /// Column names of the result set.
    fn columns(&self) -> OrmResult<Vec<String>>;

    /// Decode column `index` of the current row into `target`.
    fn decode(&self, index: usize, target: &mut dyn ScanTarget) -> OrmResult<()>;

    /// Release the cursor. Idempotent.
    fn close(&mut self);
}

fn no_current_row() -> OrmError {
    OrmError::Other("cursor is not positioned on a row".to_string())
}

fn decode_row(row: &Row, index: usize, target: &mut dyn ScanTarget) -> OrmResult<()> {
    let column = row
        .columns()
        .get(index)
        .map(|c| c.name().to_string())
        .unwrap_or_else(|| format!("#{index}"));
    let raw: RawValue<'_> = row
        .try_get(index)
        .map_err(|e| OrmError::decode(&column, e.to_string()))?;
    target
        .scan_value(raw.ty(), raw.raw())
        .map_err(|e| OrmError::decode(column, e.to_string()))
}

fn row_columns(row: Option<&Row>) -> Vec<String> {
    row.map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default()
}

/// Cursor over rows that were already fetched.
pub struct RowsCursor {
    rows: std::vec::IntoIter<Row>,
    current: Option<Row>,
}

impl RowsCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
            current: None,
        }
    }
}

impl Cursor for RowsCursor {
    async fn advance(&mut self) -> OrmResult<bool> {
        self.current = self.rows.next();
        Ok(self.current.is_some())
    }

    fn columns(&self) -> OrmResult<Vec<String>> {
        Ok(row_columns(self.current.as_ref()))
    }

    fn decode(&self, index: usize, target: &mut dyn ScanTarget) -> OrmResult<()> {
        let row = self.current.as_ref().ok_or_else(no_current_row)?;
        decode_row(row, index, target)
    }

    fn close(&mut self) {
        self.rows = Vec::new().into_iter();
        self.current = None;
    }
}

/// Cursor over a streamed result set.
pub struct StreamCursor {
    stream: Option<RowStream>,
    current: Option<Row>,
}

impl StreamCursor {
    pub fn new(stream: RowStream) -> Self {
        Self {
            stream: Some(stream),
            current: None,
        }
    }
}

impl Cursor for StreamCursor {
    async fn advance(&mut self) -> OrmResult<bool> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };
        match stream.next().await {
            Some(Ok(row)) => {
                self.current = Some(row);
                Ok(true)
            }
            Some(Err(err)) => {
                self.close();
                Err(err)
            }
            None => {
                self.close();
                Ok(false)
            }
        }
    }

    fn columns(&self) -> OrmResult<Vec<String>> {
        Ok(row_columns(self.current.as_ref()))
    }

    fn decode(&self, index: usize, target: &mut dyn ScanTarget) -> OrmResult<()> {
        let row = self.current.as_ref().ok_or_else(no_current_row)?;
        decode_row(row, index, target)
    }

    fn close(&mut self) {
        self.stream = None;
        self.current = None;
    }
}

/// In-memory result set built from Rust values, encoded in the binary wire format.
///
/// ```ignore
/// use pgload::MemoryCursor;
/// use tokio_postgres::types::Type;
///
/// let cursor = MemoryCursor::new([("id", Type::INT8), ("name", Type::TEXT)])
///     .with_row(&[&1_i64, &"alice"])?
///     .with_row(&[&2_i64, &"bob"])?;
/// ```
#[derive(Debug, Default)]
pub struct MemoryCursor {
    columns: Vec<(String, Type)>,
    rows: VecDeque<Vec<Option<Bytes>>>,
    current: Option<Vec<Option<Bytes>>>,
    closed: bool,
}

impl MemoryCursor {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Type)>,
        S: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
            ..Default::default()
        }
    }

    /// Append a row; `values` must line up with the columns.
    pub fn with_row(mut self, values: &[&(dyn ToSql + Sync)]) -> OrmResult<Self> {
        if values.len() != self.columns.len() {
            return Err(OrmError::input(format!(
                "row has {} values but the cursor has {} columns",
                values.len(),
                self.columns.len()
            )));
        }

        let mut row = Vec::with_capacity(values.len());
        for (value, (name, ty)) in values.iter().zip(&self.columns) {
            let mut buf = BytesMut::new();
            let encoded = match value
                .to_sql_checked(ty, &mut buf)
                .map_err(|e| OrmError::decode(name, e.to_string()))?
            {
                IsNull::Yes => None,
                IsNull::No => Some(buf.freeze()),
            };
            row.push(encoded);
        }
        self.rows.push_back(row);
        Ok(self)
    }

    /// Rows not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Cursor for MemoryCursor {
    async fn advance(&mut self) -> OrmResult<bool> {
        if self.closed {
            return Ok(false);
        }
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn columns(&self) -> OrmResult<Vec<String>> {
        Ok(self.columns.iter().map(|(name, _)| name.clone()).collect())
    }

    fn decode(&self, index: usize, target: &mut dyn ScanTarget) -> OrmResult<()> {
        let row = self.current.as_ref().ok_or_else(no_current_row)?;
        let (name, ty) = self
            .columns
            .get(index)
            .ok_or_else(|| OrmError::decode(format!("#{index}"), "column index out of range"))?;
        let raw = row.get(index).and_then(|v| v.as_deref());
        target
            .scan_value(ty, raw)
            .map_err(|e| OrmError::decode(name, e.to_string()))
    }

    fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
        self.current = None;
    }
}
