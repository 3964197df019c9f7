//! Row scanning into scalars, records and collections of records.
//!
//! A [`Scanner`] owns exactly one cursor and is consumed by [`Scanner::scan`] or
//! [`Scanner::scan_row`]. The cursor is closed when either call returns, and on drop.
//!
//! Destinations come in three shapes, see [`ScanDest`]:
//!
//! - directly scannable values (scalars, `Option`/`Vec` of scalars, [`Ignore`], `Json<T>`,
//!   or any [`ScanTarget`] that opts in) decode column by column, in order;
//! - records map columns to fields by name through the record's [`Schema`](crate::Schema);
//! - `Vec<R>` of records gets one element appended per row.

use crate::cursor::{Cursor, Ignore, ScanTarget};
use crate::error::{OrmError, OrmResult};
use crate::schema::{Mapper, Record, RecordType, slot_at};
use std::any::TypeId;
use std::sync::Arc;
use tokio_postgres::types::Json;

const SCAN_ROW_MULTIPLE: &str = "scan row found multiple rows, expected one";
const SCAN_DIRECT_MULTIPLE: &str =
    "more than one row returned for single-row destinations, scan into a Vec instead";
const SCAN_RECORD_MULTIPLE: &str =
    "one record destination specified but more than one row returned, scan into a Vec instead";
const NO_ROWS: &str = "no rows in result set";

/// How a destination wants to receive rows.
pub enum ScanDest<'a> {
    /// Decoded as-is, one column per destination.
    Direct(&'a mut dyn ScanTarget),
    /// Columns mapped onto record fields.
    Record(&'a mut dyn Record, RecordType),
    /// One new record per row.
    Records(&'a mut dyn RecordSink),
}

/// A scan destination.
///
/// `#[derive(Record)]` implements this for records. For a custom [`FromSql`] type, return
/// [`ScanDest::Direct`]:
///
/// ```ignore
/// impl pgload::Scannable for Money {
///     fn scan_dest(&mut self) -> pgload::ScanDest<'_> {
///         pgload::ScanDest::Direct(self)
///     }
/// }
/// ```
///
/// [`FromSql`]: tokio_postgres::types::FromSql
pub trait Scannable: Send {
    fn scan_dest(&mut self) -> ScanDest<'_>;
}

/// A growable collection of records.
pub trait RecordSink: Send {
    fn record_type(&self) -> RecordType;

    /// Append a default record and return it for decoding.
    fn push_default(&mut self) -> &mut dyn Record;

    /// Drop the most recently appended record.
    fn pop_last(&mut self);
}

impl<R: Record + Default> RecordSink for Vec<R> {
    fn record_type(&self) -> RecordType {
        RecordType::of::<R>()
    }

    fn push_default(&mut self) -> &mut dyn Record {
        self.push(R::default());
        let last = self.len() - 1;
        &mut self[last]
    }

    fn pop_last(&mut self) {
        self.pop();
    }
}

impl<R: Record + Default> Scannable for Vec<R> {
    fn scan_dest(&mut self) -> ScanDest<'_> {
        ScanDest::Records(self)
    }
}

macro_rules! impl_scannable_direct {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scannable for $ty {
                fn scan_dest(&mut self) -> ScanDest<'_> {
                    ScanDest::Direct(self)
                }
            }

            impl Scannable for Option<$ty> {
                fn scan_dest(&mut self) -> ScanDest<'_> {
                    ScanDest::Direct(self)
                }
            }
        )*
    };
}

macro_rules! impl_scannable_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl_scannable_direct!($ty, Vec<$ty>);
        )*
    };
}

impl_scannable_scalar!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u32,
    f32,
    f64,
    String,
    uuid::Uuid,
    chrono::NaiveDate,
    chrono::NaiveTime,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
    chrono::DateTime<chrono::FixedOffset>,
    serde_json::Value,
);

impl_scannable_direct!(Vec<u8>);

#[cfg(feature = "rust_decimal")]
impl_scannable_scalar!(rust_decimal::Decimal);

#[cfg(feature = "time")]
impl_scannable_scalar!(time::Date, time::PrimitiveDateTime, time::OffsetDateTime);

impl Scannable for Ignore {
    fn scan_dest(&mut self) -> ScanDest<'_> {
        ScanDest::Direct(self)
    }
}

impl<T> Scannable for Json<T>
where
    T: serde::de::DeserializeOwned + Send,
{
    fn scan_dest(&mut self) -> ScanDest<'_> {
        ScanDest::Direct(self)
    }
}

impl<T> Scannable for Option<Json<T>>
where
    T: serde::de::DeserializeOwned + Send,
{
    fn scan_dest(&mut self) -> ScanDest<'_> {
        ScanDest::Direct(self)
    }
}

/// Report result columns that have no destination field.
///
/// An empty traversal marks an unmapped column; columns beyond the traversal list are
/// unmapped too, and traversals beyond the column list are reported as `UNKNOWN`.
pub(crate) fn missing_columns(columns: &[String], traversals: &[Vec<usize>]) -> OrmResult<()> {
    let mut missing: Vec<String> = traversals
        .iter()
        .enumerate()
        .filter(|(_, path)| path.is_empty())
        .map(|(idx, _)| {
            columns
                .get(idx)
                .cloned()
                .unwrap_or_else(|| "UNKNOWN".to_string())
        })
        .collect();

    if columns.len() > traversals.len() {
        missing.extend(columns[traversals.len()..].iter().cloned());
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(OrmError::SchemaMismatch { columns: missing })
    }
}

/// Decodes the rows of one cursor into destinations.
pub struct Scanner<C: Cursor> {
    cursor: C,
    mapper: Arc<Mapper>,
    columns: Option<Vec<String>>,
    traversals: Option<(TypeId, Vec<Vec<usize>>)>,
    closed: bool,
}

impl<C: Cursor> Scanner<C> {
    pub fn new(cursor: C, mapper: Arc<Mapper>) -> Self {
        Self {
            cursor,
            mapper,
            columns: None,
            traversals: None,
            closed: false,
        }
    }

    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    /// Scan exactly one row into `dest`.
    ///
    /// Zero rows is [`OrmError::NotFound`], more than one is [`OrmError::TooManyRows`].
    /// Collections are rejected; use [`Scanner::scan`] for them.
    pub async fn scan_row(mut self, dest: &mut dyn Scannable) -> OrmResult<()> {
        let result = match dest.scan_dest() {
            ScanDest::Direct(target) => {
                self.scan_single_direct(&mut [target], true, SCAN_ROW_MULTIPLE)
                    .await
            }
            ScanDest::Record(record, ty) => {
                self.scan_single_record(record, ty, true, SCAN_ROW_MULTIPLE)
                    .await
            }
            ScanDest::Records(_) => Err(OrmError::input(
                "scan_row needs a single destination, use scan to fill a Vec",
            )),
        };
        self.close();
        result
    }

    /// Scan the cursor into `dests`.
    ///
    /// - no destinations: nothing is read;
    /// - several destinations, or one directly scannable destination: at most one row, each
    ///   column into the matching destination;
    /// - one `Vec` of records: one element per row, in cursor order;
    /// - one record: at most one row.
    ///
    /// Zero rows is never an error here.
    pub async fn scan(mut self, dests: &mut [&mut dyn Scannable]) -> OrmResult<()> {
        let result = self.scan_into(dests).await;
        self.close();
        result
    }

    async fn scan_into(&mut self, dests: &mut [&mut dyn Scannable]) -> OrmResult<()> {
        match dests {
            [] => Ok(()),
            [single] => match single.scan_dest() {
                ScanDest::Direct(target) => {
                    self.scan_single_direct(&mut [target], false, SCAN_DIRECT_MULTIPLE)
                        .await
                }
                ScanDest::Record(record, ty) => {
                    self.scan_single_record(record, ty, false, SCAN_RECORD_MULTIPLE)
                        .await
                }
                ScanDest::Records(sink) => self.scan_all(sink).await,
            },
            many => {
                let mut targets = Vec::with_capacity(many.len());
                for dest in many.iter_mut() {
                    match dest.scan_dest() {
                        ScanDest::Direct(target) => targets.push(target),
                        _ => {
                            return Err(OrmError::input(
                                "records and collections cannot be combined with other scan destinations",
                            ));
                        }
                    }
                }
                self.scan_single_direct(&mut targets, false, SCAN_DIRECT_MULTIPLE)
                    .await
            }
        }
    }

    async fn scan_single_direct(
        &mut self,
        targets: &mut [&mut dyn ScanTarget],
        require_row: bool,
        too_many: &str,
    ) -> OrmResult<()> {
        let mut got_row = false;
        while self.cursor.advance().await? {
            if got_row {
                return Err(OrmError::too_many_rows(too_many));
            }
            got_row = true;
            self.decode_direct(targets)?;
        }
        if require_row && !got_row {
            return Err(OrmError::not_found(NO_ROWS));
        }
        Ok(())
    }

    async fn scan_single_record(
        &mut self,
        record: &mut dyn Record,
        ty: RecordType,
        require_row: bool,
        too_many: &str,
    ) -> OrmResult<()> {
        let mut got_row = false;
        while self.cursor.advance().await? {
            if got_row {
                return Err(OrmError::too_many_rows(too_many));
            }
            got_row = true;
            self.decode_record(record, ty)?;
        }
        if require_row && !got_row {
            return Err(OrmError::not_found(NO_ROWS));
        }
        Ok(())
    }

    async fn scan_all(&mut self, sink: &mut dyn RecordSink) -> OrmResult<()> {
        let ty = sink.record_type();
        while self.cursor.advance().await? {
            let record = sink.push_default();
            if let Err(err) = self.decode_record(record, ty) {
                sink.pop_last();
                return Err(err);
            }
        }
        Ok(())
    }

    fn ensure_columns(&mut self) -> OrmResult<usize> {
        if self.columns.is_none() {
            self.columns = Some(self.cursor.columns()?);
        }
        Ok(self.columns.as_ref().map_or(0, Vec::len))
    }

    fn decode_direct(&mut self, targets: &mut [&mut dyn ScanTarget]) -> OrmResult<()> {
        let width = self.ensure_columns()?;
        if targets.len() != width {
            return Err(OrmError::input(format!(
                "number of destinations ({}) does not match number of columns ({width})",
                targets.len()
            )));
        }
        for (idx, target) in targets.iter_mut().enumerate() {
            self.cursor.decode(idx, &mut **target)?;
        }
        Ok(())
    }

    fn ensure_traversals(&mut self, ty: RecordType) -> OrmResult<()> {
        if matches!(&self.traversals, Some((id, _)) if *id == ty.id()) {
            return Ok(());
        }
        let schema = self.mapper.schema_for(ty)?;
        let columns = self.columns.as_deref().unwrap_or_default();
        let traversals = schema.traversals_by_name(columns);
        missing_columns(columns, &traversals)?;
        self.traversals = Some((ty.id(), traversals));
        Ok(())
    }

    fn decode_record(&mut self, record: &mut dyn Record, ty: RecordType) -> OrmResult<()> {
        self.ensure_columns()?;
        self.ensure_traversals(ty)?;

        let columns = self.columns.as_deref().unwrap_or_default();
        let traversals = self.traversals.as_ref().map_or(&[][..], |(_, t)| t.as_slice());
        for (idx, path) in traversals.iter().enumerate() {
            let slot = slot_at(record, path).ok_or_else(|| {
                OrmError::decode(
                    columns.get(idx).map_or("UNKNOWN", String::as_str),
                    format!("{} has no field at {path:?}", ty.name()),
                )
            })?;
            self.cursor.decode(idx, slot)?;
        }
        Ok(())
    }

    /// Release the cursor. Called automatically when scanning finishes.
    pub fn close(&mut self) {
        if !self.closed {
            self.cursor.close();
            self.closed = true;
        }
    }
}

impl<C: Cursor> Drop for Scanner<C> {
    fn drop(&mut self) {
        self.close();
    }
}
