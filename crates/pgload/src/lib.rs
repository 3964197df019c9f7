//! # pgload
//!
//! Struct to row mapping for PostgreSQL on top of `tokio-postgres`.
//!
//! ## Features
//!
//! - **Records**: `#[derive(Record)]` describes a struct's fields once; columns are resolved
//!   per [`Mapper`] from the field name, a `db` tag, and the naming convention
//! - **Write policies**: `omit`, `omitZero`, `defaultZero` and `nullZero` directives decide how
//!   empty fields are written
//! - **Statements**: multi-row INSERT and UPDATE (suffix or match-column) with `$n` parameters
//! - **Scanning**: rows into scalars, records, or `Vec`s of records, with strict row counts
//! - **Transactions**: [`run_in_transaction`] commits, rolls back, or rolls back and re-panics
//!
//! ## Example
//!
//! ```ignore
//! use pgload::{Loader, Record, StructInsert, run_in_transaction};
//!
//! #[derive(Debug, Default, Record)]
//! struct User {
//!     #[tag(pgload = "omitZero")]
//!     id: i64,
//!     name: String,
//!     #[tag(db = "email_address", pgload = "nullZero")]
//!     email: Option<String>,
//! }
//!
//! let mut loader = Loader::new(client);
//!
//! let alice = User { name: "alice".into(), ..Default::default() };
//! loader.insert("users", &[&alice]).await?;
//!
//! let users: Vec<User> = loader
//!     .fetch_all("SELECT id, name, email_address FROM users", &[])
//!     .await?;
//! ```

extern crate self as pgload;

pub mod client;
pub mod config;
pub mod cursor;
pub mod error;
pub mod extract;
pub mod insert;
pub mod loader;
pub mod naming;
pub mod param;
pub mod prelude;
pub mod scan;
pub mod schema;
pub mod statement;
pub mod tags;
pub mod transaction;
pub mod update;
pub mod value;

pub use client::{GenericClient, RowStream, StreamingClient};
pub use config::MapperConfig;
pub use cursor::{Cursor, Ignore, MemoryCursor, RawValue, RowsCursor, ScanTarget, StreamCursor};
pub use error::{OrmError, OrmResult};
pub use extract::{ColumnValue, ExtractedRow, ValueExtractor};
pub use insert::{StructInsert, column_list};
pub use loader::Loader;
pub use naming::{NamingFn, snake_case};
pub use param::{Null, Param, ParamList};
pub use scan::{RecordSink, ScanDest, Scannable, Scanner};
pub use schema::{
    FieldDef, FieldKind, FieldMut, FieldRef, Mapper, Record, RecordType, Schema, SchemaField,
};
pub use statement::Statement;
pub use tags::TagOptions;
pub use transaction::{Begin, TransactionHandle, run_in_transaction};
pub use update::StructUpdate;
pub use value::{
    FieldValue, IsZero, Valuer, field_bind_value, field_input_value, field_is_zero,
};

pub use tokio_postgres::types::Json;

#[cfg(feature = "derive")]
pub use pgload_derive::Record;
