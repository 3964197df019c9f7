//! Derive macros for pgload
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod record;

/// Derive `Record` (and `Scannable`) for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use pgload::Record;
///
/// #[derive(Record, Default)]
/// struct User {
///     #[tag(pgload = "omitZero")]
///     id: i64,
///     #[tag(db = "user_name")]
///     name: String,
///     #[tag(pgload = "nullZero")]
///     email: Option<String>,
///     #[record(flatten)]
///     audit: Audit,
///     #[tag(db = "-")]
///     session: String,
/// }
/// ```
///
/// # Attributes
///
/// - `#[tag(key = "value", ...)]` - String tags read at runtime. With the default config,
///   `db` overrides the column name (`"-"` ignores the field) and `pgload` holds write
///   directives: `omit`, `omitZero`, `defaultZero`, `nullZero`
/// - `#[record(flatten)]` - The field is itself a `Record`; its columns are promoted
/// - `#[record(skip)]` - Leave the field out of the record
///
/// Every mapped field type must implement `FieldValue` and `ScanTarget`.
#[proc_macro_derive(Record, attributes(tag, record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
