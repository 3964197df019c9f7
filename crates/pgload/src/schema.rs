//! Record schemas: which column maps to which (possibly nested) field.
//!
//! A record type declares its fields once, statically, through [`Record::fields`] (normally
//! generated by `#[derive(Record)]`). A [`Mapper`] resolves that declaration into a [`Schema`]
//! under its [`MapperConfig`] and caches the result per type.
//!
//! ```ignore
//! use pgload::{Mapper, Record};
//!
//! #[derive(Record, Default)]
//! struct User {
//!     id: i64,
//!     #[tag(db = "user_name")]
//!     name: String,
//!     #[tag(pgload = "defaultZero")]
//!     created_at: Option<chrono::DateTime<chrono::Utc>>,
//! }
//!
//! let mapper = Mapper::default();
//! let schema = mapper.schema::<User>()?;
//! assert_eq!(schema.columns().collect::<Vec<_>>(), ["id", "user_name", "created_at"]);
//! ```

use crate::config::MapperConfig;
use crate::cursor::ScanTarget;
use crate::error::{OrmError, OrmResult};
use crate::extract::ValueExtractor;
use crate::tags::TagOptions;
use crate::value::FieldValue;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Static declaration of one struct field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Declared field name.
    pub name: &'static str,
    /// Field tags as `(key, value)` pairs.
    pub tags: &'static [(&'static str, &'static str)],
    pub kind: FieldKind,
}

/// Whether a field holds a value or embeds another record's fields.
#[derive(Clone, Copy)]
pub enum FieldKind {
    Value,
    Flatten(fn() -> &'static [FieldDef]),
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Value => f.write_str("Value"),
            FieldKind::Flatten(_) => f.write_str("Flatten"),
        }
    }
}

impl FieldDef {
    /// A plain value field.
    pub const fn value(
        name: &'static str,
        tags: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            name,
            tags,
            kind: FieldKind::Value,
        }
    }

    /// A field whose record fields are promoted into the parent.
    pub const fn flatten(
        name: &'static str,
        tags: &'static [(&'static str, &'static str)],
        fields: fn() -> &'static [FieldDef],
    ) -> Self {
        Self {
            name,
            tags,
            kind: FieldKind::Flatten(fields),
        }
    }

    /// Look up a tag value by key.
    pub fn tag(&self, key: &str) -> Option<&'static str> {
        self.tags.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

/// Borrowed view of one field, as seen by extraction.
pub enum FieldRef<'a> {
    Value(&'a dyn FieldValue),
    Record(&'a dyn Record),
}

/// Mutable view of one field, as seen by scanning.
pub enum FieldMut<'a> {
    Value(&'a mut dyn ScanTarget),
    Record(&'a mut dyn Record),
}

/// A struct that maps to a row.
///
/// Field indices passed to [`Record::field`] and [`Record::field_mut`] are positions in
/// [`Record::fields`]. Implementations are generated by `#[derive(Record)]`.
pub trait Record: Send + Sync + 'static {
    /// Declared fields, in declaration order.
    fn fields() -> &'static [FieldDef]
    where
        Self: Sized;

    /// Borrow the field at `index`.
    fn field(&self, index: usize) -> Option<FieldRef<'_>>;

    /// Mutably borrow the field at `index`.
    fn field_mut(&mut self, index: usize) -> Option<FieldMut<'_>>;
}

/// Runtime handle to a record type.
#[derive(Clone, Copy)]
pub struct RecordType {
    id: TypeId,
    name: &'static str,
    fields: fn() -> &'static [FieldDef],
}

impl RecordType {
    /// Handle for the record type `R`.
    pub fn of<R: Record>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: std::any::type_name::<R>(),
            fields: R::fields,
        }
    }

    /// Key used by the schema cache.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, for error messages and logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordType").field(&self.name).finish()
    }
}

/// One resolved column of a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    /// Dotted field path, e.g. `audit.created_at`.
    pub name: String,
    pub column: String,
    /// Field indices from the root record down to the value.
    pub path: Vec<usize>,
    pub options: TagOptions,
}

/// Resolved column layout of a record type.
#[derive(Debug)]
pub struct Schema {
    type_name: &'static str,
    type_id: TypeId,
    fields: Vec<SchemaField>,
    by_column: HashMap<String, usize>,
}

impl Schema {
    /// Resolve a record type under `config`.
    pub fn build(record: RecordType, config: &MapperConfig) -> OrmResult<Self> {
        let mut fields = Vec::new();
        collect_fields(
            (record.fields)(),
            config,
            &mut Vec::new(),
            None,
            &mut fields,
        );

        if fields.is_empty() {
            return Err(OrmError::input(format!(
                "{} has no mapped fields",
                record.name
            )));
        }

        let mut by_column = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if let Some(prev) = by_column.insert(field.column.clone(), idx) {
                return Err(OrmError::input(format!(
                    "{}: fields {} and {} both map to column {}",
                    record.name, fields[prev].name, field.name, field.column
                )));
            }
        }

        Ok(Self {
            type_name: record.name,
            type_id: record.id,
            fields,
            by_column,
        })
    }

    /// Name of the record type this schema was built from.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `TypeId` of the record type this schema was built from.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Columns in field declaration order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Column names, in the same order as [`Schema::fields`].
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.column.as_str())
    }

    /// The field mapped to `column`, matched exactly.
    pub fn field(&self, column: &str) -> Option<&SchemaField> {
        self.by_column.get(column).map(|&idx| &self.fields[idx])
    }

    /// Traversal path for a column, if the column is mapped.
    pub fn traversal(&self, column: &str) -> Option<&[usize]> {
        self.field(column).map(|f| f.path.as_slice())
    }

    /// Traversal paths for a list of columns; unmapped columns get an empty path.
    pub fn traversals_by_name<S: AsRef<str>>(&self, columns: &[S]) -> Vec<Vec<usize>> {
        columns
            .iter()
            .map(|c| self.traversal(c.as_ref()).map(<[usize]>::to_vec).unwrap_or_default())
            .collect()
    }
}

fn collect_fields(
    defs: &'static [FieldDef],
    config: &MapperConfig,
    path: &mut Vec<usize>,
    prefix: Option<&str>,
    out: &mut Vec<SchemaField>,
) {
    for (idx, def) in defs.iter().enumerate() {
        let explicit = def
            .tag(&config.tag_key)
            .map(|tag| tag.split(',').next().unwrap_or("").trim());
        if explicit == Some("-") {
            continue;
        }

        let name = match prefix {
            Some(prefix) => format!("{prefix}.{}", def.name),
            None => def.name.to_string(),
        };

        path.push(idx);
        match def.kind {
            FieldKind::Value => {
                let column = match explicit {
                    Some(col) if !col.is_empty() => col.to_string(),
                    _ => (config.naming)(def.name),
                };
                let options = def
                    .tag(&config.options_key)
                    .map(TagOptions::parse)
                    .unwrap_or_default();
                out.push(SchemaField {
                    name,
                    column,
                    path: path.clone(),
                    options,
                });
            }
            FieldKind::Flatten(inner) => {
                collect_fields(inner(), config, path, Some(&name), out);
            }
        }
        path.pop();
    }
}

/// Borrow the value at `path` inside `record`.
pub(crate) fn value_at<'r>(record: &'r dyn Record, path: &[usize]) -> Option<&'r dyn FieldValue> {
    let (first, rest) = path.split_first()?;
    match record.field(*first)? {
        FieldRef::Value(value) if rest.is_empty() => Some(value),
        FieldRef::Record(inner) => value_at(inner, rest),
        _ => None,
    }
}

/// Mutably borrow the scan slot at `path` inside `record`.
pub(crate) fn slot_at<'r>(
    record: &'r mut dyn Record,
    path: &[usize],
) -> Option<&'r mut dyn ScanTarget> {
    let (first, rest) = path.split_first()?;
    match record.field_mut(*first)? {
        FieldMut::Value(slot) if rest.is_empty() => Some(slot),
        FieldMut::Record(inner) => slot_at(inner, rest),
        _ => None,
    }
}

/// Resolves and caches record schemas under one configuration.
///
/// `Mapper` is `Send + Sync`; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct Mapper {
    config: MapperConfig,
    cache: RwLock<HashMap<TypeId, Arc<Schema>>>,
}

impl Mapper {
    /// Mapper with an empty schema cache.
    pub fn new(config: MapperConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Schema for `R`, resolved on first use.
    pub fn schema<R: Record>(&self) -> OrmResult<Arc<Schema>> {
        self.schema_for(RecordType::of::<R>())
    }

    /// Schema for a record type known only at runtime, e.g. a scan destination.
    pub fn schema_for(&self, record: RecordType) -> OrmResult<Arc<Schema>> {
        if let Some(schema) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&record.id)
        {
            return Ok(Arc::clone(schema));
        }

        let built = Arc::new(Schema::build(record, &self.config)?);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let schema = cache.entry(record.id).or_insert_with(|| {
            tracing::debug!(
                record = record.name,
                columns = built.fields.len(),
                "resolved record schema"
            );
            Arc::clone(&built)
        });
        Ok(Arc::clone(schema))
    }

    /// Value extractor for `R` with an empty omit set.
    pub fn extractor<R: Record>(&self) -> OrmResult<ValueExtractor> {
        Ok(ValueExtractor::new(self.schema::<R>()?))
    }
}
