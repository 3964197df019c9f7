//! Turning record instances into column values.

use crate::error::{OrmError, OrmResult};
use crate::param::{Param, ParamList};
use crate::schema::{Record, Schema, value_at};
use crate::value::{FieldValue, field_bind_value, field_is_zero};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How one column is written.
#[derive(Debug, Clone)]
pub enum ColumnValue {
    /// Bound as a parameter.
    Value(Param),
    /// Rendered as the `NULL` keyword.
    Null,
    /// Rendered as the `DEFAULT` keyword.
    Default,
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ColumnValue::Default)
    }

    pub fn param(&self) -> Option<&Param> {
        match self {
            ColumnValue::Value(param) => Some(param),
            _ => None,
        }
    }
}

/// Quote a column name as a SQL identifier.
pub(crate) fn quote_column(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column values of one record instance, in schema order.
#[derive(Debug, Clone, Default)]
pub struct ExtractedRow {
    columns: Vec<String>,
    values: HashMap<String, ColumnValue>,
}

impl ExtractedRow {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.values.get(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// `("a", "b")`
    pub fn insert_column_syntax(&self) -> String {
        let quoted: Vec<String> = self.columns.iter().map(|c| quote_column(c)).collect();
        format!("({})", quoted.join(", "))
    }

    /// `($1, NULL, $2)`, pushing bound values onto `params`.
    pub fn push_insert_values(&self, params: &mut ParamList) -> String {
        let rendered: Vec<String> = self
            .columns
            .iter()
            .map(|c| self.render(c, params))
            .collect();
        format!("({})", rendered.join(", "))
    }

    /// `"a" = $1, "b" = DEFAULT`, pushing bound values onto `params`.
    pub fn push_update_assignments(&self, params: &mut ParamList) -> String {
        let rendered: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} = {}", quote_column(c), self.render(c, params)))
            .collect();
        rendered.join(", ")
    }

    fn render(&self, column: &str, params: &mut ParamList) -> String {
        match self.values.get(column) {
            Some(ColumnValue::Value(param)) => format!("${}", params.push_param(param.clone())),
            Some(ColumnValue::Default) => "DEFAULT".to_string(),
            Some(ColumnValue::Null) | None => "NULL".to_string(),
        }
    }
}

/// Extracts column values from instances of one record type.
///
/// Extractors are immutable; [`ValueExtractor::with_omit_columns`] returns a new one.
#[derive(Debug, Clone)]
pub struct ValueExtractor {
    schema: Arc<Schema>,
    omit_columns: HashSet<String>,
}

impl ValueExtractor {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            omit_columns: HashSet::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// A copy of this extractor that additionally skips `columns`.
    pub fn with_omit_columns<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut omit_columns = self.omit_columns.clone();
        omit_columns.extend(columns.into_iter().map(Into::into));
        Self {
            schema: Arc::clone(&self.schema),
            omit_columns,
        }
    }

    pub fn is_omitted(&self, column: &str) -> bool {
        self.omit_columns.contains(column)
    }

    fn check_type<R: Record>(&self) -> OrmResult<()> {
        if TypeId::of::<R>() != self.schema.type_id() {
            return Err(OrmError::input(format!(
                "extractor for {} cannot read {}",
                self.schema.type_name(),
                std::any::type_name::<R>()
            )));
        }
        Ok(())
    }

    /// The field behind `column`, before any tag policy.
    pub fn extract_raw_column_data<'r, R: Record>(
        &self,
        record: &'r R,
        column: &str,
    ) -> OrmResult<&'r dyn FieldValue> {
        self.check_type::<R>()?;
        let field = self
            .schema
            .field(column)
            .ok_or_else(|| OrmError::input(format!("unknown column {column}")))?;
        value_at(record, &field.path).ok_or_else(|| {
            OrmError::input(format!(
                "{} has no value field for column {column}",
                self.schema.type_name()
            ))
        })
    }

    /// Apply tag policies and the omit set to one instance.
    pub fn extract<R: Record>(&self, record: &R) -> OrmResult<ExtractedRow> {
        self.check_type::<R>()?;

        let mut row = ExtractedRow::default();
        for field in self.schema.fields() {
            let value = value_at(record, &field.path).ok_or_else(|| {
                OrmError::input(format!(
                    "{} has no value field for column {}",
                    self.schema.type_name(),
                    field.column
                ))
            })?;

            let zero = field_is_zero(value)?;
            let options = field.options;
            if options.omit || (options.omit_zero && zero) || self.is_omitted(&field.column) {
                continue;
            }

            let column_value = if zero && options.null_zero {
                ColumnValue::Null
            } else if zero && options.default_zero {
                ColumnValue::Default
            } else {
                ColumnValue::Value(field_bind_value(value)?)
            };

            row.columns.push(field.column.clone());
            row.values.insert(field.column.clone(), column_value);
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Mapper;
    use crate::schema::fixtures::{Account, Audit};
    use crate::schema::{FieldDef, FieldMut, FieldRef};
    use crate::value::{IsZero, Valuer};
    use tokio_postgres::types::{IsNull, ToSql, Type};

    /// Whole currency units bound as cents; an amount of 1 is a placeholder with no value.
    struct Price(i64);

    impl Valuer for Price {
        fn value(&self) -> OrmResult<Option<Param>> {
            if self.0 == 1 {
                return Ok(None);
            }
            Ok(Some(Param::new(self.0 * 100)))
        }
    }

    impl FieldValue for Price {
        fn is_zero_value(&self) -> bool {
            self.0 == 0
        }

        fn to_param(&self) -> Param {
            Param::new(self.0)
        }

        fn as_valuer(&self) -> Option<&dyn Valuer> {
            Some(self)
        }
    }

    struct Sku(String);

    impl IsZero for Sku {
        fn is_zero(&self) -> bool {
            self.0 == "none"
        }
    }

    impl FieldValue for Sku {
        fn is_zero_value(&self) -> bool {
            self.0.is_empty()
        }

        fn to_param(&self) -> Param {
            Param::new(self.0.clone())
        }

        fn as_zeroer(&self) -> Option<&dyn IsZero> {
            Some(self)
        }
    }

    struct Listing {
        price: Price,
        list_price: Price,
        sku: Sku,
    }

    impl Record for Listing {
        fn fields() -> &'static [FieldDef] {
            const FIELDS: &[FieldDef] = &[
                FieldDef::value("price", &[("pgload", "omitZero")]),
                FieldDef::value("list_price", &[]),
                FieldDef::value("sku", &[("pgload", "nullZero")]),
            ];
            FIELDS
        }

        fn field(&self, index: usize) -> Option<FieldRef<'_>> {
            match index {
                0 => Some(FieldRef::Value(&self.price)),
                1 => Some(FieldRef::Value(&self.list_price)),
                2 => Some(FieldRef::Value(&self.sku)),
                _ => None,
            }
        }

        fn field_mut(&mut self, _index: usize) -> Option<FieldMut<'_>> {
            None
        }
    }

    fn listing(price: i64, list_price: i64, sku: &str) -> Listing {
        Listing {
            price: Price(price),
            list_price: Price(list_price),
            sku: Sku(sku.into()),
        }
    }

    fn encoded(row: &ExtractedRow, column: &str, ty: &Type) -> Option<Vec<u8>> {
        let param = row.get(column).and_then(ColumnValue::param).unwrap();
        let mut buf = bytes::BytesMut::new();
        match param.as_ref().to_sql_checked(ty, &mut buf).unwrap() {
            IsNull::Yes => None,
            IsNull::No => Some(buf.to_vec()),
        }
    }

    fn sample() -> Account {
        Account {
            id: 7,
            display_name: "Ada".into(),
            email: Some("ada@example.com".into()),
            secret: "hunter2".into(),
            audit: Audit {
                created_by: "admin".into(),
                version: 2,
            },
        }
    }

    #[test]
    fn extracts_all_columns_in_order() {
        let extractor = Mapper::default().extractor::<Account>().unwrap();
        let row = extractor.extract(&sample()).unwrap();
        assert_eq!(row.columns(), ["id", "name", "email", "created_by", "version"]);
        assert!(row.get("secret").is_none());
        assert!(row.get("id").unwrap().param().is_some());
    }

    #[test]
    fn zero_values_follow_tag_policy() {
        let extractor = Mapper::default().extractor::<Account>().unwrap();
        let row = extractor.extract(&Account::default()).unwrap();
        // id: omitZero, email: nullZero, version: defaultZero
        assert_eq!(row.columns(), ["name", "email", "created_by", "version"]);
        assert!(row.get("email").unwrap().is_null());
        assert!(row.get("version").unwrap().is_default());
        assert!(row.get("name").unwrap().param().is_some());
    }

    #[test]
    fn omit_columns_is_pure() {
        let base = Mapper::default().extractor::<Account>().unwrap();
        let narrowed = base.with_omit_columns(["name"]);
        let narrower = narrowed.with_omit_columns(["email"]);

        assert_eq!(base.extract(&sample()).unwrap().len(), 5);
        assert_eq!(
            narrowed.extract(&sample()).unwrap().columns(),
            ["id", "email", "created_by", "version"]
        );
        assert_eq!(
            narrower.extract(&sample()).unwrap().columns(),
            ["id", "created_by", "version"]
        );
    }

    #[test]
    fn raw_column_data_ignores_policy() {
        let extractor = Mapper::default().extractor::<Account>().unwrap();
        let account = Account::default();
        let raw = extractor.extract_raw_column_data(&account, "id").unwrap();
        assert!(raw.is_zero_value());
        let raw = extractor.extract_raw_column_data(&account, "email").unwrap();
        assert!(raw.is_absent());

        let err = extractor
            .extract_raw_column_data(&account, "nope")
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Input error: unknown column nope");
    }

    #[test]
    fn rejects_other_record_types() {
        let extractor = Mapper::default().extractor::<Account>().unwrap();
        let err = extractor.extract(&Audit::default()).unwrap_err();
        assert!(err.is_input());
    }

    #[test]
    fn renders_insert_and_update_syntax() {
        let extractor = Mapper::default().extractor::<Account>().unwrap();
        let row = extractor.extract(&Account::default()).unwrap();
        assert_eq!(
            row.insert_column_syntax(),
            r#"("name", "email", "created_by", "version")"#
        );

        let mut params = ParamList::new();
        params.push(0_i32);
        assert_eq!(row.push_insert_values(&mut params), "($2, NULL, $3, DEFAULT)");
        assert_eq!(params.len(), 3);

        let mut params = ParamList::new();
        assert_eq!(
            row.push_update_assignments(&mut params),
            r#""name" = $1, "email" = NULL, "created_by" = $2, "version" = DEFAULT"#
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn omit_zero_consults_the_valuer() {
        let extractor = Mapper::default().extractor::<Listing>().unwrap();

        let row = extractor.extract(&listing(1, 5, "abc")).unwrap();
        assert_eq!(row.columns(), ["list_price", "sku"]);

        let row = extractor.extract(&listing(0, 5, "abc")).unwrap();
        assert_eq!(row.columns(), ["list_price", "sku"]);

        let row = extractor.extract(&listing(3, 5, "abc")).unwrap();
        assert_eq!(row.columns(), ["price", "list_price", "sku"]);
        assert_eq!(
            encoded(&row, "price", &Type::INT8),
            Some(300_i64.to_be_bytes().to_vec())
        );
    }

    #[test]
    fn valuer_without_a_value_binds_null() {
        let extractor = Mapper::default().extractor::<Listing>().unwrap();

        let row = extractor.extract(&listing(3, 1, "abc")).unwrap();
        assert!(matches!(row.get("list_price"), Some(ColumnValue::Value(_))));
        assert_eq!(encoded(&row, "list_price", &Type::INT8), None);

        let row = extractor.extract(&listing(3, 5, "abc")).unwrap();
        assert_eq!(
            encoded(&row, "list_price", &Type::INT8),
            Some(500_i64.to_be_bytes().to_vec())
        );

        let row = extractor.extract(&listing(3, 0, "abc")).unwrap();
        assert_eq!(
            encoded(&row, "list_price", &Type::INT8),
            Some(0_i64.to_be_bytes().to_vec())
        );
    }

    #[test]
    fn null_zero_consults_is_zero() {
        let extractor = Mapper::default().extractor::<Listing>().unwrap();

        let row = extractor.extract(&listing(3, 5, "none")).unwrap();
        assert!(row.get("sku").unwrap().is_null());

        let row = extractor.extract(&listing(3, 5, "")).unwrap();
        assert!(row.get("sku").unwrap().is_null());

        let row = extractor.extract(&listing(3, 5, "A-1")).unwrap();
        assert_eq!(
            encoded(&row, "sku", &Type::TEXT),
            Some(b"A-1".to_vec())
        );
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote_column(r#"we"ird"#), r#""we""ird""#);
    }
}
