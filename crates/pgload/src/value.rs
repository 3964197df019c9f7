//! Field values and zero-value resolution.
//!
//! Whether a field is "empty" decides the `omitZero` / `defaultZero` / `nullZero` policies.
//! The check runs in three steps, first match wins:
//!
//! 1. the type's native zero ([`FieldValue::is_zero_value`]): `0`, `""`, `false`, `None`...
//! 2. a [`Valuer`] conversion: empty when it converts to nothing (`None`)
//! 3. an [`IsZero`] predicate
//!
//! Anything else is not empty.

use crate::error::OrmResult;
use crate::param::Param;
use tokio_postgres::types::{Json, ToSql};

/// A struct field that can be written as a bind parameter.
pub trait FieldValue: Send + Sync {
    /// Whether the value is its type's zero value.
    fn is_zero_value(&self) -> bool;

    /// The value as a bind parameter.
    fn to_param(&self) -> Param;

    /// Whether the value is absent altogether (`None`).
    fn is_absent(&self) -> bool {
        false
    }

    /// Custom conversion hook, if the type has one.
    fn as_valuer(&self) -> Option<&dyn Valuer> {
        None
    }

    /// Custom emptiness predicate, if the type has one.
    fn as_zeroer(&self) -> Option<&dyn IsZero> {
        None
    }
}

/// Custom conversion of a field into the value actually bound.
///
/// Returning `Ok(None)` marks the field as empty.
pub trait Valuer {
    fn value(&self) -> OrmResult<Option<Param>>;
}

/// Custom emptiness predicate.
pub trait IsZero {
    fn is_zero(&self) -> bool;
}

/// Whether a field counts as empty for tag policies.
pub fn field_is_zero(value: &dyn FieldValue) -> OrmResult<bool> {
    if value.is_zero_value() {
        return Ok(true);
    }
    if let Some(valuer) = value.as_valuer() {
        return Ok(valuer.value()?.is_none());
    }
    if let Some(zeroer) = value.as_zeroer() {
        return Ok(zeroer.is_zero());
    }
    Ok(false)
}

/// The parameter to bind for a field, or `None` when the field is empty.
pub fn field_input_value(value: &dyn FieldValue) -> OrmResult<Option<Param>> {
    if value.is_zero_value() {
        return Ok(None);
    }
    if let Some(valuer) = value.as_valuer() {
        return valuer.value();
    }
    if let Some(zeroer) = value.as_zeroer() {
        if zeroer.is_zero() {
            return Ok(None);
        }
    }
    Ok(Some(value.to_param()))
}

/// The parameter bound for a field that is written as a value.
///
/// A [`Valuer`] that converts to nothing binds NULL. Natively zero fields and fields only an
/// [`IsZero`] predicate calls empty bind their own value.
pub fn field_bind_value(value: &dyn FieldValue) -> OrmResult<Param> {
    if !value.is_zero_value() {
        if let Some(valuer) = value.as_valuer() {
            return Ok(valuer.value()?.unwrap_or_else(Param::null));
        }
    }
    Ok(value.to_param())
}

macro_rules! impl_field_value_default {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn is_zero_value(&self) -> bool {
                    *self == <$ty as Default>::default()
                }

                fn to_param(&self) -> Param {
                    Param::new(self.clone())
                }
            }
        )*
    };
}

impl_field_value_default!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u32,
    f32,
    f64,
    String,
    chrono::NaiveDate,
    chrono::NaiveTime,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
);

impl FieldValue for chrono::DateTime<chrono::FixedOffset> {
    fn is_zero_value(&self) -> bool {
        self.timestamp() == 0 && self.timestamp_subsec_nanos() == 0
    }

    fn to_param(&self) -> Param {
        Param::new(*self)
    }
}

impl FieldValue for uuid::Uuid {
    fn is_zero_value(&self) -> bool {
        self.is_nil()
    }

    fn to_param(&self) -> Param {
        Param::new(*self)
    }
}

impl FieldValue for serde_json::Value {
    fn is_zero_value(&self) -> bool {
        self.is_null()
    }

    fn to_param(&self) -> Param {
        Param::new(self.clone())
    }
}

impl<T> FieldValue for Json<T>
where
    T: serde::Serialize + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn is_zero_value(&self) -> bool {
        false
    }

    fn to_param(&self) -> Param {
        Param::new(Json(self.0.clone()))
    }
}

impl<T> FieldValue for Vec<T>
where
    T: Clone + Send + Sync + 'static,
    Vec<T>: ToSql,
{
    fn is_zero_value(&self) -> bool {
        self.is_empty()
    }

    fn to_param(&self) -> Param {
        Param::new(self.clone())
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn is_zero_value(&self) -> bool {
        self.is_none()
    }

    fn to_param(&self) -> Param {
        match self {
            Some(inner) => inner.to_param(),
            None => Param::null(),
        }
    }

    fn is_absent(&self) -> bool {
        self.is_none()
    }

    fn as_valuer(&self) -> Option<&dyn Valuer> {
        self.as_ref().and_then(|inner| inner.as_valuer())
    }

    fn as_zeroer(&self) -> Option<&dyn IsZero> {
        self.as_ref().and_then(|inner| inner.as_zeroer())
    }
}

#[cfg(feature = "rust_decimal")]
impl_field_value_default!(rust_decimal::Decimal);

#[cfg(feature = "time")]
macro_rules! impl_field_value_epoch {
    ($($ty:ty => $epoch:expr),* $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn is_zero_value(&self) -> bool {
                    *self == $epoch
                }

                fn to_param(&self) -> Param {
                    Param::new(*self)
                }
            }
        )*
    };
}

#[cfg(feature = "time")]
impl_field_value_epoch!(
    time::OffsetDateTime => time::OffsetDateTime::UNIX_EPOCH,
    time::PrimitiveDateTime => time::PrimitiveDateTime::new(
        time::OffsetDateTime::UNIX_EPOCH.date(),
        time::OffsetDateTime::UNIX_EPOCH.time(),
    ),
    time::Date => time::OffsetDateTime::UNIX_EPOCH.date(),
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmError;

    #[derive(Debug, Clone)]
    struct Cents(i64);

    impl Valuer for Cents {
        fn value(&self) -> OrmResult<Option<Param>> {
            if self.0 < 0 {
                return Err(OrmError::conversion("negative amount"));
            }
            if self.0 == 1 {
                return Ok(None);
            }
            Ok(Some(Param::new(self.0 * 100)))
        }
    }

    impl FieldValue for Cents {
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

    #[derive(Debug, Clone)]
    struct Code(String);

    impl IsZero for Code {
        fn is_zero(&self) -> bool {
            self.0 == "none"
        }
    }

    impl FieldValue for Code {
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

    #[test]
    fn native_zero_values() {
        assert!(field_is_zero(&0_i32).unwrap());
        assert!(field_is_zero(&String::new()).unwrap());
        assert!(field_is_zero(&false).unwrap());
        assert!(field_is_zero(&uuid::Uuid::nil()).unwrap());
        assert!(field_is_zero(&Vec::<i32>::new()).unwrap());
        assert!(field_is_zero(&None::<i32>).unwrap());
        assert!(!field_is_zero(&7_i64).unwrap());
        assert!(!field_is_zero(&"x".to_string()).unwrap());
    }

    #[test]
    fn some_of_zero_is_not_empty() {
        assert!(!field_is_zero(&Some(0_i32)).unwrap());
        assert!(None::<i32>.is_absent());
        assert!(!Some(0_i32).is_absent());
    }

    #[test]
    fn valuer_decides_after_native_zero() {
        assert!(field_is_zero(&Cents(0)).unwrap());
        assert!(field_is_zero(&Cents(1)).unwrap());
        assert!(!field_is_zero(&Cents(2)).unwrap());
        assert!(field_is_zero(&Cents(-1)).is_err());
    }

    #[test]
    fn valuer_through_option() {
        assert!(field_is_zero(&Some(Cents(1))).unwrap());
        assert!(field_input_value(&Some(Cents(2))).unwrap().is_some());
    }

    #[test]
    fn zeroer_is_last() {
        assert!(field_is_zero(&Code(String::new())).unwrap());
        assert!(field_is_zero(&Code("none".into())).unwrap());
        assert!(!field_is_zero(&Code("abc".into())).unwrap());
    }

    #[test]
    fn input_value_follows_precedence() {
        assert!(field_input_value(&0_i32).unwrap().is_none());
        assert!(field_input_value(&5_i32).unwrap().is_some());
        assert!(field_input_value(&Cents(1)).unwrap().is_none());
        assert!(field_input_value(&Cents(2)).unwrap().is_some());
        assert!(field_input_value(&Cents(-3)).is_err());
        assert!(field_input_value(&Code("none".into())).unwrap().is_none());
        assert!(field_input_value(&Code("abc".into())).unwrap().is_some());
    }

    fn encode(param: &Param) -> Option<Vec<u8>> {
        let mut buf = bytes::BytesMut::new();
        match param
            .as_ref()
            .to_sql_checked(&tokio_postgres::types::Type::INT8, &mut buf)
            .unwrap()
        {
            tokio_postgres::types::IsNull::Yes => None,
            tokio_postgres::types::IsNull::No => Some(buf.to_vec()),
        }
    }

    #[test]
    fn bind_value_uses_the_conversion() {
        assert_eq!(
            encode(&field_bind_value(&Cents(2)).unwrap()),
            Some(200_i64.to_be_bytes().to_vec())
        );
        assert_eq!(encode(&field_bind_value(&Cents(1)).unwrap()), None);
        assert_eq!(
            encode(&field_bind_value(&Cents(0)).unwrap()),
            Some(0_i64.to_be_bytes().to_vec())
        );
        assert!(field_bind_value(&Cents(-4)).is_err());
        assert_eq!(encode(&field_bind_value(&None::<i64>).unwrap()), None);
    }
}
