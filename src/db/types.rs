//! Rendering of database values as text.
//!
//! Every non-null value is returned to clients as a string, whatever its
//! column type. Conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies the value's type name into a logical category
//! 2. Database-specific decoders extract the value and format it
//!
//! NULL is detected before decoding so a failed decode is never mistaken for
//! a database NULL. Types with no category (intervals, arrays, network
//! addresses, ...) and values a typed decoder rejects fall back to the raw text
//! the server sent.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use sqlx::error::BoxDynError;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Database, Decode, Row, Type, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    UnsignedInteger,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Uuid,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Text,
}

/// Classify a type name reported by the driver.
///
/// Names are matched exactly (after upper-casing) rather than by substring, so
/// `INTERVAL` or `POINT` are not mistaken for integers.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let upper = type_name.trim().to_ascii_uppercase();
    let (base, unsigned) = match upper.strip_suffix(" UNSIGNED") {
        Some(base) => (base, true),
        None => (upper.as_str(), false),
    };

    match base {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "INT2" | "INT4"
        | "INT8" => {
            if unsigned {
                TypeCategory::UnsignedInteger
            } else {
                TypeCategory::Integer
            }
        }
        "FLOAT" | "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE" | "DOUBLE PRECISION" => {
            TypeCategory::Float
        }
        "DECIMAL" | "NUMERIC" => TypeCategory::Decimal,
        "BOOL" | "BOOLEAN" => TypeCategory::Boolean,
        "BYTEA" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            TypeCategory::Binary
        }
        "JSON" | "JSONB" => TypeCategory::Json,
        "UUID" => TypeCategory::Uuid,
        "DATE" => TypeCategory::Date,
        "TIME" => TypeCategory::Time,
        "TIMESTAMP" | "DATETIME" => TypeCategory::Timestamp,
        "TIMESTAMPTZ" => TypeCategory::TimestampTz,
        // varchar, text, char, enum, set, ...
        _ => TypeCategory::Text,
    }
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        ty.name().eq_ignore_ascii_case("numeric")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        Ok(RawDecimal(value.as_str()?.to_string()))
    }
}

// =============================================================================
// Raw Text Fallback
// =============================================================================

/// Any non-null value, as the bytes the server sent.
///
/// Statements run without bind parameters, so PostgreSQL and MySQL send every
/// value in their text encoding. Bytes that are not UTF-8 are base64 encoded.
#[derive(Debug)]
pub struct RawText(pub String);

impl RawText {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => RawText(text.to_string()),
            Err(_) => RawText(STANDARD.encode(bytes)),
        }
    }
}

macro_rules! impl_raw_text {
    ($db:ty) => {
        impl Type<$db> for RawText {
            fn type_info() -> <$db as Database>::TypeInfo {
                <String as Type<$db>>::type_info()
            }

            fn compatible(_ty: &<$db as Database>::TypeInfo) -> bool {
                true
            }
        }

        impl<'r> Decode<'r, $db> for RawText {
            fn decode(value: <$db as Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
                let bytes = <&'r [u8] as Decode<'r, $db>>::decode(value)?;
                Ok(RawText::from_bytes(bytes))
            }
        }
    };
}

impl_raw_text!(sqlx::MySql);
impl_raw_text!(sqlx::Postgres);
impl_raw_text!(sqlx::Sqlite);

// =============================================================================
// Row to Text
// =============================================================================

/// Database-specific decoding of one non-null column into text.
pub trait RowToText: Row {
    fn decode_text(&self, idx: usize, category: TypeCategory) -> Result<String, sqlx::Error>;
}

/// Column labels of a row, in positional order.
pub fn column_labels<R: Row>(row: &R) -> Vec<String> {
    row.columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect()
}

/// Render every column of a row; NULL becomes `None`.
pub fn row_to_text<R>(row: &R) -> Vec<Option<String>>
where
    R: RowToText,
    usize: ColumnIndex<R>,
{
    (0..row.len())
        .map(|idx| {
            let type_name = match row.try_get_raw(idx) {
                Ok(raw) if raw.is_null() => return None,
                Ok(raw) => raw.type_info().name().to_string(),
                Err(e) => {
                    tracing::error!(column = idx, error = %e, "Failed to read column");
                    return None;
                }
            };

            let category = categorize_type(&type_name);
            match row.decode_text(idx, category) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::error!(
                        column = idx,
                        type_name = %type_name,
                        error = %e,
                        "Failed to render column value as text"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Decode a column as `T` and format it with `Display`.
fn get_text<'r, R, T>(row: &'r R, idx: usize) -> Result<String, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database> + ToString,
{
    row.try_get::<T, usize>(idx).map(|v| v.to_string())
}

/// Decode as `A`, or as `B` when the column is not compatible with `A`.
fn get_text_either<'r, R, A, B>(row: &'r R, idx: usize) -> Result<String, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    A: Decode<'r, R::Database> + Type<R::Database> + ToString,
    B: Decode<'r, R::Database> + Type<R::Database> + ToString,
{
    match get_text::<R, A>(row, idx) {
        Ok(text) => Ok(text),
        Err(_) => get_text::<R, B>(row, idx),
    }
}

fn get_rfc3339<'r, R>(row: &'r R, idx: usize) -> Result<String, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
{
    let value = row.try_get::<DateTime<Utc>, usize>(idx)?;
    Ok(value.to_rfc3339())
}

fn get_base64<'r, R>(row: &'r R, idx: usize) -> Result<String, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Vec<u8>, usize>(idx)
        .map(|bytes| STANDARD.encode(bytes))
}

/// Text of any value as received; never fails on a type mismatch.
fn get_raw_text<'r, R>(row: &'r R, idx: usize) -> Result<String, sqlx::Error>
where
    R: Row,
    usize: ColumnIndex<R>,
    RawText: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<RawText, usize>(idx).map(|v| v.0)
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

impl RowToText for MySqlRow {
    fn decode_text(&self, idx: usize, category: TypeCategory) -> Result<String, sqlx::Error> {
        mysql::decode_column(self, idx, category)
            .or_else(|_| get_raw_text(self, idx))
    }
}

impl RowToText for PgRow {
    fn decode_text(&self, idx: usize, category: TypeCategory) -> Result<String, sqlx::Error> {
        postgres::decode_column(self, idx, category)
            .or_else(|_| get_raw_text(self, idx))
    }
}

impl RowToText for SqliteRow {
    fn decode_text(&self, idx: usize, category: TypeCategory) -> Result<String, sqlx::Error> {
        sqlite::decode_column(self, idx, category)
            .or_else(|_| get_raw_text(self, idx))
    }
}

mod mysql {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<String, sqlx::Error> {
        match category {
            TypeCategory::Integer | TypeCategory::UnsignedInteger => {
                get_text_either::<_, i64, u64>(row, idx)
            }
            TypeCategory::Float => get_text_either::<_, f64, f32>(row, idx),
            TypeCategory::Decimal => row.try_get::<RawDecimal, _>(idx).map(|v| v.0),
            TypeCategory::Boolean => get_text::<_, bool>(row, idx),
            TypeCategory::Binary => get_base64(row, idx),
            TypeCategory::Json => get_text::<_, serde_json::Value>(row, idx),
            TypeCategory::Date => get_text::<_, NaiveDate>(row, idx),
            TypeCategory::Time => get_text::<_, NaiveTime>(row, idx),
            TypeCategory::Timestamp => timestamp(row, idx),
            TypeCategory::TimestampTz => get_rfc3339(row, idx),
            TypeCategory::Uuid | TypeCategory::Text => get_raw_text(row, idx),
        }
    }

    /// DATETIME decodes as naive, TIMESTAMP as UTC.
    fn timestamp(row: &MySqlRow, idx: usize) -> Result<String, sqlx::Error> {
        match get_text::<_, NaiveDateTime>(row, idx) {
            Ok(text) => Ok(text),
            Err(_) => {
                let value = row.try_get::<DateTime<Utc>, _>(idx)?;
                Ok(value.naive_utc().to_string())
            }
        }
    }
}

mod postgres {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<String, sqlx::Error> {
        match category {
            TypeCategory::Integer | TypeCategory::UnsignedInteger => integer(row, idx),
            TypeCategory::Float => get_text_either::<_, f64, f32>(row, idx),
            TypeCategory::Decimal => row.try_get::<RawDecimal, _>(idx).map(|v| v.0),
            TypeCategory::Boolean => get_text::<_, bool>(row, idx),
            TypeCategory::Binary => get_base64(row, idx),
            TypeCategory::Json => get_text::<_, serde_json::Value>(row, idx),
            TypeCategory::Uuid => get_text::<_, uuid::Uuid>(row, idx),
            TypeCategory::Date => get_text::<_, NaiveDate>(row, idx),
            TypeCategory::Time => get_text::<_, NaiveTime>(row, idx),
            TypeCategory::Timestamp => get_text::<_, NaiveDateTime>(row, idx),
            TypeCategory::TimestampTz => get_rfc3339(row, idx),
            TypeCategory::Text => get_raw_text(row, idx),
        }
    }

    /// INT8, INT4 and INT2 each decode only as their exact Rust width.
    fn integer(row: &PgRow, idx: usize) -> Result<String, sqlx::Error> {
        match get_text_either::<_, i64, i32>(row, idx) {
            Ok(text) => Ok(text),
            Err(_) => get_text::<_, i16>(row, idx),
        }
    }
}

mod sqlite {
    use super::*;

    /// SQLite reports the storage class of each value (INTEGER, REAL, TEXT,
    /// BLOB), so only those categories occur in practice.
    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        category: TypeCategory,
    ) -> Result<String, sqlx::Error> {
        match category {
            TypeCategory::Integer | TypeCategory::UnsignedInteger | TypeCategory::Boolean => {
                get_text::<_, i64>(row, idx)
            }
            TypeCategory::Float | TypeCategory::Decimal => get_text::<_, f64>(row, idx),
            TypeCategory::Binary => get_base64(row, idx),
            _ => get_raw_text(row, idx),
        }
    }
}
