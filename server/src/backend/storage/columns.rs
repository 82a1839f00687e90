//! Column decoding helpers for values sqlx does not map natively.
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

pub fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).with_context(|| format!("Invalid decimal in column {}: {}", column, raw))
}

pub fn count(row: &SqliteRow, column: &str) -> Result<u32> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).with_context(|| format!("Out of range value in column {}: {}", column, raw))
}

/// Parse a TEXT column through the type's `FromStr`
pub fn parsed<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    let raw: String = row.try_get(column)?;
    T::from_str(&raw)
}

/// Decode a JSON TEXT column
pub fn json<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in column {}", column))
}
