//! Statically declared record schemas for every row type the engines hand to
//! the persistence layer.

use crate::structs::{CorrelationRow, RiskSummaryRow, StepVolatilityRow, TechnicalFeatureRow};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Timestamp,
    Numeric,
    Double,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Timestamp => "TIMESTAMPTZ",
            SqlType::Numeric => "NUMERIC",
            SqlType::Double => "DOUBLE PRECISION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub nullable: bool,
}

const fn key(name: &'static str, sql_type: SqlType) -> ColumnSchema {
    ColumnSchema { name, sql_type, primary_key: true, nullable: false }
}

const fn col(name: &'static str, sql_type: SqlType) -> ColumnSchema {
    ColumnSchema { name, sql_type, primary_key: false, nullable: false }
}

const fn nullable(name: &'static str, sql_type: SqlType) -> ColumnSchema {
    ColumnSchema { name, sql_type, primary_key: false, nullable: true }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnSchema],
}

impl TableSchema {
    pub fn primary_key(&self) -> Vec<&'static str> {
        self.columns.iter().filter(|c| c.primary_key).map(|c| c.name).collect()
    }

    /// The idempotent insert statement for this table: rows whose primary key
    /// already exists are skipped rather than updated.
    pub fn insert_or_ignore_sql(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("${}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
            self.name,
            names.join(", "),
            placeholders.join(", "),
            self.primary_key().join(", ")
        )
    }
}

/// A row type with a fixed table layout and a primary key.
///
/// The `Key` is what an insert-or-ignore sink deduplicates on.
pub trait Record: Serialize {
    const SCHEMA: TableSchema;
    type Key: Ord + Clone;

    fn key(&self) -> Self::Key;
}

impl Record for TechnicalFeatureRow {
    const SCHEMA: TableSchema = TableSchema {
        name: "technical_features",
        columns: &[
            key("instrument", SqlType::Text),
            key("timestamp", SqlType::Timestamp),
            col("close", SqlType::Numeric),
            col("volume", SqlType::Numeric),
            nullable("ma_short", SqlType::Numeric),
            nullable("ma_long", SqlType::Numeric),
            nullable("rolling_std", SqlType::Numeric),
            nullable("volume_avg", SqlType::Numeric),
            nullable("rsi", SqlType::Numeric),
            nullable("macd", SqlType::Numeric),
            nullable("macd_signal", SqlType::Numeric),
            nullable("bb_upper", SqlType::Numeric),
            nullable("bb_lower", SqlType::Numeric),
        ],
    };
    type Key = (String, DateTime<Utc>);

    fn key(&self) -> Self::Key {
        (self.instrument.clone(), self.timestamp)
    }
}

impl Record for CorrelationRow {
    const SCHEMA: TableSchema = TableSchema {
        name: "correlations",
        columns: &[
            key("instrument_a", SqlType::Text),
            key("instrument_b", SqlType::Text),
            key("timestamp", SqlType::Timestamp),
            // NaN marks an undefined correlation.
            col("correlation", SqlType::Double),
        ],
    };
    type Key = (String, String, DateTime<Utc>);

    fn key(&self) -> Self::Key {
        (self.instrument_a.clone(), self.instrument_b.clone(), self.timestamp)
    }
}

impl Record for RiskSummaryRow {
    const SCHEMA: TableSchema = TableSchema {
        name: "monte_carlo_summary",
        columns: &[
            key("instrument", SqlType::Text),
            key("timestamp", SqlType::Timestamp),
            col("mean_price", SqlType::Double),
            col("p5", SqlType::Double),
            col("p10", SqlType::Double),
            col("p25", SqlType::Double),
            col("p75", SqlType::Double),
            col("p90", SqlType::Double),
            col("p95", SqlType::Double),
        ],
    };
    type Key = (String, DateTime<Utc>);

    fn key(&self) -> Self::Key {
        (self.instrument.clone(), self.timestamp)
    }
}

impl Record for StepVolatilityRow {
    const SCHEMA: TableSchema = TableSchema {
        name: "monte_carlo_volatility",
        columns: &[
            key("instrument", SqlType::Text),
            key("timestamp", SqlType::Timestamp),
            col("volatility", SqlType::Double),
        ],
    };
    type Key = (String, DateTime<Utc>);

    fn key(&self) -> Self::Key {
        (self.instrument.clone(), self.timestamp)
    }
}
