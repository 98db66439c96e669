// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The typed row model handed to the host engine.
//!
//! [`TableType`] describes a column, [`TableValue`] is one cell, and
//! [`DataChunk`] is the fixed-capacity output buffer a scan call fills.
//! EDM entity types project onto these via `odata-bridge-edm`.

use rust_decimal::Decimal;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use time::Date;
use time::Duration;
use time::OffsetDateTime;
use time::Time;
use uuid::Uuid;

/// A column type in the projected table schema.
#[derive(Debug, Clone, PartialEq)]
pub enum TableType {
    Bytes,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Text,
    Uuid,
    Date,
    /// UTC timestamp.
    Timestamp,
    Time,
    Interval,
    /// Text-valued enum; the allowed values are the member names in
    /// declaration order.
    Enum(Vec<String>),
    List(Box<TableType>),
    /// Ordered named fields.
    Struct(Vec<(String, TableType)>),
}

impl TableType {
    /// Lists and structs. Some servers reject `$select` on these, and the
    /// pushdown planner treats them specially.
    pub fn is_complex(&self) -> bool {
        matches!(self, Self::List(_) | Self::Struct(_))
    }
}

impl Display for TableType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Bytes => "bytes".fmt(f),
            Self::Bool => "bool".fmt(f),
            Self::Int8 => "int8".fmt(f),
            Self::Int16 => "int16".fmt(f),
            Self::Int32 => "int32".fmt(f),
            Self::Int64 => "int64".fmt(f),
            Self::Float32 => "float32".fmt(f),
            Self::Float64 => "float64".fmt(f),
            Self::Decimal => "decimal".fmt(f),
            Self::Text => "text".fmt(f),
            Self::Uuid => "uuid".fmt(f),
            Self::Date => "date".fmt(f),
            Self::Timestamp => "timestamp".fmt(f),
            Self::Time => "time".fmt(f),
            Self::Interval => "interval".fmt(f),
            Self::Enum(members) => write!(f, "enum<{}>", members.join(",")),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Struct(fields) => {
                write!(f, "struct<")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{name}:{ty}")?;
                }
                write!(f, ">")
            }
        }
    }
}

/// One cell of a materialized row.
#[derive(Debug, Clone, PartialEq)]
pub enum TableValue {
    /// SQL NULL of whatever the column type is.
    Null,
    Bytes(Vec<u8>),
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    Date(Date),
    Timestamp(OffsetDateTime),
    Time(Time),
    Interval(Duration),
    /// Index into the column's enum member list.
    Enum(u64),
    List(Vec<TableValue>),
    Struct(Vec<(String, TableValue)>),
}

impl TableValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Fixed-capacity output buffer one scan call fills.
///
/// The host sets the column types and capacity at bind time; each scan call
/// resets the chunk, pushes at most `capacity` rows, and reads the resulting
/// cardinality.
#[derive(Debug)]
pub struct DataChunk {
    column_types: Vec<TableType>,
    capacity: usize,
    rows: Vec<Vec<TableValue>>,
}

impl DataChunk {
    pub fn new(column_types: Vec<TableType>, capacity: usize) -> Self {
        Self {
            column_types,
            capacity,
            rows: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn column_count(&self) -> usize {
        self.column_types.len()
    }

    pub fn column_types(&self) -> &[TableType] {
        &self.column_types
    }

    /// Rows currently in the chunk.
    pub fn cardinality(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<TableValue>] {
        &self.rows
    }

    /// Drop all rows; called at the start of each scan.
    pub fn reset(&mut self) {
        self.rows.clear();
    }

    /// Append a row. The row must match the column count, and the chunk must
    /// not be full.
    pub fn push_row(&mut self, row: Vec<TableValue>) {
        debug_assert_eq!(row.len(), self.column_types.len());
        debug_assert!(self.rows.len() < self.capacity);
        self.rows.push(row);
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_types_are_lists_and_structs() {
        assert!(TableType::List(Box::new(TableType::Text)).is_complex());
        assert!(TableType::Struct(vec![("a".into(), TableType::Int32)]).is_complex());
        assert!(!TableType::Text.is_complex());
        assert!(!TableType::Enum(vec!["A".into()]).is_complex());
    }

    #[test]
    fn type_display_is_structural() {
        let ty = TableType::Struct(vec![
            ("City".to_string(), TableType::Text),
            ("Loc".to_string(), TableType::List(Box::new(TableType::Float64))),
        ]);
        assert_eq!(ty.to_string(), "struct<City:text,Loc:list<float64>>");
    }

    #[test]
    fn chunk_tracks_cardinality() {
        let mut chunk = DataChunk::new(vec![TableType::Int32], 2);
        assert_eq!(chunk.cardinality(), 0);
        chunk.push_row(vec![TableValue::Int32(1)]);
        chunk.push_row(vec![TableValue::Null]);
        assert_eq!(chunk.cardinality(), 2);
        assert!(chunk.is_full());
        chunk.reset();
        assert_eq!(chunk.cardinality(), 0);
    }
}
