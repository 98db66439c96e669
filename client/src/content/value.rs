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

//! JSON → table value deserialization.
//!
//! JSON null is SQL NULL for every target type. Scalar targets accept both
//! JSON scalars and JSON strings (servers stringify numerics freely);
//! integer widths are range-checked. Temporal targets take ISO-8601
//! strings, the v2 `/Date(ms)/` form, or epoch integers. List elements that
//! fail to deserialize are logged and skipped; struct fields degrade to
//! NULL.

use crate::content::decimal_from_value;
use crate::content::decode_binary;
use odata_bridge_core::Error;
use odata_bridge_core::Result;
use odata_bridge_core::TableType;
use odata_bridge_core::TableValue;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::Date;
use time::Duration;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::Time;
use uuid::Uuid;

fn type_error(expected: &str, value: &Value) -> Error {
    let actual = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    Error::parse(format!("expected JSON {expected}, got {actual}"))
}

/// Deserialize one JSON value against a target table type.
///
/// # Errors
///
/// `Error::Parse` when a non-null value cannot be converted (wrong JSON
/// type, out-of-range integer, malformed temporal string).
pub fn deserialize_json_value(value: &Value, target: &TableType) -> Result<TableValue> {
    if value.is_null() {
        return Ok(TableValue::Null);
    }

    match target {
        TableType::Bool => deserialize_bool(value),
        TableType::Int8 => int_in_range(value, "int8").map(TableValue::Int8),
        TableType::Int16 => int_in_range(value, "int16").map(TableValue::Int16),
        TableType::Int32 => int_in_range(value, "int32").map(TableValue::Int32),
        TableType::Int64 => int_in_range(value, "int64").map(TableValue::Int64),
        TableType::Float32 => float_value(value).map(|f| TableValue::Float32(f as f32)),
        TableType::Float64 => float_value(value).map(TableValue::Float64),
        TableType::Decimal => decimal_from_value(value)
            .map(TableValue::Decimal)
            .ok_or_else(|| type_error("decimal", value)),
        TableType::Text => deserialize_text(value),
        TableType::Bytes => match value.as_str() {
            Some(text) => Ok(TableValue::Bytes(decode_binary(text))),
            None => Err(type_error("base64 string", value)),
        },
        TableType::Uuid => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(TableValue::Uuid)
            .ok_or_else(|| type_error("uuid string", value)),
        TableType::Date => deserialize_date(value),
        TableType::Timestamp => deserialize_timestamp(value),
        TableType::Time => deserialize_time(value),
        TableType::Interval => value
            .as_str()
            .and_then(parse_iso8601_duration)
            .map(TableValue::Interval)
            .ok_or_else(|| type_error("ISO-8601 duration string", value)),
        TableType::Enum(members) => deserialize_enum(value, members),
        TableType::List(element_type) => deserialize_list(value, element_type),
        TableType::Struct(fields) => deserialize_struct(value, fields),
    }
}

fn deserialize_bool(value: &Value) -> Result<TableValue> {
    match value {
        Value::Bool(b) => Ok(TableValue::Bool(*b)),
        Value::String(s) if s == "true" || s == "1" => Ok(TableValue::Bool(true)),
        Value::String(s) if s == "false" || s == "0" => Ok(TableValue::Bool(false)),
        other => Err(type_error("boolean", other)),
    }
}

fn deserialize_text(value: &Value) -> Result<TableValue> {
    match value {
        Value::String(s) => Ok(TableValue::Text(s.clone())),
        Value::Number(n) => Ok(TableValue::Text(n.to_string())),
        Value::Bool(b) => Ok(TableValue::Text(b.to_string())),
        other => Err(type_error("string", other)),
    }
}

/// Integer parsing with per-width range checks; strings are parsed first.
fn int_in_range<T>(value: &Value, expected: &str) -> Result<T>
where
    T: TryFrom<i64> + std::str::FromStr,
{
    let wide = match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| type_error(expected, value))?,
        Value::String(s) => {
            return s.trim().parse::<T>().map_err(|_| type_error(expected, value));
        }
        other => return Err(type_error(expected, other)),
    };
    T::try_from(wide).map_err(|_| Error::parse(format!("value {wide} out of range for {expected}")))
}

fn float_value(value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| type_error("number", value)),
        Value::String(s) => s.trim().parse().map_err(|_| type_error("number", value)),
        other => Err(type_error("number", other)),
    }
}

fn deserialize_date(value: &Value) -> Result<TableValue> {
    match value {
        Value::String(text) => parse_date(text)
            .map(TableValue::Date)
            .ok_or_else(|| type_error("date string 'YYYY-MM-DD'", value)),
        // Integer inputs are days since the Unix epoch.
        Value::Number(n) => {
            let days = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| type_error("date", value))?;
            let moment = days
                .checked_mul(86_400)
                .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
                .ok_or_else(|| Error::parse(format!("day offset {days} out of range")))?;
            Ok(TableValue::Date(moment.date()))
        }
        other => Err(type_error("date", other)),
    }
}

fn deserialize_timestamp(value: &Value) -> Result<TableValue> {
    match value {
        Value::String(text) => parse_timestamp(text)
            .map(TableValue::Timestamp)
            .ok_or_else(|| type_error("ISO-8601 timestamp string", value)),
        // Integer inputs are seconds since the Unix epoch.
        Value::Number(n) => {
            let seconds = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| type_error("timestamp", value))?;
            OffsetDateTime::from_unix_timestamp(seconds)
                .map(TableValue::Timestamp)
                .map_err(|_| Error::parse(format!("epoch seconds {seconds} out of range")))
        }
        other => Err(type_error("timestamp", other)),
    }
}

fn deserialize_time(value: &Value) -> Result<TableValue> {
    match value {
        Value::String(text) => parse_time(text)
            .map(TableValue::Time)
            .ok_or_else(|| type_error("time string 'HH:MM:SS'", value)),
        other => Err(type_error("time", other)),
    }
}

fn deserialize_enum(value: &Value, members: &[String]) -> Result<TableValue> {
    match value {
        Value::String(text) => Ok(members
            .iter()
            .position(|member| member == text)
            .map(|index| TableValue::Enum(index as u64))
            // Unknown member names fall back to the raw string.
            .unwrap_or_else(|| TableValue::Text(text.clone()))),
        other => Err(type_error("enum string", other)),
    }
}

fn deserialize_list(value: &Value, element_type: &TableType) -> Result<TableValue> {
    let Some(elements) = value.as_array() else {
        return Err(type_error("array", value));
    };

    let mut list = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        match deserialize_json_value(element, element_type) {
            Ok(deserialized) => list.push(deserialized),
            Err(error) => {
                tracing::error!(
                    target: "odata.content",
                    "failed to deserialize list element {index}: {error}"
                );
            }
        }
    }
    Ok(TableValue::List(list))
}

fn deserialize_struct(value: &Value, fields: &[(String, TableType)]) -> Result<TableValue> {
    let Some(object) = value.as_object() else {
        return Err(type_error("object", value));
    };

    let mut entries = Vec::with_capacity(fields.len());
    for (name, field_type) in fields {
        let field_value = match object.get(name) {
            None => TableValue::Null,
            Some(raw) => match deserialize_json_value(raw, field_type) {
                Ok(deserialized) => deserialized,
                Err(error) => {
                    tracing::error!(
                        target: "odata.content",
                        "failed to deserialize struct field '{name}': {error}"
                    );
                    TableValue::Null
                }
            },
        };
        entries.push((name.clone(), field_value));
    }
    Ok(TableValue::Struct(entries))
}

fn parse_date(text: &str) -> Option<Date> {
    let format = format_description!("[year]-[month]-[day]");
    // Datetime strings are accepted for date targets; the time is dropped.
    let date_part = text.split('T').next().unwrap_or(text);
    Date::parse(date_part, &format).ok()
}

fn parse_timestamp(text: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(parsed.to_offset(time::UtcOffset::UTC));
    }

    // Offset-less ISO-8601 is interpreted as UTC.
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]");
    if let Ok(parsed) = PrimitiveDateTime::parse(text, &format) {
        return Some(parsed.assume_utc());
    }

    // The v2 wire format: /Date(milliseconds[+offset])/.
    let millis = text
        .strip_prefix("/Date(")
        .and_then(|rest| rest.strip_suffix(")/"))?;
    // A timezone suffix (+hhmm/-hhmm) may follow the epoch value.
    let millis = match millis[1..].find(['+', '-']) {
        Some(pos) => &millis[..pos + 1],
        None => millis,
    };
    let millis: i128 = millis.parse().ok()?;
    OffsetDateTime::from_unix_timestamp_nanos(millis * 1_000_000).ok()
}

fn parse_time(text: &str) -> Option<Time> {
    // v2 Edm.Time values arrive as ISO-8601 durations (PT16H20M00S).
    if text.starts_with("PT") {
        let duration = parse_iso8601_duration(text)?;
        let seconds = duration.whole_seconds();
        if !(0..86_400).contains(&seconds) {
            return None;
        }
        return Time::from_hms(
            (seconds / 3600) as u8,
            ((seconds % 3600) / 60) as u8,
            (seconds % 60) as u8,
        )
        .ok();
    }

    let format = format_description!("[hour]:[minute]:[second][optional [.[subsecond]]]");
    Time::parse(text, &format).ok()
}

/// Parse an ISO-8601 duration (`[-]PnDTnHnMnS`, fractional seconds allowed)
/// into a [`Duration`].
fn parse_iso8601_duration(text: &str) -> Option<Duration> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let rest = rest.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut total = Duration::ZERO;
    let mut number = String::new();
    for c in date_part.chars() {
        match c {
            '0'..='9' => number.push(c),
            'D' => total += Duration::days(number.parse().ok()?),
            'W' => total += Duration::weeks(number.parse().ok()?),
            'Y' | 'M' => return None, // calendar units are not fixed-length
            _ => return None,
        }
        if !c.is_ascii_digit() {
            number.clear();
        }
    }

    if let Some(time_part) = time_part {
        let mut number = String::new();
        for c in time_part.chars() {
            match c {
                '0'..='9' | '.' => number.push(c),
                'H' => total += Duration::hours(number.parse().ok()?),
                'M' => total += Duration::minutes(number.parse().ok()?),
                'S' => total += Duration::seconds_f64(number.parse().ok()?),
                _ => return None,
            }
            if !c.is_ascii_digit() && c != '.' {
                number.clear();
            }
        }
    }

    Some(if negative { -total } else { total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_is_null_for_every_type() {
        for target in [TableType::Int32, TableType::Text, TableType::Timestamp] {
            assert_eq!(
                deserialize_json_value(&Value::Null, &target).unwrap(),
                TableValue::Null
            );
        }
    }

    #[test]
    fn int8_range_is_enforced() {
        assert_eq!(
            deserialize_json_value(&json!(127), &TableType::Int8).unwrap(),
            TableValue::Int8(127)
        );
        assert!(deserialize_json_value(&json!(-129), &TableType::Int8).is_err());
        assert!(deserialize_json_value(&json!(128), &TableType::Int8).is_err());
    }

    #[test]
    fn numeric_strings_are_parsed() {
        assert_eq!(
            deserialize_json_value(&json!("42"), &TableType::Int32).unwrap(),
            TableValue::Int32(42)
        );
        assert_eq!(
            deserialize_json_value(&json!("2.5"), &TableType::Float64).unwrap(),
            TableValue::Float64(2.5)
        );
        assert_eq!(
            deserialize_json_value(&json!("true"), &TableType::Bool).unwrap(),
            TableValue::Bool(true)
        );
    }

    #[test]
    fn decimals_keep_their_digits() {
        let cell = deserialize_json_value(&json!("123.4500"), &TableType::Decimal).unwrap();
        assert_eq!(cell, TableValue::Decimal("123.4500".parse().unwrap()));
    }

    #[test]
    fn rfc3339_timestamps_normalize_to_utc() {
        let cell =
            deserialize_json_value(&json!("2024-03-01T12:30:00+02:00"), &TableType::Timestamp)
                .unwrap();
        let TableValue::Timestamp(ts) = cell else {
            panic!("expected timestamp")
        };
        assert_eq!(ts.offset(), time::UtcOffset::UTC);
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn offsetless_timestamps_assume_utc() {
        let cell =
            deserialize_json_value(&json!("2014-01-01T08:00:00"), &TableType::Timestamp).unwrap();
        assert!(matches!(cell, TableValue::Timestamp(_)));
    }

    #[test]
    fn v2_date_millis_form_is_accepted() {
        let cell =
            deserialize_json_value(&json!("/Date(1393200000000)/"), &TableType::Timestamp)
                .unwrap();
        let TableValue::Timestamp(ts) = cell else {
            panic!("expected timestamp")
        };
        assert_eq!(ts.unix_timestamp(), 1_393_200_000);
    }

    #[test]
    fn epoch_integers_are_days_and_seconds() {
        let date = deserialize_json_value(&json!(19_000), &TableType::Date).unwrap();
        let TableValue::Date(d) = date else {
            panic!("expected date")
        };
        assert_eq!(d.year(), 2022);

        let ts = deserialize_json_value(&json!(86_400), &TableType::Timestamp).unwrap();
        let TableValue::Timestamp(t) = ts else {
            panic!("expected timestamp")
        };
        assert_eq!(t.unix_timestamp(), 86_400);
    }

    #[test]
    fn absurd_day_offsets_fail_without_panicking() {
        assert!(deserialize_json_value(&json!(i64::MAX), &TableType::Date).is_err());
        assert!(deserialize_json_value(&json!(i64::MIN), &TableType::Date).is_err());
    }

    #[test]
    fn v2_time_durations_become_times() {
        let cell = deserialize_json_value(&json!("PT16H20M00S"), &TableType::Time).unwrap();
        let TableValue::Time(t) = cell else {
            panic!("expected time")
        };
        assert_eq!((t.hour(), t.minute(), t.second()), (16, 20, 0));
    }

    #[test]
    fn durations_parse_days_hours_minutes_seconds() {
        let cell =
            deserialize_json_value(&json!("P1DT2H30M15S"), &TableType::Interval).unwrap();
        let TableValue::Interval(d) = cell else {
            panic!("expected interval")
        };
        assert_eq!(d.whole_seconds(), 86_400 + 2 * 3600 + 30 * 60 + 15);
    }

    #[test]
    fn enums_map_members_and_fall_back_to_text() {
        let members = vec!["Male".to_string(), "Female".to_string()];
        assert_eq!(
            deserialize_json_value(&json!("Female"), &TableType::Enum(members.clone())).unwrap(),
            TableValue::Enum(1)
        );
        assert_eq!(
            deserialize_json_value(&json!("Other"), &TableType::Enum(members)).unwrap(),
            TableValue::Text("Other".to_string())
        );
    }

    #[test]
    fn list_elements_that_fail_are_skipped() {
        let cell = deserialize_json_value(
            &json!(["1", "nope", "3"]),
            &TableType::List(Box::new(TableType::Int32)),
        )
        .unwrap();
        assert_eq!(
            cell,
            TableValue::List(vec![TableValue::Int32(1), TableValue::Int32(3)])
        );
    }

    #[test]
    fn struct_fields_are_matched_by_name() {
        let fields = vec![
            ("City".to_string(), TableType::Text),
            ("Zip".to_string(), TableType::Int32),
        ];
        let cell = deserialize_json_value(
            &json!({"City": "Boise", "Extra": true}),
            &TableType::Struct(fields),
        )
        .unwrap();
        assert_eq!(
            cell,
            TableValue::Struct(vec![
                ("City".to_string(), TableValue::Text("Boise".to_string())),
                ("Zip".to_string(), TableValue::Null),
            ])
        );
    }

    #[test]
    fn binary_columns_decode_base64() {
        let cell = deserialize_json_value(&json!("aGVsbG8="), &TableType::Bytes).unwrap();
        assert_eq!(cell, TableValue::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn uuids_parse_from_strings() {
        let cell = deserialize_json_value(
            &json!("6f9619ff-8b86-d011-b42d-00c04fc964ff"),
            &TableType::Uuid,
        )
        .unwrap();
        assert!(matches!(cell, TableValue::Uuid(_)));
    }
}
