//! Typed values for identity constraint fields
//!
//! Identity constraints compare field values in the value space of their
//! types, never lexically: `01` and `1` are the same `xs:integer`, `1.0` is
//! that same value as an `xs:decimal`, and `true` equals `1` as an
//! `xs:boolean`. [`TypedValue`] holds one value per primitive value space;
//! its `Eq` and `Hash` follow value-space equality so tuples can be
//! deduplicated in a hash table. Values from different primitive spaces are
//! never equal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use base64::Engine as _;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::namespaces::QName;

/// XSD primitive types whose lexical space is a string of digits and
/// calendar fields compared without further normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GregorianKind {
    /// xs:gYear
    Year,
    /// xs:gYearMonth
    YearMonth,
    /// xs:gMonth
    Month,
    /// xs:gMonthDay
    MonthDay,
    /// xs:gDay
    Day,
}

/// Date/time primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalKind {
    /// xs:dateTime
    DateTime,
    /// xs:date
    Date,
    /// xs:time
    Time,
}

/// Binary primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryKind {
    /// xs:hexBinary
    Hex,
    /// xs:base64Binary
    Base64,
}

/// An `xs:float` or `xs:double` with identity-constraint equality: NaN
/// equals NaN and the two zeros are equal
#[derive(Debug, Clone, Copy)]
pub struct Float(pub f64);

impl Float {
    fn canonical_bits(self) -> u64 {
        if self.0.is_nan() {
            f64::NAN.to_bits()
        } else if self.0 == 0.0 {
            0.0f64.to_bits()
        } else {
            self.0.to_bits()
        }
    }
}

impl PartialEq for Float {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bits() == other.canonical_bits()
    }
}

impl Eq for Float {}

impl Hash for Float {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_bits().hash(state);
    }
}

/// A point in time; timezoned values are normalized to UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Temporal {
    /// Which primitive type this is
    pub kind: TemporalKind,
    /// The value, in UTC when `timezoned`
    pub instant: NaiveDateTime,
    /// Whether the lexical form carried a timezone
    pub timezoned: bool,
}

/// An `xs:duration` as (months, seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Duration {
    /// Years and months, in months
    pub months: i64,
    /// Days, hours, minutes and seconds, in seconds
    pub seconds: Decimal,
}

/// A simple-type value with its type's equality semantics
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypedValue {
    /// xs:string and every type derived from it; also xs:anySimpleType
    String(String),
    /// xs:boolean
    Boolean(bool),
    /// xs:decimal and the integer family, normalized
    Decimal(Decimal),
    /// xs:float
    Float(Float),
    /// xs:double
    Double(Float),
    /// xs:duration
    Duration(Duration),
    /// xs:dateTime, xs:date, xs:time
    Temporal(Temporal),
    /// xs:gYear and friends, whitespace-collapsed lexical form
    Gregorian(GregorianKind, String),
    /// xs:hexBinary, xs:base64Binary (decoded)
    Binary(BinaryKind, Vec<u8>),
    /// xs:anyURI
    AnyUri(String),
    /// xs:QName, already resolved to an expanded name
    QName(QName),
}

impl TypedValue {
    /// An xs:string value
    pub fn string(value: impl Into<String>) -> Self {
        TypedValue::String(value.into())
    }

    /// An xs:integer value
    pub fn integer(value: i64) -> Self {
        TypedValue::Decimal(Decimal::from(value))
    }

    /// Map a lexical form to a value of the named built-in type.
    ///
    /// `type_name` is the local name of an XSD built-in type such as
    /// `"integer"` or `"dateTime"`. Unknown names are treated as
    /// `xs:anySimpleType`, whose values are plain strings.
    pub fn from_builtin(type_name: &str, lexical: &str) -> Result<Self> {
        let collapsed = collapse_whitespace(lexical);
        let value = match type_name {
            "string" => TypedValue::String(lexical.to_string()),
            "normalizedString" => TypedValue::String(lexical.replace(['\t', '\n', '\r'], " ")),
            "token" | "language" | "Name" | "NCName" | "ID" | "IDREF" | "ENTITY" | "NMTOKEN"
            | "NMTOKENS" | "IDREFS" | "ENTITIES" => TypedValue::String(collapsed),
            "boolean" => TypedValue::Boolean(parse_boolean(&collapsed)?),
            "decimal" => TypedValue::Decimal(parse_decimal(&collapsed, false)?),
            "integer" | "long" | "int" | "short" | "byte" | "nonNegativeInteger"
            | "positiveInteger" | "nonPositiveInteger" | "negativeInteger" | "unsignedLong"
            | "unsignedInt" | "unsignedShort" | "unsignedByte" => {
                TypedValue::Decimal(parse_decimal(&collapsed, true)?)
            }
            "float" => TypedValue::Float(Float(parse_float(&collapsed)?)),
            "double" => TypedValue::Double(Float(parse_float(&collapsed)?)),
            "duration" | "dayTimeDuration" | "yearMonthDuration" => {
                TypedValue::Duration(parse_duration(&collapsed)?)
            }
            "dateTime" => TypedValue::Temporal(parse_temporal(TemporalKind::DateTime, &collapsed)?),
            "date" => TypedValue::Temporal(parse_temporal(TemporalKind::Date, &collapsed)?),
            "time" => TypedValue::Temporal(parse_temporal(TemporalKind::Time, &collapsed)?),
            "gYear" => TypedValue::Gregorian(GregorianKind::Year, collapsed),
            "gYearMonth" => TypedValue::Gregorian(GregorianKind::YearMonth, collapsed),
            "gMonth" => TypedValue::Gregorian(GregorianKind::Month, collapsed),
            "gMonthDay" => TypedValue::Gregorian(GregorianKind::MonthDay, collapsed),
            "gDay" => TypedValue::Gregorian(GregorianKind::Day, collapsed),
            "hexBinary" => TypedValue::Binary(BinaryKind::Hex, parse_hex(&collapsed)?),
            "base64Binary" => TypedValue::Binary(BinaryKind::Base64, parse_base64(&collapsed)?),
            "anyURI" => TypedValue::AnyUri(collapsed),
            _ => TypedValue::String(lexical.to_string()),
        };
        Ok(value)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::String(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::String(s)
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> Self {
        TypedValue::integer(i)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        TypedValue::Boolean(b)
    }
}

impl From<QName> for TypedValue {
    fn from(q: QName) -> Self {
        TypedValue::QName(q)
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) | TypedValue::AnyUri(s) | TypedValue::Gregorian(_, s) => {
                write!(f, "{}", s)
            }
            TypedValue::Boolean(b) => write!(f, "{}", b),
            TypedValue::Decimal(d) => write!(f, "{}", d),
            TypedValue::Float(v) | TypedValue::Double(v) => {
                if v.0.is_nan() {
                    write!(f, "NaN")
                } else if v.0 == f64::INFINITY {
                    write!(f, "INF")
                } else if v.0 == f64::NEG_INFINITY {
                    write!(f, "-INF")
                } else {
                    write!(f, "{}", v.0)
                }
            }
            TypedValue::Duration(d) => write!(f, "P{}MT{}S", d.months, d.seconds),
            TypedValue::Temporal(t) => {
                let text = match t.kind {
                    TemporalKind::DateTime => t.instant.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
                    TemporalKind::Date => t.instant.format("%Y-%m-%d").to_string(),
                    TemporalKind::Time => t.instant.format("%H:%M:%S%.f").to_string(),
                };
                write!(f, "{}{}", text, if t.timezoned { "Z" } else { "" })
            }
            TypedValue::Binary(_, bytes) => {
                for byte in bytes {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
            TypedValue::QName(q) => write!(f, "{}", q),
        }
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn invalid(type_name: &str, value: &str) -> Error {
    Error::Value(format!("'{}' is not a valid xs:{} value", value, type_name))
}

fn parse_boolean(value: &str) -> Result<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(invalid("boolean", value)),
    }
}

fn parse_decimal(value: &str, integer: bool) -> Result<Decimal> {
    let type_name = if integer { "integer" } else { "decimal" };
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
    let well_formed = !unsigned.is_empty()
        && unsigned != "."
        && unsigned.chars().all(|c| c.is_ascii_digit() || (!integer && c == '.'))
        && unsigned.matches('.').count() <= 1;
    if !well_formed {
        return Err(invalid(type_name, value));
    }
    let normalized = value.strip_prefix('+').unwrap_or(value);
    Decimal::from_str(normalized)
        .map(|d| d.normalize())
        .map_err(|_| invalid(type_name, value))
}

fn parse_float(value: &str) -> Result<f64> {
    match value {
        "INF" | "+INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ if value.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            Err(invalid("double", value))
        }
        _ => value.parse::<f64>().map_err(|_| invalid("double", value)),
    }
}

/// Parse `-?PnYnMnDTnHnMnS`
fn parse_duration(value: &str) -> Result<Duration> {
    let err = || invalid("duration", value);
    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    let body = body.strip_prefix('P').ok_or_else(err)?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((d, t)) if !t.is_empty() => (d, Some(t)),
        Some(_) => return Err(err()),
        None => (body, None),
    };
    if date_part.is_empty() && time_part.is_none() {
        return Err(err());
    }

    let mut months: i64 = 0;
    let mut seconds = Decimal::ZERO;

    for (number, unit) in duration_components(date_part).ok_or_else(err)? {
        let n: i64 = number.parse().map_err(|_| err())?;
        match unit {
            'Y' => {
                months = n
                    .checked_mul(12)
                    .and_then(|m| months.checked_add(m))
                    .ok_or_else(err)?
            }
            'M' => months = months.checked_add(n).ok_or_else(err)?,
            'D' => {
                seconds = Decimal::from(n)
                    .checked_mul(Decimal::from(86_400))
                    .and_then(|s| seconds.checked_add(s))
                    .ok_or_else(err)?
            }
            _ => return Err(err()),
        }
    }
    if let Some(time_part) = time_part {
        for (number, unit) in duration_components(time_part).ok_or_else(err)? {
            let factor = match unit {
                'H' => 3600,
                'M' => 60,
                'S' => 1,
                _ => return Err(err()),
            };
            seconds = Decimal::from_str(number)
                .map_err(|_| err())?
                .checked_mul(Decimal::from(factor))
                .and_then(|s| seconds.checked_add(s))
                .ok_or_else(err)?;
        }
    }

    if negative {
        months = -months;
        seconds = -seconds;
    }
    Ok(Duration {
        months,
        seconds: seconds.normalize(),
    })
}

/// Split `1Y2M` into `[("1", 'Y'), ("2", 'M')]`
fn duration_components(part: &str) -> Option<Vec<(&str, char)>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in part.char_indices() {
        if c.is_ascii_alphabetic() {
            if i == start {
                return None;
            }
            out.push((&part[start..i], c));
            start = i + c.len_utf8();
        }
    }
    if start != part.len() {
        return None;
    }
    Some(out)
}

/// Split a trailing timezone (`Z`, `+hh:mm`, `-hh:mm`) off a lexical form,
/// returning the offset in minutes
fn split_timezone(value: &str) -> Result<(&str, Option<i64>)> {
    if let Some(rest) = value.strip_suffix('Z') {
        return Ok((rest, Some(0)));
    }
    let split = value.len().saturating_sub(6);
    if split > 0 && value.is_char_boundary(split) {
        let (head, tz) = value.split_at(split);
        let bytes = tz.as_bytes();
        if (bytes[0] == b'+' || bytes[0] == b'-') && bytes[3] == b':' && tz.is_ascii() {
            let hours: i64 = tz[1..3].parse().map_err(|_| invalid("dateTime", value))?;
            let minutes: i64 = tz[4..6].parse().map_err(|_| invalid("dateTime", value))?;
            let offset = hours * 60 + minutes;
            let offset = if bytes[0] == b'-' { -offset } else { offset };
            return Ok((head, Some(offset)));
        }
    }
    Ok((value, None))
}

fn parse_temporal(kind: TemporalKind, value: &str) -> Result<Temporal> {
    let (body, offset) = split_timezone(value)?;
    let type_name = match kind {
        TemporalKind::DateTime => "dateTime",
        TemporalKind::Date => "date",
        TemporalKind::Time => "time",
    };
    let err = || invalid(type_name, value);

    let local = match kind {
        TemporalKind::DateTime => {
            NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f").map_err(|_| err())?
        }
        TemporalKind::Date => NaiveDate::parse_from_str(body, "%Y-%m-%d")
            .map_err(|_| err())?
            .and_time(NaiveTime::MIN),
        TemporalKind::Time => {
            let time = NaiveTime::parse_from_str(body, "%H:%M:%S%.f").map_err(|_| err())?;
            // xs:time values are compared on a fixed reference day
            NaiveDate::from_ymd_opt(1972, 12, 31)
                .ok_or_else(err)?
                .and_time(time)
        }
    };

    let instant = match offset {
        Some(minutes) => local
            .checked_sub_signed(ChronoDuration::minutes(minutes))
            .ok_or_else(err)?,
        None => local,
    };
    Ok(Temporal {
        kind,
        instant,
        timezoned: offset.is_some(),
    })
}

fn parse_hex(value: &str) -> Result<Vec<u8>> {
    if value.len() % 2 != 0 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("hexBinary", value));
    }
    (0..value.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&value[i..i + 2], 16).map_err(|_| invalid("hexBinary", value)))
        .collect()
}

fn parse_base64(value: &str) -> Result<Vec<u8>> {
    let cleaned = value.replace(' ', "");
    base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|_| invalid("base64Binary", value))
}
