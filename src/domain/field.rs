//! Structured header fields with inferred scalar kinds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?$",
    )
    .expect("date pattern is valid")
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("number pattern is valid")
});

/// The inferred kind of a header value.
///
/// A closed set: every value maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

impl FieldKind {
    /// Returns the database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Parses the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infers the kind of a scalar from its string form.
///
/// Precedence: date pattern, then numeric pattern, then boolean literal,
/// falling back to string. `"2024"` is therefore a number, never a date.
pub fn infer_kind(raw: &str) -> FieldKind {
    let s = raw.trim();
    if normalize_date(s).is_some() {
        FieldKind::Date
    } else if NUMBER_RE.is_match(s) && s.parse::<f64>().is_ok() {
        FieldKind::Number
    } else if parse_boolean(s).is_some() {
        FieldKind::Boolean
    } else {
        FieldKind::String
    }
}

/// A single key/value entry from a document's structured header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValue {
    key: String,
    raw: String,
    kind: FieldKind,
    normalized: String,
}

impl FieldValue {
    /// Builds a field from a scalar string, inferring its kind.
    pub fn scalar(key: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let kind = infer_kind(&raw);
        let normalized = normalize(&raw, kind);
        Self {
            key: key.into(),
            raw,
            kind,
            normalized,
        }
    }

    /// Builds a field from a YAML value.
    pub fn from_yaml(key: impl Into<String>, value: &serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Sequence(_) => Self::structured(key, FieldKind::Array, yaml_to_json(value)),
            Value::Mapping(_) => Self::structured(key, FieldKind::Object, yaml_to_json(value)),
            Value::Tagged(tagged) => Self::from_yaml(key, &tagged.value),
            Value::Null => Self::scalar(key, ""),
            Value::Bool(b) => Self::scalar(key, b.to_string()),
            Value::Number(n) => Self::scalar(key, n.to_string()),
            Value::String(s) => Self::scalar(key, s.clone()),
        }
    }

    /// Builds a field from a TOML value.
    pub fn from_toml(key: impl Into<String>, value: &toml::Value) -> Self {
        use toml::Value;

        match value {
            Value::Array(_) => Self::structured(key, FieldKind::Array, toml_to_json(value)),
            Value::Table(_) => Self::structured(key, FieldKind::Object, toml_to_json(value)),
            Value::String(s) => Self::scalar(key, s.clone()),
            Value::Integer(i) => Self::scalar(key, i.to_string()),
            Value::Float(f) => Self::scalar(key, f.to_string()),
            Value::Boolean(b) => Self::scalar(key, b.to_string()),
            Value::Datetime(dt) => Self::scalar(key, dt.to_string()),
        }
    }

    fn structured(key: impl Into<String>, kind: FieldKind, json: serde_json::Value) -> Self {
        let raw = json.to_string();
        Self {
            key: key.into(),
            normalized: raw.clone(),
            raw,
            kind,
        }
    }

    /// Returns the header key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the value as written (arrays and objects as JSON).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the inferred kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns the canonical form used for comparisons.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Returns the value as a list of strings. See [`list_items`].
    pub fn items(&self) -> Vec<String> {
        list_items(self.kind, &self.raw)
    }
}

/// Interprets a stored field value as a list.
///
/// Arrays yield their scalar elements; objects yield nothing; scalars are
/// split on commas and whitespace (`tags: rust, cli`).
pub fn list_items(kind: FieldKind, raw: &str) -> Vec<String> {
    match kind {
        FieldKind::Array => serde_json::from_str::<Vec<serde_json::Value>>(raw)
            .map(|items| items.iter().filter_map(json_scalar).collect())
            .unwrap_or_default(),
        FieldKind::Object => Vec::new(),
        _ => raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn json_scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn normalize(raw: &str, kind: FieldKind) -> String {
    let s = raw.trim();
    match kind {
        FieldKind::Date => normalize_date(s).unwrap_or_else(|| s.to_string()),
        FieldKind::Number => normalize_number(s),
        FieldKind::Boolean => parse_boolean(s)
            .map(|b| b.to_string())
            .unwrap_or_else(|| s.to_string()),
        FieldKind::String | FieldKind::Array | FieldKind::Object => s.to_string(),
    }
}

fn normalize_date(s: &str) -> Option<String> {
    if !DATE_RE.is_match(s) {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    }
    const LOCAL_FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn normalize_number(s: &str) -> String {
    match s.parse::<f64>() {
        Ok(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
            format!("{}", n as i64)
        }
        Ok(n) => n.to_string(),
        Err(_) => s.to_string(),
    }
}

fn parse_boolean(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

fn yaml_to_json(value: &serde_yaml::Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn toml_to_json(value: &toml::Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
