//! Structured problem reports.
//!
//! An [`Issue`] is the single error vocabulary shared by the validator and by
//! any domain layer that maps its own failures into request-shaped reports.
//! The wire form is `{code, detail, path, pointer, meta}`.
use std::fmt;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{Map, Value};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    FieldMissing,
    FieldUnknown,
    TypeInvalid,
    ValueNull,
    ValueInvalid,
    StringTooShort,
    StringTooLong,
    NumberTooSmall,
    NumberTooLarge,
    ArrayTooSmall,
    ArrayTooLarge,
}

/// One segment of an issue path. Array indices stay integers on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    code: IssueCode,
    detail: String,
    path: Vec<PathSegment>,
    meta: Map<String, Value>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FieldMissing => "field_missing",
            Self::FieldUnknown => "field_unknown",
            Self::TypeInvalid => "type_invalid",
            Self::ValueNull => "value_null",
            Self::ValueInvalid => "value_invalid",
            Self::StringTooShort => "string_too_short",
            Self::StringTooLong => "string_too_long",
            Self::NumberTooSmall => "number_too_small",
            Self::NumberTooLarge => "number_too_large",
            Self::ArrayTooSmall => "array_too_small",
            Self::ArrayTooLarge => "array_too_large",
        }
    }

    /// Default human-readable detail for the code.
    pub fn default_detail(self) -> &'static str {
        match self {
            Self::FieldMissing => "Required",
            Self::FieldUnknown => "Unknown field",
            Self::TypeInvalid => "Invalid type",
            Self::ValueNull => "Cannot be null",
            Self::ValueInvalid => "Invalid value",
            Self::StringTooShort => "Too short",
            Self::StringTooLong => "Too long",
            Self::NumberTooSmall => "Too small",
            Self::NumberTooLarge => "Too large",
            Self::ArrayTooSmall => "Too few items",
            Self::ArrayTooLarge => "Too many items",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl Issue {
    pub fn new(code: IssueCode, detail: impl Into<String>, path: Vec<PathSegment>) -> Self {
        Self { code, detail: detail.into(), path, meta: Map::new() }
    }

    /// Issue carrying the code's default detail.
    pub fn of(code: IssueCode, path: Vec<PathSegment>) -> Self {
        Self::new(code, code.default_detail(), path)
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn code(&self) -> IssueCode { self.code }
    pub fn detail(&self) -> &str { &self.detail }
    pub fn path(&self) -> &[PathSegment] { &self.path }
    pub fn meta(&self) -> &Map<String, Value> { &self.meta }

    /// `/`-joined path, JSON-pointer style. The root path yields `""`.
    pub fn pointer(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            out.push('/');
            // JSON pointer escaping: `~` before `/`
            out.push_str(&segment.to_string().replace('~', "~0").replace('/', "~1"));
        }
        out
    }

    /// Re-root the issue under `prefix` (used when nested results bubble up).
    pub fn prefixed(mut self, prefix: &[PathSegment]) -> Self {
        let mut path = prefix.to_vec();
        path.append(&mut self.path);
        self.path = path;
        self
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pointer = self.pointer();
        let at = if pointer.is_empty() { "/" } else { pointer.as_str() };
        write!(f, "{at}: {} ({})", self.detail, self.code)
    }
}

impl Serialize for Issue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Issue", 5)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("detail", &self.detail)?;
        state.serialize_field("path", &self.path)?;
        state.serialize_field("pointer", &self.pointer())?;
        state.serialize_field("meta", &self.meta)?;
        state.end()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
