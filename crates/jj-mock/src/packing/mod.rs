//! Type-tagged wire format for matchers, responses, policies and history.
//!
//! A packable value travels as a single-key JSON object naming its type:
//!
//! ```json
//! {"AllMatcher": {"matchers": [{"MethodMatcher": {"matcher": {"EqualMatcher": {"expected": "POST"}}}}]}}
//! ```
//!
//! Unpacking looks the tag up in a [`PackTable`] of constructors. Unknown tags
//! are an error; unknown fields inside a known type are ignored.

mod matchers;
mod values;

use crate::expiration::{ExpirationPolicy, PolicyError};
use crate::history::{HistoryItem, HistoryRequest, HistoryResponse};
use crate::matcher::{AttributeMatcher, MatcherError, MultiDictMatcher, RequestMatcher};
use crate::response::ResponseTemplate;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

pub type Fields = Map<String, Value>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PackError {
    #[error("unknown packed type `{0}`")]
    UnknownType(String),

    #[error("expected a packed object, got {0}")]
    NotPacked(String),

    #[error("{type_name}: missing field `{field}`")]
    MissingField {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("{type_name}: invalid field `{field}`: {reason}")]
    InvalidField {
        type_name: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("expected {expected}, got {actual}")]
    UnexpectedType {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("cannot pack {0}")]
    Unsupported(String),

    #[error(transparent)]
    Matcher(#[from] MatcherError),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// A value with a packed representation.
pub trait Pack {
    fn type_name(&self) -> &'static str;

    fn pack_fields(&self) -> Result<Fields, PackError>;

    /// `{TypeName: fields}`.
    fn pack(&self) -> Result<Value, PackError> {
        let mut wrapped = Fields::new();
        wrapped.insert(
            self.type_name().to_string(),
            Value::Object(self.pack_fields()?),
        );
        Ok(Value::Object(wrapped))
    }
}

/// Pack every element of a list.
pub fn pack_list<T: Pack>(items: &[T]) -> Result<Value, PackError> {
    items
        .iter()
        .map(Pack::pack)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Every value the standard table knows how to rebuild.
#[derive(Debug, Clone, PartialEq)]
pub enum Packed {
    Attribute(AttributeMatcher),
    MultiDict(MultiDictMatcher),
    Request(RequestMatcher),
    Response(ResponseTemplate),
    Policy(ExpirationPolicy),
    HistoryRequest(HistoryRequest),
    HistoryResponse(HistoryResponse),
    HistoryItem(HistoryItem),
}

impl Packed {
    pub fn kind(&self) -> &'static str {
        match self {
            Packed::Attribute(_) => "attribute matcher",
            Packed::MultiDict(_) => "multi-dict matcher",
            Packed::Request(_) => "request matcher",
            Packed::Response(_) => "response",
            Packed::Policy(_) => "expiration policy",
            Packed::HistoryRequest(_) => "history request",
            Packed::HistoryResponse(_) => "history response",
            Packed::HistoryItem(_) => "history item",
        }
    }
}

macro_rules! packed_conversions {
    ($($variant:ident => $ty:ty, $kind:literal;)*) => {
        $(
            impl TryFrom<Packed> for $ty {
                type Error = PackError;

                fn try_from(packed: Packed) -> Result<Self, PackError> {
                    match packed {
                        Packed::$variant(value) => Ok(value),
                        other => Err(PackError::UnexpectedType {
                            expected: $kind,
                            actual: other.kind(),
                        }),
                    }
                }
            }
        )*
    };
}

packed_conversions! {
    Attribute => AttributeMatcher, "attribute matcher";
    MultiDict => MultiDictMatcher, "multi-dict matcher";
    Request => RequestMatcher, "request matcher";
    Response => ResponseTemplate, "response";
    Policy => ExpirationPolicy, "expiration policy";
    HistoryRequest => HistoryRequest, "history request";
    HistoryResponse => HistoryResponse, "history response";
    HistoryItem => HistoryItem, "history item";
}

/// Server-side values injected into constructors.
#[derive(Debug, Clone, Default)]
pub struct UnpackContext {
    /// Outbound client handed to relay and tunnel responses.
    pub client: Option<reqwest::Client>,
}

pub type Constructor = fn(&Fields, &PackTable, &UnpackContext) -> Result<Packed, PackError>;

/// String-keyed constructor table.
#[derive(Clone)]
pub struct PackTable {
    constructors: HashMap<&'static str, Constructor>,
    context: UnpackContext,
}

impl PackTable {
    pub fn empty(context: UnpackContext) -> Self {
        Self {
            constructors: HashMap::new(),
            context,
        }
    }

    /// Every matcher, response, policy and history type.
    pub fn standard(context: UnpackContext) -> Self {
        let mut table = Self::empty(context);
        matchers::register(&mut table);
        values::register(&mut table);
        table
    }

    pub fn register(&mut self, type_name: &'static str, constructor: Constructor) {
        self.constructors.insert(type_name, constructor);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    pub fn unpack(&self, value: &Value) -> Result<Packed, PackError> {
        let (type_name, fields) = split_tag(value)?;
        let constructor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| PackError::UnknownType(type_name.to_string()))?;
        constructor(fields, self, &self.context)
    }

    pub fn unpack_as<T>(&self, value: &Value) -> Result<T, PackError>
    where
        T: TryFrom<Packed, Error = PackError>,
    {
        T::try_from(self.unpack(value)?)
    }

    /// Unpack every element of a JSON array.
    pub fn unpack_list<T>(&self, value: &Value) -> Result<Vec<T>, PackError>
    where
        T: TryFrom<Packed, Error = PackError>,
    {
        match value {
            Value::Array(items) => items.iter().map(|item| self.unpack_as(item)).collect(),
            other => Err(PackError::NotPacked(describe(other))),
        }
    }
}

impl Default for PackTable {
    fn default() -> Self {
        Self::standard(UnpackContext::default())
    }
}

fn split_tag(value: &Value) -> Result<(&str, &Fields), PackError> {
    let Value::Object(object) = value else {
        return Err(PackError::NotPacked(describe(value)));
    };
    let mut entries = object.iter();
    match (entries.next(), entries.next()) {
        (Some((type_name, Value::Object(fields))), None) => Ok((type_name.as_str(), fields)),
        _ => Err(PackError::NotPacked(describe(value))),
    }
}

fn describe(value: &Value) -> String {
    let text = value.to_string();
    if text.len() > 64 {
        let cut = (0..=64).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &text[..cut])
    } else {
        text
    }
}

// ===== Field access =====

pub(crate) fn field<'a>(
    fields: &'a Fields,
    type_name: &'static str,
    name: &'static str,
) -> Result<&'a Value, PackError> {
    fields.get(name).ok_or(PackError::MissingField {
        type_name,
        field: name,
    })
}

pub(crate) fn invalid(
    type_name: &'static str,
    field: &'static str,
    reason: impl Into<String>,
) -> PackError {
    PackError::InvalidField {
        type_name,
        field,
        reason: reason.into(),
    }
}

pub(crate) fn str_field<'a>(
    fields: &'a Fields,
    type_name: &'static str,
    name: &'static str,
) -> Result<&'a str, PackError> {
    field(fields, type_name, name)?
        .as_str()
        .ok_or_else(|| invalid(type_name, name, "expected a string"))
}

/// Optional string; `null` and absent are the same.
pub(crate) fn opt_str_field<'a>(
    fields: &'a Fields,
    type_name: &'static str,
    name: &'static str,
) -> Result<Option<&'a str>, PackError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(invalid(type_name, name, "expected a string")),
    }
}

pub(crate) fn pairs_to_value(pairs: &[(String, String)]) -> Value {
    Value::Array(
        pairs
            .iter()
            .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), Value::String(v.clone())]))
            .collect(),
    )
}

/// `[[key, value], ...]`; a missing field is an empty list.
pub(crate) fn pairs_field(
    fields: &Fields,
    type_name: &'static str,
    name: &'static str,
) -> Result<Vec<(String, String)>, PackError> {
    let items = match fields.get(name) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid(type_name, name, "expected a list of pairs")),
    };
    items
        .iter()
        .map(|item| match item.as_array().map(Vec::as_slice) {
            Some([Value::String(k), Value::String(v)]) => Ok((k.clone(), v.clone())),
            _ => Err(invalid(type_name, name, "expected [key, value] string pairs")),
        })
        .collect()
}

pub(crate) fn encode_body(body: &[u8]) -> Value {
    Value::String(BASE64.encode(body))
}

pub(crate) fn body_field(
    fields: &Fields,
    type_name: &'static str,
    name: &'static str,
) -> Result<bytes::Bytes, PackError> {
    match opt_str_field(fields, type_name, name)? {
        None => Ok(bytes::Bytes::new()),
        Some(encoded) => BASE64
            .decode(encoded)
            .map(bytes::Bytes::from)
            .map_err(|e| invalid(type_name, name, format!("invalid base64: {e}"))),
    }
}
