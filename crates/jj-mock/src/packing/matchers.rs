//! Packing for attribute, multi-dict and request matchers.

use super::{
    field, invalid, opt_str_field, pack_list, str_field, Fields, Pack, PackError, PackTable,
    Packed, UnpackContext,
};
use crate::matcher::{AttributeMatcher, MultiDictMatcher, RequestMatcher};
use serde_json::Value;

impl Pack for AttributeMatcher {
    fn type_name(&self) -> &'static str {
        match self {
            AttributeMatcher::Equal(_) => "EqualMatcher",
            AttributeMatcher::NotEqual(_) => "NotEqualMatcher",
            AttributeMatcher::Contain(_) => "ContainMatcher",
            AttributeMatcher::NotContain(_) => "NotContainMatcher",
            AttributeMatcher::Regex(_) => "RegexMatcher",
            AttributeMatcher::Exists => "ExistMatcher",
            AttributeMatcher::Route(_) => "RouteMatcher",
        }
    }

    fn pack_fields(&self) -> Result<Fields, PackError> {
        let mut fields = Fields::new();
        match self {
            AttributeMatcher::Equal(expected)
            | AttributeMatcher::NotEqual(expected)
            | AttributeMatcher::Contain(expected)
            | AttributeMatcher::NotContain(expected) => {
                fields.insert("expected".into(), Value::String(expected.clone()));
            }
            AttributeMatcher::Regex(regex) => {
                fields.insert("pattern".into(), Value::String(regex.pattern().to_string()));
                fields.insert("flags".into(), Value::String(regex.flags().to_string()));
            }
            AttributeMatcher::Exists => {}
            AttributeMatcher::Route(route) => {
                fields.insert("path".into(), Value::String(route.template().to_string()));
            }
        }
        Ok(fields)
    }
}

impl Pack for MultiDictMatcher {
    fn type_name(&self) -> &'static str {
        "MultiDictMatcher"
    }

    fn pack_fields(&self) -> Result<Fields, PackError> {
        let mut expected = Fields::new();
        for (key, sub) in self.expected() {
            expected.insert(key.clone(), sub.pack()?);
        }
        let mut fields = Fields::new();
        fields.insert("expected".into(), Value::Object(expected));
        Ok(fields)
    }
}

impl Pack for RequestMatcher {
    fn type_name(&self) -> &'static str {
        match self {
            RequestMatcher::Method(_) => "MethodMatcher",
            RequestMatcher::Path(_) => "PathMatcher",
            RequestMatcher::Header(_) => "HeaderMatcher",
            RequestMatcher::Param(_) => "ParamMatcher",
            RequestMatcher::All(_) => "AllMatcher",
            RequestMatcher::Any(_) => "AnyMatcher",
            RequestMatcher::Custom(_) => "CustomMatcher",
        }
    }

    fn pack_fields(&self) -> Result<Fields, PackError> {
        let mut fields = Fields::new();
        match self {
            RequestMatcher::Method(sub) | RequestMatcher::Path(sub) => {
                fields.insert("matcher".into(), sub.pack()?);
            }
            RequestMatcher::Header(sub) | RequestMatcher::Param(sub) => {
                fields.insert("matcher".into(), sub.pack()?);
            }
            RequestMatcher::All(items) | RequestMatcher::Any(items) => {
                fields.insert("matchers".into(), pack_list(items)?);
            }
            RequestMatcher::Custom(custom) => {
                return Err(PackError::Unsupported(format!(
                    "custom matcher `{}`",
                    custom.name()
                )));
            }
        }
        Ok(fields)
    }
}

// ===== Constructors =====

fn equal(fields: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let expected = str_field(fields, "EqualMatcher", "expected")?;
    Ok(Packed::Attribute(AttributeMatcher::equal(expected)))
}

fn not_equal(fields: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let expected = str_field(fields, "NotEqualMatcher", "expected")?;
    Ok(Packed::Attribute(AttributeMatcher::not_equal(expected)))
}

fn contain(fields: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let expected = str_field(fields, "ContainMatcher", "expected")?;
    Ok(Packed::Attribute(AttributeMatcher::contain(expected)))
}

fn not_contain(fields: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let expected = str_field(fields, "NotContainMatcher", "expected")?;
    Ok(Packed::Attribute(AttributeMatcher::not_contain(expected)))
}

fn regex(fields: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let pattern = str_field(fields, "RegexMatcher", "pattern")?;
    let flags = opt_str_field(fields, "RegexMatcher", "flags")?.unwrap_or("");
    Ok(Packed::Attribute(AttributeMatcher::regex_with_flags(
        pattern, flags,
    )?))
}

fn exists(_: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    Ok(Packed::Attribute(AttributeMatcher::Exists))
}

fn route(fields: &Fields, _: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let path = str_field(fields, "RouteMatcher", "path")?;
    Ok(Packed::Attribute(AttributeMatcher::route(path)?))
}

/// Plain strings are accepted as `Equal` shorthand.
fn attribute(table: &PackTable, value: &Value) -> Result<AttributeMatcher, PackError> {
    match value {
        Value::String(expected) => Ok(AttributeMatcher::equal(expected.clone())),
        other => table.unpack_as(other),
    }
}

fn multidict(fields: &Fields, table: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let expected = match field(fields, "MultiDictMatcher", "expected")? {
        Value::Object(expected) => expected,
        _ => return Err(invalid("MultiDictMatcher", "expected", "expected an object")),
    };
    let mut matcher = MultiDictMatcher::default();
    for (key, sub) in expected {
        matcher.insert(key.clone(), attribute(table, sub)?);
    }
    Ok(Packed::MultiDict(matcher))
}

/// A multi-dict field; a bare `{key: value}` object is accepted too.
fn multidict_field(
    fields: &Fields,
    table: &PackTable,
    type_name: &'static str,
) -> Result<MultiDictMatcher, PackError> {
    let value = field(fields, type_name, "matcher")?;
    match table.unpack_as::<MultiDictMatcher>(value) {
        Ok(matcher) => Ok(matcher),
        Err(PackError::NotPacked(_) | PackError::UnknownType(_)) => {
            let Value::Object(plain) = value else {
                return Err(invalid(type_name, "matcher", "expected a multi-dict matcher"));
            };
            let mut matcher = MultiDictMatcher::default();
            for (key, sub) in plain {
                matcher.insert(key.clone(), attribute(table, sub)?);
            }
            Ok(matcher)
        }
        Err(e) => Err(e),
    }
}

fn method(fields: &Fields, table: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let sub = attribute(table, field(fields, "MethodMatcher", "matcher")?)?;
    let sub = match sub {
        AttributeMatcher::Equal(name) => AttributeMatcher::Equal(name.to_ascii_uppercase()),
        other => other,
    };
    Ok(Packed::Request(RequestMatcher::Method(sub)))
}

fn path(fields: &Fields, table: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let sub = attribute(table, field(fields, "PathMatcher", "matcher")?)?;
    Ok(Packed::Request(RequestMatcher::Path(sub)))
}

fn header(fields: &Fields, table: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let sub = multidict_field(fields, table, "HeaderMatcher")?;
    Ok(Packed::Request(RequestMatcher::Header(sub)))
}

fn param(fields: &Fields, table: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let sub = multidict_field(fields, table, "ParamMatcher")?;
    Ok(Packed::Request(RequestMatcher::Param(sub)))
}

fn all(fields: &Fields, table: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let items = table.unpack_list(field(fields, "AllMatcher", "matchers")?)?;
    Ok(Packed::Request(RequestMatcher::all(items)?))
}

fn any(fields: &Fields, table: &PackTable, _: &UnpackContext) -> Result<Packed, PackError> {
    let items = table.unpack_list(field(fields, "AnyMatcher", "matchers")?)?;
    Ok(Packed::Request(RequestMatcher::any(items)?))
}

pub(super) fn register(table: &mut PackTable) {
    table.register("EqualMatcher", equal);
    table.register("NotEqualMatcher", not_equal);
    table.register("ContainMatcher", contain);
    table.register("NotContainMatcher", not_contain);
    table.register("RegexMatcher", regex);
    table.register("ExistMatcher", exists);
    table.register("RouteMatcher", route);
    table.register("MultiDictMatcher", multidict);
    table.register("MethodMatcher", method);
    table.register("PathMatcher", path);
    table.register("HeaderMatcher", header);
    table.register("ParamMatcher", param);
    table.register("AllMatcher", all);
    table.register("AnyMatcher", any);
}
