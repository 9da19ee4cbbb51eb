//! Conversion between tag trees and generic JSON values.
//!
//! JSON has a single number type, so a value alone cannot say whether `5`
//! was a `TAG_Byte` or a `TAG_Long`. [`kind_schema`] records the kinds in a
//! parallel document:
//!
//! - scalars, strings and arrays: `"TAG_Int"`, `"TAG_Byte_Array"`, ...
//! - lists of scalars: `["TAG_Short"]`
//! - lists of compounds or lists: one schema per element, `[{...}, {...}]`
//! - compounds: an object with one schema per child
//!
//! [`from_value`] rebuilds the tree from the two documents.

use crate::{Compound, List, Tag, TagKind};
use serde_json::{Map, Number, Value};
use strata_common::{Result, StrataError};

pub fn to_value(tag: &Tag) -> Value {
    match tag {
        Tag::End => Value::Null,
        Tag::Byte(v) => Value::from(*v),
        Tag::Short(v) => Value::from(*v),
        Tag::Int(v) => Value::from(*v),
        Tag::Long(v) => Value::from(*v),
        Tag::Float(v) => float_value(*v as f64),
        Tag::Double(v) => float_value(*v),
        Tag::ByteArray(v) => Value::Array(v.iter().map(|&b| Value::from(b)).collect()),
        Tag::String(v) => Value::String(v.clone()),
        Tag::List(list) => Value::Array(list.iter().map(to_value).collect()),
        Tag::Compound(map) => Value::Object(
            map.iter()
                .map(|(name, child)| (name.clone(), to_value(child)))
                .collect(),
        ),
        Tag::IntArray(v) => Value::Array(v.iter().map(|&i| Value::from(i)).collect()),
    }
}

// NaN and infinities have no JSON spelling
fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

pub fn kind_schema(tag: &Tag) -> Value {
    match tag {
        Tag::List(list) => match list.kind() {
            TagKind::Compound | TagKind::List if !list.is_empty() => {
                Value::Array(list.iter().map(kind_schema).collect())
            }
            kind => Value::Array(vec![Value::String(kind.name().to_string())]),
        },
        Tag::Compound(map) => Value::Object(
            map.iter()
                .map(|(name, child)| (name.clone(), kind_schema(child)))
                .collect::<Map<String, Value>>(),
        ),
        other => Value::String(other.kind().name().to_string()),
    }
}

pub fn from_value(value: &Value, schema: &Value) -> Result<Tag> {
    match schema {
        Value::String(name) => {
            let kind = TagKind::from_name(name)
                .ok_or_else(|| StrataError::format(format!("Unknown tag kind {:?}", name)))?;
            scalar_from_value(value, kind)
        }
        Value::Array(element_schemas) => list_from_value(value, element_schemas),
        Value::Object(child_schemas) => {
            let values = value
                .as_object()
                .ok_or_else(|| mismatch("an object", value))?;
            let mut compound = Compound::new();
            for (name, child) in values {
                let child_schema = child_schemas
                    .get(name)
                    .ok_or_else(|| StrataError::format(format!("No kind recorded for {:?}", name)))?;
                compound.insert(name.clone(), from_value(child, child_schema)?);
            }
            Ok(Tag::Compound(compound))
        }
        other => Err(StrataError::format(format!("Invalid kind schema {}", other))),
    }
}

fn list_from_value(value: &Value, element_schemas: &[Value]) -> Result<Tag> {
    let values = value.as_array().ok_or_else(|| mismatch("an array", value))?;

    // ["TAG_x"]: every element shares the one kind
    if let [Value::String(name)] = element_schemas {
        let kind = TagKind::from_name(name)
            .ok_or_else(|| StrataError::format(format!("Unknown tag kind {:?}", name)))?;
        let items = values
            .iter()
            .map(|v| from_value(v, &element_schemas[0]))
            .collect::<Result<Vec<_>>>()?;
        return List::new(kind, items).map(Tag::List);
    }

    if element_schemas.len() != values.len() {
        return Err(StrataError::format(format!(
            "List has {} values but {} kind entries",
            values.len(),
            element_schemas.len()
        )));
    }
    let items = values
        .iter()
        .zip(element_schemas)
        .map(|(v, s)| from_value(v, s))
        .collect::<Result<Vec<_>>>()?;
    let kind = items.first().map(Tag::kind).unwrap_or(TagKind::End);
    List::new(kind, items).map(Tag::List)
}

fn scalar_from_value(value: &Value, kind: TagKind) -> Result<Tag> {
    match kind {
        TagKind::End => Err(StrataError::format("TAG_End does not hold a value")),
        TagKind::Byte => integer(value, kind).map(|v| Tag::Byte(v as i8)),
        TagKind::Short => integer(value, kind).map(|v| Tag::Short(v as i16)),
        TagKind::Int => integer(value, kind).map(|v| Tag::Int(v as i32)),
        TagKind::Long => integer(value, kind).map(Tag::Long),
        TagKind::Float => float(value).map(|v| Tag::Float(v as f32)),
        TagKind::Double => float(value).map(Tag::Double),
        TagKind::ByteArray => array(value)?
            .iter()
            .map(|v| integer(v, TagKind::Byte).map(|b| b as i8))
            .collect::<Result<Vec<_>>>()
            .map(Tag::ByteArray),
        TagKind::IntArray => array(value)?
            .iter()
            .map(|v| integer(v, TagKind::Int).map(|i| i as i32))
            .collect::<Result<Vec<_>>>()
            .map(Tag::IntArray),
        TagKind::String => value
            .as_str()
            .map(|s| Tag::String(s.to_string()))
            .ok_or_else(|| mismatch("a string", value)),
        // composite kinds only appear as bare names when they are empty
        TagKind::List => {
            if array(value)?.is_empty() {
                Ok(Tag::List(List::empty(TagKind::End)))
            } else {
                Err(StrataError::format("Non-empty list needs element kinds"))
            }
        }
        TagKind::Compound => {
            let values = value.as_object().ok_or_else(|| mismatch("an object", value))?;
            if values.is_empty() {
                Ok(Tag::Compound(Compound::new()))
            } else {
                Err(StrataError::format("Non-empty compound needs child kinds"))
            }
        }
    }
}

fn integer(value: &Value, kind: TagKind) -> Result<i64> {
    let v = match value.as_i64() {
        Some(v) => v,
        None => match value.as_f64() {
            Some(f) if f.fract() == 0.0 => f as i64,
            _ => return Err(mismatch("an integer", value)),
        },
    };
    let (min, max) = match kind {
        TagKind::Byte => (i8::MIN as i64, i8::MAX as i64),
        TagKind::Short => (i16::MIN as i64, i16::MAX as i64),
        TagKind::Int => (i32::MIN as i64, i32::MAX as i64),
        _ => (i64::MIN, i64::MAX),
    };
    if v < min || v > max {
        return Err(StrataError::format(format!(
            "{} does not fit in {}",
            v,
            kind.name()
        )));
    }
    Ok(v)
}

fn float(value: &Value) -> Result<f64> {
    match value {
        Value::Null => Ok(f64::NAN),
        _ => value.as_f64().ok_or_else(|| mismatch("a number", value)),
    }
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    value.as_array().ok_or_else(|| mismatch("an array", value))
}

fn mismatch(expected: &str, found: &Value) -> StrataError {
    StrataError::format(format!("Expected {}, found {}", expected, found))
}
