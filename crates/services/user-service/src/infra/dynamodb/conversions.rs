//! Conversion between JSON documents and DynamoDB attribute maps.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Number, Value};

use common::{AppError, AppResult};

use crate::infra::store::Document;

/// DynamoDB item or key.
pub type Item = HashMap<String, AttributeValue>;

pub fn to_item(document: Document) -> Item {
    document
        .into_iter()
        .map(|(name, value)| (name, to_attribute_value(value)))
        .collect()
}

pub fn to_attribute_value(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(values) => {
            AttributeValue::L(values.into_iter().map(to_attribute_value).collect())
        }
        Value::Object(map) => AttributeValue::M(to_item(map)),
    }
}

pub fn from_item(item: Item) -> AppResult<Document> {
    item.into_iter()
        .map(|(name, value)| Ok((name, from_attribute_value(value)?)))
        .collect()
}

pub fn from_attribute_value(value: AttributeValue) -> AppResult<Value> {
    let value = match value {
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::N(n) => Value::Number(parse_number(&n)?),
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::Array(
            values
                .into_iter()
                .map(from_attribute_value)
                .collect::<AppResult<_>>()?,
        ),
        AttributeValue::M(map) => Value::Object(from_item(map)?),
        AttributeValue::Ss(values) => Value::Array(values.into_iter().map(Value::String).collect()),
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<AppResult<_>>()?,
        ),
        other => {
            return Err(AppError::store(format!(
                "Unsupported attribute value: {:?}",
                other
            )))
        }
    };
    Ok(value)
}

/// Parse an `N` value. Integers must fit `i64` or `u64`; larger ones would
/// only survive as a rounded `f64` and are refused.
fn parse_number(raw: &str) -> AppResult<Number> {
    let number: Number = serde_json::from_str(raw)?;
    if number.is_f64() && !raw.contains(['.', 'e', 'E']) {
        return Err(AppError::store(format!(
            "Number {} cannot be represented exactly",
            raw
        )));
    }
    Ok(number)
}
