use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::error::{invalid_argument, StateResult};
use crate::model::{GeoPoint, Timestamp};
use crate::value::{BytesValue, FieldValue, ValueKind};

pub fn encode_fields(fields: &BTreeMap<String, FieldValue>) -> JsonValue {
    let mut encoded = JsonMap::new();
    for (key, value) in fields {
        encoded.insert(key.clone(), encode_value(value));
    }
    JsonValue::Object(encoded)
}

pub fn encode_value(value: &FieldValue) -> JsonValue {
    match value.kind() {
        ValueKind::Null => json!({ "nullValue": JsonValue::Null }),
        ValueKind::Boolean(boolean) => json!({ "booleanValue": boolean }),
        ValueKind::Integer(integer) => json!({ "integerValue": integer.to_string() }),
        ValueKind::Double(double) => json!({ "doubleValue": encode_double(*double) }),
        ValueKind::Timestamp(timestamp) => json!({ "timestampValue": timestamp.to_rfc3339() }),
        ValueKind::String(string) => json!({ "stringValue": string }),
        ValueKind::Bytes(bytes) => json!({ "bytesValue": bytes.to_base64() }),
        ValueKind::Reference(reference) => json!({ "referenceValue": reference }),
        ValueKind::GeoPoint(point) => json!({
            "geoPointValue": {
                "latitude": point.latitude(),
                "longitude": point.longitude(),
            }
        }),
        ValueKind::Array(array) => {
            let values = array.values().iter().map(encode_value).collect::<Vec<_>>();
            json!({ "arrayValue": { "values": values } })
        }
        ValueKind::Map(map) => json!({
            "mapValue": {
                "fields": encode_fields(map.fields())
            }
        }),
    }
}

// JSON numbers cannot carry non-finite doubles; protobuf JSON spells them out.
fn encode_double(value: f64) -> JsonValue {
    if value.is_nan() {
        json!("NaN")
    } else if value == f64::INFINITY {
        json!("Infinity")
    } else if value == f64::NEG_INFINITY {
        json!("-Infinity")
    } else {
        json!(value)
    }
}

/// Decodes a `fields` object (`{"name": {"stringValue": ...}}`).
pub fn decode_fields(value: &JsonValue) -> StateResult<BTreeMap<String, FieldValue>> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid_argument("Expected 'fields' to be an object"))?;
    let mut fields = BTreeMap::new();
    for (key, value) in object {
        fields.insert(key.clone(), decode_value(value)?);
    }
    Ok(fields)
}

fn decode_map_value(value: &JsonValue) -> StateResult<BTreeMap<String, FieldValue>> {
    let map = value
        .as_object()
        .ok_or_else(|| invalid_argument("Expected object for map value"))?;
    match map.get("fields") {
        Some(fields) => decode_fields(fields),
        None => Ok(BTreeMap::new()),
    }
}

pub fn decode_value(value: &JsonValue) -> StateResult<FieldValue> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid_argument("Expected value object"))?;
    if object.contains_key("nullValue") {
        return Ok(FieldValue::null());
    }
    if let Some(bool_value) = object.get("booleanValue") {
        let value = bool_value
            .as_bool()
            .ok_or_else(|| invalid_argument("booleanValue must be bool"))?;
        return Ok(FieldValue::from_bool(value));
    }
    if let Some(integer_value) = object.get("integerValue") {
        return match integer_value {
            JsonValue::String(value) => i64::from_str(value)
                .map(FieldValue::from_integer)
                .map_err(|err| invalid_argument(format!("Invalid integerValue: {err}"))),
            JsonValue::Number(number) => match number.as_i64() {
                Some(integer) => Ok(FieldValue::from_integer(integer)),
                None => FieldValue::integer_from_f64(number.as_f64().unwrap_or(f64::NAN)),
            },
            _ => Err(invalid_argument("integerValue must be a string or number")),
        };
    }
    if let Some(double_value) = object.get("doubleValue") {
        let parsed = match double_value {
            JsonValue::Number(number) => number
                .as_f64()
                .ok_or_else(|| invalid_argument("Invalid doubleValue"))?,
            JsonValue::String(value) => match value.as_str() {
                "NaN" => f64::NAN,
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                other => other
                    .parse::<f64>()
                    .map_err(|err| invalid_argument(format!("Invalid doubleValue: {err}")))?,
            },
            _ => return Err(invalid_argument("doubleValue must be a number or string")),
        };
        return Ok(FieldValue::from_double(parsed));
    }
    if let Some(timestamp_value) = object.get("timestampValue") {
        let timestamp = match timestamp_value {
            JsonValue::String(value) => Timestamp::parse_rfc3339(value)?,
            JsonValue::Object(parts) => Timestamp::new(
                parts.get("seconds").and_then(json_i64).unwrap_or(0),
                parts.get("nanos").and_then(json_i64).unwrap_or(0) as i32,
            ),
            _ => return Err(invalid_argument("timestampValue must be string")),
        };
        return Ok(FieldValue::from_timestamp(timestamp));
    }
    if let Some(string_value) = object.get("stringValue") {
        let str_value = string_value
            .as_str()
            .ok_or_else(|| invalid_argument("stringValue must be string"))?;
        return Ok(FieldValue::from_string(str_value));
    }
    if let Some(bytes_value) = object.get("bytesValue") {
        let str_value = bytes_value
            .as_str()
            .ok_or_else(|| invalid_argument("bytesValue must be base64 string"))?;
        return Ok(FieldValue::from_bytes(BytesValue::from_base64(str_value)?));
    }
    if let Some(reference_value) = object.get("referenceValue") {
        let str_value = reference_value
            .as_str()
            .ok_or_else(|| invalid_argument("referenceValue must be string"))?;
        return Ok(FieldValue::from_reference(str_value));
    }
    if let Some(geo_point) = object.get("geoPointValue") {
        let latitude = geo_point
            .get("latitude")
            .and_then(JsonValue::as_f64)
            .unwrap_or(0.0);
        let longitude = geo_point
            .get("longitude")
            .and_then(JsonValue::as_f64)
            .unwrap_or(0.0);
        return Ok(FieldValue::from_geo_point(GeoPoint::new(latitude, longitude)?));
    }
    if let Some(array_value) = object.get("arrayValue") {
        let decoded = match array_value.get("values").and_then(JsonValue::as_array) {
            Some(entries) => entries
                .iter()
                .map(decode_value)
                .collect::<StateResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        return Ok(FieldValue::from_array(decoded));
    }
    if let Some(map_value) = object.get("mapValue") {
        return Ok(FieldValue::from_map(decode_map_value(map_value)?));
    }

    Err(invalid_argument(format!(
        "unknown field type. field={value}"
    )))
}

fn json_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(number) => number.as_i64(),
        JsonValue::String(text) => text.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalar_values() {
        assert_eq!(
            encode_value(&FieldValue::from_integer(42)),
            json!({ "integerValue": "42" })
        );
        assert_eq!(
            encode_value(&FieldValue::from_timestamp(Timestamp::new(0, 6))),
            json!({ "timestampValue": "1970-01-01T00:00:00.000000006Z" })
        );
        assert_eq!(
            encode_value(&FieldValue::from_double(f64::NAN)),
            json!({ "doubleValue": "NaN" })
        );
        assert_eq!(encode_value(&FieldValue::null()), json!({ "nullValue": null }));
    }

    #[test]
    fn decodes_nested_document_fields() {
        let encoded = json!({
            "name": { "stringValue": "Ada" },
            "age": { "integerValue": "42" },
            "score": { "doubleValue": 1.5 },
            "avatar": { "bytesValue": "AQID" },
            "favorites": {
                "mapValue": {
                    "fields": {
                        "tags": { "arrayValue": { "values": [{ "booleanValue": true }] } }
                    }
                }
            }
        });
        let fields = decode_fields(&encoded).unwrap();
        assert_eq!(fields.get("name"), Some(&FieldValue::from_string("Ada")));
        assert_eq!(fields.get("age"), Some(&FieldValue::from_integer(42)));
        assert_eq!(fields.get("score"), Some(&FieldValue::from_double(1.5)));
        assert_eq!(
            fields.get("avatar"),
            Some(&FieldValue::from_bytes(BytesValue::new(vec![1, 2, 3])))
        );
        let favorites = fields.get("favorites").and_then(FieldValue::as_map).unwrap();
        assert_eq!(
            favorites.get("tags"),
            Some(&FieldValue::from_array(vec![FieldValue::from_bool(true)]))
        );
        assert_eq!(encode_fields(&fields), encoded);
    }

    #[test]
    fn rejects_unknown_and_fractional_values() {
        assert!(decode_value(&json!({ "mysteryValue": 1 })).is_err());
        let err = decode_value(&json!({ "integerValue": 1.5 })).unwrap_err();
        assert_eq!(err.code_str(), "state/invalid-argument");
    }
}
