use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{json, Value as JsonValue};

use crate::error::{invalid_argument, StateResult};
use crate::model::{GeoPoint, Timestamp};
use crate::value::{ArrayValue, BytesValue, MapValue};

/// A typed document field.
///
/// Equality and ordering only hold between values of the same kind: an
/// `Integer(5)` is neither equal to nor ordered against a `Double(5.0)`.
#[derive(Clone, Debug)]
pub struct FieldValue {
    kind: ValueKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(Timestamp),
    String(String),
    Bytes(BytesValue),
    Reference(String),
    GeoPoint(GeoPoint),
    Array(ArrayValue),
    Map(MapValue),
}

impl FieldValue {
    pub fn null() -> Self {
        Self {
            kind: ValueKind::Null,
        }
    }

    pub fn from_bool(value: bool) -> Self {
        Self {
            kind: ValueKind::Boolean(value),
        }
    }

    pub fn from_integer(value: i64) -> Self {
        Self {
            kind: ValueKind::Integer(value),
        }
    }

    /// Builds an integer from a float, rejecting anything that is not a whole number in range.
    pub fn integer_from_f64(value: f64) -> StateResult<Self> {
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(invalid_argument(format!(
                "value must be integer. value={value}"
            )));
        }
        if value < i64::MIN as f64 || value >= i64::MAX as f64 {
            return Err(invalid_argument(format!(
                "integer value out of range. value={value}"
            )));
        }
        Ok(Self::from_integer(value as i64))
    }

    pub fn from_double(value: f64) -> Self {
        Self {
            kind: ValueKind::Double(value),
        }
    }

    pub fn from_timestamp(value: Timestamp) -> Self {
        Self {
            kind: ValueKind::Timestamp(value),
        }
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::String(value.into()),
        }
    }

    pub fn from_bytes(value: BytesValue) -> Self {
        Self {
            kind: ValueKind::Bytes(value),
        }
    }

    pub fn from_reference(path: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::Reference(path.into()),
        }
    }

    pub fn from_geo_point(value: GeoPoint) -> Self {
        Self {
            kind: ValueKind::GeoPoint(value),
        }
    }

    pub fn from_array(values: Vec<FieldValue>) -> Self {
        Self {
            kind: ValueKind::Array(ArrayValue::new(values)),
        }
    }

    pub fn from_map(map: BTreeMap<String, FieldValue>) -> Self {
        Self {
            kind: ValueKind::Map(MapValue::new(map)),
        }
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::Null)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.kind, ValueKind::Double(value) if value.is_nan())
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match &self.kind {
            ValueKind::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match &self.kind {
            ValueKind::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The proto oneof name for this kind, e.g. `string_value`.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ValueKind::Null => "null_value",
            ValueKind::Boolean(_) => "boolean_value",
            ValueKind::Integer(_) => "integer_value",
            ValueKind::Double(_) => "double_value",
            ValueKind::Timestamp(_) => "timestamp_value",
            ValueKind::String(_) => "string_value",
            ValueKind::Bytes(_) => "bytes_value",
            ValueKind::Reference(_) => "reference_value",
            ValueKind::GeoPoint(_) => "geo_point_value",
            ValueKind::Array(_) => "array_value",
            ValueKind::Map(_) => "map_value",
        }
    }

    /// Ordering between two values of the same orderable kind.
    ///
    /// `None` for mismatched kinds, for `Null`, `Array` and `Map`, and for NaN doubles.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (&self.kind, &other.kind) {
            (ValueKind::Boolean(left), ValueKind::Boolean(right)) => Some(left.cmp(right)),
            (ValueKind::Integer(left), ValueKind::Integer(right)) => Some(left.cmp(right)),
            (ValueKind::Double(left), ValueKind::Double(right)) => left.partial_cmp(right),
            (ValueKind::Timestamp(left), ValueKind::Timestamp(right)) => Some(left.cmp(right)),
            (ValueKind::String(left), ValueKind::String(right)) => Some(left.cmp(right)),
            (ValueKind::Bytes(left), ValueKind::Bytes(right)) => Some(left.cmp(right)),
            (ValueKind::Reference(left), ValueKind::Reference(right)) => Some(left.cmp(right)),
            (ValueKind::GeoPoint(left), ValueKind::GeoPoint(right)) => left.compare(right),
            _ => None,
        }
    }

    pub fn equals(&self, other: &FieldValue) -> bool {
        match (&self.kind, &other.kind) {
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Array(left), ValueKind::Array(right)) => {
                left.len() == right.len()
                    && left
                        .values()
                        .iter()
                        .zip(right.values())
                        .all(|(l, r)| l.equals(r))
            }
            (ValueKind::Map(left), ValueKind::Map(right)) => {
                left.fields().len() == right.fields().len()
                    && left.fields().iter().all(|(key, value)| {
                        right
                            .get(key)
                            .map(|other| value.equals(other))
                            .unwrap_or(false)
                    })
            }
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    pub fn less_than(&self, other: &FieldValue) -> bool {
        self.compare(other) == Some(Ordering::Less)
    }

    pub fn less_or_equal(&self, other: &FieldValue) -> bool {
        matches!(
            self.compare(other),
            Some(Ordering::Less) | Some(Ordering::Equal)
        )
    }

    pub fn greater_than(&self, other: &FieldValue) -> bool {
        self.compare(other) == Some(Ordering::Greater)
    }

    pub fn greater_or_equal(&self, other: &FieldValue) -> bool {
        matches!(
            self.compare(other),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        )
    }

    /// Protobuf JSON representation (`{"stringValue": "..."}`).
    pub fn to_wire_value(&self) -> JsonValue {
        crate::wire::encode_value(self)
    }

    /// `{"type": "string_value", "value": ...}` shape used by state dumps.
    pub fn to_debug_json(&self) -> JsonValue {
        let value = match &self.kind {
            ValueKind::Null => JsonValue::Null,
            ValueKind::Boolean(value) => json!(value),
            ValueKind::Integer(value) => json!(value),
            ValueKind::Double(value) => json!(value),
            ValueKind::Timestamp(value) => json!({
                "seconds": value.seconds,
                "nanos": value.nanos,
            }),
            ValueKind::String(value) => json!(value),
            ValueKind::Bytes(value) => json!(value.to_base64()),
            ValueKind::Reference(value) => json!(value),
            ValueKind::GeoPoint(value) => json!({
                "latitude": value.latitude(),
                "longitude": value.longitude(),
            }),
            ValueKind::Array(array) => JsonValue::Array(
                array.values().iter().map(FieldValue::to_debug_json).collect(),
            ),
            ValueKind::Map(map) => JsonValue::Object(
                map.fields()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_debug_json()))
                    .collect(),
            ),
        };
        json!({ "type": self.type_name(), "value": value })
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<ValueKind> for FieldValue {
    fn from(kind: ValueKind) -> Self {
        Self { kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, FieldValue)]) -> FieldValue {
        FieldValue::from_map(
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        )
    }

    #[test]
    fn equality_is_type_guarded() {
        assert!(!FieldValue::from_integer(5).equals(&FieldValue::from_double(5.0)));
        assert!(!FieldValue::from_integer(5).less_or_equal(&FieldValue::from_double(6.0)));
        assert!(!FieldValue::from_string("5").greater_than(&FieldValue::from_integer(1)));
        assert!(FieldValue::null().equals(&FieldValue::null()));
        assert!(!FieldValue::null().less_or_equal(&FieldValue::null()));
    }

    #[test]
    fn equality_is_reflexive_and_symmetric() {
        let values = [
            FieldValue::from_string("a"),
            FieldValue::from_integer(1),
            FieldValue::from_double(1.5),
            FieldValue::from_bool(true),
            FieldValue::from_reference("projects/p/databases/d/documents/c/x"),
            FieldValue::from_timestamp(Timestamp::new(1, 2)),
            FieldValue::from_array(vec![FieldValue::from_integer(1)]),
            map(&[("n", FieldValue::from_integer(1))]),
        ];
        for left in &values {
            assert!(left.equals(left), "{left:?}");
            for right in &values {
                assert_eq!(left.equals(right), right.equals(left));
            }
        }
    }

    #[test]
    fn orders_within_kind() {
        assert!(FieldValue::from_integer(1).less_than(&FieldValue::from_integer(2)));
        assert!(FieldValue::from_string("b").greater_or_equal(&FieldValue::from_string("a")));
        assert!(FieldValue::from_timestamp(Timestamp::new(1, 5))
            .less_than(&FieldValue::from_timestamp(Timestamp::new(1, 6))));
        assert!(FieldValue::from_bytes(BytesValue::new(vec![1, 2]))
            .less_than(&FieldValue::from_bytes(BytesValue::new(vec![1, 3]))));
        assert!(FieldValue::from_bool(false).less_than(&FieldValue::from_bool(true)));
        assert!(FieldValue::from_reference("projects/p/databases/d/documents/c/a")
            .less_than(&FieldValue::from_reference("projects/p/databases/d/documents/c/b")));
    }

    #[test]
    fn nan_is_unordered_and_unequal() {
        let nan = FieldValue::from_double(f64::NAN);
        assert!(nan.is_nan());
        assert!(!nan.equals(&nan));
        assert!(!nan.less_than(&FieldValue::from_double(1.0)));
    }

    #[test]
    fn composites_compare_structurally_but_never_order() {
        let array = FieldValue::from_array(vec![FieldValue::from_string("a"), FieldValue::from_integer(1)]);
        let same = FieldValue::from_array(vec![FieldValue::from_string("a"), FieldValue::from_integer(1)]);
        let reversed = FieldValue::from_array(vec![FieldValue::from_integer(1), FieldValue::from_string("a")]);
        assert!(array.equals(&same));
        assert!(!array.equals(&reversed));
        assert!(!array.less_or_equal(&same));

        let left = map(&[("a", FieldValue::from_integer(1)), ("b", FieldValue::null())]);
        let right = map(&[("b", FieldValue::null()), ("a", FieldValue::from_integer(1))]);
        assert!(left.equals(&right));
        assert!(!left.greater_or_equal(&right));
        assert!(!left.equals(&map(&[("a", FieldValue::from_integer(1))])));
    }

    #[test]
    fn integer_construction_rejects_fractions() {
        assert_eq!(
            FieldValue::integer_from_f64(3.0).unwrap(),
            FieldValue::from_integer(3)
        );
        let err = FieldValue::integer_from_f64(3.5).unwrap_err();
        assert_eq!(err.code_str(), "state/invalid-argument");
        assert!(FieldValue::integer_from_f64(f64::INFINITY).is_err());
    }

    #[test]
    fn debug_json_shape() {
        let value = map(&[
            ("name", FieldValue::from_string("Ada")),
            ("tags", FieldValue::from_array(vec![FieldValue::null()])),
        ]);
        assert_eq!(
            value.to_debug_json(),
            json!({
                "type": "map_value",
                "value": {
                    "name": { "type": "string_value", "value": "Ada" },
                    "tags": {
                        "type": "array_value",
                        "value": [{ "type": "null_value", "value": null }]
                    }
                }
            })
        );
    }
}
