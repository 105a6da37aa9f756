use crate::error::{invalid_argument, StateResult};
use crate::model::{FieldPath, Timestamp};
use crate::value::{ArrayValue, FieldValue, ValueKind};

/// A server-computed mutation of one field, applied after a write's fields.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldTransform {
    field_path: FieldPath,
    operation: TransformOperation,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransformOperation {
    /// `set_to_server_value: REQUEST_TIME`.
    RequestTime,
    Increment(FieldValue),
    ArrayUnion(Vec<FieldValue>),
    ArrayRemove(Vec<FieldValue>),
}

impl FieldTransform {
    pub fn new(field_path: FieldPath, operation: TransformOperation) -> Self {
        Self {
            field_path,
            operation,
        }
    }

    /// Parses `field_path` in server format.
    pub fn parse(field_path: &str, operation: TransformOperation) -> StateResult<Self> {
        Ok(Self::new(FieldPath::parse(field_path)?, operation))
    }

    pub fn field_path(&self) -> &FieldPath {
        &self.field_path
    }

    pub fn operation(&self) -> &TransformOperation {
        &self.operation
    }

    /// Computes the field's next value from its current one.
    pub fn apply(&self, current: Option<&FieldValue>, at: Timestamp) -> StateResult<FieldValue> {
        match &self.operation {
            TransformOperation::RequestTime => Ok(FieldValue::from_timestamp(at)),
            TransformOperation::Increment(operand) => self.increment(current, operand),
            TransformOperation::ArrayUnion(values) => Ok(match current.and_then(FieldValue::as_array) {
                Some(array) => FieldValue::from(ValueKind::Array(array.union(values))),
                None => FieldValue::from(ValueKind::Array(ArrayValue::default().union(values))),
            }),
            TransformOperation::ArrayRemove(values) => Ok(match current.and_then(FieldValue::as_array) {
                Some(array) => FieldValue::from(ValueKind::Array(array.remove_all(values))),
                None => FieldValue::from_array(Vec::new()),
            }),
        }
    }

    fn increment(&self, current: Option<&FieldValue>, operand: &FieldValue) -> StateResult<FieldValue> {
        let current = current.map(FieldValue::kind);
        match (operand.kind(), current) {
            (ValueKind::Integer(by), None) => Ok(FieldValue::from_integer(*by)),
            (ValueKind::Integer(by), Some(ValueKind::Integer(value))) => {
                Ok(FieldValue::from_integer(value.saturating_add(*by)))
            }
            (ValueKind::Integer(by), Some(ValueKind::Double(value))) => {
                Ok(FieldValue::from_double(value + *by as f64))
            }
            (ValueKind::Double(by), None) => Ok(FieldValue::from_double(*by)),
            (ValueKind::Double(by), Some(ValueKind::Integer(value))) => {
                Ok(FieldValue::from_double(*value as f64 + by))
            }
            (ValueKind::Double(by), Some(ValueKind::Double(value))) => {
                Ok(FieldValue::from_double(value + by))
            }
            (ValueKind::Integer(_) | ValueKind::Double(_), Some(_)) => Err(invalid_argument(format!(
                "Invalid transform on {}. increment transform can only be applied to an integer or a double field",
                self.field_path
            ))),
            _ => Err(invalid_argument(format!(
                "Invalid transform on {}. increment operand must be an integer or a double",
                self.field_path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(operation: TransformOperation) -> FieldTransform {
        FieldTransform::parse("count", operation).unwrap()
    }

    fn at() -> Timestamp {
        Timestamp::new(1_700_000_000, 0)
    }

    #[test]
    fn integer_increment() {
        let by_one = transform(TransformOperation::Increment(FieldValue::from_integer(1)));
        assert_eq!(by_one.apply(None, at()).unwrap(), FieldValue::from_integer(1));

        let by_three = transform(TransformOperation::Increment(FieldValue::from_integer(3)));
        assert_eq!(
            by_three.apply(Some(&FieldValue::from_integer(5)), at()).unwrap(),
            FieldValue::from_integer(8)
        );
        assert_eq!(
            by_one.apply(Some(&FieldValue::from_double(1.5)), at()).unwrap(),
            FieldValue::from_double(2.5)
        );
    }

    #[test]
    fn double_increment() {
        let by_half = transform(TransformOperation::Increment(FieldValue::from_double(0.5)));
        assert_eq!(by_half.apply(None, at()).unwrap(), FieldValue::from_double(0.5));
        assert_eq!(
            by_half.apply(Some(&FieldValue::from_integer(2)), at()).unwrap(),
            FieldValue::from_double(2.5)
        );
    }

    #[test]
    fn integer_increment_saturates() {
        let by_one = transform(TransformOperation::Increment(FieldValue::from_integer(1)));
        assert_eq!(
            by_one.apply(Some(&FieldValue::from_integer(i64::MAX)), at()).unwrap(),
            FieldValue::from_integer(i64::MAX)
        );
    }

    #[test]
    fn increment_rejects_other_types() {
        let by_one = transform(TransformOperation::Increment(FieldValue::from_integer(1)));
        let err = by_one
            .apply(Some(&FieldValue::from_string("1")), at())
            .unwrap_err();
        assert_eq!(err.code_str(), "state/invalid-argument");

        let by_text = transform(TransformOperation::Increment(FieldValue::from_string("1")));
        assert!(by_text.apply(None, at()).is_err());
    }

    #[test]
    fn array_union_appends_missing() {
        let mut nested = std::collections::BTreeMap::new();
        nested.insert("n".to_string(), FieldValue::from_integer(1));
        let element = FieldValue::from_map(nested);
        let union = transform(TransformOperation::ArrayUnion(vec![
            FieldValue::from_string("a"),
            element.clone(),
        ]));
        let current = FieldValue::from_array(vec![FieldValue::from_string("a")]);
        assert_eq!(
            union.apply(Some(&current), at()).unwrap(),
            FieldValue::from_array(vec![FieldValue::from_string("a"), element])
        );
    }

    #[test]
    fn array_transforms_on_non_arrays() {
        let union = transform(TransformOperation::ArrayUnion(vec![
            FieldValue::from_integer(1),
            FieldValue::from_integer(1),
        ]));
        assert_eq!(
            union.apply(Some(&FieldValue::from_string("x")), at()).unwrap(),
            FieldValue::from_array(vec![FieldValue::from_integer(1)])
        );

        let remove = transform(TransformOperation::ArrayRemove(vec![FieldValue::from_integer(1)]));
        assert_eq!(
            remove.apply(None, at()).unwrap(),
            FieldValue::from_array(Vec::new())
        );
    }

    #[test]
    fn request_time_uses_commit_time() {
        let request_time = transform(TransformOperation::RequestTime);
        assert_eq!(
            request_time.apply(Some(&FieldValue::null()), at()).unwrap(),
            FieldValue::from_timestamp(at())
        );
    }
}
