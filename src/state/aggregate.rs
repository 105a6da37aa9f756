use std::collections::BTreeMap;

use crate::error::{invalid_argument, unimplemented, StateResult};
use crate::model::FieldPath;
use crate::state::snapshot::DocumentSnapshot;
use crate::value::{FieldValue, ValueKind};

#[derive(Clone, Debug, PartialEq)]
pub enum AggregateOperation {
    Count,
    Sum(FieldPath),
    Avg(FieldPath),
}

/// One entry of a `StructuredAggregationQuery`, keyed by its result alias.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregation {
    alias: String,
    operation: AggregateOperation,
}

impl Aggregation {
    pub fn new(alias: impl Into<String>, operation: AggregateOperation) -> Self {
        Self {
            alias: alias.into(),
            operation,
        }
    }

    pub fn count(alias: impl Into<String>) -> Self {
        Self::new(alias, AggregateOperation::Count)
    }

    pub fn sum(alias: impl Into<String>, field: &str) -> StateResult<Self> {
        Ok(Self::new(alias, AggregateOperation::Sum(FieldPath::parse(field)?)))
    }

    pub fn avg(alias: impl Into<String>, field: &str) -> StateResult<Self> {
        Ok(Self::new(alias, AggregateOperation::Avg(FieldPath::parse(field)?)))
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn operation(&self) -> &AggregateOperation {
        &self.operation
    }
}

/// Computes every aggregation over `documents`, keyed by alias.
pub(crate) fn aggregate(
    documents: &[DocumentSnapshot],
    aggregations: &[Aggregation],
) -> StateResult<BTreeMap<String, FieldValue>> {
    let mut results = BTreeMap::new();
    for aggregation in aggregations {
        if aggregation.alias.trim().is_empty() {
            return Err(invalid_argument(
                "Aggregate aliases must contain at least one non-whitespace character",
            ));
        }
        let value = match &aggregation.operation {
            AggregateOperation::Count => FieldValue::from_integer(documents.len() as i64),
            AggregateOperation::Sum(field) => sum(&numeric_values(documents, field)?),
            AggregateOperation::Avg(field) => average(&numeric_values(documents, field)?),
        };
        if results.insert(aggregation.alias.clone(), value).is_some() {
            return Err(invalid_argument(format!(
                "Duplicate aggregate alias: {}",
                aggregation.alias
            )));
        }
    }
    Ok(results)
}

fn numeric_values<'a>(
    documents: &'a [DocumentSnapshot],
    field: &FieldPath,
) -> StateResult<Vec<&'a FieldValue>> {
    if field.len() > 1 {
        return Err(unimplemented(format!(
            "Nested field paths are not supported: {field}"
        )));
    }
    Ok(documents
        .iter()
        .filter_map(|document| document.get(field.first_segment()))
        .filter(|value| matches!(value.kind(), ValueKind::Integer(_) | ValueKind::Double(_)))
        .collect())
}

// Stays an integer until a double joins in.
fn sum(values: &[&FieldValue]) -> FieldValue {
    let mut integer_total: i64 = 0;
    let mut double_total: Option<f64> = None;
    for value in values {
        match value.kind() {
            ValueKind::Integer(integer) => match double_total.as_mut() {
                Some(total) => *total += *integer as f64,
                None => integer_total = integer_total.saturating_add(*integer),
            },
            ValueKind::Double(double) => {
                let total = double_total.get_or_insert(integer_total as f64);
                *total += double;
            }
            _ => {}
        }
    }
    match double_total {
        Some(total) => FieldValue::from_double(total),
        None => FieldValue::from_integer(integer_total),
    }
}

fn average(values: &[&FieldValue]) -> FieldValue {
    if values.is_empty() {
        return FieldValue::null();
    }
    let total: f64 = values
        .iter()
        .map(|value| match value.kind() {
            ValueKind::Integer(integer) => *integer as f64,
            ValueKind::Double(double) => *double,
            _ => 0.0,
        })
        .sum();
    FieldValue::from_double(total / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentKey, Timestamp};

    fn document(id: &str, value: Option<FieldValue>) -> DocumentSnapshot {
        let key = DocumentKey::parse(&format!("projects/p/databases/(default)/documents/scores/{id}")).unwrap();
        let mut fields = BTreeMap::new();
        if let Some(value) = value {
            fields.insert("points".to_string(), value);
        }
        DocumentSnapshot::new(key, fields, Some(Timestamp::new(1, 0)), Some(Timestamp::new(1, 0)))
    }

    #[test]
    fn count_sum_and_average() {
        let documents = vec![
            document("a", Some(FieldValue::from_integer(2))),
            document("b", Some(FieldValue::from_integer(4))),
            document("c", Some(FieldValue::from_string("n/a"))),
            document("d", None),
        ];
        let results = aggregate(
            &documents,
            &[
                Aggregation::count("total"),
                Aggregation::sum("points_sum", "points").unwrap(),
                Aggregation::avg("points_avg", "points").unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(results["total"], FieldValue::from_integer(4));
        assert_eq!(results["points_sum"], FieldValue::from_integer(6));
        assert_eq!(results["points_avg"], FieldValue::from_double(3.0));
    }

    #[test]
    fn sum_turns_double_when_any_double_is_added() {
        let documents = vec![
            document("a", Some(FieldValue::from_integer(1))),
            document("b", Some(FieldValue::from_double(0.5))),
            document("c", Some(FieldValue::from_integer(1))),
        ];
        let results = aggregate(&documents, &[Aggregation::sum("s", "points").unwrap()]).unwrap();
        assert_eq!(results["s"], FieldValue::from_double(2.5));
    }

    #[test]
    fn empty_inputs() {
        let results = aggregate(
            &[],
            &[
                Aggregation::count("c"),
                Aggregation::sum("s", "points").unwrap(),
                Aggregation::avg("a", "points").unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(results["c"], FieldValue::from_integer(0));
        assert_eq!(results["s"], FieldValue::from_integer(0));
        assert!(results["a"].is_null());
    }

    #[test]
    fn rejects_bad_aliases() {
        let err = aggregate(&[], &[Aggregation::count(" ")]).unwrap_err();
        assert_eq!(err.code_str(), "state/invalid-argument");
        let err = aggregate(&[], &[Aggregation::count("c"), Aggregation::count("c")]).unwrap_err();
        assert_eq!(err.code_str(), "state/invalid-argument");
    }
}
