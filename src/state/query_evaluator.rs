use std::cmp::Ordering;

use crate::error::{invalid_argument, unimplemented, StateResult};
use crate::state::collection::CollectionNode;
use crate::state::document::DocumentNode;
use crate::state::query::{
    CompositeFilter, CompositeOperator, Cursor, Direction, FieldFilter, FieldOperator, Filter,
    Order, StructuredQuery, UnaryFilter, UnaryOperator,
};
use crate::state::snapshot::DocumentSnapshot;
use crate::value::{FieldValue, ValueKind};

/// Rejects query shapes the engine does not evaluate, before touching any document.
pub(crate) fn validate_query(query: &StructuredQuery) -> StateResult<()> {
    let collection_id = query.collection_id()?;
    if collection_id.is_empty() {
        return Err(invalid_argument("collection_id is required"));
    }
    if query.from.iter().any(|selector| selector.all_descendants) {
        return Err(unimplemented("Collection group queries are not supported"));
    }
    if let Some(limit) = query.limit {
        if limit < 0 {
            return Err(invalid_argument(format!("limit must be non-negative, got {limit}")));
        }
    }
    if query.offset < 0 {
        return Err(invalid_argument(format!(
            "offset must be non-negative, got {}",
            query.offset
        )));
    }
    for cursor in [&query.start_at, &query.end_at].into_iter().flatten() {
        if cursor.values.len() > query.order_by.len() {
            return Err(invalid_argument(
                "Too many cursor values specified. The specified values must match the orderBy constraints of the query.",
            ));
        }
    }
    if let Some(filter) = &query.filter {
        validate_filter(filter, true)?;
    }
    Ok(())
}

fn validate_filter(filter: &Filter, top_level: bool) -> StateResult<()> {
    match filter {
        Filter::Field(field) if field.op == FieldOperator::Unspecified => Err(invalid_argument(
            format!("Invalid query: op is not supported yet, field={}", field.field),
        )),
        Filter::Unary(unary) if unary.op == UnaryOperator::Unspecified => Err(invalid_argument(
            format!("Invalid query: op is not supported yet, field={}", unary.field),
        )),
        Filter::Field(_) | Filter::Unary(_) => Ok(()),
        Filter::Composite(_) if !top_level => {
            log::warn!("rejecting composite filter nested in a composite filter");
            Err(unimplemented("composite_filter only supports field_filter"))
        }
        Filter::Composite(composite) => {
            if composite.op == CompositeOperator::Unspecified {
                return Err(invalid_argument("Invalid query: op is required"));
            }
            composite
                .filters
                .iter()
                .try_for_each(|child| validate_filter(child, false))
        }
    }
}

/// Evaluates `query` against the existing documents of `collection`.
///
/// Documents are ordered (stable, missing fields first), then filtered, then
/// bounded by cursors, offset and limit, in that order.
pub(crate) fn apply_query(
    collection: Option<&CollectionNode>,
    query: &StructuredQuery,
) -> StateResult<Vec<DocumentSnapshot>> {
    validate_query(query)?;
    let Some(collection) = collection else {
        return Ok(Vec::new());
    };

    let mut candidates = Vec::new();
    for document in collection.existing_documents() {
        let order_values = order_values(document, &query.order_by)?;
        candidates.push((document, order_values));
    }

    candidates.sort_by(|(_, left), (_, right)| compare_order_values(left, right, &query.order_by));

    let mut matched = Vec::with_capacity(candidates.len());
    for (document, values) in candidates {
        let keep = match &query.filter {
            Some(filter) => document_matches(document, filter)?,
            None => true,
        };
        if keep {
            matched.push((document, values));
        }
    }

    if let Some(cursor) = &query.start_at {
        matched.retain(|(_, values)| {
            let ordering = compare_to_cursor(values, cursor, &query.order_by);
            if cursor.before {
                ordering != Ordering::Less
            } else {
                ordering == Ordering::Greater
            }
        });
    }
    if let Some(cursor) = &query.end_at {
        matched.retain(|(_, values)| {
            let ordering = compare_to_cursor(values, cursor, &query.order_by);
            if cursor.before {
                ordering == Ordering::Less
            } else {
                ordering != Ordering::Greater
            }
        });
    }

    let limit = query.limit.map(|limit| limit as usize).unwrap_or(usize::MAX);
    Ok(matched
        .into_iter()
        .skip(query.offset as usize)
        .take(limit)
        .map(|(document, _)| document.snapshot())
        .collect())
}

fn order_values(document: &DocumentNode, order_by: &[Order]) -> StateResult<Vec<Option<FieldValue>>> {
    order_by
        .iter()
        .map(|order| document.get_field_path(&order.field))
        .collect()
}

fn compare_order_values(
    left: &[Option<FieldValue>],
    right: &[Option<FieldValue>],
    order_by: &[Order],
) -> Ordering {
    for ((left, right), order) in left.iter().zip(right).zip(order_by) {
        let ordering = match (left, right) {
            // Missing sorts low regardless of direction.
            (None, None) => continue,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(left), Some(right)) => apply_direction(sort_order(left, right), order.direction),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_to_cursor(values: &[Option<FieldValue>], cursor: &Cursor, order_by: &[Order]) -> Ordering {
    for ((value, bound), order) in values.iter().zip(&cursor.values).zip(order_by) {
        let ordering = match value {
            None => Ordering::Less,
            Some(value) => apply_direction(sort_order(value, bound), order.direction),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn apply_direction(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Descending => ordering.reverse(),
        Direction::Ascending | Direction::Unspecified => ordering,
    }
}

/// Total order used for sorting only: values of one kind use the value
/// comparison, NaN sorts before other doubles, and distinct kinds group by kind.
fn sort_order(left: &FieldValue, right: &FieldValue) -> Ordering {
    let by_kind = kind_rank(left).cmp(&kind_rank(right));
    if by_kind != Ordering::Equal {
        return by_kind;
    }
    match (left.is_nan(), right.is_nan()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }
    left.compare(right).unwrap_or(Ordering::Equal)
}

fn kind_rank(value: &FieldValue) -> u8 {
    match value.kind() {
        ValueKind::Null => 0,
        ValueKind::Boolean(_) => 1,
        ValueKind::Integer(_) => 2,
        ValueKind::Double(_) => 3,
        ValueKind::Timestamp(_) => 4,
        ValueKind::String(_) => 5,
        ValueKind::Bytes(_) => 6,
        ValueKind::Reference(_) => 7,
        ValueKind::GeoPoint(_) => 8,
        ValueKind::Array(_) => 9,
        ValueKind::Map(_) => 10,
    }
}

fn document_matches(document: &DocumentNode, filter: &Filter) -> StateResult<bool> {
    match filter {
        Filter::Field(field) => field_filter_matches(document, field),
        Filter::Unary(unary) => unary_filter_matches(document, unary),
        Filter::Composite(composite) => composite_matches(document, composite),
    }
}

fn composite_matches(document: &DocumentNode, composite: &CompositeFilter) -> StateResult<bool> {
    match composite.op {
        CompositeOperator::And => {
            for child in &composite.filters {
                if !document_matches(document, child)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        CompositeOperator::Or => {
            for child in &composite.filters {
                if document_matches(document, child)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        CompositeOperator::Unspecified => Err(invalid_argument("Invalid query: op is required")),
    }
}

fn field_filter_matches(document: &DocumentNode, filter: &FieldFilter) -> StateResult<bool> {
    let Some(value) = document.get_field_path(&filter.field)? else {
        return Ok(false);
    };
    evaluate_field_filter(&value, filter)
}

fn evaluate_field_filter(value: &FieldValue, filter: &FieldFilter) -> StateResult<bool> {
    let operand = &filter.value;
    Ok(match filter.op {
        FieldOperator::Equal => value.equals(operand),
        FieldOperator::NotEqual => !value.equals(operand),
        FieldOperator::LessThan => value.less_than(operand),
        FieldOperator::LessThanOrEqual => value.less_or_equal(operand),
        FieldOperator::GreaterThan => value.greater_than(operand),
        FieldOperator::GreaterThanOrEqual => value.greater_or_equal(operand),
        FieldOperator::ArrayContains => value
            .as_array()
            .map(|array| array.contains(operand))
            .unwrap_or(false),
        FieldOperator::ArrayContainsAny => match (value.as_array(), operand.as_array()) {
            (Some(array), Some(needles)) => {
                needles.values().iter().any(|needle| array.contains(needle))
            }
            _ => false,
        },
        FieldOperator::In => operand
            .as_array()
            .map(|candidates| candidates.contains(value))
            .unwrap_or(false),
        FieldOperator::NotIn => operand
            .as_array()
            .map(|candidates| !candidates.contains(value))
            .unwrap_or(false),
        FieldOperator::Unspecified => {
            return Err(invalid_argument(format!(
                "Invalid query: op is not supported yet, field={}",
                filter.field
            )))
        }
    })
}

fn unary_filter_matches(document: &DocumentNode, filter: &UnaryFilter) -> StateResult<bool> {
    let Some(value) = document.get_field_path(&filter.field)? else {
        return Ok(false);
    };
    match filter.op {
        UnaryOperator::IsNull => Ok(value.is_null()),
        UnaryOperator::IsNan => Ok(value.is_nan()),
        UnaryOperator::IsNotNull => Ok(!value.is_null()),
        UnaryOperator::IsNotNan => Ok(!value.is_nan()),
        UnaryOperator::Unspecified => Err(invalid_argument(format!(
            "Invalid query: op is not supported yet, field={}",
            filter.field
        ))),
    }
}
