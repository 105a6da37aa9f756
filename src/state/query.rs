use crate::error::{invalid_argument, StateResult};
use crate::model::FieldPath;
use crate::value::FieldValue;

/// A `google.firestore.v1.StructuredQuery` restricted to what the engine evaluates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,
    pub filter: Option<Filter>,
    pub order_by: Vec<Order>,
    pub start_at: Option<Cursor>,
    pub end_at: Option<Cursor>,
    pub offset: i32,
    pub limit: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionSelector {
    pub collection_id: String,
    pub all_descendants: bool,
}

impl CollectionSelector {
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            all_descendants: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Field(FieldFilter),
    Unary(UnaryFilter),
    Composite(CompositeFilter),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    pub field: FieldPath,
    pub op: FieldOperator,
    pub value: FieldValue,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnaryFilter {
    pub field: FieldPath,
    pub op: UnaryOperator,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompositeFilter {
    pub op: CompositeOperator,
    pub filters: Vec<Filter>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldOperator {
    Unspecified,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
    ArrayContains,
    In,
    ArrayContainsAny,
    NotIn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Unspecified,
    IsNan,
    IsNull,
    IsNotNan,
    IsNotNull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeOperator {
    Unspecified,
    And,
    Or,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Unspecified,
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub field: FieldPath,
    pub direction: Direction,
}

/// A position in the ordered result, expressed as values of the ordering fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Cursor {
    pub values: Vec<FieldValue>,
    /// Whether the position sits just before the values (`start_at`/`end_before`).
    pub before: bool,
}

impl Cursor {
    pub fn new(values: Vec<FieldValue>, before: bool) -> Self {
        Self { values, before }
    }
}

impl Filter {
    pub fn field(path: &str, op: FieldOperator, value: FieldValue) -> StateResult<Self> {
        Ok(Filter::Field(FieldFilter {
            field: FieldPath::parse(path)?,
            op,
            value,
        }))
    }

    pub fn unary(path: &str, op: UnaryOperator) -> StateResult<Self> {
        Ok(Filter::Unary(UnaryFilter {
            field: FieldPath::parse(path)?,
            op,
        }))
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::Composite(CompositeFilter {
            op: CompositeOperator::And,
            filters,
        })
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Composite(CompositeFilter {
            op: CompositeOperator::Or,
            filters,
        })
    }
}

impl StructuredQuery {
    /// `SELECT * FROM {collection_id}` against the query's parent.
    pub fn collection(collection_id: impl Into<String>) -> Self {
        Self {
            from: vec![CollectionSelector::new(collection_id)],
            ..Self::default()
        }
    }

    /// Adds `filter`, AND-ing it with any filter already present.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            None => filter,
            Some(Filter::Composite(mut composite)) if composite.op == CompositeOperator::And => {
                composite.filters.push(filter);
                Filter::Composite(composite)
            }
            Some(existing) => Filter::and(vec![existing, filter]),
        });
        self
    }

    pub fn where_field(self, path: &str, op: FieldOperator, value: FieldValue) -> StateResult<Self> {
        Ok(self.with_filter(Filter::field(path, op, value)?))
    }

    pub fn order_by(mut self, path: &str, direction: Direction) -> StateResult<Self> {
        self.order_by.push(Order {
            field: FieldPath::parse(path)?,
            direction,
        });
        Ok(self)
    }

    pub fn with_start_at(mut self, cursor: Cursor) -> Self {
        self.start_at = Some(cursor);
        self
    }

    pub fn with_end_at(mut self, cursor: Cursor) -> Self {
        self.end_at = Some(cursor);
        self
    }

    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The single collection this query reads from.
    pub fn collection_id(&self) -> StateResult<&str> {
        match self.from.as_slice() {
            [selector] => Ok(selector.collection_id.as_str()),
            _ => Err(invalid_argument(format!(
                "query.from must contain exactly one collection selector, got {}",
                self.from.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_filters_collapse_into_one_and() {
        let query = StructuredQuery::collection("users")
            .where_field("age", FieldOperator::Equal, FieldValue::from_integer(21))
            .unwrap()
            .where_field("age", FieldOperator::GreaterThanOrEqual, FieldValue::from_integer(20))
            .unwrap()
            .with_filter(Filter::unary("name", UnaryOperator::IsNotNull).unwrap());

        match query.filter {
            Some(Filter::Composite(composite)) => {
                assert_eq!(composite.op, CompositeOperator::And);
                assert_eq!(composite.filters.len(), 3);
            }
            other => panic!("unexpected filter: {other:?}"),
        }
    }

    #[test]
    fn requires_single_selector() {
        let mut query = StructuredQuery::collection("users");
        assert_eq!(query.collection_id().unwrap(), "users");
        query.from.push(CollectionSelector::new("posts"));
        assert_eq!(
            query.collection_id().unwrap_err().code_str(),
            "state/invalid-argument"
        );
    }
}
