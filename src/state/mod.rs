//! The emulator engine: document hierarchy, writes, queries and listen streams.

pub mod aggregate;
pub mod collection;
pub mod database;
pub mod document;
pub mod events;
pub mod listen;
mod mask;
pub mod query;
mod query_evaluator;
pub mod snapshot;
mod store;
pub mod transform;
pub mod write;

pub use aggregate::{AggregateOperation, Aggregation};
pub use collection::CollectionNode;
pub use database::{DatabaseNode, ProjectNode, StateTree};
pub use document::{DocumentMetadata, DocumentNode};
pub use events::{ChangeLog, EventBus, EventSubscription, StateEvent};
pub use listen::{ListenEmitter, ListenRegistration, ListenRequest, ListenTarget};
pub use mask::update_fields;
pub use query::{
    CollectionSelector, CompositeFilter, CompositeOperator, Cursor, Direction, FieldFilter,
    FieldOperator, Filter, Order, StructuredQuery, UnaryFilter, UnaryOperator,
};
pub use snapshot::{CollectionSnapshot, DocumentSnapshot};
pub use store::{BatchGetResult, StateStore};
pub use transform::{FieldTransform, TransformOperation};
pub use write::{CommitResponse, Precondition, Write, WriteOperation, WriteResult};
