mod database_id;
mod document_key;
mod field_path;
mod geo_point;
mod resource_path;
mod timestamp;

pub use database_id::DatabaseId;
pub use document_key::{CollectionKey, DocumentKey};
pub use field_path::{escape_segment, FieldPath};
pub use geo_point::GeoPoint;
pub use resource_path::ResourcePath;
pub use timestamp::Timestamp;
