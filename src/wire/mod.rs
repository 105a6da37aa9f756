//! REST/JSON protobuf encoding used by the emulator's transport adapter.

mod serializer;
mod watch;

pub use serializer::{decode_fields, decode_value, encode_fields, encode_value};
pub use watch::{DocumentChange, ListenResponse, TargetChange, TargetChangeType};
