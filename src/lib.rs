#![doc = include_str!("RUSTDOC.md")]

pub mod error;
pub mod model;
pub mod platform;
pub mod settings;
pub mod state;
pub mod value;
pub mod wire;

pub use error::{StateError, StateErrorCode, StateResult};
pub use settings::StateSettings;
pub use state::StateStore;
