//! Density sculpting and deferred remeshing.
//!
//! Edits mutate chunks in place on the caller's thread; every touched chunk
//! is then handed to the [`RemeshQueue`] as an immutable snapshot.

pub mod engine;
pub mod queue;
pub mod request;

pub use engine::{EditEngine, EditReport};
pub use queue::{RemeshQueue, RemeshStats};
pub use request::{BrushConfig, EditMode, EditRequest, Falloff};
