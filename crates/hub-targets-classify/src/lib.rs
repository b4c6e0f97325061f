//! Target classification for the reflective hub strips.
//!
//! Design idea:
//! - Two physical profiles describe the same strip seen at two tilts: the
//!   low-angle strip (about -15 degrees) looks tall, the high-angle strip
//!   (about -75 degrees) looks wide.
//! - A shape matches a profile when the viewing angle falls in the profile's
//!   angle window and its box aspect ratio falls in the ratio window.
//! - Per-frame match results drive `Searching -> Acquiring -> Locked` through
//!   a pure transition function.

mod classifier;
mod error;
mod params;
mod profile;
mod state;

pub use classifier::{Classification, TargetClassifier};
pub use error::ProfileError;
pub use params::{ClassifierParams, LockPolicy, TargetDimensions};
pub use profile::{ProfileKind, TargetProfile};
pub use state::{next_state, TargetLock, TargetingState};
