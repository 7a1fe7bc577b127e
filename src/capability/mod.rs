//! External capabilities consumed by the classifier.
//!
//! Face embedding and visual diffing are black boxes to the gateway. The
//! traits here are the contract; `backends` holds the implementations that
//! ship with the daemon.

mod backend;
pub mod backends;

pub use backend::{DiffCapability, Embedding, FaceCapability};
pub use backends::{PixelDiffBackend, StubFaceBackend};
