//! Configuration shared by the library and the server.

pub mod target;

pub use target::{Target, TargetError};
