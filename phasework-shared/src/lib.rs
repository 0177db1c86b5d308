//! Types shared by every phasework crate.

pub mod errors;

pub use errors::{PhaseworkError, PhaseworkResult};
