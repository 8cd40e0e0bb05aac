//! Request extractors.

pub mod request;
pub use request::*;
