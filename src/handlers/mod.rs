//! HTTP handlers for registered resources and the discovery listing.

pub mod discovery;
pub mod resource;
pub use discovery::discovery;
pub use resource::handle;
