pub mod env;
pub mod resource;
pub mod validator;

pub use env::*;
pub use resource::*;
pub use validator::*;
