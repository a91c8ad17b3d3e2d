pub mod jwt;
pub mod model;

pub use model::{Caller, Role};
