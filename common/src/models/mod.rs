// common/src/models/mod.rs
pub mod access_key;
pub mod guest;
pub mod token;

pub use access_key::*;
pub use guest::*;
pub use token::*;
