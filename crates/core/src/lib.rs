pub mod aggregate;
pub mod config;
pub mod cost;
pub mod error;
pub mod model;
pub mod quantity;
pub mod query;
pub mod time;

pub use error::{CostError, Result};
