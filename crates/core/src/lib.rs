pub mod config;
pub mod error;
pub mod filter;
pub mod frame;
pub mod model;
pub mod schema;
pub mod severity;
pub mod time;

pub use error::{Result, TracelogError};
