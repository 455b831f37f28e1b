pub mod core;
pub mod features;
pub mod parsers;
pub mod scraping;
pub mod tools;

pub use core::types;
pub use core::types::*;
pub use core::{AppState, LookupError};

pub use features::{address, antibot, matcher, merge};
pub use tools::{fallback, lookup};
