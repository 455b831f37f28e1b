pub mod fallback;
pub mod lookup;
