pub mod address;
pub mod antibot;
pub mod matcher;
pub mod merge;
