pub mod browser_manager;
pub mod driver;
pub mod selectors;
pub mod session;
