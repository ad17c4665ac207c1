pub mod catalog;
pub mod chain;
pub mod config;
pub mod enablement;
pub mod state;
pub mod status;
