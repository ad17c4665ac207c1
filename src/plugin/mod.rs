pub mod endpoint;
pub mod installer;
pub mod manager;
pub mod manifest;
pub mod resolver;
pub mod runtime;

pub use manager::PluginManager;
