pub mod config;
pub mod directory;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod identity;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod sink;
pub mod store;
