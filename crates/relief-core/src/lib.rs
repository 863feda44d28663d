pub mod catalog;
pub mod config;
pub mod error;
pub mod geo;
pub mod mcp_api;
pub mod model;
pub mod normalize;
pub mod query;
pub mod schema;
pub mod text;
pub mod vocabulary;
