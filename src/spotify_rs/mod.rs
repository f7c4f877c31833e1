pub mod auth;
pub mod client;
pub mod pagination;
pub mod types;
