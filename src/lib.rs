// Apigee management API client - library root

pub mod auth;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod http_client;
pub mod management;
pub mod pagination;
