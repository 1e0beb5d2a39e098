pub mod adapters;
pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod git;
pub mod github;
pub mod language_files;
pub mod lyra_config;
pub mod pull_request;
pub mod retry;
pub mod security;
pub mod server_config;
pub mod store;
