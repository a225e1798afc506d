pub mod analysis;
pub mod backend;
pub mod config;
pub mod errors;
pub mod models;
pub mod oauth;
pub mod services;
pub mod session;
