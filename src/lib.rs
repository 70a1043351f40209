pub mod app;
pub mod auth;
pub mod cli;
pub mod commission;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod types;
