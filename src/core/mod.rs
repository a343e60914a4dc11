pub mod auth;
pub mod config;
pub mod cost;
pub mod error;
pub mod formatter;
pub mod message;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod process;
pub mod providers;
pub mod secrets;
