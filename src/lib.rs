pub mod api;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod forecast;
pub mod models;
pub mod series;
pub mod state;
