pub mod auth;
pub mod config;
pub mod database;
pub mod erp;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod orders;
