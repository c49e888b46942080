pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod types;
pub mod upload;

#[cfg(test)]
pub mod testing;
