pub mod auth;
pub mod cache;
pub mod config;
pub mod health;
pub mod school;
pub mod user;
