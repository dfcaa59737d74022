pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod logging;
pub mod pages;
pub mod roles;
pub mod session;
pub mod state;
pub mod users;
pub mod views;
