pub mod auth;
pub mod calendar;
pub mod config;
pub mod rows;
pub mod timekeeper;
