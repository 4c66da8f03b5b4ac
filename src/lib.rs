pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod tasks;
pub mod tenant;

#[cfg(test)]
pub mod testing;
