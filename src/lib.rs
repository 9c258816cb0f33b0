pub mod api;
pub mod calendar;
pub mod config;
pub mod dates;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod scope;
pub mod selection;
pub mod session;
pub mod store;

#[cfg(test)]
mod fake_transport;
