//! Async services shared by the engine and its clients.

mod database;

pub use database::DatabaseService;
