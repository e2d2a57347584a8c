// Library for tests to access modules

pub mod cache;
pub mod cadence;
pub mod clock;
pub mod collector;
pub mod config;
pub mod dedup_worker;
pub mod error;
pub mod health;
pub mod history;
pub mod models;
pub mod retention;
pub mod routes;
pub mod runtime;
pub mod version;
