//! FinQuest backend daemon library.
//!
//! The daemon owns the persistence gateway (SQLite), the transactional
//! storage engine, and the HTTP surface. Pure business rules live in
//! `finquest_common`.

pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod store;
