//! todo-migrate library
//!
//! Converts a provider export into a provider-neutral import forest and loads
//! it into the service database in one transaction.

pub mod cli;
pub mod colors;
pub mod config;
pub mod convert;
pub mod db;
pub mod download;
pub mod error;
pub mod files;
pub mod forest;
pub mod load;
pub mod logging;
pub mod migrate;
pub mod source;
