//! CLI subcommands.

pub mod config;
pub mod convert;
pub mod models;
