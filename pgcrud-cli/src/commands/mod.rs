//! Command implementations for the pgcrud CLI

pub mod check;
pub mod db;
pub mod serve;

pub use check::run_check_config;
pub use db::{run_migrate, run_ping};
pub use serve::run_serve;
