//! Unit tests - public API pieces exercised without a project database

mod config_env_tests;
mod output_format_tests;
