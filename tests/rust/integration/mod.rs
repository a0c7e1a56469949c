//! Integration tests - whole requests against a project on disk
//!
//! Each test builds a project database, an attached annotation database and a
//! separate genotype database in a temporary directory, and loads them through
//! the YAML project file the way the command line tool does.

mod common;
mod project_file_tests;
mod select_workflow_tests;
