//! Variant query compiler
//!
//! Turns variant selection requests (a variant table, conditions over variant
//! and annotation fields, phenotype conditions on samples) into statements for
//! a relational store, runs them, and writes counts, tables or records:
//! - Field resolution against the project catalog and join planning
//! - Sample filters over per-sample genotype tables
//! - Output queries with one row per variant
//! - Count, materialize and stream execution modes

pub mod utils;

pub mod catalog;
pub mod config;
pub mod context;
pub mod engine;
pub mod executor;
pub mod output;
pub mod progress;
pub mod query_compiler;
