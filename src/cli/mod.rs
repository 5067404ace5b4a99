//! CLI commands

pub mod commands;
