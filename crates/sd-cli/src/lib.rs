//! Support desk SLA engine CLI library.
//!
//! This crate provides the `sd` command-line interface over the SLA engine.

mod cli;
pub mod commands;
mod config;
pub mod tickets;

pub use cli::{
    Cli, Commands, EventCommand, HoursCommand, RulesCommand, TimerCommand,
};
pub use config::Config;
