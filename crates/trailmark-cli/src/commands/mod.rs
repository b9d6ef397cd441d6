//! CLI subcommands

pub mod config;
pub mod consent;
pub mod flush;
pub mod identify;
pub mod queue;
pub mod track;
