//! CLI subcommand implementations for the dcmr binary.

pub mod crawl_cmd;
pub mod lookup_cmd;
pub mod output;
pub mod rename_cmd;
