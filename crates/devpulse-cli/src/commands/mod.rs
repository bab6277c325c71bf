// CLI subcommands

pub mod alerts;
pub mod logs;
pub mod tail;
