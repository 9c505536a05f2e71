#![forbid(unsafe_code)]

use crate::config::InternetzAction;
use clap::Parser;
use config::Args;
use std::io::IsTerminal;

mod app;
mod config;
mod netinfo;
mod print;
mod report;
mod signal;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let terminal = std::io::stderr().is_terminal();
    match InternetzAction::from(args, terminal)? {
        InternetzAction::Run(cfg) => app::run_internetz(&cfg)?,
        InternetzAction::PrintConfigTemplate => print::print_config_template(),
    }
    Ok(())
}
