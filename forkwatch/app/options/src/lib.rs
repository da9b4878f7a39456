// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

pub fn parse() -> Options {
    Options::parse()
}

#[derive(Parser, Debug)]
#[command(version)]
pub struct Options {
    /// Set the logging level of the console.
    #[arg(
        short = 'l',
        long,
        default_value = "info",
        env = "FW_LOG_LEVEL",
        help = "Standard log levels, or a comma separated list of filters, e.g. 'debug,hyper=warn'"
    )]
    log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl Options {
    /// Tracing filter for the console, built from the log level so that
    /// both plain levels and full filter expressions work.
    pub fn log_filter(&self) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
        EnvFilter::try_new(&self.log_level)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the monitor against the nodes in the configuration file.
    Run(RunArgs),
    /// Parse the configuration file and print the resulting settings.
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the TOML configuration file.
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the TOML configuration file.
    pub config: PathBuf,
}
