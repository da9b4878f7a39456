// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! CLI command implementations.

use std::path::Path;

use crate::{
    options::{Commands, Options},
    settings::Settings,
};
use anyhow::{anyhow, Context};
use async_trait::async_trait;

pub mod config;
pub mod run;

#[async_trait]
pub trait Cmd {
    type Settings;
    async fn exec(&self, settings: Self::Settings) -> anyhow::Result<()>;
}

/// Convenience macro to simplify declaring commands.
///
/// ```text
/// cmd! {
///   <arg-type>(self, settings: <settings-type>) {
///     <exec-body>
///   }
/// }
/// ```
#[macro_export]
macro_rules! cmd {
    ($name:ident($self:ident, $settings_name:ident : $settings_type:ty) $exec:expr) => {
        #[async_trait::async_trait]
        impl $crate::cmd::Cmd for $name {
            type Settings = $settings_type;

            async fn exec(&$self, $settings_name: Self::Settings) -> anyhow::Result<()> {
                $exec
            }
        }
    };

    ($name:ident($self:ident, $settings:ident) $exec:expr) => {
        cmd!($name($self, $settings: $crate::settings::Settings) $exec);
    };
}

/// Execute the command specified in the options.
pub async fn exec(opts: &Options) -> anyhow::Result<()> {
    match &opts.command {
        Commands::Run(args) => args.exec(settings(&args.config)?).await,
        Commands::Config(args) => args.exec(settings(&args.config)?).await,
    }
}

/// Try to parse the settings from the configuration file.
pub fn settings(config_file: &Path) -> anyhow::Result<Settings> {
    if !config_file.is_file() {
        return Err(anyhow!("'{config_file:?}' is not a file"));
    }
    tracing::info!(
        path = config_file.to_string_lossy().into_owned(),
        "reading configuration"
    );
    Settings::new(config_file).context("error parsing settings")
}
