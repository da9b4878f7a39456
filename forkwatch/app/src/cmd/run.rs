// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use forkwatch_app_options::RunArgs;
use forkwatch_nodes::monitor::Monitor;
use forkwatch_nodes::node::NodeView;
use forkwatch_nodes::source::{EtherscanSource, HeaderSource, RpcSource};
use forkwatch_nodes::store::HeaderStore;
use forkwatch_nodes::testing::ChainSource;
use forkwatch_nodes::vulns::VulnCatalogue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

use crate::settings::{ClientKind, Settings};
use crate::cmd;

cmd! {
  RunArgs(self, settings) {
    run(self.config.clone(), settings).await
  }
}

enum Outcome {
    Shutdown,
    Restart,
}

/// Run the monitor. This method acts as our composition root.
///
/// The configuration file is watched; a change stops the monitor and the
/// dashboard server and starts them again from the new settings.
async fn run(config_file: PathBuf, mut settings: Settings) -> anyhow::Result<()> {
    init_metrics(&settings)?;

    let mut config_changed = spawn_config_watcher(config_file.clone());

    loop {
        match run_once(&settings, &mut config_changed).await? {
            Outcome::Shutdown => return Ok(()),
            Outcome::Restart => {
                tracing::info!("config file change detected: monitor restarting");
                settings = super::settings(&config_file)?;
            }
        }
    }
}

/// One monitor lifetime: from construction to shutdown or restart.
async fn run_once(
    settings: &Settings,
    config_changed: &mut watch::Receiver<u32>,
) -> anyhow::Result<Outcome> {
    let store = HeaderStore::open(&settings.db_path)?;
    let nodes = build_nodes(settings, &store)?;

    let monitor = Monitor::new(
        nodes,
        Some(store),
        settings.reload_interval,
        settings.chain_name.clone(),
        Some(settings.www_root.clone()),
        VulnCatalogue::new(),
    )
    .await;
    let monitor = monitor.start();

    let server = if settings.server_address.is_empty() {
        None
    } else {
        Some(spawn_server(&settings.server_address, &settings.www_root)?)
    };

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => Outcome::Shutdown,
        _ = config_changed.changed() => Outcome::Restart,
    };

    if let Some(server) = server {
        server.abort();
    }
    monitor.stop().await;
    Ok(outcome)
}

/// One node view per configured client.
fn build_nodes(settings: &Settings, store: &HeaderStore) -> anyhow::Result<Vec<Arc<NodeView>>> {
    let mut nodes = Vec::new();
    for client in &settings.clients {
        let source: Arc<dyn HeaderSource> = match client.kind {
            ClientKind::Rpc => Arc::new(RpcSource::new(&client.url, &client.auth_headers)?),
            ClientKind::Infura => {
                if settings.infura_key.is_empty() {
                    bail!("missing infura_key");
                }
                let url = format!("{}{}", settings.infura_endpoint, settings.infura_key);
                Arc::new(RpcSource::new(&url, &[])?)
            }
            ClientKind::Alchemy => {
                if settings.alchemy_key.is_empty() {
                    bail!("missing alchemy_key");
                }
                let url = format!("{}{}", settings.alchemy_endpoint, settings.alchemy_key);
                Arc::new(RpcSource::new(&url, &[])?)
            }
            ClientKind::Etherscan => {
                if settings.etherscan_key.is_empty() {
                    bail!("missing etherscan_key");
                }
                Arc::new(EtherscanSource::new(
                    &settings.etherscan_endpoint,
                    &settings.etherscan_key,
                ))
            }
            ClientKind::TestnodeCanon => {
                ChainSource::spawn_live("canon", 13_000_000, vec![0], vec![0])
            }
            ClientKind::TestnodeForkOld => {
                ChainSource::spawn_live("old", 12_800_000, vec![0, 12_799_998], vec![0, 2])
            }
            ClientKind::TestnodeForkRecent => {
                ChainSource::spawn_live("legacy", 12_999_900, vec![0, 12_999_800], vec![0, 1])
            }
        };
        nodes.push(Arc::new(NodeView::new(
            client.name.clone(),
            source,
            Some(store.clone()),
            client.ratelimit,
        )));
        tracing::info!(name = client.name.as_str(), "client configured");
    }
    Ok(nodes)
}

/// Serve the artifact directory as the dashboard.
fn spawn_server(address: &str, root: &Path) -> anyhow::Result<JoinHandle<()>> {
    let addr: SocketAddr = address
        .to_socket_addrs()
        .with_context(|| format!("invalid server_address {address}"))?
        .next()
        .ok_or_else(|| anyhow!("server_address {address} resolves to nothing"))?;

    let router = axum::Router::new().fallback_service(ServeDir::new(root));
    let server = axum::Server::try_bind(&addr)
        .context("failed to bind web server")?
        .serve(router.into_make_service());

    tracing::info!(address, "starting web server");
    Ok(tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!(error = e.to_string(), "web server exited");
        }
    }))
}

/// Serve the Prometheus registry when enabled. Started once per process;
/// changing the metrics settings needs a full restart.
fn init_metrics(settings: &Settings) -> anyhow::Result<()> {
    if !settings.metrics.enabled {
        tracing::info!("metrics disabled");
        return Ok(());
    }
    let registry = if settings.metrics.namespace.is_empty() {
        prometheus::Registry::new()
    } else {
        prometheus::Registry::new_custom(Some(settings.metrics.namespace.clone()), None)
            .context("invalid metrics namespace")?
    };
    forkwatch_nodes::metrics::register_metrics(&registry).context("failed to register metrics")?;

    tracing::info!(
        listen_addr = settings.metrics.listen.to_string(),
        "serving metrics"
    );
    let mut builder = prometheus_exporter::Builder::new(settings.metrics.listen.clone().try_into()?);
    builder.with_registry(registry);
    let _ = builder.start().context("failed to start metrics server")?;
    Ok(())
}

/// Poll the configuration file at 1 Hz; any (size, mtime) change fires
/// the returned channel.
fn spawn_config_watcher(path: PathBuf) -> watch::Receiver<u32> {
    let (tx, rx) = watch::channel(0u32);
    tokio::spawn(async move {
        let stat = |path: &Path| {
            std::fs::metadata(path)
                .ok()
                .map(|m| (m.len(), m.modified().ok()))
        };
        let mut last = stat(&path);
        let mut generation = 0u32;
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if tx.is_closed() {
                break;
            }
            let current = stat(&path);
            if current != last {
                last = current;
                generation += 1;
                if tx.send(generation).is_err() {
                    break;
                }
            }
        }
    });
    rx
}
