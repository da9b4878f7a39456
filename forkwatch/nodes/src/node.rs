// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! The per-node chain view: a rate-limited cache of recent headers with
//! reorg-aware parent-chain maintenance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ethers::types::H256;
use serde::{Serialize, Serializer};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::badblocks::BadBlockEntry;
use crate::limiter::Limiter;
use crate::metrics;
use crate::source::{HeaderSource, SourceError, SourceHeader};
use crate::store::HeaderStore;
use crate::BlockInfo;

/// Don't request the version more often than this.
const VERSION_RECHECK: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeStatus {
    Ok = 0,
    Unreachable = 1,
}

impl Serialize for NodeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

struct ViewState {
    version: String,
    status: NodeStatus,
    latest: Option<BlockInfo>,
    chain_history: HashMap<u64, BlockInfo>,
    last_progress: i64,
    bad_block_count: usize,
    last_version_check: Option<Instant>,
}

/// One monitored node. The view owns a header source and keeps a chain
/// history with two invariants: every entry's number equals its key, and
/// adjacent entries are parent-chained. Fetches hold the state lock on
/// purpose — each node is a serial resource, parallelism is across nodes.
pub struct NodeView {
    name: String,
    source: Arc<dyn HeaderSource>,
    store: Option<HeaderStore>,
    limiter: Limiter,
    head_gauge: prometheus::IntGauge,
    state: Mutex<ViewState>,
}

impl NodeView {
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn HeaderSource>,
        store: Option<HeaderStore>,
        rate_limit: u32,
    ) -> Self {
        let name = name.into();
        let head_gauge = metrics::NODE_HEAD.with_label_values(&[name.as_str()]);
        Self {
            name,
            source,
            store,
            limiter: Limiter::new(rate_limit),
            head_gauge,
            state: Mutex::new(ViewState {
                version: "n/a".to_string(),
                status: NodeStatus::Unreachable,
                latest: None,
                chain_history: HashMap::new(),
                last_progress: 0,
                bad_block_count: 0,
                last_version_check: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn status(&self) -> NodeStatus {
        self.state.lock().await.status
    }

    pub async fn set_status(&self, status: NodeStatus) {
        self.state.lock().await.status = status;
    }

    pub async fn head_num(&self) -> u64 {
        self.state.lock().await.latest.map_or(0, |bl| bl.number)
    }

    pub async fn last_progress(&self) -> i64 {
        self.state.lock().await.last_progress
    }

    pub async fn bad_block_count(&self) -> usize {
        self.state.lock().await.bad_block_count
    }

    pub async fn cached_version(&self) -> String {
        self.state.lock().await.version.clone()
    }

    /// The node's version string. The remote is asked at most once per
    /// 30 seconds; within the window the cached value is returned.
    pub async fn version(&self) -> anyhow::Result<String> {
        let mut state = self.state.lock().await;
        if let Some(at) = state.last_version_check {
            if at.elapsed() < VERSION_RECHECK {
                return Ok(state.version.clone());
            }
        }
        state.last_version_check = Some(Instant::now());
        self.limiter.take().await;
        let version = self.source.version().await?;
        state.version = version.clone();
        Ok(version)
    }

    /// Refresh the latest header. A new head hash bumps `last_progress`
    /// and the head gauge.
    pub async fn update_latest(&self) -> Result<(), SourceError> {
        let mut state = self.state.lock().await;
        let bl = self.fetch_header(&mut state, None).await?;
        if state.latest.map_or(true, |latest| latest.hash != bl.hash) {
            state.last_progress = unix_now();
            state.latest = Some(bl);
            self.head_gauge.set(bl.number as i64);
            tracing::trace!(
                node = self.name.as_str(),
                time = state.last_progress,
                "chain head progressed"
            );
        }
        Ok(())
    }

    /// The block at `number`, from the history when possible. Heights
    /// beyond the known head are not queried at all.
    pub async fn block_at(&self, number: u64, force: bool) -> Option<BlockInfo> {
        let mut state = self.state.lock().await;
        if state.latest.map_or(false, |latest| latest.number < number) {
            return None; // that block is future, don't bother
        }
        if !force {
            if let Some(bl) = state.chain_history.get(&number) {
                return Some(*bl);
            }
        }
        self.fetch_header(&mut state, Some(number)).await.ok()
    }

    /// The hash at `number`, zero when unavailable. A cache hit at
    /// `number` answers directly; a hit at `number + 1` answers through
    /// its parent hash, which is valid because adjacency is an invariant.
    pub async fn hash_at(&self, number: u64, force: bool) -> H256 {
        let mut state = self.state.lock().await;
        if !force {
            if state.latest.map_or(false, |latest| latest.number < number) {
                return H256::zero();
            }
            if let Some(bl) = state.chain_history.get(&number) {
                return bl.hash;
            }
            if let Some(child) = state.chain_history.get(&(number + 1)) {
                return child.parent_hash;
            }
        }
        match self.fetch_header(&mut state, Some(number)).await {
            Ok(bl) => bl.hash,
            Err(_) => H256::zero(),
        }
    }

    /// The node's current self-reported bad blocks; an error counts as an
    /// empty set. Also refreshes the cached count.
    pub async fn bad_blocks(&self) -> Vec<BadBlockEntry> {
        let mut state = self.state.lock().await;
        match self.source.bad_blocks().await {
            Ok(entries) => {
                state.bad_block_count = entries.len();
                entries
            }
            Err(e) => {
                tracing::debug!(
                    node = self.name.as_str(),
                    error = e.to_string(),
                    "bad block query failed"
                );
                Vec::new()
            }
        }
    }

    /// Fetch a header and reconcile the parent chain: while the cached
    /// entry below the fetched one is not its parent, evict and refetch
    /// it, walking backwards until the chains join up again.
    async fn fetch_header(
        &self,
        state: &mut ViewState,
        number: Option<u64>,
    ) -> Result<BlockInfo, SourceError> {
        let hdr = self.throttled_get_header(state, number).await?;

        let mut current = hdr;
        let mut reorgs = 0usize;
        while current.number > 0 {
            let parent = match state.chain_history.get(&(current.number - 1)) {
                Some(parent) => *parent,
                None => break,
            };
            if parent.hash == current.parent_hash {
                break; // not reorged
            }
            reorgs += 1;
            state.chain_history.remove(&parent.number);
            match self.throttled_get_header(state, Some(parent.number)).await {
                Ok(refetched) => current = refetched,
                Err(_) => break,
            }
        }
        if reorgs > 1 {
            tracing::info!(node = self.name.as_str(), depth = reorgs, "node reorged");
        }
        Ok(hdr)
    }

    async fn throttled_get_header(
        &self,
        state: &mut ViewState,
        number: Option<u64>,
    ) -> Result<BlockInfo, SourceError> {
        self.limiter.take().await;
        tracing::debug!(node = self.name.as_str(), requested = ?number, "fetching header");
        let SourceHeader { info, header } = self.source.header_by_number(number).await?;
        if let Some(store) = &self.store {
            store.add(info.hash, &header);
        }
        state.chain_history.insert(info.number, info);
        Ok(info)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}
