// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! The monitor drives periodic rounds over the node fleet: refresh every
//! head in parallel, cross-check distinct heads pair-wise for splits,
//! assemble the report, sweep bad blocks, and publish the artifacts the
//! dashboard reads.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::{fs, thread};

use ethers::types::H256;
use futures::future;
use futures::stream::{self, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::badblocks::{self, BadBlock};
use crate::forks::find_split;
use crate::metrics;
use crate::node::{NodeStatus, NodeView};
use crate::report::Report;
use crate::store::HeaderStore;
use crate::vulns::VulnCatalogue;

const DEFAULT_RELOAD: Duration = Duration::from_secs(10);
const BAD_BLOCK_INTERVAL: Duration = Duration::from_secs(60);
const CLEAN_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Monitors a set of nodes and performs checks on them.
pub struct Monitor {
    nodes: Vec<Arc<NodeView>>,
    store: Option<HeaderStore>,
    reload_interval: Duration,
    chain_name: String,
    /// Directory the report and its supporting artifacts are written to.
    /// None in tests, which only look at `last_report`.
    artifact_root: Option<PathBuf>,
    catalogue: VulnCatalogue,
    bad_blocks: HashMap<H256, BadBlock>,
    reported_bad_numbers: HashSet<u64>,
    fork_height_cache: Vec<u64>,
    last_clean: Option<Instant>,
    last_bad_blocks: Option<Instant>,
    last_report: Option<Report>,
}

/// Handle to a started monitor loop.
pub struct MonitorHandle {
    quit: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the loop to stop and wait for the round in progress.
    pub async fn stop(self) {
        let _ = self.quit.send(true);
        let _ = self.task.await;
    }
}

impl Monitor {
    /// Create a monitor, run the initial health check and a first round.
    pub async fn new(
        nodes: Vec<Arc<NodeView>>,
        store: Option<HeaderStore>,
        reload_interval: Duration,
        chain_name: String,
        artifact_root: Option<PathBuf>,
        catalogue: VulnCatalogue,
    ) -> Self {
        for node in &nodes {
            tracing::info!(node = node.name(), "checking health");
            match node.version().await {
                Ok(version) => {
                    node.set_status(NodeStatus::Ok).await;
                    tracing::info!(node = node.name(), version, "node ok");
                }
                Err(e) => {
                    node.set_status(NodeStatus::Unreachable).await;
                    tracing::error!(
                        node = node.name(),
                        error = e.to_string(),
                        "error checking version"
                    );
                }
            }
        }
        let reload_interval = if reload_interval.is_zero() {
            DEFAULT_RELOAD
        } else {
            reload_interval
        };

        let mut monitor = Self {
            nodes,
            store,
            reload_interval,
            chain_name,
            artifact_root,
            catalogue,
            bad_blocks: HashMap::new(),
            reported_bad_numbers: HashSet::new(),
            fork_height_cache: Vec::new(),
            last_clean: None,
            last_bad_blocks: None,
            last_report: None,
        };
        monitor.do_checks().await;
        monitor
    }

    /// Spawn the tick loop. The returned handle stops it.
    pub fn start(mut self) -> MonitorHandle {
        let (quit, mut quit_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = quit_rx.changed() => break,
                    _ = tokio::time::sleep(self.reload_interval) => self.do_checks().await,
                }
            }
            if let Some(store) = &self.store {
                store.flush();
            }
        });
        MonitorHandle { quit, task }
    }

    pub fn last_report(&self) -> Option<&Report> {
        self.last_report.as_ref()
    }

    /// One round of checks.
    pub async fn do_checks(&mut self) {
        // Refresh every head in parallel; each node is independently
        // marked reachable or not, with no hysteresis.
        let refreshes = self.nodes.iter().cloned().map(|node| {
            tokio::spawn(async move {
                match node.update_latest().await {
                    Ok(()) => node.set_status(NodeStatus::Ok).await,
                    Err(e) => {
                        tracing::error!(
                            node = node.name(),
                            error = e.to_string(),
                            "error getting latest"
                        );
                        node.set_status(NodeStatus::Unreachable).await;
                    }
                }
            })
        });
        let _ = future::join_all(refreshes).await;

        let mut active = Vec::new();
        for node in &self.nodes {
            if node.status().await == NodeStatus::Ok {
                active.push(node.clone());
            }
        }
        active.sort_by(|a, b| a.name().cmp(b.name()));

        let heads = self.find_splits(&active).await;
        let mut numbers: Vec<u64> = heads.into_iter().collect();
        numbers.sort_unstable_by(|a, b| b.cmp(a));
        // cache the interesting heights for the next round's searches
        self.fork_height_cache = numbers.clone();

        let mut report = Report::new(numbers, self.chain_name.clone());
        let nodes = self.nodes.clone();
        for node in &nodes {
            let vulnerabilities = self.check_node(node).await;
            report.add_node(node, vulnerabilities).await;
        }

        self.check_bad_blocks().await;
        report.add_bad_blocks(&self.bad_blocks);

        if let Some(root) = self.artifact_root.clone() {
            self.publish(&root, &report);
        }
        self.last_report = Some(report);
    }

    /// Pair-wise cross-check of the active nodes: every pair of distinct
    /// heads is checked for divergence, and each divergence is narrowed
    /// down to its split height. Returns the set of interesting heights.
    async fn find_splits(&self, active: &[Arc<NodeView>]) -> BTreeSet<u64> {
        let t0 = Instant::now();
        let mut heads = BTreeSet::new();
        let mut seen = HashSet::new();
        let mut distinct = Vec::new();

        for node in active {
            let head = node.head_num().await;
            let Some(block) = node.block_at(head, false).await else {
                tracing::error!(
                    node = node.name(),
                    number = head,
                    "node seems to be missing blocks"
                );
                continue;
            };
            heads.insert(block.number);
            // Nodes sharing a head hash are on the same chain; one
            // representative per distinct head is enough for the scan.
            if seen.insert(block.hash) {
                distinct.push(node.clone());
            }
        }
        let t1 = Instant::now();

        let mut pairs = Vec::new();
        for i in 0..distinct.len() {
            for j in i + 1..distinct.len() {
                pairs.push((distinct[i].clone(), distinct[j].clone()));
            }
        }

        // splitSize is the largest number of blocks in any chain not
        // accepted by all nodes. A node that is simply behind does not
        // count, it has yet to accept the canon chain.
        let split_size = AtomicI64::new(0);
        let heads_mu = Mutex::new(heads);
        let fork_height_cache = &self.fork_height_cache;

        let workers = thread::available_parallelism().map_or(4, |n| n.get());
        stream::iter(pairs)
            .for_each_concurrent(workers, |(a, b)| {
                let split_size = &split_size;
                let heads_mu = &heads_mu;
                async move {
                    tracing::debug!(a = a.name(), b = b.name(), "cross-checking");
                    let highest = a.head_num().await.min(b.head_num().await);
                    // At the height where both nodes have blocks, check
                    // whether the two blocks are identical.
                    let Some(ha) = a.block_at(highest, false).await else {
                        tracing::error!(node = a.name(), number = highest, "node seems to be missing blocks");
                        return;
                    };
                    let Some(hb) = b.block_at(highest, false).await else {
                        tracing::error!(node = b.name(), number = highest, "node seems to be missing blocks");
                        return;
                    };
                    if ha.hash == hb.hash {
                        tracing::debug!(a = a.name(), b = b.name(), highest_common = highest, "same chain");
                        return;
                    }
                    let split = find_split(fork_height_cache, highest, &a, &b).await;
                    split_size.fetch_max((highest - split) as i64, Ordering::Relaxed);
                    tracing::info!(
                        a = a.name(),
                        b = b.name(),
                        num = split,
                        a_hash = ?ha.hash,
                        b_hash = ?hb.hash,
                        "split found"
                    );
                    // Points of interest: the split and its parent.
                    let mut heads = heads_mu.lock().unwrap();
                    heads.insert(split);
                    if split > 0 {
                        heads.insert(split - 1);
                    }
                }
            })
            .await;

        let t2 = Instant::now();
        tracing::info!(
            head_update = ?t1.duration_since(t0),
            forkcheck = ?t2.duration_since(t1),
            "update complete"
        );
        metrics::CHAIN_SPLIT.set(split_size.load(Ordering::Relaxed));
        heads_mu.into_inner().unwrap()
    }

    /// Match a node's version string against the vulnerability catalogue.
    async fn check_node(&mut self, node: &Arc<NodeView>) -> Vec<String> {
        let version = match node.version().await {
            Ok(version) => version,
            Err(_) => node.cached_version().await,
        };
        self.catalogue
            .check(&version)
            .await
            .into_iter()
            .map(|v| v.uid)
            .collect()
    }

    /// Sweep the nodes' self-reported bad blocks, at most once a minute.
    /// Known hashes gain the reporting node in their client set; new ones
    /// are decoded and recorded.
    async fn check_bad_blocks(&mut self) {
        if let Some(at) = self.last_bad_blocks {
            if at.elapsed() < BAD_BLOCK_INTERVAL {
                return;
            }
        }
        self.last_bad_blocks = Some(Instant::now());

        let nodes = self.nodes.clone();
        for node in &nodes {
            for entry in node.bad_blocks().await {
                match self.bad_blocks.entry(entry.hash) {
                    Entry::Vacant(vacant) => {
                        let bad = badblocks::from_entry(&entry, node.name());
                        if let Some(number) = bad.number {
                            let number = number.low_u64();
                            if self.reported_bad_numbers.insert(number) {
                                metrics::CHAIN_BAD_BLOCK.set(number as i64);
                            }
                        }
                        tracing::info!(hash = ?entry.hash, "added new bad block");
                        vacant.insert(bad);
                    }
                    Entry::Occupied(mut present) => {
                        let clients = &mut present.get_mut().clients;
                        if !clients.iter().any(|c| c == node.name()) {
                            clients.push(node.name().to_string());
                        }
                    }
                }
            }
        }
    }

    /// Write the report and its supporting artifacts. Failures are logged
    /// and the round carries on; the next round retries.
    fn publish(&mut self, root: &Path, report: &Report) {
        for sub in ["hashes", "badblocks", "vulns"] {
            if let Err(e) = fs::create_dir_all(root.join(sub)) {
                tracing::warn!(error = e.to_string(), "failed to create artifact dir");
                return;
            }
        }
        let data = match serde_json::to_vec_pretty(report) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = e.to_string(), "json marshal fail");
                return;
            }
        };
        if let Err(e) = write_atomic(&root.join("data.json"), &data) {
            tracing::warn!(error = e.to_string(), "failed to write file");
            return;
        }
        self.provide_hashes(root, report);
        self.provide_bad_blocks(root);
        self.provide_vulns(root);
    }

    /// One file per header referenced by the report, plus a periodic
    /// sweep of files whose hash the report no longer mentions.
    fn provide_hashes(&mut self, root: &Path, report: &Report) {
        let Some(store) = &self.store else { return };
        let dir = root.join("hashes");
        for hash in &report.hashes {
            let Some(header) = store.get(hash) else {
                tracing::warn!(hash = ?hash, "missing header");
                continue;
            };
            let fname = dir.join(format!("{hash:?}.json"));
            if fname.exists() {
                continue;
            }
            match serde_json::to_vec_pretty(&header) {
                Ok(data) => {
                    if let Err(e) = fs::write(&fname, data) {
                        tracing::warn!(error = e.to_string(), "failed to write file");
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = e.to_string(), "failed to marshal header");
                    continue;
                }
            }
        }
        if self.last_clean.map_or(true, |at| at.elapsed() > CLEAN_INTERVAL) {
            clean_hashes(&dir, &report.hashes);
            self.last_clean = Some(Instant::now());
        }
    }

    /// One file per bad block: the stored header plus the raw RLP when
    /// the hash resolves, the minimal record otherwise.
    fn provide_bad_blocks(&self, root: &Path) {
        let dir = root.join("badblocks");
        for (hash, block) in &self.bad_blocks {
            let fname = dir.join(format!("{hash:?}.json"));
            if fname.exists() {
                continue;
            }
            let mut payload = None;
            if let Some(header) = self.store.as_ref().and_then(|s| s.get(hash)) {
                if let Ok(serde_json::Value::Object(mut obj)) = serde_json::to_value(&header) {
                    obj.insert(
                        "rlp".to_string(),
                        serde_json::Value::String(block.rlp.clone()),
                    );
                    payload = serde_json::to_vec_pretty(&obj).ok();
                }
            }
            let data = match payload {
                Some(data) => data,
                // Not in the store; write what we know.
                None => match serde_json::to_vec_pretty(block) {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!(error = e.to_string(), "failed to marshal bad block");
                        continue;
                    }
                },
            };
            if let Err(e) = fs::write(&fname, data) {
                tracing::warn!(error = e.to_string(), "failed to write file");
                return;
            }
        }
    }

    fn provide_vulns(&self, root: &Path) {
        let dir = root.join("vulns");
        for vuln in self.catalogue.entries() {
            let fname = dir.join(format!("{}.json", vuln.uid));
            if fname.exists() {
                continue;
            }
            match serde_json::to_vec_pretty(vuln) {
                Ok(data) => {
                    if let Err(e) = fs::write(&fname, data) {
                        tracing::warn!(error = e.to_string(), "failed to write file");
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = e.to_string(), "failed to marshal vulnerability");
                    continue;
                }
            }
        }
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(tmp, path)
}

lazy_static! {
    static ref HASH_FILE_RE: Regex = Regex::new(r"^0x([0-9a-f]{64})\.json$").unwrap();
}

/// Delete files under `dir` whose hash the current report doesn't list.
fn clean_hashes(dir: &Path, keep: &[H256]) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = e.to_string(), "cleaning hashes failed");
            return;
        }
    };
    let keep: HashSet<H256> = keep.iter().copied().collect();
    let mut count = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(caps) = HASH_FILE_RE.captures(name) else {
            continue;
        };
        let Ok(raw) = hex::decode(&caps[1]) else {
            continue;
        };
        if keep.contains(&H256::from_slice(&raw)) {
            continue;
        }
        if fs::remove_file(entry.path()).is_ok() {
            count += 1;
        }
    }
    tracing::info!(files = count, "cleaned hashes");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ethers::types::H256;
    use serial_test::serial;

    use super::{clean_hashes, Monitor};
    use crate::badblocks::BadBlockEntry;
    use crate::metrics;
    use crate::node::{NodeStatus, NodeView};
    use crate::store::HeaderStore;
    use crate::testing::{BrokenSource, ChainSource};
    use crate::vulns::VulnCatalogue;

    struct Fleet {
        nodes: Vec<Arc<NodeView>>,
        sources: Vec<Arc<ChainSource>>,
    }

    impl Fleet {
        fn new() -> Self {
            Self {
                nodes: Vec::new(),
                sources: Vec::new(),
            }
        }

        fn add(&mut self, name: &str, head: u64, forks: Vec<u64>, seeds: Vec<u64>) {
            let source = ChainSource::new(name, head, forks, seeds);
            self.sources.push(source.clone());
            self.nodes
                .push(Arc::new(NodeView::new(name, source, None, 0)));
        }

        fn add_broken(&mut self, name: &str) {
            self.nodes
                .push(Arc::new(NodeView::new(name, Arc::new(BrokenSource), None, 0)));
        }

        fn unique_queries(&self) -> usize {
            self.sources.iter().map(|s| s.unique_queries()).sum()
        }

        fn advance_all(&self, blocks: u64) {
            for source in &self.sources {
                source.advance(blocks);
            }
        }
    }

    /// Ten nodes in agreement, three on a recent fork and behind, one
    /// stuck on an old fork, two broken.
    fn forked_fleet() -> Fleet {
        let mut fleet = Fleet::new();
        for suffix in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"] {
            fleet.add(&format!("canon-{suffix}"), 13_000_000, vec![0], vec![0]);
        }
        for suffix in ["a", "b", "c"] {
            fleet.add(
                &format!("fork-{suffix}"),
                12_999_900,
                vec![0, 12_999_800],
                vec![0, 1],
            );
        }
        fleet.add("old-a", 12_800_000, vec![0, 12_799_998], vec![0, 2]);
        fleet.add_broken("broken-a");
        fleet.add_broken("broken-b");
        fleet
    }

    async fn monitor(fleet: &Fleet) -> Monitor {
        Monitor::new(
            fleet.nodes.clone(),
            None,
            Duration::from_secs(1),
            "testnet".to_string(),
            None,
            VulnCatalogue::disabled(),
        )
        .await
    }

    #[tokio::test]
    #[serial]
    async fn all_nodes_agree() {
        let mut fleet = Fleet::new();
        for suffix in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"] {
            fleet.add(&format!("canon-{suffix}"), 13_000_000, vec![0], vec![0]);
        }
        let mon = monitor(&fleet).await;
        let report = mon.last_report().expect("missing report");

        assert_eq!(report.numbers, vec![13_000_000]);
        assert_eq!(report.hashes.len(), 1);
        let row = &report.rows[&13_000_000];
        assert_eq!(row.len(), 10);
        assert!(row.iter().all(|cell| cell == &row[0] && !cell.is_empty()));
        assert_eq!(metrics::CHAIN_SPLIT.get(), 0);
    }

    #[tokio::test]
    #[serial]
    async fn forked_fleet_finds_all_interesting_heights() {
        let fleet = forked_fleet();
        let mon = monitor(&fleet).await;
        let report = mon.last_report().expect("missing report");
        report.print();

        // heads, splits and split parents
        assert_eq!(
            report.numbers,
            vec![
                13_000_000, 12_999_900, 12_999_800, 12_999_799, 12_800_000, 12_799_998, 12_799_997
            ]
        );
        // the deepest wedge: the recent fork diverged 100 blocks below
        // its head
        assert_eq!(metrics::CHAIN_SPLIT.get(), 100);

        // Unreachable nodes show up as empty columns but never join the
        // scan.
        let broken = report
            .cols
            .iter()
            .position(|c| c.name == "broken-a")
            .expect("broken node missing from report");
        assert_eq!(report.cols[broken].status, NodeStatus::Unreachable);
        for number in &report.numbers {
            assert_eq!(report.rows[number][broken], "");
        }

        // Every hash in the report appears in some row.
        for hash in &report.hashes {
            let hex = format!("{hash:?}");
            assert!(report
                .rows
                .values()
                .any(|row| row.iter().any(|cell| cell == &hex)));
        }
    }

    #[tokio::test]
    #[serial]
    async fn no_progress_means_no_new_queries() {
        let fleet = forked_fleet();
        let mut mon = monitor(&fleet).await;
        let q1 = fleet.unique_queries();

        mon.do_checks().await;
        assert_eq!(
            fleet.unique_queries() - q1,
            0,
            "round without progression must be answered from the caches"
        );
    }

    #[tokio::test]
    #[serial]
    async fn uniform_advance_stays_cheap() {
        let fleet = forked_fleet();
        let mut mon = monitor(&fleet).await;
        mon.do_checks().await;
        let q1 = fleet.unique_queries();

        fleet.advance_all(2);
        mon.do_checks().await;

        let report = mon.last_report().unwrap();
        // Heads shifted by two, the split heights unchanged, nothing else.
        assert_eq!(
            report.numbers,
            vec![
                13_000_002, 12_999_902, 12_999_800, 12_999_799, 12_800_002, 12_799_998, 12_799_997
            ]
        );
        // Head refresh plus boundary re-confirmation per node, not a
        // re-walk of the history.
        let delta = fleet.unique_queries() - q1;
        assert!(
            delta <= 3 * fleet.nodes.len(),
            "expected a bounded number of queries, got {delta}"
        );
    }

    #[tokio::test]
    #[serial]
    async fn fork_after_advance_is_detected() {
        let fleet = forked_fleet();
        let mut mon = monitor(&fleet).await;
        mon.do_checks().await;

        fleet.advance_all(2);
        mon.do_checks().await;

        // Two more blocks, and the last canon node wanders off on its own
        // chain at the new head.
        fleet.advance_all(2);
        fleet.sources[9].fork_at(13_000_004, 9);
        mon.do_checks().await;

        let report = mon.last_report().unwrap();
        assert!(report.numbers.contains(&13_000_004));
        assert!(report.numbers.contains(&13_000_003));
        assert_eq!(report.numbers.len(), 8);
        // The recent fork is now 104 blocks deep and still the widest
        // wedge; the fresh one-block fork doesn't widen anything.
        assert_eq!(metrics::CHAIN_SPLIT.get(), 104);
    }

    #[tokio::test]
    #[serial]
    async fn bad_blocks_merge_client_sets() {
        let entry = BadBlockEntry {
            hash: H256::repeat_byte(0xbb),
            rlp: "0x00".to_string(),
            block: serde_json::Value::Null,
        };
        let mut fleet = Fleet::new();
        fleet.add("geth-a", 100, vec![0], vec![0]);
        fleet.add("geth-b", 100, vec![0], vec![0]);
        fleet.sources[0].set_bad_blocks(vec![entry.clone()]);
        fleet.sources[1].set_bad_blocks(vec![entry]);

        let mut mon = monitor(&fleet).await;
        let report = mon.last_report().unwrap();
        assert_eq!(report.bad_blocks.len(), 1);
        assert_eq!(report.bad_blocks[0].clients, vec!["geth-a", "geth-b"]);

        // The per-node count is sampled when the column is built, which
        // happens before the sweep, so it shows up one round later.
        mon.do_checks().await;
        let report = mon.last_report().unwrap();
        assert_eq!(report.cols[0].bad_blocks, 1);
        assert_eq!(report.bad_blocks[0].clients, vec!["geth-a", "geth-b"]);
    }

    #[tokio::test]
    #[serial]
    async fn report_numbers_are_strictly_descending() {
        let fleet = forked_fleet();
        let mon = monitor(&fleet).await;
        let numbers = &mon.last_report().unwrap().numbers;
        assert!(numbers.windows(2).all(|w| w[0] > w[1]));
    }

    #[tokio::test]
    #[serial]
    async fn publishes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let www = dir.path().join("www");
        let store = HeaderStore::open(dir.path().join("blockdb")).unwrap();

        let source = ChainSource::new("canon", 100, vec![0], vec![0]);
        let node = Arc::new(NodeView::new(
            "canon-a",
            source,
            Some(store.clone()),
            0,
        ));
        let mon = Monitor::new(
            vec![node],
            Some(store),
            Duration::from_secs(1),
            "testnet".to_string(),
            Some(www.clone()),
            VulnCatalogue::disabled(),
        )
        .await;

        let data = std::fs::read(www.join("data.json")).expect("data.json missing");
        let parsed: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(parsed["Chain"], "testnet");
        assert_eq!(parsed["Numbers"][0], 100);

        for hash in &mon.last_report().unwrap().hashes {
            assert!(www.join("hashes").join(format!("{hash:?}.json")).exists());
        }
    }

    #[test]
    fn clean_hashes_removes_unreferenced_files() {
        let dir = tempfile::tempdir().unwrap();
        let keep = H256::repeat_byte(0x11);
        let drop = H256::repeat_byte(0x22);
        for h in [keep, drop] {
            std::fs::write(dir.path().join(format!("{h:?}.json")), b"{}").unwrap();
        }
        std::fs::write(dir.path().join("index.html"), b"x").unwrap();

        clean_hashes(dir.path(), &[keep]);

        assert!(dir.path().join(format!("{keep:?}.json")).exists());
        assert!(!dir.path().join(format!("{drop:?}.json")).exists());
        // unrelated files are left alone
        assert!(dir.path().join("index.html").exists());
    }
}
