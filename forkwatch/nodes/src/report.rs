// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::{BTreeMap, HashMap, HashSet};

use ethers::types::H256;
use serde::Serialize;

use crate::badblocks::BadBlock;
use crate::node::{NodeStatus, NodeView};

/// At most this many bad blocks are attached to a report.
const BAD_BLOCK_CAP: usize = 20;

/// One column of the report: the state of a single node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientSummary {
    pub name: String,
    pub version: String,
    pub status: NodeStatus,
    pub last_progress: i64,
    pub bad_blocks: usize,
    pub vulnerabilities: Vec<String>,
}

/// One snapshot of where the nodes are at a given time. `rows` maps each
/// interesting height to one cell per column — the hex hash the node
/// reports there, or empty when it has none.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Report {
    pub cols: Vec<ClientSummary>,
    pub rows: BTreeMap<u64, Vec<String>>,
    pub numbers: Vec<u64>,
    pub hashes: Vec<H256>,
    pub bad_blocks: Vec<BadBlock>,
    pub chain: String,
}

impl Report {
    /// A report over the given interesting heights (descending).
    pub fn new(numbers: Vec<u64>, chain: String) -> Self {
        Self {
            cols: Vec::new(),
            rows: BTreeMap::new(),
            numbers,
            hashes: Vec::new(),
            bad_blocks: Vec::new(),
            chain,
        }
    }

    /// Append one node as a column, filling its cell in every row from
    /// the node's view (cached heights only get cache hits here; heights
    /// past the node's head stay empty).
    pub async fn add_node(&mut self, node: &NodeView, vulnerabilities: Vec<String>) {
        self.cols.push(ClientSummary {
            name: node.name().to_string(),
            version: node.cached_version().await,
            status: node.status().await,
            last_progress: node.last_progress().await,
            bad_blocks: node.bad_block_count().await,
            vulnerabilities,
        });
        for &num in &self.numbers {
            let cell = match node.block_at(num, false).await {
                Some(bl) => {
                    self.hashes.push(bl.hash);
                    format!("{:?}", bl.hash)
                }
                None => String::new(),
            };
            self.rows.entry(num).or_default().push(cell);
        }
        self.dedup();
    }

    /// Attach the most recent bad blocks, highest number first.
    pub fn add_bad_blocks(&mut self, bad_blocks: &HashMap<H256, BadBlock>) {
        let mut blocks: Vec<BadBlock> = bad_blocks.values().cloned().collect();
        blocks.sort_by(|a, b| b.number.cmp(&a.number));
        blocks.truncate(BAD_BLOCK_CAP);
        self.bad_blocks = blocks;
    }

    fn dedup(&mut self) {
        let mut seen = HashSet::new();
        self.hashes.retain(|h| seen.insert(*h));
    }

    /// Print the report as a table to stdout.
    pub fn print(&self) {
        let names: Vec<&str> = self.cols.iter().map(|c| c.name.as_str()).collect();
        println!("| number | {} |", names.join(" | "));
        print!("|----");
        for _ in &self.cols {
            print!("|----");
        }
        println!("|");
        for num in &self.numbers {
            let row = self.rows.get(num).map(|r| r.join(" | ")).unwrap_or_default();
            println!("| {num} | {row} |");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::ChainSource;

    async fn ready_node(name: &str, source: Arc<ChainSource>) -> NodeView {
        let node = NodeView::new(name, source, None, 0);
        node.update_latest().await.unwrap();
        node.set_status(NodeStatus::Ok).await;
        node
    }

    #[tokio::test]
    async fn fills_rows_and_dedups_hashes() {
        let canon = ChainSource::new("canon", 100, vec![0], vec![0]);
        let a = ready_node("a", canon.clone()).await;
        let b = ready_node("b", canon.clone()).await;

        let mut report = Report::new(vec![100, 99], "testnet".to_string());
        report.add_node(&a, vec![]).await;
        report.add_node(&b, vec!["GETH-2021-01".to_string()]).await;

        assert_eq!(report.cols.len(), 2);
        assert_eq!(report.cols[1].vulnerabilities, vec!["GETH-2021-01"]);
        assert_eq!(report.rows[&100].len(), 2);
        assert_eq!(report.rows[&100][0], report.rows[&100][1]);
        // Two nodes, two heights, but only two distinct hashes.
        assert_eq!(report.hashes.len(), 2);
    }

    #[tokio::test]
    async fn heights_past_a_nodes_head_stay_empty() {
        let canon = ChainSource::new("canon", 100, vec![0], vec![0]);
        let behind = ChainSource::new("behind", 90, vec![0], vec![0]);
        let a = ready_node("a", canon).await;
        let b = ready_node("b", behind).await;

        let mut report = Report::new(vec![100, 90], "testnet".to_string());
        report.add_node(&a, vec![]).await;
        report.add_node(&b, vec![]).await;

        assert!(!report.rows[&100][0].is_empty());
        assert!(report.rows[&100][1].is_empty());
        assert!(!report.rows[&90][1].is_empty());
    }

    #[tokio::test]
    async fn bad_blocks_are_sorted_and_capped() {
        use ethers::types::U256;

        let mut map = HashMap::new();
        for i in 0..30u64 {
            let hash = H256::from_low_u64_be(i + 1);
            map.insert(
                hash,
                BadBlock {
                    clients: vec!["geth".to_string()],
                    hash,
                    rlp: String::new(),
                    number: Some(U256::from(i)),
                    parent_hash: None,
                    time: None,
                    extra: None,
                    coinbase: None,
                    root: None,
                },
            );
        }

        let mut report = Report::new(vec![], "testnet".to_string());
        report.add_bad_blocks(&map);
        assert_eq!(report.bad_blocks.len(), 20);
        assert_eq!(report.bad_blocks[0].number, Some(U256::from(29u64)));
        assert_eq!(report.bad_blocks[19].number, Some(U256::from(10u64)));
    }
}
