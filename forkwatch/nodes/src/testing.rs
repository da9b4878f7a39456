// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Deterministic header sources. These back the test suite, and the
//! `testnode-*` client kinds run the live variant against a real monitor
//! without any network.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use ethers::types::{Block, TxHash, H256};
use ethers::utils::keccak256;
use rand::Rng;

use crate::badblocks::BadBlockEntry;
use crate::source::{HeaderSource, SourceError, SourceHeader};
use crate::BlockInfo;

/// The hash of block `number` on the chain identified by `seed`.
pub fn hash_from_seed(seed: u64, number: u64) -> H256 {
    let mut buf = [0u8; 32];
    buf[..8].copy_from_slice(&seed.to_be_bytes());
    buf[8..16].copy_from_slice(&number.to_be_bytes());
    H256::from(keccak256(buf))
}

/// A scripted chain: block hashes derive from a seed which switches at
/// the configured fork heights, so two sources sharing a prefix of
/// (forks, seeds) agree exactly up to the first differing fork point.
///
/// Every header request is counted, uniquely per height, which is what
/// the round-idempotence tests measure.
pub struct ChainSource {
    id: String,
    head: AtomicU64,
    chain: Mutex<ChainShape>,
    queried: Mutex<HashSet<u64>>,
    total: AtomicUsize,
    bad_blocks: Mutex<Vec<BadBlockEntry>>,
}

struct ChainShape {
    forks: Vec<u64>,
    seeds: Vec<u64>,
}

impl ChainSource {
    pub fn new(id: &str, head: u64, forks: Vec<u64>, seeds: Vec<u64>) -> Arc<Self> {
        assert_eq!(forks.len(), seeds.len(), "each fork height needs a seed");
        assert!(!seeds.is_empty(), "a chain needs at least one seed");
        Arc::new(Self {
            id: id.to_string(),
            head: AtomicU64::new(head),
            chain: Mutex::new(ChainShape { forks, seeds }),
            queried: Mutex::new(HashSet::new()),
            total: AtomicUsize::new(0),
            bad_blocks: Mutex::new(Vec::new()),
        })
    }

    /// The live variant advances its head on a timer, like a chain that
    /// keeps producing blocks.
    pub fn spawn_live(id: &str, head: u64, forks: Vec<u64>, seeds: Vec<u64>) -> Arc<Self> {
        let source = Self::new(id, head, forks, seeds);
        let ticker = source.clone();
        tokio::spawn(async move {
            loop {
                let jitter = rand::thread_rng().gen_range(0..4);
                tokio::time::sleep(Duration::from_secs(10 + jitter)).await;
                ticker.head.fetch_add(1, Ordering::SeqCst);
            }
        });
        source
    }

    pub fn head(&self) -> u64 {
        self.head.load(Ordering::SeqCst)
    }

    pub fn advance(&self, blocks: u64) {
        self.head.fetch_add(blocks, Ordering::SeqCst);
    }

    /// Switch to a different chain from `height` upwards.
    pub fn fork_at(&self, height: u64, seed: u64) {
        let mut chain = self.chain.lock().unwrap();
        chain.forks.push(height);
        chain.seeds.push(seed);
    }

    pub fn set_bad_blocks(&self, entries: Vec<BadBlockEntry>) {
        *self.bad_blocks.lock().unwrap() = entries;
    }

    /// How many distinct heights have been requested from this source.
    pub fn unique_queries(&self) -> usize {
        self.queried.lock().unwrap().len()
    }

    pub fn total_queries(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn seed_at(&self, number: u64) -> u64 {
        let chain = self.chain.lock().unwrap();
        let mut seed = chain.seeds[0];
        for (i, fork) in chain.forks.iter().enumerate() {
            if *fork <= number {
                seed = chain.seeds[i];
            }
        }
        seed
    }

    fn info_at(&self, number: u64) -> BlockInfo {
        let parent = number.wrapping_sub(1);
        BlockInfo {
            number,
            hash: hash_from_seed(self.seed_at(number), number),
            parent_hash: hash_from_seed(self.seed_at(parent), parent),
        }
    }
}

#[async_trait]
impl HeaderSource for ChainSource {
    async fn version(&self) -> anyhow::Result<String> {
        Ok(format!("TestNode({})/v0.1.0/linux", self.id))
    }

    async fn header_by_number(&self, number: Option<u64>) -> Result<SourceHeader, SourceError> {
        let head = self.head();
        let number = number.unwrap_or(head);
        if number > head {
            return Err(SourceError::MissingHeader(Some(number)));
        }
        self.queried.lock().unwrap().insert(number);
        self.total.fetch_add(1, Ordering::SeqCst);

        let info = self.info_at(number);
        let header = Block {
            number: Some(info.number.into()),
            hash: Some(info.hash),
            parent_hash: info.parent_hash,
            ..Default::default()
        };
        Ok(SourceHeader { info, header })
    }

    async fn bad_blocks(&self) -> anyhow::Result<Vec<BadBlockEntry>> {
        Ok(self.bad_blocks.lock().unwrap().clone())
    }
}

/// A source where every call fails, for exercising the unreachable path.
pub struct BrokenSource;

#[async_trait]
impl HeaderSource for BrokenSource {
    async fn version(&self) -> anyhow::Result<String> {
        Err(anyhow!("broken node"))
    }

    async fn header_by_number(&self, _number: Option<u64>) -> Result<SourceHeader, SourceError> {
        Err(SourceError::Transport(anyhow!("broken node")))
    }

    async fn bad_blocks(&self) -> anyhow::Result<Vec<BadBlockEntry>> {
        Err(anyhow!("broken node"))
    }
}
