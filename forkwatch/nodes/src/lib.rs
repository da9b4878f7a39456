// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Cross-checking of a fleet of chain nodes: per-node chain views,
//! pair-wise fork detection, bad block collection, vulnerability
//! matching and the monitor loop that drives them.

pub mod badblocks;
pub mod forks;
pub mod limiter;
pub mod metrics;
pub mod monitor;
pub mod node;
pub mod report;
pub mod source;
pub mod store;
pub mod testing;
pub mod vulns;

use ethers::types::H256;

/// The compact view of a block kept in every node's chain history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub hash: H256,
    pub parent_hash: H256,
}

impl std::fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{:?}]", self.number, self.hash)
    }
}
