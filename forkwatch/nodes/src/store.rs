// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;

use anyhow::Context;
use ethers::types::{Block, TxHash, H256};
use forkwatch_rocksdb::{RocksDb, RocksDbConfig};

/// Content-addressed header persistence: 32-byte block hash to the
/// canonical JSON encoding of the header. Many nodes report the same
/// hashes; the store keeps each unique one exactly once and survives
/// restarts.
#[derive(Clone)]
pub struct HeaderStore {
    db: RocksDb,
}

impl HeaderStore {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let db = RocksDb::open(path, &RocksDbConfig::default())
            .context("failed to open header store")?;
        Ok(Self { db })
    }

    /// Persist a header under its hash. A no-op when the hash is already
    /// present; write failures are logged, the round carries on.
    pub fn add(&self, hash: H256, header: &Block<TxHash>) {
        match self.db.exists(hash.as_bytes()) {
            Ok(true) => return,
            Ok(false) => (),
            Err(e) => {
                tracing::warn!(error = e.to_string(), "header store read failed");
                return;
            }
        }
        let data = match serde_json::to_vec(header) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = e.to_string(), "failed encoding header");
                return;
            }
        };
        if let Err(e) = self.db.write(hash.as_bytes(), data) {
            tracing::warn!(error = e.to_string(), "header store write failed");
        }
    }

    /// Look up a header by hash. The store only ever holds data we wrote
    /// ourselves, so undecodable content means the database is corrupted
    /// beyond recovery and the process must not continue.
    pub fn get(&self, hash: &H256) -> Option<Block<TxHash>> {
        let data = self.db.read(hash.as_bytes()).ok()??;
        match serde_json::from_slice(&data) {
            Ok(header) => Some(header),
            Err(e) => panic!("failed decoding our own data: {e}"),
        }
    }

    pub fn flush(&self) {
        if let Err(e) = self.db.flush() {
            tracing::warn!(error = e.to_string(), "header store flush failed");
        }
    }
}
