// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Header sources: the remote endpoints a node view can query. Each
//! source answers three questions — who are you, what is the header at a
//! height (or the latest one), and which blocks have you rejected.

use async_trait::async_trait;
use ethers::types::{Block, TxHash};
use thiserror::Error;

use crate::badblocks::BadBlockEntry;
use crate::BlockInfo;

mod etherscan;
mod rpc;

pub use etherscan::EtherscanSource;
pub use rpc::RpcSource;

/// Per-call timeout; sources own their timeouts, callers don't add any.
pub const CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
    #[error("got nil header for number {0:?}")]
    MissingHeader(Option<u64>),
    #[error("remote answered with wrong number, got {got}, want {want}")]
    NumberMismatch { want: u64, got: u64 },
}

/// A header plus the compact info the chain history keeps. The full header
/// is carried along so it can be persisted by hash.
#[derive(Debug, Clone)]
pub struct SourceHeader {
    pub info: BlockInfo,
    pub header: Block<TxHash>,
}

impl SourceHeader {
    /// Validate a remote header against the requested number. A header
    /// with a number other than the requested one is a protocol violation
    /// and must not enter any cache.
    pub fn from_block(header: Block<TxHash>, requested: Option<u64>) -> Result<Self, SourceError> {
        let (number, hash) = match (header.number, header.hash) {
            (Some(n), Some(h)) => (n.as_u64(), h),
            _ => return Err(SourceError::MissingHeader(requested)),
        };
        if let Some(want) = requested {
            if number != want {
                return Err(SourceError::NumberMismatch { want, got: number });
            }
        }
        let info = BlockInfo {
            number,
            hash,
            parent_hash: header.parent_hash,
        };
        Ok(Self { info, header })
    }
}

#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// The remote's self-reported client/version string, unmodified.
    async fn version(&self) -> anyhow::Result<String>;

    /// Header at the given height, or the latest one when `None`.
    async fn header_by_number(&self, number: Option<u64>) -> Result<SourceHeader, SourceError>;

    /// The node's current set of rejected blocks; empty for sources that
    /// don't expose it.
    async fn bad_blocks(&self) -> anyhow::Result<Vec<BadBlockEntry>>;
}
