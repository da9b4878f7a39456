// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Context;
use async_trait::async_trait;
use ethers::types::{Block, TxHash};
use serde::Deserialize;

use super::{HeaderSource, SourceError, SourceHeader, CALL_TIMEOUT};
use crate::badblocks::BadBlockEntry;

/// An Etherscan-style REST proxy: `eth_getBlockByNumber` wrapped in a
/// `{jsonrpc, id, result}` envelope. No version RPC, no bad blocks.
pub struct EtherscanSource {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

/// The REST envelope around the proxied JSON-RPC response.
#[derive(Debug, Deserialize)]
struct JsonRpcReply {
    #[serde(default)]
    result: Option<Block<TxHash>>,
}

impl EtherscanSource {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl HeaderSource for EtherscanSource {
    async fn version(&self) -> anyhow::Result<String> {
        Ok("Etherscan".to_string())
    }

    async fn header_by_number(&self, number: Option<u64>) -> Result<SourceHeader, SourceError> {
        let tag = match number {
            Some(n) => format!("{n:#x}"),
            None => "latest".to_string(),
        };
        // e.g. https://api.etherscan.io/api?module=proxy&action=eth_getBlockByNumber&tag=0x10d4f&boolean=true&apikey=...
        let url = format!(
            "{}?module=proxy&action=eth_getBlockByNumber&tag={}&boolean=true&apikey={}",
            self.url, tag, self.api_key
        );
        let reply: JsonRpcReply = self
            .client
            .get(&url)
            .timeout(CALL_TIMEOUT)
            .send()
            .await
            .context("etherscan request failed")
            .map_err(SourceError::Transport)?
            .json()
            .await
            .context("etherscan returned an invalid envelope")
            .map_err(SourceError::Transport)?;
        let block = reply.result.ok_or(SourceError::MissingHeader(number))?;
        SourceHeader::from_block(block, number)
    }

    async fn bad_blocks(&self) -> anyhow::Result<Vec<BadBlockEntry>> {
        Ok(Vec::new())
    }
}
