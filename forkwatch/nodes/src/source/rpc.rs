// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{BlockId, BlockNumber};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use super::{HeaderSource, SourceError, SourceHeader, CALL_TIMEOUT};
use crate::badblocks::BadBlockEntry;

/// A node reachable over plain JSON-RPC. Uses `web3_clientVersion`,
/// `eth_getBlockByNumber` and `debug_getBadBlocks`.
pub struct RpcSource {
    provider: Provider<Http>,
}

impl RpcSource {
    /// Connect to a JSON-RPC endpoint. `auth_headers` are colon-separated
    /// `key: value` pairs sent with every request.
    pub fn new(url: &str, auth_headers: &[String]) -> anyhow::Result<Self> {
        let url: Url = url.parse().with_context(|| format!("invalid url {url}"))?;
        let mut headers = HeaderMap::new();
        for hdr in auth_headers {
            let (key, value) = hdr
                .split_once(": ")
                .ok_or_else(|| anyhow!("expected colon-separated key-value pair, got {hdr}"))?;
            headers.insert(
                HeaderName::from_bytes(key.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        let client = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            provider: Provider::new(Http::new_with_client(url, client)),
        })
    }
}

#[async_trait]
impl HeaderSource for RpcSource {
    async fn version(&self) -> anyhow::Result<String> {
        self.provider
            .client_version()
            .await
            .context("web3_clientVersion failed")
    }

    async fn header_by_number(&self, number: Option<u64>) -> Result<SourceHeader, SourceError> {
        let id: BlockId = match number {
            Some(n) => BlockNumber::Number(n.into()).into(),
            None => BlockNumber::Latest.into(),
        };
        let block = self
            .provider
            .get_block(id)
            .await
            .map_err(|e| SourceError::Transport(e.into()))?
            .ok_or(SourceError::MissingHeader(number))?;
        SourceHeader::from_block(block, number)
    }

    async fn bad_blocks(&self) -> anyhow::Result<Vec<BadBlockEntry>> {
        // Not all clients expose the debug namespace; the caller treats
        // an error the same as an empty list.
        self.provider
            .request("debug_getBadBlocks", ())
            .await
            .context("debug_getBadBlocks failed")
    }
}
