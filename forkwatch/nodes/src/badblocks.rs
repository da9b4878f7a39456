// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

//! Bad blocks: blocks a node has rejected as invalid and kept around for
//! diagnostics, as returned by the `debug_getBadBlocks` RPC.

use anyhow::Context;
use ethers::types::{Bytes, H160, H256, U256};
use rlp::Rlp;
use serde::{Deserialize, Serialize};

/// One element of the `debug_getBadBlocks` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadBlockEntry {
    pub hash: H256,
    pub rlp: String,
    #[serde(default)]
    pub block: serde_json::Value,
}

/// A bad block merged across the nodes that reported it. `clients` is the
/// set of reporting node names; it only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BadBlock {
    pub clients: Vec<String>,
    pub hash: H256,
    #[serde(rename = "RLP")]
    pub rlp: String,
    pub number: Option<U256>,
    pub parent_hash: Option<H256>,
    pub time: Option<u64>,
    pub extra: Option<Bytes>,
    pub coinbase: Option<H160>,
    pub root: Option<H256>,
}

/// Header fields recovered from the RLP envelope of a bad block.
struct DecodedHeader {
    parent_hash: H256,
    coinbase: H160,
    root: H256,
    number: U256,
    time: u64,
    extra: Bytes,
}

/// Build a [BadBlock] from a node's raw report, decoding what we can from
/// the RLP payload. Decode failures leave the optional fields empty, they
/// don't drop the report.
pub fn from_entry(entry: &BadBlockEntry, reporter: &str) -> BadBlock {
    let mut bad = BadBlock {
        clients: vec![reporter.to_string()],
        hash: entry.hash,
        rlp: entry.rlp.clone(),
        number: None,
        parent_hash: None,
        time: None,
        extra: None,
        coinbase: None,
        root: None,
    };
    match decode_block_rlp(&entry.rlp) {
        Ok(hdr) => {
            bad.number = Some(hdr.number);
            bad.parent_hash = Some(hdr.parent_hash);
            bad.time = Some(hdr.time);
            bad.extra = Some(hdr.extra);
            bad.coinbase = Some(hdr.coinbase);
            bad.root = Some(hdr.root);
        }
        Err(e) => {
            tracing::warn!(error = e.to_string(), "error decoding bad block");
        }
    }
    bad
}

/// Decode `[header, transactions, uncles]` and pull the interesting header
/// fields out by their fixed positions.
fn decode_block_rlp(rlp_hex: &str) -> anyhow::Result<DecodedHeader> {
    let raw = hex::decode(rlp_hex.trim_start_matches("0x")).context("invalid hex")?;
    let block = Rlp::new(&raw);
    let header = block.at(0).context("block envelope has no header")?;
    Ok(DecodedHeader {
        parent_hash: header.val_at(0).context("parent hash")?,
        coinbase: header.val_at(2).context("coinbase")?,
        root: header.val_at(3).context("state root")?,
        number: header.val_at(8).context("number")?,
        time: header.val_at(11).context("time")?,
        extra: header
            .val_at::<Vec<u8>>(12)
            .context("extra data")?
            .into(),
    })
}
