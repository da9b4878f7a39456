// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Prometheus metrics

use lazy_static::lazy_static;
use paste::paste;
use prometheus::{IntGauge, IntGaugeVec, Opts, Registry};

macro_rules! metrics {
        ($($name:ident : $type:ty = $desc:literal);* $(;)?) => {
            $(
              paste! {
                lazy_static! {
                    pub static ref $name: $type = $type::new(stringify!([< $name:lower >]), $desc).unwrap();
                }
              }
            )*

            pub fn register_metrics(registry: &Registry) -> anyhow::Result<()> {
                $(registry.register(Box::new($name.clone()))?;)*
                registry.register(Box::new(NODE_HEAD.clone()))?;
                Ok(())
            }
        };
    }

// The per-node head gauge carries a label, which the macro shape above
// doesn't cover, so it is declared by hand and registered alongside.
lazy_static! {
    pub static ref NODE_HEAD: IntGaugeVec = IntGaugeVec::new(
        Opts::new("node_head", "Latest block number advertised by a node"),
        &["node"],
    )
    .unwrap();
}

metrics! {
    CHAIN_SPLIT: IntGauge = "Largest number of blocks in any chain not accepted by all nodes";
    CHAIN_BAD_BLOCK: IntGauge = "Number of the most recently observed bad block";
}

#[cfg(test)]
mod tests {
    #[test]
    fn can_register_metrics() {
        let r = prometheus::Registry::new();
        super::register_metrics(&r).unwrap();
    }
}
