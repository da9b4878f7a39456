// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use rocksdb::Options;

#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    pub create_if_missing: bool,
    pub max_open_files: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_open_files: 256,
        }
    }
}

impl From<&RocksDbConfig> for Options {
    fn from(cfg: &RocksDbConfig) -> Self {
        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.set_max_open_files(cfg.max_open_files);
        opts
    }
}
