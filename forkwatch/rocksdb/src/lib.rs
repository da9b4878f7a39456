// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
mod rocks;

pub use rocks::{Error as RocksDbError, RocksDb, RocksDbConfig};
