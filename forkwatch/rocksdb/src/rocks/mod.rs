// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT

use rocksdb::{Options, DB};
use std::{path::Path, sync::Arc};

mod config;
mod error;

pub use config::RocksDbConfig;
pub use error::Error;

/// `RocksDb` is used as the KV store behind the header store. Unlike the
/// blockstore variants elsewhere in the ecosystem this one is a plain `DB`:
/// the monitor only ever does point reads and idempotent point writes, so
/// transactions and column families would be dead weight.
///
/// Usage:
/// ```no_run
/// use forkwatch_rocksdb::{RocksDb, RocksDbConfig};
///
/// let db = RocksDb::open("test_db", &RocksDbConfig::default()).unwrap();
/// ```
#[derive(Clone)]
pub struct RocksDb {
    db: Arc<DB>,
}

impl RocksDb {
    pub fn open<P>(path: P, config: &RocksDbConfig) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let db_opts: Options = config.into();
        let db = DB::open(&db_opts, path)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn read<K>(&self, key: K) -> Result<Option<Vec<u8>>, Error>
    where
        K: AsRef<[u8]>,
    {
        self.db.get(key).map_err(Error::from)
    }

    pub fn write<K, V>(&self, key: K, value: V) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        Ok(self.db.put(key, value)?)
    }

    pub fn delete<K>(&self, key: K) -> Result<(), Error>
    where
        K: AsRef<[u8]>,
    {
        Ok(self.db.delete(key)?)
    }

    pub fn exists<K>(&self, key: K) -> Result<bool, Error>
    where
        K: AsRef<[u8]>,
    {
        self.db
            .get_pinned(key)
            .map(|v| v.is_some())
            .map_err(Error::from)
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush().map_err(|e| Error::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{RocksDb, RocksDbConfig};

    #[test]
    fn write_read_exists() {
        let dir = tempfile::Builder::new()
            .tempdir()
            .expect("error creating temporary path for db");
        let path = dir.path().join("rocksdb");

        let db = RocksDb::open(&path, &RocksDbConfig::default()).expect("error creating RocksDB");
        assert!(!db.exists(b"foo").unwrap());

        db.write(b"foo", b"bar").unwrap();
        assert!(db.exists(b"foo").unwrap());
        assert_eq!(db.read(b"foo").unwrap(), Some(b"bar".to_vec()));

        // Survives a close and reopen.
        drop(db);
        let db = RocksDb::open(&path, &RocksDbConfig::default()).expect("error reopening RocksDB");
        assert_eq!(db.read(b"foo").unwrap(), Some(b"bar".to_vec()));

        db.delete(b"foo").unwrap();
        assert_eq!(db.read(b"foo").unwrap(), None);
    }
}
