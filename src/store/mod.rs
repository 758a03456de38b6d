use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Plain key -> value strings. Written only by SET and DEL.
#[derive(Debug, Default)]
pub struct StringKeyspace {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

/// Key -> (field -> value) maps. Written only by HSET and DEL.
#[derive(Debug, Default)]
pub struct HashKeyspace {
    data: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

/// The in-memory database: two independently locked keyspaces.
///
/// Lock order, wherever both are needed: strings first, then hashes.
/// A key may live in both keyspaces at once; nothing enforces a single type
/// per key.
#[derive(Debug, Default)]
pub struct Store {
    strings: StringKeyspace,
    hashes: HashKeyspace,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let strings = self.strings.data.read().await;
        strings.get(key).cloned()
    }

    pub async fn set(&self, key: String, value: Vec<u8>) {
        let mut strings = self.strings.data.write().await;
        strings.insert(key, value);
    }

    /// Remove `key` from both keyspaces. Returns true if it was in either.
    ///
    /// The two removals are not atomic together: the string side is released
    /// before the hash side is locked.
    pub async fn del(&self, key: &str) -> bool {
        let removed_string = {
            let mut strings = self.strings.data.write().await;
            strings.remove(key).is_some()
        };
        let removed_hash = {
            let mut hashes = self.hashes.data.write().await;
            hashes.remove(key).is_some()
        };
        removed_string || removed_hash
    }

    pub async fn hset(&self, key: String, field: String, value: Vec<u8>) {
        let mut hashes = self.hashes.data.write().await;
        hashes.entry(key).or_default().insert(field, value);
    }

    pub async fn hget(&self, key: &str, field: &str) -> Option<Vec<u8>> {
        let hashes = self.hashes.data.read().await;
        hashes.get(key)?.get(field).cloned()
    }

    /// Snapshot of every field/value pair under `key`, copied while the read
    /// lock is held. `None` if the key has no hash.
    pub async fn hgetall(&self, key: &str) -> Option<Vec<(String, Vec<u8>)>> {
        let hashes = self.hashes.data.read().await;
        hashes.get(key).map(|fields| {
            fields
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()
        })
    }

    /// Number of keys held in the string and hash keyspaces respectively.
    pub async fn key_counts(&self) -> (usize, usize) {
        let strings = self.strings.data.read().await.len();
        let hashes = self.hashes.data.read().await.len();
        (strings, hashes)
    }
}

pub type SharedStore = Arc<Store>;
