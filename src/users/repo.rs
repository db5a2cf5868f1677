use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde_json::Value;
use thiserror::Error;
use tokio::{fs, sync::RwLock};
use tracing::{debug, info, warn};

use super::repo_types::{normalize_record, UserRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user store i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("user store is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("user {0} already exists")]
    Conflict(String),
}

/// Every user record, held in memory and written back as one JSON document
/// after each mutation.
///
/// All writers go through the same lock, and the lock is held until the
/// snapshot is on disk, so writes never interleave. Records that could not be
/// decoded are kept verbatim and written back with every snapshot.
#[derive(Debug)]
pub struct UserStore {
    path: Option<PathBuf>,
    users: RwLock<BTreeMap<String, UserRecord>>,
    unreadable: BTreeMap<String, Value>,
}

impl UserStore {
    /// Loads the store at `path`. A missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let Decoded { users, unreadable } = match fs::read(&path).await {
            Ok(bytes) => decode_users(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "user store not found; starting empty");
                Decoded::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self {
            path: Some(path),
            users: RwLock::new(users),
            unreadable,
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            users: RwLock::new(BTreeMap::new()),
            unreadable: BTreeMap::new(),
        }
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn contains(&self, username: &str) -> bool {
        self.unreadable.contains_key(username) || self.users.read().await.contains_key(username)
    }

    pub async fn get(&self, username: &str) -> Option<UserRecord> {
        self.users.read().await.get(username).cloned()
    }

    pub async fn insert(&self, username: &str, record: UserRecord) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(username) || self.unreadable.contains_key(username) {
            return Err(StoreError::Conflict(username.to_owned()));
        }
        users.insert(username.to_owned(), record);
        if let Err(e) = self.persist(&users).await {
            users.remove(username);
            return Err(e);
        }
        Ok(())
    }

    /// Applies `f` to the user's record and persists the result.
    ///
    /// Returns `Ok(None)` for an unknown user. If the snapshot cannot be
    /// written the in-memory record is rolled back.
    pub async fn update<T>(
        &self,
        username: &str,
        f: impl FnOnce(&mut UserRecord) -> T,
    ) -> Result<Option<T>, StoreError> {
        let mut users = self.users.write().await;
        let Some(record) = users.get_mut(username) else {
            return Ok(None);
        };
        let before = record.clone();
        let out = f(record);

        if let Err(e) = self.persist(&users).await {
            users.insert(username.to_owned(), before);
            return Err(e);
        }
        Ok(Some(out))
    }

    async fn persist(&self, users: &BTreeMap<String, UserRecord>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut snapshot = serde_json::to_value(users)?;
        if let Some(all) = snapshot.as_object_mut() {
            for (username, raw) in &self.unreadable {
                all.insert(username.clone(), raw.clone());
            }
        }
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| io_err(parent, source))?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)
            .await
            .map_err(|source| io_err(&tmp, source))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|source| io_err(path, source))?;

        debug!(path = %path.display(), users = users.len(), bytes = bytes.len(), "user store saved");
        Ok(())
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Default)]
struct Decoded {
    users: BTreeMap<String, UserRecord>,
    unreadable: BTreeMap<String, Value>,
}

/// Decodes a store snapshot, normalizing each record first. A record that
/// still fails to decode is set aside untouched instead of failing the load.
fn decode_users(bytes: &[u8]) -> Result<Decoded, StoreError> {
    let mut decoded = Decoded::default();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(decoded);
    }
    let raw: BTreeMap<String, Value> = serde_json::from_slice(bytes)?;

    for (username, original) in raw {
        let mut value = original.clone();
        if normalize_record(&mut value) {
            debug!(%username, "back-filled missing user fields");
        }
        match serde_json::from_value::<UserRecord>(value) {
            Ok(record) => {
                decoded.users.insert(username, record);
            }
            Err(e) => {
                warn!(%username, error = %e, "keeping undecodable user record as stored");
                decoded.unreadable.insert(username, original);
            }
        }
    }
    Ok(decoded)
}
