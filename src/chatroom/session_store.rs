//! Durable storage of finished sessions.
//!
//! [`SessionStore`] is the seam the chat room saves through. The store is the only
//! authority for session ids: callers hand over a [`NewSession`] and get back the
//! id it was written under.
//!
//! [`JsonFileSessionStore`] keeps one pretty-printed JSON file per session in a
//! single directory:
//!
//! ```text
//! experiments/
//! ├── experiment_1718000000000.json
//! └── experiment_1718000004521.json
//! ```
//!
//! Ids are `experiment_<unix millis>`. Within one store instance they strictly
//! increase even when two saves land in the same millisecond, and files are
//! created exclusively so an existing session is never overwritten.
//!
//! # Example
//!
//! ```rust,no_run
//! use chatroom::session_store::{JsonFileSessionStore, SessionStore};
//!
//! # async {
//! let store = JsonFileSessionStore::new("experiments");
//! for session in store.get_all_sessions().await.unwrap() {
//!     println!("{} {}", session.id, session.label());
//! }
//! # };
//! ```

use crate::chatroom::error::ChatRoomError;
use crate::chatroom::session::{NewSession, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const ID_PREFIX: &str = "experiment_";

/// Persistence for finished sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session and return its freshly minted id.
    async fn save_session(&self, session: NewSession) -> Result<String, ChatRoomError>;

    /// Look up a session by id.
    ///
    /// - `Ok(Some(session))`: found
    /// - `Ok(None)`: no session with that id
    /// - `Err(_)`: the store could not be read or the record is corrupt
    async fn get_session(&self, id: &str) -> Result<Option<Session>, ChatRoomError>;

    /// Every stored session, most recent first.
    ///
    /// An unreadable record fails the whole listing instead of being skipped.
    async fn get_all_sessions(&self) -> Result<Vec<Session>, ChatRoomError>;
}

/// One JSON file per session in a directory.
pub struct JsonFileSessionStore {
    dir: PathBuf,
    last_millis: Mutex<i64>,
}

impl JsonFileSessionStore {
    /// The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonFileSessionStore {
            dir: dir.into(),
            last_millis: Mutex::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read_session(&self, path: &Path) -> Result<Option<Session>, ChatRoomError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                log::error!(
                    "JsonFileSessionStore::read_session(...): cannot read {}: {}",
                    path.display(),
                    e
                );
                return Err(ChatRoomError::Persistence(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str::<Session>(&raw).map(Some).map_err(|e| {
            log::error!(
                "JsonFileSessionStore::read_session(...): corrupt session file {}: {}",
                path.display(),
                e
            );
            ChatRoomError::Persistence(format!("corrupt session file {}: {}", path.display(), e))
        })
    }
}

/// Only ids this store could have minted are accepted, which also keeps lookups
/// inside the store directory.
fn is_valid_id(id: &str) -> bool {
    id.strip_prefix(ID_PREFIX)
        .map(|millis| !millis.is_empty() && millis.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

fn persistence(context: &str, e: impl std::fmt::Display) -> ChatRoomError {
    ChatRoomError::Persistence(format!("{}: {}", context, e))
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn save_session(&self, session: NewSession) -> Result<String, ChatRoomError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| persistence(&format!("cannot create {}", self.dir.display()), e))?;

        // Held for the whole write so saves through this instance are serialized.
        let mut last_millis = self.last_millis.lock().await;
        let mut millis = Utc::now().timestamp_millis().max(*last_millis + 1);

        loop {
            let id = format!("{}{}", ID_PREFIX, millis);
            let path = self.path_for(&id);
            let timestamp: DateTime<Utc> =
                DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now);
            let record = session.clone().into_session(id.clone(), timestamp);
            let body = serde_json::to_string_pretty(&record)
                .map_err(|e| persistence("cannot serialize session", e))?;

            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            let mut file = match file {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    log::debug!(
                        "JsonFileSessionStore::save_session(...): {} already taken",
                        id
                    );
                    millis += 1;
                    continue;
                }
                Err(e) => {
                    return Err(persistence(&format!("cannot create {}", path.display()), e));
                }
            };

            file.write_all(body.as_bytes())
                .await
                .map_err(|e| persistence(&format!("cannot write {}", path.display()), e))?;
            file.sync_all()
                .await
                .map_err(|e| persistence(&format!("cannot sync {}", path.display()), e))?;

            *last_millis = millis;
            log::info!(
                "JsonFileSessionStore::save_session(...): saved {} to {}",
                id,
                path.display()
            );
            return Ok(id);
        }
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, ChatRoomError> {
        if !is_valid_id(id) {
            log::debug!("JsonFileSessionStore::get_session(...): unknown id '{}'", id);
            return Ok(None);
        }
        self.read_session(&self.path_for(id)).await
    }

    async fn get_all_sessions(&self) -> Result<Vec<Session>, ChatRoomError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(persistence(
                    &format!("cannot list {}", self.dir.display()),
                    e,
                ))
            }
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| persistence(&format!("cannot list {}", self.dir.display()), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(session) = self.read_session(&path).await? {
                sessions.push(session);
            }
        }

        sessions.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(sessions)
    }
}
