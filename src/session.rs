//! Per-session upload slots.
//!
//! Each browser session owns one slot holding the bytes of its most recent
//! upload (last write wins). Handlers look the slot up by id and re-run the
//! whole pipeline from those bytes on every interaction, so sessions never
//! see each other's data. The store is bounded; the least recently written
//! session is evicted once `capacity` is reached.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DashboardError, Result};

// ---

/// Raw dataset kept for a session.
#[derive(Debug, Clone)]
pub struct Upload {
    // ---
    /// Client file name, or the source URL for remote fetches.
    pub source: String,
    pub bytes: Arc<Vec<u8>>,
}

impl Upload {
    pub fn new(source: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            bytes: Arc::new(bytes),
        }
    }
}

#[derive(Debug, Default)]
struct Slots {
    uploads: HashMap<Uuid, Upload>,
    order: VecDeque<Uuid>,
}

/// Cloneable handle to the shared session map.
#[derive(Debug, Clone)]
pub struct SessionStore {
    // ---
    slots: Arc<RwLock<Slots>>,
    capacity: usize,
}

impl SessionStore {
    // ---
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(RwLock::new(Slots::default())),
            capacity: capacity.max(1),
        }
    }

    /// Store `upload` under a fresh session id.
    pub async fn create(&self, upload: Upload) -> Uuid {
        // ---
        let id = Uuid::new_v4();
        let mut slots = self.slots.write().await;

        while slots.order.len() >= self.capacity {
            if let Some(evicted) = slots.order.pop_front() {
                slots.uploads.remove(&evicted);
                debug!("Evicted session {}", evicted);
            }
        }

        slots.uploads.insert(id, upload);
        slots.order.push_back(id);
        id
    }

    /// Overwrite the upload of an existing session and mark it most recent.
    pub async fn replace(&self, id: Uuid, upload: Upload) -> Result<()> {
        // ---
        let mut slots = self.slots.write().await;
        match slots.uploads.get_mut(&id) {
            Some(slot) => {
                *slot = upload;
                slots.order.retain(|queued| *queued != id);
                slots.order.push_back(id);
                Ok(())
            }
            None => Err(DashboardError::UnknownSession(id.to_string())),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Upload> {
        // ---
        self.slots
            .read()
            .await
            .uploads
            .get(&id)
            .cloned()
            .ok_or_else(|| DashboardError::UnknownSession(id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.uploads.len()
    }
}

/// Parse a session id from a path segment; malformed ids are unknown sessions.
pub fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| DashboardError::UnknownSession(raw.to_string()))
}
