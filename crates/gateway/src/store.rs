//! State Store — durable, atomic, file-backed collections.
//!
//! Each collection (tasks, grants, dynamic rules) is one JSON document on
//! disk of the shape `{ "items": [...] }`, newest-first. Writes are atomic:
//! serialize to a sibling temp file in the same directory, then rename over
//! the target. A `parking_lot::Mutex` around the in-memory mirror serializes
//! writers within the process and gives callers a total order consistent
//! with call-return order. Reads tolerate a missing file by returning the
//! empty shape.
//!
//! The admin-pairing record is a single document, not a list; see
//! [`SingleDocStore`].

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use portero_core::error::{Error, Result};

/// Implemented by every type that can live in a [`JsonDocStore`] collection.
pub trait HasId {
    fn id(&self) -> Uuid;
}

#[derive(Serialize, serde::Deserialize)]
struct Doc<T> {
    #[serde(default)]
    items: Vec<T>,
}

/// Atomically replace `path`'s contents: write to `<path>.tmp-<uuid>` in the
/// same directory, then rename over the target. The rename is the only
/// durability primitive used — no fsync.
fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        "{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("doc"),
        Uuid::new_v4()
    ));
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// A document-backed collection of `T`, one JSON file per collection.
pub struct JsonDocStore<T> {
    path: PathBuf,
    items: Mutex<Vec<T>>,
}

impl<T> JsonDocStore<T>
where
    T: Clone + Serialize + DeserializeOwned + HasId,
{
    /// Load the collection from `path`. A missing file is not an error —
    /// it's the documented empty shape.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = match fs::read(&path) {
            Ok(bytes) => {
                let doc: Doc<T> = serde_json::from_slice(&bytes)?;
                doc.items
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::from(e)),
        };
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    fn persist(&self, items: &[T]) -> Result<()> {
        let doc = Doc {
            items: items.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&doc)?;
        atomic_write(&self.path, &bytes)
            .map_err(|e| Error::Store(format!("writing {}: {e}", self.path.display())))
    }

    /// Insert `item` at the front (insertion-newest-first) and persist.
    pub fn create(&self, item: T) -> Result<T> {
        let mut guard = self.items.lock();
        guard.insert(0, item.clone());
        self.persist(&guard)?;
        Ok(item)
    }

    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.items.lock().iter().find(|i| i.id() == *id).cloned()
    }

    /// Read-modify-write a single item. `mutator` runs under the collection
    /// lock, so concurrent `update`s on this collection are serialized.
    pub fn update(&self, id: &Uuid, mutator: impl FnOnce(&mut T)) -> Result<Option<T>> {
        let mut guard = self.items.lock();
        let Some(item) = guard.iter_mut().find(|i| i.id() == *id) else {
            return Ok(None);
        };
        mutator(item);
        let updated = item.clone();
        self.persist(&guard)?;
        Ok(Some(updated))
    }

    /// Like [`update`](Self::update), but the mutator may reject the
    /// change (e.g. an FSM guard) by returning `Err`. Mutates a clone
    /// first, so a rejected mutation leaves the stored item untouched —
    /// `mutator` may freely inspect-then-mutate within one closure.
    pub fn try_update(&self, id: &Uuid, mutator: impl FnOnce(&mut T) -> Result<()>) -> Result<Option<T>> {
        let mut guard = self.items.lock();
        let Some(idx) = guard.iter().position(|i| i.id() == *id) else {
            return Ok(None);
        };
        let mut candidate = guard[idx].clone();
        mutator(&mut candidate)?;
        guard[idx] = candidate.clone();
        self.persist(&guard)?;
        Ok(Some(candidate))
    }

    pub fn remove(&self, id: &Uuid) -> Result<bool> {
        let mut guard = self.items.lock();
        let before = guard.len();
        guard.retain(|i| i.id() != *id);
        let removed = guard.len() != before;
        if removed {
            self.persist(&guard)?;
        }
        Ok(removed)
    }

    /// List items matching `filter`, already in insertion-newest-first
    /// order, truncated to `limit`.
    pub fn list(&self, filter: impl Fn(&T) -> bool, limit: usize) -> Vec<T> {
        self.items
            .lock()
            .iter()
            .filter(|i| filter(i))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single-record document (the admin pairing). Not a list — there is
/// exactly one value, created with `T::default()` if the file is absent.
pub struct SingleDocStore<T> {
    path: PathBuf,
    value: Mutex<T>,
}

impl<T> SingleDocStore<T>
where
    T: Clone + Default + Serialize + DeserializeOwned,
{
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let value = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
            Err(e) => return Err(Error::from(e)),
        };
        Ok(Self {
            path,
            value: Mutex::new(value),
        })
    }

    pub fn get(&self) -> T {
        self.value.lock().clone()
    }

    pub fn update(&self, mutator: impl FnOnce(&mut T)) -> Result<T> {
        let mut guard = self.value.lock();
        mutator(&mut guard);
        let bytes = serde_json::to_vec_pretty(&*guard)?;
        atomic_write(&self.path, &bytes)
            .map_err(|e| Error::Store(format!("writing {}: {e}", self.path.display())))?;
        Ok(guard.clone())
    }
}

/// Import-only handling of the vestigial `approvals` collection (see the
/// open question in the design notes): if `tasks.json` is absent and
/// `approvals.json` exists, read its item count once and discard it. No
/// code path ever writes `approvals.json`.
pub fn import_legacy_approvals(base_dir: &Path) -> usize {
    let tasks_path = base_dir.join("tasks.json");
    let approvals_path = base_dir.join("approvals.json");
    if tasks_path.exists() || !approvals_path.exists() {
        return 0;
    }
    match fs::read(&approvals_path) {
        Ok(bytes) => match serde_json::from_slice::<Doc<serde_json::Value>>(&bytes) {
            Ok(doc) => doc.items.len(),
            Err(e) => {
                tracing::warn!(error = %e, "legacy approvals.json present but unparseable, ignoring");
                0
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "failed to read legacy approvals.json, ignoring");
            0
        }
    }
}
