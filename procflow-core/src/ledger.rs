//! Per-container YAML ledger and the file-backed [`FileStore`].
//!
//! # Storage layout
//!
//! ```text
//! ~/.procflow/
//!   config.yaml
//!   containers/
//!     <container_id>.yaml   (one ledger per process table — mode 0600)
//!   state/
//!     <container_id>.json   (last sync fingerprints, owned by procflow-sync)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::store::{MemoryStore, RecordStore, StoreOp};
use crate::types::{Container, ContainerId, NewRecord, ProcessRecord, RecordId, RecordPatch};

pub const LEDGER_VERSION: u32 = 1;

/// On-disk payload of one container file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLedger {
    pub version: u32,
    pub container: Container,
    #[serde(default)]
    pub records: Vec<ProcessRecord>,
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.procflow/`
pub fn procflow_root(home: &Path) -> PathBuf {
    home.join(".procflow")
}

/// `<home>/.procflow/containers/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn containers_dir_at(home: &Path) -> Result<PathBuf, StoreError> {
    let dir = procflow_root(home).join("containers");
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.procflow/containers/<container>.yaml` — pure, no I/O.
pub fn container_path_at(home: &Path, container: &ContainerId) -> PathBuf {
    procflow_root(home)
        .join("containers")
        .join(format!("{}.yaml", container.0))
}

/// Container ids double as file names.
pub fn validate_container_id(container: &ContainerId) -> Result<(), StoreError> {
    let value = container.0.as_str();
    if value.trim().is_empty() {
        return Err(StoreError::Rejected("container id must not be empty".into()));
    }
    if value.starts_with('.') {
        return Err(StoreError::Rejected(
            "container id must not start with '.'".into(),
        ));
    }
    if value.contains(['/', '\\']) {
        return Err(StoreError::Rejected(
            "container id must not contain path separators".into(),
        ));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(StoreError::Rejected(
            "container id contains control characters".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load one container ledger.
///
/// Returns `StoreError::ContainerNotFound` if absent,
/// `StoreError::Parse` (with path + line context) if malformed YAML.
pub fn load_container_at(
    home: &Path,
    container: &ContainerId,
) -> Result<ContainerLedger, StoreError> {
    let path = container_path_at(home, container);
    if !path.exists() {
        return Err(StoreError::ContainerNotFound {
            container: container.clone(),
        });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })
}

/// Every ledger under `<home>/.procflow/containers/`, sorted by file name.
///
/// Skips `.tmp` leftovers from interrupted writes.
pub fn list_containers_at(home: &Path) -> Result<Vec<ContainerLedger>, StoreError> {
    let dir = procflow_root(home).join("containers");
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut entries: Vec<_> = std::fs::read_dir(&dir)
        .map_err(|e| io_err(&dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut result = Vec::new();
    for entry in entries {
        let fname = entry.file_name();
        let name = fname.to_string_lossy();
        if !name.ends_with(".yaml") {
            continue;
        }
        let path = entry.path();
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let ledger: ContainerLedger =
            serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })?;
        result.push(ledger);
    }
    Ok(result)
}

/// `list_containers_at` convenience wrapper.
pub fn list_containers() -> Result<Vec<ContainerLedger>, StoreError> {
    list_containers_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a container ledger.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_container_at(home: &Path, ledger: &ContainerLedger) -> Result<(), StoreError> {
    validate_container_id(&ledger.container.id)?;
    containers_dir_at(home)?;
    let path = container_path_at(home, &ledger.container.id);
    let tmp_path = path.with_file_name(format!("{}.yaml.tmp", ledger.container.id.0));

    let yaml = serde_yaml::to_string(ledger)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Create an empty container ledger.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
pub fn init_container_at(
    home: &Path,
    container: ContainerId,
    name: impl Into<String>,
) -> Result<ContainerLedger, StoreError> {
    validate_container_id(&container)?;
    if container_path_at(home, &container).exists() {
        return load_container_at(home, &container);
    }

    let ledger = ContainerLedger {
        version: LEDGER_VERSION,
        container: Container {
            id: container,
            name: name.into(),
            created_at: Utc::now(),
        },
        records: vec![],
    };
    save_container_at(home, &ledger)?;
    tracing::info!("initialized container '{}'", ledger.container.id);
    Ok(ledger)
}

/// `init_container_at` convenience wrapper.
pub fn init_container(
    container: ContainerId,
    name: impl Into<String>,
) -> Result<ContainerLedger, StoreError> {
    init_container_at(&home()?, container, name)
}

// ---------------------------------------------------------------------------
// 5. FileStore
// ---------------------------------------------------------------------------

/// [`RecordStore`] over the YAML ledger.
///
/// All ledgers are loaded on open; each successful mutation rewrites the
/// touched container file before returning.
#[derive(Debug)]
pub struct FileStore {
    home: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    pub fn open_at(home: &Path) -> Result<Self, StoreError> {
        let mut inner = MemoryStore::new();
        for ledger in list_containers_at(home)? {
            inner.restore(ledger.container, ledger.records);
        }
        Ok(Self {
            home: home.to_path_buf(),
            inner,
        })
    }

    /// `open_at` convenience wrapper.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&home()?)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn containers(&self) -> Vec<Container> {
        self.inner.containers().cloned().collect()
    }

    /// Create and persist a new container.
    pub fn create_container(
        &mut self,
        id: ContainerId,
        name: impl Into<String>,
    ) -> Result<Container, StoreError> {
        validate_container_id(&id)?;
        let touched = [id.clone()];
        self.staged(&touched, |inner| inner.create_container(id, name))
    }

    /// Run `change` on a copy of the working set, write every touched
    /// container from that copy, then adopt it.
    ///
    /// A failed write leaves the working set as it was and puts back any
    /// container file already rewritten in this call.
    fn staged<T>(
        &mut self,
        touched: &[ContainerId],
        change: impl FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut staged = self.inner.clone();
        let out = change(&mut staged)?;

        for (written, container) in touched.iter().enumerate() {
            if let Err(e) = persist(&self.home, &staged, container) {
                for done in &touched[..written] {
                    if let Err(restore) = persist(&self.home, &self.inner, done) {
                        tracing::warn!("could not restore ledger '{done}': {restore}");
                    }
                }
                return Err(e);
            }
        }
        self.inner = staged;
        Ok(out)
    }

    fn container_of(&self, id: &RecordId) -> Result<ContainerId, StoreError> {
        self.inner
            .get_by_id(id)?
            .map(|r| r.container_id)
            .ok_or_else(|| StoreError::RecordNotFound { id: id.clone() })
    }
}

impl RecordStore for FileStore {
    fn container_exists(&self, container: &ContainerId) -> Result<bool, StoreError> {
        self.inner.container_exists(container)
    }

    fn get_by_container(
        &self,
        container: &ContainerId,
    ) -> Result<Vec<ProcessRecord>, StoreError> {
        self.inner.get_by_container(container)
    }

    fn get_by_id(&self, id: &RecordId) -> Result<Option<ProcessRecord>, StoreError> {
        self.inner.get_by_id(id)
    }

    fn insert(&mut self, record: NewRecord) -> Result<RecordId, StoreError> {
        let touched = [record.container_id.clone()];
        self.staged(&touched, |inner| inner.insert(record))
    }

    fn update(&mut self, id: &RecordId, patch: RecordPatch) -> Result<(), StoreError> {
        let touched = [self.container_of(id)?];
        self.staged(&touched, |inner| inner.update(id, patch))
    }

    fn delete(&mut self, id: &RecordId) -> Result<(), StoreError> {
        let touched = [self.container_of(id)?];
        self.staged(&touched, |inner| inner.delete(id))
    }

    fn apply_batch(&mut self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        let mut touched: Vec<ContainerId> = Vec::new();
        for op in &ops {
            let container = match op {
                StoreOp::Insert(record) => record.container_id.clone(),
                StoreOp::Update { id, .. } | StoreOp::Delete(id) => self.container_of(id)?,
            };
            if !touched.contains(&container) {
                touched.push(container);
            }
        }
        self.staged(&touched, |inner| inner.apply_batch(ops))
    }
}

/// Write one container of `store` to its ledger file.
fn persist(home: &Path, store: &MemoryStore, container: &ContainerId) -> Result<(), StoreError> {
    let Some(meta) = store.container(container) else {
        return Err(StoreError::ContainerNotFound {
            container: container.clone(),
        });
    };
    let ledger = ContainerLedger {
        version: LEDGER_VERSION,
        container: meta.clone(),
        records: store.get_by_container(container)?,
    };
    save_container_at(home, &ledger)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExternalId;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    fn orders() -> ContainerId {
        ContainerId::from("orders")
    }

    #[test]
    fn container_path_is_correct() {
        let home = make_home();
        let path = container_path_at(home.path(), &orders());
        assert!(path.ends_with(".procflow/containers/orders.yaml"));
    }

    #[test]
    fn containers_dir_created_with_perms() {
        let home = make_home();
        let dir = containers_dir_at(home.path()).expect("containers_dir_at");
        assert!(dir.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
        }
    }

    #[test]
    fn init_is_idempotent() {
        let home = make_home();
        let first = init_container_at(home.path(), orders(), "Orders").expect("init");
        let second = init_container_at(home.path(), orders(), "Renamed").expect("init again");
        assert_eq!(first, second);
        assert_eq!(second.container.name, "Orders");
    }

    #[test]
    fn rejects_path_like_container_ids() {
        let home = make_home();
        for bad in ["", "../escape", "a/b", ".hidden"] {
            let err = init_container_at(home.path(), ContainerId::from(bad), "x").unwrap_err();
            assert!(matches!(err, StoreError::Rejected(_)), "{bad:?} accepted");
        }
    }

    #[test]
    fn file_store_persists_every_mutation() {
        let home = make_home();
        init_container_at(home.path(), orders(), "Orders").expect("init");

        let mut store = FileStore::open_at(home.path()).expect("open");
        let id = store
            .insert(NewRecord::new(orders(), "Review").linked_to(ExternalId::from("e1")))
            .expect("insert");
        store
            .update(&id, RecordPatch::rename("Approve"))
            .expect("update");

        let reopened = FileStore::open_at(home.path()).expect("reopen");
        let record = reopened.get_by_id(&id).expect("get").expect("present");
        assert_eq!(record.name, "Approve");
        assert_eq!(record.external_element_id, Some(ExternalId::from("e1")));

        let mut reopened = reopened;
        reopened.delete(&id).expect("delete");
        let ledger = load_container_at(home.path(), &orders()).expect("load");
        assert!(ledger.records.is_empty());
    }

    #[test]
    fn failed_write_leaves_working_set_unchanged() {
        let home = make_home();
        init_container_at(home.path(), orders(), "Orders").expect("init");
        let mut store = FileStore::open_at(home.path()).expect("open");
        let id = store.insert(NewRecord::new(orders(), "Review")).expect("insert");

        // A directory where the temp file goes makes every save fail.
        let blocker = container_path_at(home.path(), &orders()).with_file_name("orders.yaml.tmp");
        std::fs::create_dir(&blocker).expect("blocker");

        let err = store.insert(NewRecord::new(orders(), "Lost")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "got: {err}");
        let err = store.update(&id, RecordPatch::rename("Renamed")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "got: {err}");
        let names: Vec<String> = store
            .get_by_container(&orders())
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Review"]);

        std::fs::remove_dir(&blocker).expect("remove blocker");
        store.insert(NewRecord::new(orders(), "Kept")).expect("insert");
        let on_disk: Vec<String> = load_container_at(home.path(), &orders())
            .expect("load")
            .records
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(on_disk, vec!["Review", "Kept"]);
    }

    #[test]
    fn restore_keeps_ids_and_order() {
        let home = make_home();
        init_container_at(home.path(), orders(), "Orders").expect("init");
        let mut store = FileStore::open_at(home.path()).expect("open");
        let a = store.insert(NewRecord::new(orders(), "a")).unwrap();
        let b = store.insert(NewRecord::new(orders(), "b")).unwrap();

        let reopened = FileStore::open_at(home.path()).expect("reopen");
        let ids: Vec<RecordId> = reopened
            .get_by_container(&orders())
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = make_home();
        init_container_at(home.path(), orders(), "Orders").expect("init");
        let tmp = container_path_at(home.path(), &orders()).with_file_name("orders.yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    fn load_missing_container_returns_not_found() {
        let home = make_home();
        let err = load_container_at(home.path(), &orders()).unwrap_err();
        assert!(matches!(err, StoreError::ContainerNotFound { .. }));
    }

    #[test]
    fn list_containers_empty_when_none() {
        let home = make_home();
        assert!(list_containers_at(home.path()).expect("list").is_empty());
    }
}
