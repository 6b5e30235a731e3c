//! The local connection registry.
//!
//! Named endpoints live in one JSON document in the data directory, split
//! into namespaces: catalogue endpoints (`csw`) and one namespace per OGC
//! service kind. Mutations take a file lock and replace the document
//! atomically, so concurrent invocations cannot shear the file.

pub mod document;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use fslock::LockFile;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::data::Version;
use crate::models::services::ServiceKind;

pub const CONNECTIONS_FILENAME: &str = "connections.json";

/// Errors encountered while interacting with the connection registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("couldn't acquire connection registry file lock")]
    AcquireLock(#[source] fslock::Error),
    #[error("couldn't open connection registry file")]
    OpenRegistry(#[source] std::io::Error),
    #[error("couldn't parse connection registry")]
    ParseRegistry(#[source] serde_json::Error),
    #[error("failed to open temporary file for registry")]
    OpenTmpRegistry(#[source] std::io::Error),
    #[error("failed to write temporary connection registry file")]
    WriteTmpRegistry(#[source] serde_json::Error),
    #[error("failed to rename temporary registry file")]
    RenameRegistry(#[source] tempfile::PersistError),
    #[error("registry file stored in an invalid location: {0}")]
    InvalidRegistryLocation(PathBuf),
    #[error("no {namespace} connection named '{name}'")]
    UnknownConnection {
        namespace: Namespace,
        name: String,
    },
}

/// A registry namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Catalogue (CSW) endpoints.
    Catalogue,
    /// Endpoints registered for one OGC service kind.
    Service(ServiceKind),
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Catalogue => "csw",
            Namespace::Service(kind) => kind.as_str(),
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub name: String,
    pub url: Url,
}

/// One namespace's entries plus its remembered selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ConnectionSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected: Option<String>,
    #[serde(default)]
    entries: Vec<Connection>,
}

impl ConnectionSet {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == name)
    }
}

/// The serialized form of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RegistryDocument {
    version: Version<1>,
    #[serde(default)]
    csw: ConnectionSet,
    #[serde(default)]
    wms: ConnectionSet,
    #[serde(default)]
    wfs: ConnectionSet,
    #[serde(default)]
    wcs: ConnectionSet,
}

impl RegistryDocument {
    fn set(&self, namespace: Namespace) -> &ConnectionSet {
        match namespace {
            Namespace::Catalogue => &self.csw,
            Namespace::Service(ServiceKind::Wms) => &self.wms,
            Namespace::Service(ServiceKind::Wfs) => &self.wfs,
            Namespace::Service(ServiceKind::Wcs) => &self.wcs,
        }
    }

    fn set_mut(&mut self, namespace: Namespace) -> &mut ConnectionSet {
        match namespace {
            Namespace::Catalogue => &mut self.csw,
            Namespace::Service(ServiceKind::Wms) => &mut self.wms,
            Namespace::Service(ServiceKind::Wfs) => &mut self.wfs,
            Namespace::Service(ServiceKind::Wcs) => &mut self.wcs,
        }
    }
}

/// Handle on the registry file.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    path: PathBuf,
}

impl ConnectionRegistry {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        ConnectionRegistry {
            path: data_dir.as_ref().join(CONNECTIONS_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List a namespace's connections in registry order.
    pub fn list(&self, namespace: Namespace) -> Result<Vec<Connection>, RegistryError> {
        Ok(self.read()?.set(namespace).entries.clone())
    }

    /// Look up a connection by name.
    pub fn get(
        &self,
        namespace: Namespace,
        name: &str,
    ) -> Result<Option<Connection>, RegistryError> {
        let document = self.read()?;
        let set = document.set(namespace);
        Ok(set.position(name).map(|index| set.entries[index].clone()))
    }

    /// Add a connection, replacing an existing entry with the same name in
    /// place.
    pub fn set(
        &self,
        namespace: Namespace,
        connection: Connection,
    ) -> Result<(), RegistryError> {
        self.mutate(|document| {
            let set = document.set_mut(namespace);
            match set.position(&connection.name) {
                Some(index) => set.entries[index] = connection,
                None => set.entries.push(connection),
            }
            Ok(())
        })
    }

    /// Remove a connection; removing the selected one clears the selection.
    pub fn remove(&self, namespace: Namespace, name: &str) -> Result<(), RegistryError> {
        self.mutate(|document| {
            let set = document.set_mut(namespace);
            let index = set
                .position(name)
                .ok_or_else(|| RegistryError::UnknownConnection {
                    namespace,
                    name: name.to_string(),
                })?;
            set.entries.remove(index);
            if set.selected.as_deref() == Some(name) {
                set.selected = None;
            }
            Ok(())
        })
    }

    /// The remembered selection of a namespace, resolved to its entry.
    pub fn selected(&self, namespace: Namespace) -> Result<Option<Connection>, RegistryError> {
        let document = self.read()?;
        let set = document.set(namespace);
        let Some(name) = set.selected.as_deref() else {
            return Ok(None);
        };
        Ok(set.position(name).map(|index| set.entries[index].clone()))
    }

    /// Remember `name` as the namespace's selection.
    pub fn set_selected(&self, namespace: Namespace, name: &str) -> Result<(), RegistryError> {
        self.mutate(|document| {
            let set = document.set_mut(namespace);
            if set.position(name).is_none() {
                return Err(RegistryError::UnknownConnection {
                    namespace,
                    name: name.to_string(),
                });
            }
            set.selected = Some(name.to_string());
            Ok(())
        })
    }

    fn read(&self) -> Result<RegistryDocument, RegistryError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "connection registry not found");
            return Ok(RegistryDocument::default());
        }
        let file = File::open(&self.path).map_err(RegistryError::OpenRegistry)?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(RegistryError::ParseRegistry)
    }

    /// Run `operation` on the document under the registry lock and persist
    /// the result atomically. The document is not written when `operation`
    /// fails.
    fn mutate<T>(
        &self,
        operation: impl FnOnce(&mut RegistryDocument) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let lock = self.acquire_lock()?;
        let mut document = self.read()?;
        let output = operation(&mut document)?;
        self.write(&document, lock)?;
        Ok(output)
    }

    fn acquire_lock(&self) -> Result<LockFile, RegistryError> {
        let lock_path = self.path.with_extension("lock");
        let mut lock = LockFile::open(&lock_path).map_err(RegistryError::AcquireLock)?;
        lock.lock().map_err(RegistryError::AcquireLock)?;
        Ok(lock)
    }

    /// Write via a temporary file and rename so the replacement appears
    /// atomic. Holding the [LockFile] is what makes the read-modify-write
    /// race free; passing it here keeps the write inside the locked region.
    fn write(&self, document: &RegistryDocument, _lock: LockFile) -> Result<(), RegistryError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| RegistryError::InvalidRegistryLocation(self.path.clone()))?;
        let temp_file =
            tempfile::NamedTempFile::new_in(parent).map_err(RegistryError::OpenTmpRegistry)?;

        let writer = BufWriter::new(&temp_file);
        serde_json::to_writer_pretty(writer, document).map_err(RegistryError::WriteTmpRegistry)?;
        temp_file
            .persist(&self.path)
            .map_err(RegistryError::RenameRegistry)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn connection(name: &str, url: &str) -> Connection {
        Connection {
            name: name.to_string(),
            url: url.parse().unwrap(),
        }
    }

    fn registry() -> (TempDir, ConnectionRegistry) {
        let dir = TempDir::new().unwrap();
        let registry = ConnectionRegistry::new(dir.path());
        (dir, registry)
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let (_dir, registry) = registry();
        assert_eq!(registry.list(Namespace::Catalogue).unwrap(), vec![]);
        assert_eq!(registry.selected(Namespace::Catalogue).unwrap(), None);
    }

    #[test]
    fn set_appends_and_replaces_in_place() {
        let (_dir, registry) = registry();
        registry
            .set(Namespace::Catalogue, connection("a", "https://a.example/csw"))
            .unwrap();
        registry
            .set(Namespace::Catalogue, connection("b", "https://b.example/csw"))
            .unwrap();
        registry
            .set(Namespace::Catalogue, connection("a", "https://a2.example/csw"))
            .unwrap();

        let names: Vec<_> = registry
            .list(Namespace::Catalogue)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(
            registry
                .get(Namespace::Catalogue, "a")
                .unwrap()
                .unwrap()
                .url
                .as_str(),
            "https://a2.example/csw"
        );
    }

    #[test]
    fn namespaces_are_disjoint() {
        let (_dir, registry) = registry();
        registry
            .set(Namespace::Catalogue, connection("shared", "https://csw.example/"))
            .unwrap();
        registry
            .set(
                Namespace::Service(ServiceKind::Wms),
                connection("shared", "https://wms.example/"),
            )
            .unwrap();

        assert_eq!(
            registry
                .get(Namespace::Catalogue, "shared")
                .unwrap()
                .unwrap()
                .url
                .as_str(),
            "https://csw.example/"
        );
        assert_eq!(
            registry
                .get(Namespace::Service(ServiceKind::Wms), "shared")
                .unwrap()
                .unwrap()
                .url
                .as_str(),
            "https://wms.example/"
        );
    }

    #[test]
    fn selection_round_trips_and_requires_a_known_name() {
        let (_dir, registry) = registry();
        registry
            .set(Namespace::Catalogue, connection("a", "https://a.example/csw"))
            .unwrap();

        registry.set_selected(Namespace::Catalogue, "a").unwrap();
        assert_eq!(
            registry.selected(Namespace::Catalogue).unwrap().unwrap().name,
            "a"
        );

        let err = registry
            .set_selected(Namespace::Catalogue, "ghost")
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownConnection { .. }));
    }

    #[test]
    fn removing_the_selected_connection_clears_the_selection() {
        let (_dir, registry) = registry();
        registry
            .set(Namespace::Catalogue, connection("a", "https://a.example/csw"))
            .unwrap();
        registry.set_selected(Namespace::Catalogue, "a").unwrap();

        registry.remove(Namespace::Catalogue, "a").unwrap();
        assert_eq!(registry.selected(Namespace::Catalogue).unwrap(), None);
        assert!(matches!(
            registry.remove(Namespace::Catalogue, "a").unwrap_err(),
            RegistryError::UnknownConnection { .. }
        ));
    }
}
