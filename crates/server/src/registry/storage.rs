//! In-memory index of served PEM files.
//!
//! # Directory layout
//!
//! ```text
//! live/
//! ├── a.example.com/
//! │   ├── fullchain.pem -> ../../archive/a.example.com/fullchain6.pem
//! │   ├── privkey.pem -> ../../archive/a.example.com/privkey6.pem
//! │   └── README
//! └── b.example.com/
//!     └── ...
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use pemvault_common::BufferPool;
use pemvault_config::StorageConfig;

use super::error::{PemFileError, RegistryError};
use super::pem::{PemFile, PemKind, PemNames};

type Slots = [Option<Arc<PemFile>>; PemKind::COUNT];
type DomainMap = HashMap<String, Slots>;

/// Result of a directory walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub registered: usize,
    pub skipped: usize,
}

/// Serves base64-encoded PEM material to the HTTP layer
pub trait CertificateSource: Send + Sync {
    /// Write the encoded file to `writer`, returning the bytes written
    fn write_to(
        &self,
        domain: &str,
        kind: PemKind,
        writer: &mut dyn io::Write,
    ) -> Result<usize, RegistryError>;
}

/// Domain → per-kind file slots
pub struct CertificateRegistry {
    by_domain: RwLock<DomainMap>,
    names: PemNames,
    size_limit: u64,
    pool: BufferPool,
}

impl CertificateRegistry {
    /// Create an empty registry; `size_limit` is in bytes
    pub fn new(names: PemNames, size_limit: u64) -> Self {
        let buffer_size = usize::try_from(size_limit).unwrap_or(usize::MAX);
        Self {
            by_domain: RwLock::new(HashMap::new()),
            names,
            size_limit,
            pool: BufferPool::new(buffer_size),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(PemNames::from_config(config), config.pem_size_limit_bytes())
    }

    /// Register every valid file under `root`
    ///
    /// Per-file problems are logged and skipped; only an unusable root fails.
    pub fn scan_directory(&self, root: &Path) -> Result<ScanReport, RegistryError> {
        let (found, report) = self.collect(root)?;
        for file in found {
            self.put(file);
        }
        info!(
            root = %root.display(),
            registered = report.registered,
            skipped = report.skipped,
            domains = self.by_domain.read().len(),
            "Certificate directory scanned"
        );
        Ok(report)
    }

    /// Replace the whole index with a fresh scan of `root`
    ///
    /// The new index is built before the write lock is taken. Files dropped
    /// from the index are closed once their last reader releases them.
    pub fn rescan(&self, root: &Path) -> Result<ScanReport, RegistryError> {
        let (found, report) = self.collect(root)?;

        let mut fresh = DomainMap::new();
        for file in found {
            let slots = fresh.entry(file.domain().to_string()).or_default();
            let index = file.kind().index();
            slots[index] = Some(Arc::new(file));
        }

        let previous = {
            let mut map = self.by_domain.write();
            std::mem::replace(&mut *map, fresh)
        };

        let current = self.by_domain.read();
        let added = current.keys().filter(|d| !previous.contains_key(*d)).count();
        let removed = previous.keys().filter(|d| !current.contains_key(*d)).count();
        info!(
            root = %root.display(),
            registered = report.registered,
            skipped = report.skipped,
            domains_added = added,
            domains_removed = removed,
            "Certificate directory rescanned"
        );
        Ok(report)
    }

    fn collect(&self, root: &Path) -> Result<(Vec<PemFile>, ScanReport), RegistryError> {
        let meta = fs::metadata(root).map_err(|source| RegistryError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(RegistryError::NotADirectory(root.to_path_buf()));
        }

        let mut found = Vec::new();
        let mut report = ScanReport::default();
        self.walk(root, &mut found, &mut report)?;
        Ok((found, report))
    }

    fn walk(
        &self,
        dir: &Path,
        found: &mut Vec<PemFile>,
        report: &mut ScanReport,
    ) -> Result<(), RegistryError> {
        let entries = fs::read_dir(dir).map_err(|source| RegistryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                    continue;
                }
            };
            let path = entry.path();

            // file_type() does not follow symlinks
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                if let Err(e) = self.walk(&path, found, report) {
                    warn!(dir = %path.display(), error = %e, "Skipping unreadable directory");
                }
                continue;
            }

            match PemFile::open(&path, &self.names, self.size_limit) {
                Ok(file) => {
                    report.registered += 1;
                    found.push(file);
                }
                Err(e) => {
                    report.skipped += 1;
                    log_skipped(&path, &e);
                }
            }
        }
        Ok(())
    }

    /// Insert or replace the file's slot
    pub fn put(&self, file: PemFile) {
        let domain = file.domain().to_string();
        let kind = file.kind();
        let mut map = self.by_domain.write();
        let slot = &mut map.entry(domain.clone()).or_default()[kind.index()];
        if slot.is_some() {
            debug!(domain = %domain, kind = %kind, "Replacing registered PEM file");
        }
        *slot = Some(Arc::new(file));
    }

    pub fn get(&self, domain: &str, kind: PemKind) -> Option<Arc<PemFile>> {
        self.by_domain
            .read()
            .get(domain)
            .and_then(|slots| slots[kind.index()].clone())
    }

    /// Remove one slot; the domain goes away with its last file
    pub fn remove(&self, domain: &str, kind: PemKind) -> Option<Arc<PemFile>> {
        let mut map = self.by_domain.write();
        let slots = map.get_mut(domain)?;
        let removed = slots[kind.index()].take();
        if slots.iter().all(Option::is_none) {
            map.remove(domain);
        }
        removed
    }

    pub fn remove_domain(&self, domain: &str) -> bool {
        self.by_domain.write().remove(domain).is_some()
    }

    /// Registered domains, sorted
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.by_domain.read().keys().cloned().collect();
        domains.sort();
        domains
    }

    /// Call `visit` for every registered file under the read lock
    pub fn visit_all<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &PemFile),
    {
        let map = self.by_domain.read();
        for (domain, slots) in map.iter() {
            for file in slots.iter().flatten() {
                visit(domain, file);
            }
        }
    }

    /// Number of registered files
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.visit_all(|_, _| count += 1);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.by_domain.read().is_empty()
    }

    /// Close every held descriptor; returns how many were closed
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        self.visit_all(|domain, file| {
            if file.close() {
                closed += 1;
                trace!(domain = %domain, name = %file.name(), "PEM file closed");
            } else {
                debug!(domain = %domain, name = %file.name(), "PEM file already closed");
            }
        });
        info!(closed, "Closed certificate files");
        closed
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }
}

impl CertificateSource for CertificateRegistry {
    fn write_to(
        &self,
        domain: &str,
        kind: PemKind,
        writer: &mut dyn io::Write,
    ) -> Result<usize, RegistryError> {
        let file = {
            let map = self.by_domain.read();
            let slots = map
                .get(domain)
                .ok_or_else(|| RegistryError::DomainNotFound(domain.to_string()))?;
            slots[kind.index()]
                .clone()
                .ok_or_else(|| RegistryError::KindNotFound {
                    domain: domain.to_string(),
                    kind,
                })?
        };

        let read_failure = |source: io::Error| RegistryError::ReadFailure {
            path: file.path().to_path_buf(),
            source,
        };

        let size = usize::try_from(file.size())
            .map_err(|_| read_failure(io::ErrorKind::InvalidData.into()))?;
        let mut raw = self.pool.acquire_with_capacity(size);
        raw.resize(size, 0);
        file.read_into(&mut raw[..]).map_err(read_failure)?;

        let encoded_len = base64::encoded_len(size, true)
            .ok_or_else(|| read_failure(io::ErrorKind::InvalidData.into()))?;
        let mut encoded = self.pool.acquire_with_capacity(encoded_len);
        encoded.resize(encoded_len, 0);
        let written = base64::engine::general_purpose::STANDARD
            .encode_slice(&raw[..], &mut encoded[..])
            .map_err(|e| read_failure(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        writer
            .write_all(&encoded[..written])
            .map_err(RegistryError::Write)?;

        trace!(domain = %domain, kind = %kind, bytes = written, "PEM file served");
        Ok(written)
    }
}

fn log_skipped(path: &Path, error: &PemFileError) {
    debug!(path = %path.display(), error = %error, "Skipping file");
}

impl std::fmt::Debug for CertificateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateRegistry")
            .field("domains", &self.by_domain.read().len())
            .field("names", &self.names)
            .field("size_limit", &self.size_limit)
            .finish()
    }
}
