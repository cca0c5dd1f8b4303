//! A single symlinked PEM file held open for serving.

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::trace;

use pemvault_config::StorageConfig;

use super::error::PemFileError;

/// What a PEM file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PemKind {
    /// Public certificate chain
    Certificate,
    PrivateKey,
    /// Intermediate chain only
    Chain,
}

impl PemKind {
    pub const COUNT: usize = 3;
    pub const ALL: [PemKind; Self::COUNT] =
        [PemKind::Certificate, PemKind::PrivateKey, PemKind::Chain];

    /// Dense slot index
    #[inline]
    pub fn index(self) -> usize {
        match self {
            PemKind::Certificate => 0,
            PemKind::PrivateKey => 1,
            PemKind::Chain => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PemKind::Certificate => "certificate",
            PemKind::PrivateKey => "private key",
            PemKind::Chain => "chain",
        }
    }
}

impl fmt::Display for PemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured base names of each kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemNames {
    pub certificate: String,
    pub private_key: String,
    pub chain: Option<String>,
}

impl PemNames {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            certificate: config.pem_pubname.clone(),
            private_key: config.pem_keyname.clone(),
            chain: config.pem_chainname.clone(),
        }
    }

    pub fn classify(&self, name: &str) -> Option<PemKind> {
        if name == self.certificate {
            Some(PemKind::Certificate)
        } else if name == self.private_key {
            Some(PemKind::PrivateKey)
        } else if self.chain.as_deref() == Some(name) {
            Some(PemKind::Chain)
        } else {
            None
        }
    }
}

impl Default for PemNames {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

/// Open descriptor of a resolved PEM file
///
/// Reads are positional, so concurrent readers never share a cursor.
pub struct PemFile {
    kind: PemKind,
    name: String,
    domain: String,
    size: u64,
    path: PathBuf,
    file: RwLock<Option<File>>,
}

impl PemFile {
    /// Open the symlink at `link` (`<root>/<domain>/<name>`)
    ///
    /// Name and domain come from the link path; the descriptor is opened on
    /// the resolved target. `size_limit` of zero disables the size check.
    pub fn open(link: &Path, names: &PemNames, size_limit: u64) -> Result<Self, PemFileError> {
        let meta = fs::symlink_metadata(link).map_err(|source| PemFileError::Resolve {
            path: link.to_path_buf(),
            source,
        })?;
        if !meta.file_type().is_symlink() {
            return Err(PemFileError::NotSymlink(link.to_path_buf()));
        }

        let name = link
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PemFileError::Layout(link.to_path_buf()))?;
        let kind = names
            .classify(&name)
            .ok_or_else(|| PemFileError::UnknownName(name.clone()))?;
        let domain = link
            .parent()
            .and_then(Path::file_name)
            .map(|d| d.to_string_lossy().into_owned())
            .ok_or_else(|| PemFileError::Layout(link.to_path_buf()))?;

        let resolved = fs::canonicalize(link).map_err(|source| PemFileError::Resolve {
            path: link.to_path_buf(),
            source,
        })?;
        let file = File::open(&resolved).map_err(|source| PemFileError::Open {
            path: resolved.clone(),
            source,
        })?;
        let size = file
            .metadata()
            .map_err(|source| PemFileError::Open {
                path: resolved.clone(),
                source,
            })?
            .len();

        if size_limit != 0 && size > size_limit {
            return Err(PemFileError::TooLarge {
                path: resolved,
                size,
                limit: size_limit,
            });
        }

        trace!(
            domain = %domain,
            name = %name,
            target = %resolved.display(),
            size,
            "Opened PEM file"
        );

        Ok(Self {
            kind,
            name,
            domain,
            size,
            path: resolved,
            file: RwLock::new(Some(file)),
        })
    }

    pub fn kind(&self) -> PemKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Size observed when the file was opened
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Resolved target path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.read().is_some()
    }

    /// Fill `buf` from the start of the file
    ///
    /// `buf` must be exactly [`size`](Self::size) bytes long.
    pub fn read_into(&self, buf: &mut [u8]) -> io::Result<()> {
        let guard = self.file.read();
        let file = guard
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file has been closed"))?;
        read_exact_at(file, buf, 0)
    }

    /// Drop the descriptor; returns `false` if it was already closed
    pub fn close(&self) -> bool {
        self.file.write().take().is_some()
    }
}

impl fmt::Debug for PemFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemFile")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("size", &self.size)
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    /// `archive/<domain>/<file>` plus `live/<domain>/<link>` pointing at it
    fn linked(dir: &TempDir, domain: &str, link: &str, target: &str, content: &[u8]) -> PathBuf {
        let archive = dir.path().join("archive").join(domain);
        let live = dir.path().join("live").join(domain);
        fs::create_dir_all(&archive).unwrap();
        fs::create_dir_all(&live).unwrap();
        fs::write(archive.join(target), content).unwrap();
        let link_path = live.join(link);
        symlink(archive.join(target), &link_path).unwrap();
        link_path
    }

    #[test]
    fn test_open_classifies_by_link_name() {
        let dir = TempDir::new().unwrap();
        let link = linked(&dir, "a.example", "fullchain.pem", "fullchain7.pem", b"CERT");

        let pem = PemFile::open(&link, &PemNames::default(), 1024).unwrap();
        assert_eq!(pem.kind(), PemKind::Certificate);
        assert_eq!(pem.name(), "fullchain.pem");
        assert_eq!(pem.domain(), "a.example");
        assert_eq!(pem.size(), 4);

        let mut buf = vec![0u8; 4];
        pem.read_into(&mut buf).unwrap();
        assert_eq!(buf, b"CERT");
    }

    #[test]
    fn test_open_rejections() {
        let dir = TempDir::new().unwrap();
        let names = PemNames::default();

        let plain = dir.path().join("fullchain.pem");
        fs::write(&plain, b"x").unwrap();
        assert!(matches!(
            PemFile::open(&plain, &names, 0),
            Err(PemFileError::NotSymlink(_))
        ));

        let other = linked(&dir, "a.example", "cert.pem", "cert1.pem", b"x");
        assert!(matches!(
            PemFile::open(&other, &names, 0),
            Err(PemFileError::UnknownName(n)) if n == "cert.pem"
        ));

        let big = linked(&dir, "b.example", "privkey.pem", "privkey1.pem", &[b'k'; 2048]);
        assert!(matches!(
            PemFile::open(&big, &names, 1024),
            Err(PemFileError::TooLarge { size: 2048, limit: 1024, .. })
        ));
        assert!(PemFile::open(&big, &names, 0).is_ok());

        let dangling = dir.path().join("live").join("a.example").join("privkey.pem");
        symlink(dir.path().join("nowhere"), &dangling).unwrap();
        assert!(matches!(
            PemFile::open(&dangling, &names, 0),
            Err(PemFileError::Resolve { .. })
        ));
    }

    #[test]
    fn test_closed_file_fails_reads() {
        let dir = TempDir::new().unwrap();
        let link = linked(&dir, "a.example", "privkey.pem", "privkey1.pem", b"KEY");
        let pem = PemFile::open(&link, &PemNames::default(), 0).unwrap();

        assert!(pem.close());
        assert!(!pem.close());
        assert!(!pem.is_open());
        let mut buf = vec![0u8; 3];
        assert!(pem.read_into(&mut buf).is_err());
    }

    #[test]
    fn test_chain_name_optional() {
        let mut names = PemNames::default();
        assert_eq!(names.classify("chain.pem"), None);
        names.chain = Some("chain.pem".to_string());
        assert_eq!(names.classify("chain.pem"), Some(PemKind::Chain));
        assert_eq!(names.classify("privkey.pem"), Some(PemKind::PrivateKey));
    }

    #[test]
    fn test_kind_indices_are_dense() {
        for (i, kind) in PemKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }
}
