//! Request path → filesystem path resolution.
//!
//! The URL path is percent-decoded and appended to the served root. When that
//! candidate does not exist and absolute paths are allowed, the decoded URL
//! path is retried as an absolute filesystem path. There is no way to tell an
//! intentionally relative URL from one meant as absolute, so the retry is
//! opt-in and only happens after the relative lookup misses.

use crate::config::ServerConfig;
use percent_encoding::percent_decode_str;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Kind of filesystem entry a path resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

/// Outcome of resolving a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path exists.
    Found { path: PathBuf, kind: EntryKind },
    /// Neither the relative nor (if enabled) the absolute candidate exists.
    NotFound,
}

/// Percent-decode a URL path. Invalid UTF-8 sequences are replaced.
pub fn decode_url_path(url_path: &str) -> String {
    percent_decode_str(url_path)
        .decode_utf8_lossy()
        .into_owned()
}

/// Resolves request paths against the served root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    allow_absolute: bool,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>, allow_absolute: bool) -> Self {
        Self {
            root: root.into(),
            allow_absolute,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.root.clone(), config.allow_absolute)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Primary candidate: the root with the decoded path appended verbatim.
    pub fn candidate(&self, decoded_path: &str) -> PathBuf {
        let mut joined = OsString::from(self.root.as_os_str());
        joined.push(decoded_path);
        PathBuf::from(joined)
    }

    /// Resolve a raw (still percent-encoded) URL path.
    ///
    /// # Errors
    ///
    /// Only for stat failures other than "does not exist" (e.g. permission
    /// denied). A missing path is [`Resolution::NotFound`], not an error.
    pub async fn resolve(&self, url_path: &str) -> io::Result<Resolution> {
        let decoded = decode_url_path(url_path);

        let primary = self.candidate(&decoded);
        if let Some(kind) = stat(&primary).await? {
            return Ok(Resolution::Found {
                path: primary,
                kind,
            });
        }

        if self.allow_absolute {
            let absolute = PathBuf::from(&decoded);
            if absolute.is_absolute() {
                if let Some(kind) = stat(&absolute).await? {
                    tracing::debug!("Resolved {} as absolute path", absolute.display());
                    return Ok(Resolution::Found {
                        path: absolute,
                        kind,
                    });
                }
            }
        }

        Ok(Resolution::NotFound)
    }
}

/// Stat `path`, mapping "does not exist" to `None`.
async fn stat(path: &Path) -> io::Result<Option<EntryKind>> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(Some(EntryKind::from_metadata(&metadata))),
        Err(e) if is_missing(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// "Does not exist", including a file used as a directory (`/a.txt/b`).
pub(crate) fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
