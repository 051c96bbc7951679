//! Remote references and the local cache
//!
//! Trees can be referenced by an identifier carrying `url`, `ref`, `path`
//! and `name` keys. Remote repositories are materialised into a local
//! cache directory by a [`Fetcher`] implementation (the actual transport,
//! typically git, lives outside this crate). The cache entry is protected
//! by an exclusive file lock held across the whole fetch so that
//! concurrent callers do not race; the lock is released on every exit
//! path, including panics, via the RAII guard.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::tree::{NodeId, Tree};
use crate::value::Map;

/// Lock file suffix for cache entries
const LOCK_SUFFIX: &str = ".fetch.lock";
/// Default time limit for acquiring a cache lock
pub const FETCH_LOCK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Transport used to materialise a remote repository locally.
///
/// Implementations receive the destination directory inside the cache and
/// are expected to create or refresh a checkout of the requested ref.
pub trait Fetcher {
    fn fetch(&self, url: &str, reference: Option<&str>, destination: &Path) -> Result<(), Error>;
}

/// Resolve the cache directory.
///
/// First existing wins: the `FMF_CACHE_DIRECTORY` environment variable,
/// the explicit override, `$XDG_CACHE_HOME/fmf`, `~/.cache/fmf`.
pub fn cache_directory(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    if let Ok(cache) = std::env::var("FMF_CACHE_DIRECTORY") {
        return Ok(PathBuf::from(cache));
    }
    if let Some(cache) = explicit {
        return Ok(cache.to_path_buf());
    }
    let base = match std::env::var("XDG_CACHE_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => {
            let home = std::env::var("HOME")
                .map(PathBuf::from)
                .map_err(|_| Error::General(String::from("Unable to locate home directory.")))?;
            home.join(".cache")
        }
    };
    Ok(base.join("fmf"))
}

/// Delete the cache directory if it exists, returning the removed path.
pub fn clean_cache_directory(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    let cache = cache_directory(explicit)?;
    if cache.is_dir() {
        fs::remove_dir_all(&cache)?;
    }
    Ok(cache)
}

/// Metadata stored inside a held lock file for diagnostics
#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
    pub pid: u32,
    pub acquired_at_unix: u64,
}

/// Exclusive file lock over a cache entry
///
/// The lock is released when the guard is dropped (the descriptor is
/// closed), so it cannot leak across early returns or panics.
pub struct CacheLock {
    _file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquire the lock, waiting up to `timeout` for a holder to leave.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<CacheLock, Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let deadline = Instant::now() + timeout;
        loop {
            match try_lock(&file) {
                Ok(()) => break,
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(Error::General(format!(
                            "Failed to acquire lock for '{}' within {} seconds.",
                            path.display(),
                            timeout.as_secs()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(error) => return Err(Error::Io(error)),
            }
        }
        let metadata = LockMetadata {
            pid: std::process::id(),
            acquired_at_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };
        serde_json::to_writer(&file, &metadata).ok();
        debug!(path = %path.display(), "Cache lock acquired");
        Ok(CacheLock {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
    use rustix::fs::{flock, FlockOperation};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
        .map_err(|error| io::Error::from_raw_os_error(error.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };

    let handle = file.as_raw_handle() as HANDLE;
    // SAFETY: OVERLAPPED is plain data, valid when zero-initialized, and
    // the handle comes from an open File.
    let result = unsafe {
        let mut overlapped = std::mem::zeroed();
        LockFileEx(
            handle,
            LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if result == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Cache entry directory for a repository url.
///
/// The url is percent-encoded into a single filesystem-safe name. The
/// encoding is injective (`%` itself is escaped), so distinct urls can
/// never alias to the same cache entry or lock file.
fn cache_destination(cache: &Path, url: &str) -> PathBuf {
    let mut name = String::with_capacity(url.len());
    for byte in url.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                name.push(byte as char);
            }
            other => {
                name.push('%');
                name.push_str(&format!("{other:02X}"));
            }
        }
    }
    cache.join(name)
}

/// Fetch a remote repository and grow a tree from it.
///
/// The cache entry is locked for the whole fetch; `path` selects the
/// metadata tree root inside the repository.
pub fn fetch_tree(
    fetcher: &dyn Fetcher,
    url: &str,
    reference: Option<&str>,
    path: &str,
    timeout: Duration,
) -> Result<Tree, Error> {
    let cache = cache_directory(None)?;
    fs::create_dir_all(&cache)?;
    let destination = cache_destination(&cache, url);
    let mut lock_path = destination.clone().into_os_string();
    lock_path.push(LOCK_SUFFIX);

    let _lock = CacheLock::acquire(Path::new(&lock_path), timeout)?;
    fetcher.fetch(url, reference, &destination)?;
    Tree::grow(destination.join(path.trim_start_matches('/')))
}

/// A tree node reference: `url`, `ref`, `path` and `name` keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reference {
    pub url: Option<String>,
    pub reference: Option<String>,
    pub path: Option<String>,
    pub name: Option<String>,
}

impl Reference {
    /// Build a reference from an identifier mapping.
    pub fn from_data(data: &Map) -> Result<Reference, Error> {
        let text = |key: &str| -> Result<Option<String>, Error> {
            match data.get(key) {
                None => Ok(None),
                Some(value) => value
                    .as_str()
                    .map(|text| Some(text.to_string()))
                    .ok_or_else(|| {
                        Error::Reference(format!(
                            "The '{key}' key should be a string, got a {}.",
                            value.kind()
                        ))
                    }),
            }
        };
        Ok(Reference {
            url: text("url")?,
            reference: text("ref")?,
            path: text("path")?,
            name: text("name")?,
        })
    }
}

/// Resolve a reference to a tree and the node it points at.
///
/// Remote references need a [`Fetcher`]; local references accept an
/// absolute path or `.` as the tree root.
pub fn node(
    reference: &Reference,
    fetcher: Option<&dyn Fetcher>,
) -> Result<(Tree, NodeId), Error> {
    let tree = match &reference.url {
        Some(url) => {
            let fetcher = fetcher.ok_or_else(|| {
                Error::Reference(format!(
                    "Remote reference '{url}' requires a fetcher implementation."
                ))
            })?;
            let path = reference.path.as_deref().unwrap_or(".");
            fetch_tree(
                fetcher,
                url,
                reference.reference.as_deref(),
                path.trim_start_matches('/'),
                FETCH_LOCK_TIMEOUT,
            )?
        }
        None => {
            let root = reference.path.as_deref().unwrap_or(".");
            if !root.starts_with('/') && root != "." {
                return Err(Error::Reference(format!(
                    "Relative path '{root}' specified."
                )));
            }
            Tree::grow(root)?
        }
    };
    let name = reference.name.as_deref().unwrap_or("/");
    let id = tree
        .find(name)
        .ok_or_else(|| Error::Reference(format!("No tree node found for name '{name}'.")))?;
    Ok((tree, id))
}
