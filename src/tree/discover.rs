//! Tree discovery
//!
//! Locates the metadata root (the closest ancestor with a `.fmf/version`
//! marker), reads the optional `.fmf/config` inclusion list and walks the
//! subtree producing metadata files in a deterministic order: `main.fmf`
//! first, then the remaining `*.fmf` files of a directory in lexicographic
//! order, then subdirectories recursively.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Error;

/// Metadata file suffix
pub const SUFFIX: &str = ".fmf";
/// Per-directory index file
pub const MAIN: &str = "main.fmf";

/// Special directories which are never walked
const IGNORED_DIRECTORIES: &[&str] = &["/dev", "/proc", "/sys"];

/// A metadata file together with the hierarchical name of its node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub name: String,
}

/// Find the metadata tree root for the given path.
///
/// Ascends directory-wise until an ancestor contains a `.fmf` directory
/// with a readable `version` file.
pub fn find_root(path: &Path) -> Result<PathBuf, Error> {
    let start = std::path::absolute(path)?;
    if !start.is_dir() {
        return Err(Error::File {
            path: start,
            message: String::from("not an accessible directory"),
        });
    }
    let mut current = start.clone();
    loop {
        if current.join(".fmf").join("version").is_file() {
            info!(root = %current.display(), "Root directory found");
            return Ok(current);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Err(Error::RootMissing(start)),
        }
    }
}

/// Read and validate the tree format version.
pub fn read_version(root: &Path) -> Result<u32, Error> {
    let path = root.join(".fmf").join("version");
    let content = fs::read_to_string(&path).map_err(|_| Error::File {
        path: path.clone(),
        message: String::from("unable to detect format version"),
    })?;
    content.trim().parse().map_err(|_| Error::File {
        path,
        message: String::from("invalid version format"),
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    explore: ExploreSection,
}

#[derive(Debug, Default, Deserialize)]
struct ExploreSection {
    #[serde(default)]
    include: Vec<String>,
}

/// Names from `.fmf/config` `explore.include` which are discovered even
/// when the default rules would skip them
#[derive(Debug, Default, Clone)]
pub struct ExploreConfig {
    pub include: Vec<String>,
}

/// Read the optional `.fmf/config` file.
pub fn read_config(root: &Path) -> Result<ExploreConfig, Error> {
    let path = root.join(".fmf").join("config");
    if !path.is_file() {
        return Ok(ExploreConfig::default());
    }
    let content = fs::read_to_string(&path).map_err(|error| Error::File {
        path: path.clone(),
        message: error.to_string(),
    })?;
    let raw: RawConfig =
        serde_yaml::from_str(&content).map_err(|source| Error::Yaml { path, source })?;
    Ok(ExploreConfig {
        include: raw.explore.include,
    })
}

fn entry_name(path: &Path) -> &str {
    path.file_name().and_then(OsStr::to_str).unwrap_or_default()
}

/// Hierarchical node name for a directory relative to the root.
fn directory_name(root: &Path, directory: &Path) -> String {
    let relative = directory.strip_prefix(root).unwrap_or(directory);
    let segments: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        String::from("/")
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn join_name(directory: &str, segment: &str) -> String {
    if directory == "/" {
        format!("/{segment}")
    } else {
        format!("{directory}/{segment}")
    }
}

/// Walk the tree and produce metadata files in assembly order.
pub fn discover(root: &Path) -> Result<Vec<DiscoveredFile>, Error> {
    let config = read_config(root)?;
    let include: HashSet<&str> = config.include.iter().map(String::as_str).collect();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut discovered = Vec::new();

    // Files sort before directories, main.fmf before its siblings
    let walker = WalkDir::new(root).follow_links(true).sort_by(|a, b| {
        let key = |entry: &walkdir::DirEntry| {
            (
                entry.file_type().is_dir(),
                entry.file_name() != MAIN,
                entry.file_name().to_owned(),
            )
        };
        key(a).cmp(&key(b))
    });

    let mut iterator = walker.into_iter();
    while let Some(entry) = iterator.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                // Symlink loops and unreadable directories are skipped
                debug!(error = %error, "Skipping inaccessible entry");
                continue;
            }
        };
        let path = entry.path().to_path_buf();
        let name = entry_name(&path).to_string();

        if entry.file_type().is_dir() {
            if entry.depth() == 0 {
                if let Ok(canonical) = dunce::canonicalize(&path) {
                    visited.insert(canonical);
                }
                continue;
            }
            if name == ".fmf" {
                iterator.skip_current_dir();
                continue;
            }
            if IGNORED_DIRECTORIES
                .iter()
                .any(|ignored| path == Path::new(ignored))
            {
                debug!(path = %path.display(), "Ignoring special directory");
                iterator.skip_current_dir();
                continue;
            }
            if name.starts_with('.') && !include.contains(name.as_str()) {
                iterator.skip_current_dir();
                continue;
            }
            // A nested .fmf directory marks a separate metadata tree
            if path.join(".fmf").is_dir() {
                debug!(path = %path.display(), "Ignoring nested metadata tree");
                iterator.skip_current_dir();
                continue;
            }
            // Track canonical paths so that symlinks cannot revisit a
            // directory or loop forever
            match dunce::canonicalize(&path) {
                Ok(canonical) => {
                    if !visited.insert(canonical) {
                        debug!(path = %path.display(), "Not entering symlink loop");
                        iterator.skip_current_dir();
                    }
                }
                Err(_) => iterator.skip_current_dir(),
            }
            continue;
        }

        if !entry.file_type().is_file() {
            continue;
        }
        let included = include.contains(name.as_str());
        if name.starts_with('.') && !included {
            continue;
        }
        if !name.ends_with(SUFFIX) && !included {
            continue;
        }
        debug!(path = %path.display(), "Checking file");
        let parent = directory_name(root, path.parent().unwrap_or(root));
        let stem = match name.strip_suffix(SUFFIX) {
            Some(stripped) => stripped.to_string(),
            None => Path::new(&name)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.clone()),
        };
        let node_name = if name == MAIN {
            parent.clone()
        } else {
            join_name(&parent, &stem)
        };
        discovered.push(DiscoveredFile {
            path,
            name: node_name,
        });
    }
    Ok(discovered)
}
