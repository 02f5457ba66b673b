//! Filesystem side: rule-file discovery and loading, snapshot reading.
//!
//! Discovery follows the host's naming conventions:
//!
//! ```text
//! <root>/**/Anything_DISTR.ini          -> Dialect::Spid
//! <root>/**/SkyPatcher/npc/**/*.ini     -> Dialect::SkyPatcher
//! ```
//!
//! Sources come back sorted by relative path (ASCII case-insensitive), which
//! is the load order the rest of the crate relies on.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::distribution::{Dialect, DistributionFile};
use crate::form::FormIndex;
use crate::npc::DataSnapshot;
use crate::parser::{RuleSource, parse};
use crate::{Error, Result};

const SPID_SUFFIX: &str = "_distr.ini";

/// Dialect a path belongs to, if it is a rule file at all.
pub fn dialect_for(path: &Path) -> Option<Dialect> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    if !name.ends_with(".ini") {
        return None;
    }
    if name.ends_with(SPID_SUFFIX) && name.len() > SPID_SUFFIX.len() {
        return Some(Dialect::Spid);
    }

    let dirs: Vec<String> = path
        .parent()?
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str().map(str::to_ascii_lowercase),
            _ => None,
        })
        .collect();
    dirs.windows(2).any(|w| w[0] == "skypatcher" && w[1] == "npc").then_some(Dialect::SkyPatcher)
}

/// Walk `root` for rule files.
pub fn discover(root: &Path) -> Result<Vec<RuleSource>> {
    let meta = fs::metadata(root).map_err(|e| Error::io(root, e))?;
    if !meta.is_dir() {
        return Err(Error::io(root, std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory")));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable path during discovery");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let Some(dialect) = dialect_for(relative) else {
            continue;
        };
        sources.push(RuleSource::new(path, display_path(relative), dialect));
    }

    sources.sort_by_cached_key(|s| (s.relative_path.to_ascii_lowercase(), s.relative_path.clone()));
    debug!(root = %root.display(), found = sources.len(), "discovered rule files");
    Ok(sources)
}

fn display_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// A file that could not be read.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Parsed files in load order plus whatever could not be read.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub files: Vec<DistributionFile>,
    pub failures: Vec<FileFailure>,
}

/// Read and parse every source, keeping the given order.
///
/// A missing or unreadable file is recorded and skipped; it never aborts the
/// load. Content that is not valid UTF-8 is decoded lossily.
pub fn load_files(sources: &[RuleSource], forms: &FormIndex) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    for source in sources {
        match fs::read(&source.full_path) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                outcome.files.push(parse(source, &content, forms));
            }
            Err(err) => {
                warn!(file = %source.relative_path, error = %err, "skipping unreadable distribution file");
                outcome.failures.push(FileFailure { path: source.full_path.clone(), error: Error::io(&source.full_path, err) });
            }
        }
    }

    outcome
}

/// Read a JSON [`DataSnapshot`] from disk.
pub fn load_snapshot(path: &Path) -> Result<DataSnapshot> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    DataSnapshot::from_json(&text)
}
