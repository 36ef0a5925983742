//! File discovery: walk a directory tree and group supported files by stem.
//!
//! ## Ordering
//!
//! Every listing is deterministic. Within a directory, files come before
//! subdirectories and both are sorted case-insensitively by name, so the same
//! tree always produces the same sequence of groups and the same status
//! output, run after run.
//!
//! ## Grouping
//!
//! A [`FileGroup`] is every supported file in one directory that shares a
//! file stem: `lecture1.mp4`, `lecture1.mp3` and `lecture1.png` form one
//! group. Equal stems in different directories are distinct groups; the
//! [`GroupKey`] carries the relative directory to keep them apart.

use crate::classify::{ExtensionSets, MediaKind};
use crate::error::StudyGenError;
use crate::pipeline::artifact::TEMP_PREFIX;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// A supported file together with its media class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// Identity of a [`FileGroup`]: directory relative to the scan root, plus stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    /// Directory relative to the scan root; empty for the root itself.
    pub rel_dir: PathBuf,
    pub stem: String,
}

impl GroupKey {
    fn sort_key(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl fmt::Display for GroupKey {
    /// `stem` for files in the root, `sub/dir::stem` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rel_dir.as_os_str().is_empty() {
            write!(f, "{}", self.stem)
        } else {
            let dir: Vec<String> = self
                .rel_dir
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            write!(f, "{}::{}", dir.join("/"), self.stem)
        }
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.to_string().cmp(&other.to_string()))
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Files in one directory sharing one stem. Never empty.
#[derive(Debug, Clone, Serialize)]
pub struct FileGroup {
    pub key: GroupKey,
    /// Directory holding every member.
    pub dir: PathBuf,
    pub stem: String,
    /// Members sorted case-insensitively by file name.
    pub files: Vec<MediaFile>,
}

impl FileGroup {
    /// Image members, in member order.
    pub fn images(&self) -> Vec<PathBuf> {
        self.of_kind(MediaKind::Image)
    }

    /// Members of one class, in member order.
    pub fn of_kind(&self, kind: MediaKind) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|f| f.kind == kind)
            .map(|f| f.path.clone())
            .collect()
    }

    /// `true` if any member is video, audio or text.
    pub fn has_media(&self) -> bool {
        self.files
            .iter()
            .any(|f| matches!(f.kind, MediaKind::Video | MediaKind::Audio | MediaKind::Text))
    }

    pub fn has_images(&self) -> bool {
        self.files.iter().any(|f| f.kind == MediaKind::Image)
    }
}

/// Groups keyed and ordered by [`GroupKey`] (case-insensitive).
pub type FileGroups = BTreeMap<GroupKey, FileGroup>;

/// List every supported file under `root` in deterministic order.
///
/// Unsupported files are skipped silently. Unreadable entries below the root
/// are skipped with a warning.
///
/// # Errors
/// [`StudyGenError::Discovery`] if `root` does not exist, is not a directory,
/// or cannot be read.
pub fn discover(root: &Path, extensions: &ExtensionSets) -> Result<Vec<MediaFile>, StudyGenError> {
    check_root(root)?;

    let mut files = Vec::new();
    for entry in sorted_walk(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                return Err(StudyGenError::Discovery {
                    path: root.to_path_buf(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || is_temp_artifact(&entry) {
            continue;
        }

        let kind = extensions.classify(entry.path());
        if kind.is_supported() {
            files.push(MediaFile {
                path: entry.into_path(),
                kind,
            });
        }
    }

    debug!("Discovered {} supported files under {}", files.len(), root.display());
    Ok(files)
}

/// Group every supported file under `root` by `(directory, stem)`.
///
/// # Errors
/// Same as [`discover`].
pub fn group_by_stem(root: &Path, extensions: &ExtensionSets) -> Result<FileGroups, StudyGenError> {
    let files = discover(root, extensions)?;

    let mut buckets: HashMap<(PathBuf, String), Vec<MediaFile>> = HashMap::new();
    for file in files {
        let dir = file
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        let stem = file_stem(&file.path);
        buckets.entry((dir, stem)).or_default().push(file);
    }

    let mut groups = FileGroups::new();
    for ((dir, stem), mut members) in buckets {
        members.sort_by_key(|f| name_key(&f.path));
        let rel_dir = dir.strip_prefix(root).map(Path::to_path_buf).unwrap_or_default();
        let key = GroupKey {
            rel_dir,
            stem: stem.clone(),
        };
        groups.insert(
            key.clone(),
            FileGroup {
                key,
                dir,
                stem,
                files: members,
            },
        );
    }

    debug!("Grouped into {} stems", groups.len());
    Ok(groups)
}

/// Lossy UTF-8 file stem (`"a.b.mp4"` → `"a.b"`).
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Case-insensitive sort key for a file name.
pub(crate) fn name_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub(crate) fn check_root(root: &Path) -> Result<(), StudyGenError> {
    let reason = if !root.exists() {
        "directory not found"
    } else if !root.is_dir() {
        "not a directory"
    } else {
        return Ok(());
    };
    Err(StudyGenError::Discovery {
        path: root.to_path_buf(),
        reason: reason.to_string(),
    })
}

/// Files before subdirectories, each sorted case-insensitively.
fn sorted_walk(root: &Path) -> walkdir::IntoIter {
    WalkDir::new(root)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| {
                    a.file_name()
                        .to_string_lossy()
                        .to_lowercase()
                        .cmp(&b.file_name().to_string_lossy().to_lowercase())
                })
        })
        .into_iter()
}

fn is_temp_artifact(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX)
}
