//! Primary source selection: pick the one file a group's pipeline starts from.
//!
//! Priority is fixed: video > audio > text, and only a group with none of
//! those falls back to its images. Members are already sorted by file name,
//! so when two files share a class (`talk.mp3` and `talk.wav`) the first by
//! case-insensitive name wins.

use crate::classify::MediaKind;
use crate::discovery::FileGroup;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where the stage sequence begins for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    Video,
    Audio,
    Text,
    Images,
}

impl StartMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StartMode::Video => "video",
            StartMode::Audio => "audio",
            StartMode::Text => "text",
            StartMode::Images => "images",
        }
    }
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The selected `(path, start mode)` pair for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimarySource {
    pub path: PathBuf,
    pub mode: StartMode,
}

/// Pick the primary source of `group`, or `None` for a group with no
/// supported members.
///
/// An image-only group yields its first image with [`StartMode::Images`];
/// the orchestrator handles image groups in their own passes because they
/// need an OCR pre-stage over every image, not just this one.
pub fn select_primary(group: &FileGroup) -> Option<PrimarySource> {
    const PRIORITY: [(MediaKind, StartMode); 4] = [
        (MediaKind::Video, StartMode::Video),
        (MediaKind::Audio, StartMode::Audio),
        (MediaKind::Text, StartMode::Text),
        (MediaKind::Image, StartMode::Images),
    ];

    PRIORITY.iter().find_map(|&(kind, mode)| {
        group
            .files
            .iter()
            .find(|f| f.kind == kind)
            .map(|f| PrimarySource {
                path: f.path.clone(),
                mode,
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{GroupKey, MediaFile};
    use std::path::Path;

    fn group(names: &[(&str, MediaKind)]) -> FileGroup {
        let mut files: Vec<MediaFile> = names
            .iter()
            .map(|(n, k)| MediaFile {
                path: Path::new("/d").join(n),
                kind: *k,
            })
            .collect();
        files.sort_by_key(|f| f.path.to_string_lossy().to_lowercase());
        FileGroup {
            key: GroupKey {
                rel_dir: PathBuf::new(),
                stem: "x".into(),
            },
            dir: PathBuf::from("/d"),
            stem: "x".into(),
            files,
        }
    }

    #[test]
    fn video_beats_audio_beats_text() {
        let all = group(&[
            ("x.mp4", MediaKind::Video),
            ("x.mp3", MediaKind::Audio),
            ("x.txt", MediaKind::Text),
        ]);
        let p = select_primary(&all).unwrap();
        assert_eq!(p.path, Path::new("/d/x.mp4"));
        assert_eq!(p.mode, StartMode::Video);

        let no_video = group(&[("x.mp3", MediaKind::Audio), ("x.txt", MediaKind::Text)]);
        let p = select_primary(&no_video).unwrap();
        assert_eq!(p.path, Path::new("/d/x.mp3"));
        assert_eq!(p.mode, StartMode::Audio);

        let text_only = group(&[("x.txt", MediaKind::Text)]);
        let p = select_primary(&text_only).unwrap();
        assert_eq!(p.path, Path::new("/d/x.txt"));
        assert_eq!(p.mode, StartMode::Text);
    }

    #[test]
    fn images_only_falls_back_to_first_image() {
        let g = group(&[("x.png", MediaKind::Image), ("x.jpg", MediaKind::Image)]);
        let p = select_primary(&g).unwrap();
        assert_eq!(p.path, Path::new("/d/x.jpg"));
        assert_eq!(p.mode, StartMode::Images);
    }

    #[test]
    fn images_never_win_over_media() {
        let g = group(&[("x.png", MediaKind::Image), ("x.txt", MediaKind::Text)]);
        assert_eq!(select_primary(&g).unwrap().mode, StartMode::Text);
    }

    #[test]
    fn same_class_tie_breaks_by_name() {
        let g = group(&[("x.wav", MediaKind::Audio), ("x.M4A", MediaKind::Audio)]);
        assert_eq!(select_primary(&g).unwrap().path, Path::new("/d/x.M4A"));
    }

    #[test]
    fn empty_group_has_no_primary() {
        assert_eq!(select_primary(&group(&[])), None);
    }
}
