//! Extension classifier: map a path to a media class by suffix.
//!
//! Classification is a total function. A path whose suffix is in none of the
//! configured sets is [`MediaKind::Unknown`]; that is not an error, it simply
//! means the file is ignored by discovery.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Media class of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Text,
    Image,
    Unknown,
}

impl MediaKind {
    /// `true` for every class the pipeline can start from or consume.
    pub fn is_supported(self) -> bool {
        !matches!(self, MediaKind::Unknown)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Text => "text",
            MediaKind::Image => "image",
            MediaKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The configurable suffix lists, one per media class.
///
/// Entries are stored lower-case with a leading dot (`".mp4"`). Use
/// [`ExtensionSets::normalised`] after editing by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSets {
    pub video: Vec<String>,
    pub audio: Vec<String>,
    pub text: Vec<String>,
    pub image: Vec<String>,
}

impl Default for ExtensionSets {
    fn default() -> Self {
        fn list(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Self {
            video: list(&[".mp4", ".mkv", ".avi", ".mov"]),
            audio: list(&[".mp3", ".wav", ".m4a", ".aac"]),
            text: list(&[".txt"]),
            image: list(&[
                ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".tiff", ".tif", ".webp",
            ]),
        }
    }
}

impl ExtensionSets {
    /// Classify `path` by its suffix (case-insensitive).
    pub fn classify(&self, path: &Path) -> MediaKind {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return MediaKind::Unknown;
        };
        let suffix = format!(".{}", ext.to_lowercase());

        if self.video.contains(&suffix) {
            MediaKind::Video
        } else if self.audio.contains(&suffix) {
            MediaKind::Audio
        } else if self.text.contains(&suffix) {
            MediaKind::Text
        } else if self.image.contains(&suffix) {
            MediaKind::Image
        } else {
            MediaKind::Unknown
        }
    }

    /// Lower-case every entry and add a missing leading dot.
    pub fn normalised(mut self) -> Self {
        for set in [
            &mut self.video,
            &mut self.audio,
            &mut self.text,
            &mut self.image,
        ] {
            for ext in set.iter_mut() {
                let lower = ext.trim().to_lowercase();
                *ext = if lower.starts_with('.') {
                    lower
                } else {
                    format!(".{lower}")
                };
            }
            set.sort();
            set.dedup();
        }
        self
    }

    /// The first suffix that appears in more than one class, if any.
    pub fn first_overlap(&self) -> Option<&str> {
        let sets = [&self.video, &self.audio, &self.text, &self.image];
        for (i, a) in sets.iter().enumerate() {
            for b in sets.iter().skip(i + 1) {
                if let Some(ext) = a.iter().find(|e| b.contains(e)) {
                    return Some(ext);
                }
            }
        }
        None
    }
}
