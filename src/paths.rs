//! Output path derivation: the bit-exact artifact naming contract.
//!
//! | Artifact | Pattern |
//! |---|---|
//! | Extracted audio | `{stem}.mp3` |
//! | Transcript (media) | `{stem}.txt` |
//! | Transcript (images, stem taken) | `{stem}_images.txt` |
//! | Transcript (loose images) | `{directory_name}_images.txt` |
//! | Study document | `{base}_study.md` |
//! | PDF | `{base}.pdf` |
//! | PDF (source was a PDF extraction) | `{base} - AI study guide.pdf` |
//!
//! `{base}` is the transcript's stem, so image transcripts get their own
//! study document and PDF and never overwrite the media group's.
//!
//! Everything here is a pure function of its inputs. Facts that depend on
//! other groups or on file contents (is the stem already taken? was the text
//! extracted from a PDF?) are passed in through [`Naming`].

use crate::discovery::file_stem;
use crate::select::StartMode;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Suffix appended to image transcripts whose stem is taken by other media.
pub const IMAGES_SUFFIX: &str = "_images";
/// Suffix of the generated study document.
pub const STUDY_SUFFIX: &str = "_study.md";
/// Name tail of the PDF produced from a PDF-derived transcript.
pub const PDF_GUIDE_SUFFIX: &str = " - AI study guide.pdf";

/// Caller-supplied naming facts the deriver cannot compute on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Naming {
    /// Image sources only: the stem is claimed by non-image media, so the
    /// transcript takes the `_images` suffix.
    ///
    /// The directory orchestrator sets this for every image source it runs:
    /// loose images always, stem images whenever pass 1 claimed the stem
    /// (which it does for every group holding media). Left unset, an image
    /// set is named after its bare stem (`board.txt`); library callers
    /// running a standalone [`crate::runner::ImageGroupSource`] get that.
    pub images_suffix: bool,
    /// The transcript text was extracted from an existing PDF; the study PDF
    /// must not overwrite it.
    pub source_was_pdf: bool,
}

/// The four sibling artifacts of one logical source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub audio: PathBuf,
    pub transcript: PathBuf,
    pub study: PathBuf,
    pub pdf: PathBuf,
}

impl ArtifactPaths {
    /// Derive artifact paths for a concrete source file.
    pub fn derive(source: &Path, mode: StartMode, naming: Naming) -> Self {
        let dir = source.parent().unwrap_or_else(|| Path::new(""));
        Self::for_stem(dir, &file_stem(source), mode, naming)
    }

    /// Derive artifact paths from a directory and stem.
    ///
    /// Image sources use this directly: a loose-image folder has no single
    /// source file, only a synthetic stem (the folder name).
    pub fn for_stem(dir: &Path, stem: &str, mode: StartMode, naming: Naming) -> Self {
        let base = if mode == StartMode::Images && naming.images_suffix {
            format!("{stem}{IMAGES_SUFFIX}")
        } else {
            stem.to_string()
        };

        let pdf_name = if naming.source_was_pdf {
            format!("{base}{PDF_GUIDE_SUFFIX}")
        } else {
            format!("{base}.pdf")
        };

        Self {
            audio: dir.join(format!("{stem}.mp3")),
            transcript: dir.join(format!("{base}.txt")),
            study: dir.join(format!("{base}{STUDY_SUFFIX}")),
            pdf: dir.join(pdf_name),
        }
    }

    /// The same paths with the PDF renamed for a PDF-derived transcript.
    pub fn with_source_was_pdf(mut self, source_was_pdf: bool) -> Self {
        let dir = self
            .transcript
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let base = file_stem(&self.transcript);
        self.pdf = if source_was_pdf {
            dir.join(format!("{base}{PDF_GUIDE_SUFFIX}"))
        } else {
            dir.join(format!("{base}.pdf"))
        };
        self
    }
}
