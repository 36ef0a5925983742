//! Directory orchestrator: run every group under a root in three passes.
//!
//! ## Passes
//!
//! ```text
//! pass 1  media        one source per stem group with video, audio or text
//! pass 2  stem images  images sharing a stem with media → {stem}_images.*
//! pass 3  loose images all remaining images, one source per directory
//!                      → {dirname}_images.*
//! ```
//!
//! Groups run one at a time. A failing group is recorded and the run moves
//! on; only a bad root or an unusable configuration aborts the whole run.
//!
//! ## Claimed stems
//!
//! All three passes are planned before any source runs. [`RunContext`]
//! records, per `(directory, stem)`, which stems pass 1 claims and which
//! `_images` bases the image passes use. Pass 2 suffixes a group's image
//! artifacts only when pass 1 claimed its stem. A loose image source whose
//! base is already taken in the same directory is renamed instead of
//! silently reusing (and skipping on) the earlier transcript.
//!
//! A transcript written by an image source (`week2_images.txt`) is found
//! again by discovery on the next run. Text-only groups whose stem is a
//! planned image base are left to that image source, so each document runs
//! once per run.

use crate::classify::MediaKind;
use crate::config::PipelineConfig;
use crate::discovery::{self, name_key, FileGroups};
use crate::error::StudyGenError;
use crate::output::{DirectorySummary, GroupOutcome, Pass};
use crate::paths::IMAGES_SUFFIX;
use crate::pipeline::Toolchain;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::runner::{ImageGroupSource, Source, StageRunner};
use crate::select::select_primary;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fallback directory name for a root without one (`/`).
const ROOT_FALLBACK_NAME: &str = "images";

/// Suffix inserted before `_images` when a directory's loose-image base is
/// already claimed by a stem group of the same name.
const LOOSE_SUFFIX: &str = "_loose";

// ── Run context ──────────────────────────────────────────────────────────

/// Per-run state shared by the three passes. Never persisted: on the next
/// run the artifacts on disk are the resume state.
///
/// Media stems and image bases are tracked apart: the image bases decide
/// which rediscovered transcripts pass 1 leaves to their image source.
#[derive(Debug, Default)]
pub struct RunContext {
    stems: HashSet<(PathBuf, String)>,
    image_bases: HashSet<(PathBuf, String)>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stem handled by pass 1.
    pub fn claim_stem(&mut self, dir: &Path, stem: &str) {
        self.stems.insert((dir.to_path_buf(), stem.to_string()));
    }

    pub fn is_stem_claimed(&self, dir: &Path, stem: &str) -> bool {
        self.stems.contains(&(dir.to_path_buf(), stem.to_string()))
    }

    /// Record the artifact base (`{stem}_images`) of an image source.
    pub fn claim_image_base(&mut self, dir: &Path, base: &str) {
        self.image_bases.insert((dir.to_path_buf(), base.to_string()));
    }

    pub fn is_image_base_claimed(&self, dir: &Path, base: &str) -> bool {
        self.image_bases.contains(&(dir.to_path_buf(), base.to_string()))
    }
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Process every group under `root` with the default toolchain.
///
/// # Errors
/// - [`StudyGenError::Discovery`] if `root` is missing or unreadable
/// - [`StudyGenError::ProviderNotConfigured`] if the LLM provider cannot be built
/// - [`StudyGenError::PromptTemplate`] / [`StudyGenError::InvalidConfig`] for
///   unusable prompt or header files
///
/// Failed groups are *not* errors; inspect [`DirectorySummary::failed`] or
/// call [`DirectorySummary::into_result`].
pub async fn process_directory(
    root: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<DirectorySummary, StudyGenError> {
    let root = root.as_ref();
    discovery::check_root(root)?;
    let tools = Toolchain::from_config(config)?;
    process_directory_with(root, config, &tools).await
}

/// Process every group under `root` with an explicit toolchain.
pub async fn process_directory_with(
    root: impl AsRef<Path>,
    config: &PipelineConfig,
    tools: &Toolchain,
) -> Result<DirectorySummary, StudyGenError> {
    let root = root.as_ref();
    let runner = StageRunner::new(config, tools)?;
    let groups = discovery::group_by_stem(root, &config.extensions)?;
    let progress: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));

    let mut ctx = RunContext::new();
    let media = plan_media_pass(root, &groups, &mut ctx);
    let stem_images = plan_stem_image_pass(root, &groups, &mut ctx);
    let loose_images = plan_loose_image_pass(root, &groups, &mut ctx);
    let (media, owned) = drop_image_transcripts(media, &ctx);

    let total = groups.len() - owned;
    info!("Found {} file group(s) under {}", total, root.display());
    progress.on_run_start(total);

    let mut summary = DirectorySummary::new(root.to_path_buf(), total);
    run_pass(Pass::Media, media, &runner, &mut summary).await;
    run_pass(Pass::StemImages, stem_images, &runner, &mut summary).await;
    run_pass(Pass::LooseImages, loose_images, &runner, &mut summary).await;

    info!(
        "Finished {}: {} succeeded ({} new, {} up to date), {} failed",
        root.display(),
        summary.succeeded,
        summary.newly_processed,
        summary.up_to_date,
        summary.failed
    );
    progress.on_run_complete(summary.succeeded, summary.failed);
    Ok(summary)
}

/// Blocking wrapper around [`process_directory`].
///
/// Creates a Tokio runtime internally. Do not call from an async context.
pub fn process_directory_sync(
    root: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<DirectorySummary, StudyGenError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| StudyGenError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_directory(root, config))
}

// ── Passes ───────────────────────────────────────────────────────────────

/// One source scheduled for a pass.
#[derive(Debug)]
struct Scheduled {
    label: String,
    source: Source,
    /// `(dir, stem)` of a group holding nothing but text files.
    text_group: Option<(PathBuf, String)>,
}

async fn run_pass(
    pass: Pass,
    scheduled: Vec<Scheduled>,
    runner: &StageRunner<'_>,
    summary: &mut DirectorySummary,
) {
    info!("Starting {} ({} source(s))", pass, scheduled.len());
    for Scheduled { label, source, .. } in scheduled {
        let result = runner.run(&source, &label).await;
        summary.record(GroupOutcome { pass, label, result });
    }
}

/// Pass 1: one source per group with video, audio or text. Every planned
/// group claims its stem.
fn plan_media_pass(root: &Path, groups: &FileGroups, ctx: &mut RunContext) -> Vec<Scheduled> {
    let mut planned = Vec::new();
    for group in groups.values().filter(|g| g.has_media()) {
        let Some(source) = select_primary(group).and_then(|p| Source::from_primary(&p)) else {
            continue;
        };
        ctx.claim_stem(&group.dir, &group.stem);
        let text_only = group.files.iter().all(|f| f.kind == MediaKind::Text);
        planned.push(Scheduled {
            label: relative(root, source_path(&source)),
            source,
            text_group: text_only.then(|| (group.dir.clone(), group.stem.clone())),
        });
    }
    planned
}

/// Pass 2: the images of groups that also hold media. The `_images` suffix
/// applies when pass 1 claimed the stem, so `{stem}.txt` stays the media
/// transcript.
fn plan_stem_image_pass(root: &Path, groups: &FileGroups, ctx: &mut RunContext) -> Vec<Scheduled> {
    let mut planned = Vec::new();
    for group in groups.values().filter(|g| g.has_media() && g.has_images()) {
        let suffixed = ctx.is_stem_claimed(&group.dir, &group.stem);
        if !suffixed {
            debug!("{}: no media source claimed this stem", group.key);
        }
        let base = if suffixed {
            format!("{}{}", group.stem, IMAGES_SUFFIX)
        } else {
            group.stem.clone()
        };
        ctx.claim_image_base(&group.dir, &base);

        let images = group.images();
        planned.push(Scheduled {
            label: format!(
                "{} ({} images)",
                relative(root, &group.dir.join(&group.stem)),
                images.len()
            ),
            source: Source::Images(ImageGroupSource {
                dir: group.dir.clone(),
                stem: group.stem.clone(),
                images,
                suffixed,
            }),
            text_group: None,
        });
    }
    planned
}

/// Pass 3: every remaining image, one source per directory named after it.
fn plan_loose_image_pass(root: &Path, groups: &FileGroups, ctx: &mut RunContext) -> Vec<Scheduled> {
    let mut planned = Vec::new();
    for (dir, images) in loose_images_by_dir(groups) {
        let mut stem = directory_name(&dir, root);
        if ctx.is_image_base_claimed(&dir, &format!("{stem}{IMAGES_SUFFIX}")) {
            warn!(
                "{}: '{}{}' is taken by a stem group, using '{}{}{}'",
                dir.display(),
                stem,
                IMAGES_SUFFIX,
                stem,
                LOOSE_SUFFIX,
                IMAGES_SUFFIX
            );
            stem.push_str(LOOSE_SUFFIX);
        }
        ctx.claim_image_base(&dir, &format!("{stem}{IMAGES_SUFFIX}"));

        planned.push(Scheduled {
            label: format!("{} ({} images)", relative_dir(root, &dir), images.len()),
            source: Source::Images(ImageGroupSource {
                dir,
                stem,
                images,
                suffixed: true,
            }),
            text_group: None,
        });
    }
    planned
}

/// Remove text-only groups whose stem is the artifact base of an image
/// source: they are transcripts an earlier run wrote for those images, and
/// the image source resumes from them. Returns the kept sources and the
/// number removed.
fn drop_image_transcripts(media: Vec<Scheduled>, ctx: &RunContext) -> (Vec<Scheduled>, usize) {
    let (owned, kept): (Vec<Scheduled>, Vec<Scheduled>) = media.into_iter().partition(|s| {
        s.text_group
            .as_ref()
            .is_some_and(|(dir, stem)| ctx.is_image_base_claimed(dir, stem))
    });
    for s in &owned {
        debug!("{}: transcript of an image source, resumed with its images", s.label);
    }
    (kept, owned.len())
}

fn source_path(source: &Source) -> &Path {
    match source {
        Source::Video(p) | Source::Audio(p) | Source::Text(p) => p,
        Source::Images(g) => &g.dir,
    }
}

// ── Grouping helpers ─────────────────────────────────────────────────────

/// Images of image-only groups, bucketed by directory. Directories come in
/// case-insensitive relative-path order (root first), images in
/// case-insensitive name order.
fn loose_images_by_dir(groups: &FileGroups) -> Vec<(PathBuf, Vec<PathBuf>)> {
    let mut buckets: BTreeMap<String, (PathBuf, Vec<PathBuf>)> = BTreeMap::new();

    for group in groups.values().filter(|g| !g.has_media() && g.has_images()) {
        let key = group.key.rel_dir.to_string_lossy().to_lowercase();
        buckets
            .entry(key)
            .or_insert_with(|| (group.dir.clone(), Vec::new()))
            .1
            .extend(group.images());
    }

    buckets
        .into_values()
        .map(|(dir, mut images)| {
            images.sort_by_key(|p| name_key(p));
            (dir, images)
        })
        .collect()
}

/// Name of `dir` for loose-image artifacts. The root may be given as `.`,
/// so it is canonicalised first.
fn directory_name(dir: &Path, root: &Path) -> String {
    let resolved = if dir == root {
        std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
    } else {
        dir.to_path_buf()
    };
    // Whole name, not the stem: `week.2` stays `week.2`.
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ROOT_FALLBACK_NAME.to_string())
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn relative_dir(root: &Path, dir: &Path) -> String {
    let rel = relative(root, dir);
    if rel.is_empty() {
        "./".to_string()
    } else {
        format!("{rel}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ExtensionSets;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, b"x").unwrap();
    }

    #[test]
    fn loose_images_bucket_by_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.png");
        touch(dir.path(), "A.jpg");
        touch(dir.path(), "week2/z.png");
        touch(dir.path(), "lecture.mp4");
        touch(dir.path(), "lecture.png");

        let groups = discovery::group_by_stem(dir.path(), &ExtensionSets::default()).unwrap();
        let buckets = loose_images_by_dir(&groups);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].0, dir.path());
        let names: Vec<String> = buckets[0].1.iter().map(|p| name_key(p)).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
        assert_eq!(buckets[1].0, dir.path().join("week2"));
    }

    #[test]
    fn directory_name_resolves_dot_root() {
        let dir = TempDir::new().unwrap();
        let named = dir.path().join("biology");
        fs::create_dir(&named).unwrap();
        assert_eq!(directory_name(&named, &named), "biology");
        let dotted = named.join("week.2");
        assert_eq!(directory_name(&dotted, &named), "week.2");
    }

    #[test]
    fn claims_are_per_directory() {
        let mut ctx = RunContext::new();
        ctx.claim_stem(Path::new("/a"), "lecture");
        assert!(ctx.is_stem_claimed(Path::new("/a"), "lecture"));
        assert!(!ctx.is_stem_claimed(Path::new("/b"), "lecture"));
        assert!(!ctx.is_image_base_claimed(Path::new("/a"), "lecture"));
    }

    fn suffixed(s: &Scheduled) -> bool {
        match &s.source {
            Source::Images(g) => g.suffixed,
            other => panic!("expected an image source, got {other:?}"),
        }
    }

    #[test]
    fn stem_images_are_suffixed_only_after_a_media_claim() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "lecture.mp4");
        touch(dir.path(), "lecture.png");
        let groups = discovery::group_by_stem(dir.path(), &ExtensionSets::default()).unwrap();

        let mut fresh = RunContext::new();
        let unclaimed = plan_stem_image_pass(dir.path(), &groups, &mut fresh);
        assert!(!suffixed(&unclaimed[0]));

        let mut ctx = RunContext::new();
        plan_media_pass(dir.path(), &groups, &mut ctx);
        let claimed = plan_stem_image_pass(dir.path(), &groups, &mut ctx);
        assert!(suffixed(&claimed[0]));
        assert!(ctx.is_image_base_claimed(dir.path(), "lecture_images"));
    }

    #[test]
    fn image_transcripts_are_left_to_their_images() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("scans");
        touch(&root, "a.jpg");
        touch(&root, "b.jpg");
        touch(&root, "scans_images.txt");
        touch(&root, "notes.txt");
        touch(&root, "talk.mp3");
        touch(&root, "talk.png");
        touch(&root, "talk_images.txt");
        let groups = discovery::group_by_stem(&root, &ExtensionSets::default()).unwrap();

        let mut ctx = RunContext::new();
        let media = plan_media_pass(&root, &groups, &mut ctx);
        plan_stem_image_pass(&root, &groups, &mut ctx);
        plan_loose_image_pass(&root, &groups, &mut ctx);
        let (kept, dropped) = drop_image_transcripts(media, &ctx);

        let labels: Vec<&str> = kept.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["notes.txt", "talk.mp3"]);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn sync_wrapper_reports_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = process_directory_sync(&missing, &crate::PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, StudyGenError::Discovery { .. }), "got: {err}");
    }

    #[test]
    fn labels_are_relative() {
        let root = Path::new("/c");
        assert_eq!(relative(root, Path::new("/c/w/a.mp4")), "w/a.mp4");
        assert_eq!(relative_dir(root, root), "./");
        assert_eq!(relative_dir(root, Path::new("/c/w")), "w/");
    }
}
