//! Result types returned by the stage runner and the directory orchestrator.

use crate::error::StudyGenError;
use crate::runner::Stage;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Outcome of running one source through its stages.
///
/// `success` reflects stages 1–3 only. A failed PDF render leaves
/// `success == true` and records `pdf_status = "failed"` plus `pdf_error`
/// in `metadata`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    /// The last artifact produced or found: the PDF, or the study document
    /// when no PDF was made.
    pub output_path: Option<PathBuf>,
    pub message: String,
    pub metadata: BTreeMap<String, Value>,
    /// Stages that did real work, in order. Empty when everything was up to date.
    pub stages_run: Vec<Stage>,
}

impl ProcessResult {
    pub fn succeeded(output_path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }

    /// Insert a metadata entry, builder-style.
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// `true` if every artifact already existed and nothing ran.
    pub fn was_up_to_date(&self) -> bool {
        self.success && self.stages_run.is_empty()
    }

    /// `true` if the PDF stage was attempted and failed.
    pub fn pdf_failed(&self) -> bool {
        self.metadata.get("pdf_status").and_then(Value::as_str) == Some("failed")
    }
}

/// Which orchestrator pass handled a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    /// Video, audio and text groups.
    Media,
    /// Images sharing a stem with other media.
    StemImages,
    /// Remaining images, one document per directory.
    LooseImages,
}

impl Pass {
    pub fn number(self) -> u8 {
        match self {
            Pass::Media => 1,
            Pass::StemImages => 2,
            Pass::LooseImages => 3,
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pass::Media => "media",
            Pass::StemImages => "stem images",
            Pass::LooseImages => "loose images",
        };
        write!(f, "pass {} ({})", self.number(), name)
    }
}

/// One group's result, tagged with the pass and a display label.
#[derive(Debug, Clone, Serialize)]
pub struct GroupOutcome {
    pub pass: Pass,
    /// Path of the source relative to the root (`week2/lecture1.mp4`,
    /// `week2/ (3 images)`).
    pub label: String,
    pub result: ProcessResult,
}

/// Aggregate result of one directory run.
#[derive(Debug, Clone, Serialize)]
pub struct DirectorySummary {
    pub directory: PathBuf,
    /// File groups found by discovery (stem groups, before pass 3 regrouping).
    pub groups_found: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successful outcomes where at least one stage ran.
    pub newly_processed: usize,
    /// Successful outcomes where nothing needed doing.
    pub up_to_date: usize,
    /// Successful outcomes whose PDF could not be rendered.
    pub pdf_warnings: usize,
    pub outcomes: Vec<GroupOutcome>,
}

impl DirectorySummary {
    pub(crate) fn new(directory: PathBuf, groups_found: usize) -> Self {
        Self {
            directory,
            groups_found,
            succeeded: 0,
            failed: 0,
            newly_processed: 0,
            up_to_date: 0,
            pdf_warnings: 0,
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, outcome: GroupOutcome) {
        let r = &outcome.result;
        if r.success {
            self.succeeded += 1;
            if r.was_up_to_date() {
                self.up_to_date += 1;
            } else {
                self.newly_processed += 1;
            }
            if r.pdf_failed() {
                self.pdf_warnings += 1;
            }
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }

    /// `true` when no group failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Failed outcomes, in processing order.
    pub fn failures(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.outcomes.iter().filter(|o| !o.result.success)
    }

    /// Convert to `Err(PartialFailure)` when any group failed.
    pub fn into_result(self) -> Result<Self, StudyGenError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(StudyGenError::PartialFailure {
                succeeded: self.succeeded,
                failed: self.failed,
                total: self.succeeded + self.failed,
            })
        }
    }

    /// Collapse the run into a single directory-level [`ProcessResult`].
    pub fn to_process_result(&self) -> ProcessResult {
        let total = self.succeeded + self.failed;
        let message = if self.is_success() {
            format!("Processed {total} item(s) in {}", self.directory.display())
        } else {
            format!(
                "{} of {total} item(s) failed in {}",
                self.failed,
                self.directory.display()
            )
        };
        ProcessResult {
            success: self.is_success(),
            output_path: Some(self.directory.clone()),
            message,
            metadata: BTreeMap::new(),
            stages_run: Vec::new(),
        }
        .with_meta("groups_found", self.groups_found)
        .with_meta("succeeded", self.succeeded)
        .with_meta("failed", self.failed)
        .with_meta("newly_processed", self.newly_processed)
        .with_meta("up_to_date", self.up_to_date)
    }
}
