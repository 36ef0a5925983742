//! Prompts and the default LaTeX header.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing what a study guide contains
//!    requires editing exactly one place.
//!
//! 2. **Testability**: unit tests can inspect prompts directly without a
//!    real LLM, so a dropped section or a lost placeholder is caught early.
//!
//! Callers can override the study prompt via
//! [`crate::config::PipelineConfig::prompt_file`] and the header via
//! [`crate::config::PipelineConfig::header_file`].

use crate::error::StudyGenError;
use std::path::Path;

/// Placeholder replaced by the transcript text in a study prompt template.
pub const TRANSCRIPT_PLACEHOLDER: &str = "{transcript}";

/// The level-2 sections every study guide is asked to contain, in order.
///
/// [`crate::pipeline::postprocess::missing_sections`] checks generated
/// output against this list.
pub const STUDY_SECTIONS: [&str; 7] = [
    "Learning Objectives",
    "Executive Overview",
    "Core Concepts",
    "In-Depth",
    "Summary",
    "Glossary",
    "Knowledge Assessment",
];

/// System message sent ahead of every study-generation request.
pub const STUDY_SYSTEM_PROMPT: &str = "You are a world-class domain expert and textbook author. \
You write original, authoritative, standalone reference material in clean Markdown.";

/// Default study prompt template. Contains exactly one `{transcript}` placeholder.
pub const DEFAULT_STUDY_TEMPLATE: &str = r#"A transcript is provided below.

### YOUR TASK (Two Phases):

**Phase 1 - Concept Extraction:**
Read the transcript and identify the core SUBJECT DOMAIN, TOPICS, and CONCEPTS being discussed. The transcript is ONLY a source of topic hints. Do NOT summarize, paraphrase, or follow the structure of the transcript.

**Phase 2 - Authoritative Content Generation:**
Write a comprehensive, standalone textbook chapter that teaches these topics in depth, as if you are writing for a professional reference book. You must write ORIGINAL, AUTHORITATIVE content about the identified topics.

### CRITICAL RULES:
1. **NEVER reference the transcript, lecture, video, speaker, presentation, or recording.** Do not use phrases like 'In this video', 'The speaker explains' or 'As discussed in the lecture'. Write as if no transcript exists.
2. **Do NOT follow the transcript's structure or flow.** Organize content by the logical structure of the domain knowledge itself.
3. **Go BEYOND what was said.** For each concept:
   - Define it precisely and explain why it matters
   - Describe types, classifications, or variations
   - Explain how to implement or apply it step by step
   - List common mistakes and pitfalls and how to avoid them
   - Reference relevant industry standards, frameworks, or best practices
   - Provide practical real-world examples
4. **Write like a textbook author**, not a note-taker.
5. **Professional tone**: formal, academic, yet engaging.
6. **Formatting**: clean Markdown with clear hierarchies. Put formulas and code in appropriate blocks.

### STRUCTURE YOUR RESPONSE WITH THESE SECTIONS:

# [Authoritative Title for the Subject Domain]

## 1. Learning Objectives
List 3-5 clear, actionable objectives. What will the reader be able to DO after mastering this material?

## 2. Executive Overview
A detailed 2-3 paragraph introduction to the subject domain. Why does it matter? What problems does it solve?

## 3. Core Concepts & Technical Definitions
Define each fundamental concept with precision. Use **bold** for key terms.

## 4. In-Depth Subject Matter Coverage
The main body. Organize by domain logic using ### and #### headings. Include **Best Practices** and **Common Pitfalls** callouts, blockquotes for real-world scenarios, and code blocks for technical syntax.

## 5. Summary & Actionable Takeaways
A 'Key Takeaways' list of what the reader should remember and apply immediately.

## 6. Glossary of Terms
Technical terms with expanded definitions and cross-references.

## 7. Knowledge Assessment (Bloom's Taxonomy Based)

### Part A: Recall & Comprehension (10 MCQs)
**Q1:** Question?
- A) Option
- B) Option
- C) **Option (Correct)**
- D) Option

### Part B: Application & Analysis (5 Short Answer Questions)
**Q11:** Scenario/Question text?
*Answer:* Detailed explanation demonstrating practical application.

### Part C: Synthesis & Evaluation (2 Critical Thinking Challenges)
**Q16:** Challenge prompt?
*Answer:* Guidelines for a high-quality response.

---
REMEMBER: the transcript below is ONLY used to identify WHAT topics to cover.

Transcript (for topic identification only):
{transcript}"#;

/// Prompt for reading a scanned image with a vision model.
pub const VISION_OCR_PROMPT: &str = r#"Transcribe ALL text visible in this image exactly as written.

- Preserve reading order as a human would read it
- Keep line breaks between separate lines, bullets, and boxes
- Transcribe handwriting as best you can; mark illegible words as [illegible]
- Output ONLY the transcribed text, with no commentary
- If the image contains no text at all, output nothing"#;

/// Default LaTeX header passed to Pandoc via `--include-in-header`.
///
/// The footer line is replaced when author attribution is configured.
pub const DEFAULT_LATEX_HEADER: &str = r#"% Study guide header
\usepackage{fancyhdr}
\usepackage{xcolor}
\usepackage{graphicx}
\usepackage{booktabs}
\usepackage{longtable}
\usepackage{hyperref}
\hypersetup{colorlinks=true, linkcolor=blue!50!black, urlcolor=blue!60!black}
\usepackage[margin=1in]{geometry}
\setlength{\headheight}{15pt}
\pagestyle{fancy}
\fancyhf{}
\renewcommand{\headrulewidth}{0.5pt}
\renewcommand{\footrulewidth}{0.5pt}
\fancyhead[L]{\leftmark}
\fancyhead[R]{\thepage}
\fancyfoot[C]{\small AI-generated Study Material}
"#;

/// The footer line of [`DEFAULT_LATEX_HEADER`].
pub const DEFAULT_FOOTER_LINE: &str = r"\fancyfoot[C]{\small AI-generated Study Material}";

/// Load a custom study prompt template from disk.
///
/// # Errors
/// [`StudyGenError::PromptTemplate`] if the file cannot be read or does not
/// contain `{transcript}` exactly once.
pub fn load_template(path: &Path) -> Result<String, StudyGenError> {
    let template = std::fs::read_to_string(path).map_err(|e| StudyGenError::PromptTemplate {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    match template.matches(TRANSCRIPT_PLACEHOLDER).count() {
        1 => Ok(template),
        n => Err(StudyGenError::PromptTemplate {
            path: path.to_path_buf(),
            reason: format!("expected exactly one {TRANSCRIPT_PLACEHOLDER} placeholder, found {n}"),
        }),
    }
}

/// Substitute the transcript into a template.
pub fn render_study_prompt(template: &str, transcript: &str) -> String {
    template.replacen(TRANSCRIPT_PLACEHOLDER, transcript, 1)
}
