//! AI-content marking for rendered study guides.
//!
//! Generated handouts circulate well beyond the person who made them. When
//! marking is configured the PDF carries up to three signals that it was
//! machine-written: a diagonal watermark, an attribution footer on every
//! page, and a closing acknowledgment page. Marking only touches the
//! render inputs (a temp copy of the Markdown and the LaTeX header); the
//! `_study.md` on disk is never modified.

use crate::prompts::DEFAULT_FOOTER_LINE;
use serde::{Deserialize, Serialize};

/// Who to credit in the footer and acknowledgment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub name: String,
    pub email: String,
}

impl AuthorInfo {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// `"Name, email"`, or just the name when no email is set.
    pub fn attribution(&self) -> String {
        if self.email.trim().is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.email)
        }
    }
}

/// Diagonal watermark drawn with the `draftwatermark` LaTeX package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkConfig {
    pub text: String,
    /// 0.0 (invisible) to 1.0.
    pub opacity: f32,
    /// Degrees counter-clockwise.
    pub rotation: i32,
    /// Nominal size in points; 48 corresponds to scale 1.0.
    pub font_size: u32,
    /// `#RRGGBB`.
    pub color: String,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: "AI Generated Content".to_string(),
            opacity: 0.3,
            rotation: 45,
            font_size: 48,
            color: "#CCCCCC".to_string(),
        }
    }
}

impl WatermarkConfig {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// The colour as a LaTeX `{rgb,r,g,b}` spec. Invalid hex falls back to light grey.
    pub fn latex_color(&self) -> String {
        let hex = self.color.trim_start_matches('#');
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .map(|v| f32::from(v) / 255.0)
        };
        match (hex.len(), channel(0), channel(2), channel(4)) {
            (6, Some(r), Some(g), Some(b)) => format!("{{rgb,{r:.3},{g:.3},{b:.3}}}"),
            _ => "{rgb,0.8,0.8,0.8}".to_string(),
        }
    }

    fn scale(&self) -> f32 {
        self.font_size as f32 / 48.0
    }
}

/// Which marks to apply. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiMarking {
    pub author: Option<AuthorInfo>,
    pub watermark: Option<WatermarkConfig>,
    /// Append an acknowledgment page. Requires `author`.
    pub acknowledgment: bool,
}

impl AiMarking {
    /// `true` if no mark would be applied.
    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.watermark.is_none()
    }

    /// Add watermark and attribution footer to a LaTeX header.
    pub fn apply_to_header(&self, header: &str) -> String {
        let mut out = String::with_capacity(header.len() + 512);

        if let Some(ref wm) = self.watermark {
            out.push_str("% AI content watermark\n\\usepackage{draftwatermark}\n");
            out.push_str(&format!("\\SetWatermarkText{{{}}}\n", escape_latex(&wm.text)));
            out.push_str(&format!("\\SetWatermarkScale{{{}}}\n", wm.scale()));
            out.push_str(&format!("\\SetWatermarkAngle{{{}}}\n", wm.rotation));
            out.push_str(&format!("\\SetWatermarkColor{{{}}}\n", wm.latex_color()));
            out.push_str(&format!("\\SetWatermarkOpacity{{{}}}\n", wm.opacity.clamp(0.0, 1.0)));
        }

        match self.author {
            Some(ref author) => {
                let footer = format!(
                    "\\fancyfoot[C]{{\\small AI-generated | {}}}",
                    escape_latex(&author.attribution())
                );
                if header.contains(DEFAULT_FOOTER_LINE) {
                    out.push_str(&header.replace(DEFAULT_FOOTER_LINE, &footer));
                } else {
                    out.push_str(header);
                    if !header.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(&footer);
                    out.push('\n');
                }
            }
            None => out.push_str(header),
        }
        out
    }

    /// Minimal header for the last-resort render: attribution footer only.
    pub fn minimal_header(&self) -> Option<String> {
        let author = self.author.as_ref()?;
        Some(format!(
            "\\usepackage{{fancyhdr}}\n\\pagestyle{{fancy}}\n\\fancyhf{{}}\n\\fancyhead[R]{{\\thepage}}\n\
\\fancyfoot[C]{{\\small AI-generated | {}}}\n",
            escape_latex(&author.attribution())
        ))
    }

    /// Append the acknowledgment page to the study Markdown, if enabled.
    pub fn apply_to_markdown(&self, markdown: &str) -> String {
        match (self.acknowledgment, self.author.as_ref()) {
            (true, Some(author)) => format!(
                "{}\n\n\\newpage\n\n{}",
                markdown.trim_end(),
                acknowledgment_page(author)
            ),
            _ => markdown.to_string(),
        }
    }
}

fn acknowledgment_page(author: &AuthorInfo) -> String {
    let contact = if author.email.trim().is_empty() {
        String::new()
    } else {
        format!("\n{}\n", author.email)
    };
    format!(
        "# Acknowledgment\n\n\
This study material was generated automatically from recorded media by a\n\
language model and prepared for distribution by:\n\n\
**{name}**\n{contact}\n\
The content is original expository writing on the topics identified in the\n\
source material. It has not been reviewed for accuracy by a subject-matter\n\
expert; verify important facts against authoritative references.\n",
        name = author.name,
    )
}

/// Escape characters with special meaning in LaTeX text.
fn escape_latex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}
