//! Printable PDF report over the whole run history.

pub mod layout;
pub mod pdf;
pub mod template;

use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::core::artifact::write_atomic;
use crate::error::{Error, Result};
use crate::models::RunRecord;

pub use layout::TextMetrics;
pub use template::{RenderMode, ReportText, compose};

const OUTPUT_HINT: &str = "check that the output directory exists and is writable";

/// A rendered report on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub path: PathBuf,
    pub mode: RenderMode,
    /// Title and body lines exactly as set into the document.
    pub title: String,
    pub lines: Vec<String>,
    /// History records listed; 0 means the "no data" report.
    pub entries: usize,
    pub pages: usize,
}

/// Font capability, resolved once per report.
enum FontChoice {
    Unicode { bytes: Vec<u8>, font: FontArc },
    Ascii,
}

impl FontChoice {
    fn mode(&self) -> RenderMode {
        match self {
            FontChoice::Unicode { .. } => RenderMode::Unicode,
            FontChoice::Ascii => RenderMode::Ascii,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportGenerator {
    font_path: PathBuf,
    output_path: PathBuf,
}

impl ReportGenerator {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(font_path: P, output_path: Q) -> Self {
        Self {
            font_path: font_path.as_ref().to_path_buf(),
            output_path: output_path.as_ref().to_path_buf(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.font_path, settings.report_path())
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Render mode a report generated right now would use.
    pub fn render_mode(&self) -> RenderMode {
        self.resolve_font().mode()
    }

    fn resolve_font(&self) -> FontChoice {
        let bytes = match std::fs::read(&self.font_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(font = ?self.font_path, error = %e, "Unicode font unavailable, using ASCII report");
                return FontChoice::Ascii;
            }
        };
        match FontArc::try_from_vec(bytes.clone()) {
            Ok(font) => FontChoice::Unicode { bytes, font },
            Err(e) => {
                warn!(font = ?self.font_path, error = %e, "Unicode font unreadable, using ASCII report");
                FontChoice::Ascii
            }
        }
    }

    /// Render `records` and atomically replace the report file.
    ///
    /// An empty history yields a valid "no data" report, not an error.
    pub fn generate(&self, records: &[RunRecord]) -> Result<Report> {
        let choice = self.resolve_font();
        let text = compose(records, choice.mode());

        let (metrics, font) = match &choice {
            FontChoice::Unicode { bytes, font } => {
                (TextMetrics::Font(font.clone()), pdf::PdfFont::Embedded(bytes))
            }
            FontChoice::Ascii => (TextMetrics::Helvetica, pdf::PdfFont::Helvetica),
        };
        let pages = layout::paginate(&text, &metrics);
        let bytes = pdf::render(&text.title, &pages, font)?;
        // Page 1 opens with the title; everything after it is body.
        let placed: Vec<String> = pages
            .iter()
            .flat_map(|page| page.lines.iter())
            .skip(1)
            .map(|line| line.text.clone())
            .collect();

        write_atomic(&self.output_path, &bytes).map_err(|e| {
            Error::report(
                format!("cannot write {:?}: {}", self.output_path, e),
                OUTPUT_HINT,
            )
        })?;

        info!(
            path = ?self.output_path,
            mode = ?text.mode,
            entries = records.len(),
            pages = pages.len(),
            "report generated"
        );
        Ok(Report {
            path: self.output_path.clone(),
            mode: text.mode,
            title: text.title,
            lines: placed,
            entries: records.len(),
            pages: pages.len(),
        })
    }
}
