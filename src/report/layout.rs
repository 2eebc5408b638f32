//! Page geometry and pagination, independent of the PDF backend.

use ab_glyph::{Font, FontArc};

use crate::report::template::ReportText;

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 10.0;
/// Content stops this far above the bottom edge.
pub const BOTTOM_MARGIN_MM: f32 = 20.0;
pub const LINE_HEIGHT_MM: f32 = 10.0;
pub const TITLE_GAP_MM: f32 = 5.0;
pub const FONT_SIZE_PT: f32 = 12.0;

const MM_PER_PT: f32 = 25.4 / 72.0;
/// Baseline position inside a line cell, from the cell top.
const BASELINE_MM: f32 = 6.5;

/// Advance widths of Helvetica for ASCII 32..=126, in 1/1000 em.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Measures rendered text width for centering.
#[derive(Clone)]
pub enum TextMetrics {
    /// PDF built-in Helvetica.
    Helvetica,
    /// An embedded TrueType font.
    Font(FontArc),
}

impl std::fmt::Debug for TextMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextMetrics::Helvetica => f.write_str("Helvetica"),
            TextMetrics::Font(_) => f.write_str("Font"),
        }
    }
}

impl TextMetrics {
    pub fn width_mm(&self, text: &str, size_pt: f32) -> f32 {
        let em = match self {
            TextMetrics::Helvetica => text
                .chars()
                .map(|c| {
                    let idx = (c as usize).wrapping_sub(32);
                    HELVETICA_WIDTHS.get(idx).copied().unwrap_or(556) as f32 / 1000.0
                })
                .sum::<f32>(),
            TextMetrics::Font(font) => {
                let upem = font.units_per_em().unwrap_or(1000.0);
                text.chars()
                    .map(|c| font.h_advance_unscaled(font.glyph_id(c)))
                    .sum::<f32>()
                    / upem
            }
        };
        em * size_pt * MM_PER_PT
    }
}

/// A line of text at its final position; `baseline_mm` counts from the page bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x_mm: f32,
    pub baseline_mm: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageLayout {
    pub lines: Vec<PlacedLine>,
}

/// Lay out a centered title followed by left-aligned body lines, starting a
/// new page whenever the next line would cross the bottom margin.
pub fn paginate(text: &ReportText, metrics: &TextMetrics) -> Vec<PageLayout> {
    let place = |line: &str, x_mm: f32, top_mm: f32| PlacedLine {
        text: line.to_string(),
        x_mm,
        baseline_mm: PAGE_HEIGHT_MM - (top_mm + BASELINE_MM),
    };

    let mut pages = vec![PageLayout::default()];
    let mut top = MARGIN_MM;

    let title_width = metrics.width_mm(&text.title, FONT_SIZE_PT);
    let title_x = ((PAGE_WIDTH_MM - title_width) / 2.0).max(MARGIN_MM);
    pages[0].lines.push(place(&text.title, title_x, top));
    top += LINE_HEIGHT_MM + TITLE_GAP_MM;

    for line in &text.lines {
        if top + LINE_HEIGHT_MM > PAGE_HEIGHT_MM - BOTTOM_MARGIN_MM {
            pages.push(PageLayout::default());
            top = MARGIN_MM;
        }
        if let Some(page) = pages.last_mut() {
            page.lines.push(place(line, MARGIN_MM, top));
        }
        top += LINE_HEIGHT_MM;
    }
    pages
}
