use printpdf::{BuiltinFont, Mm, PdfDocument};

use crate::error::{Error, Result};
use crate::report::layout::{FONT_SIZE_PT, PAGE_HEIGHT_MM, PAGE_WIDTH_MM, PageLayout};

pub(crate) const FONT_HINT: &str =
    "check that the report font exists and is a valid TrueType file";

/// Font the PDF text is set in.
#[derive(Debug, Clone, Copy)]
pub enum PdfFont<'a> {
    Helvetica,
    /// Raw TTF bytes, embedded into the document.
    Embedded(&'a [u8]),
}

/// Render laid-out pages into PDF bytes.
pub fn render(title: &str, pages: &[PageLayout], font: PdfFont<'_>) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");

    let font_ref = match font {
        PdfFont::Helvetica => doc.add_builtin_font(BuiltinFont::Helvetica),
        PdfFont::Embedded(bytes) => doc.add_external_font(bytes),
    }
    .map_err(|e| Error::report(format!("cannot load font: {:?}", e), FONT_HINT))?;

    for (i, page) in pages.iter().enumerate() {
        let layer = if i == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_idx, layer_idx) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(page_idx).get_layer(layer_idx)
        };
        for line in &page.lines {
            layer.use_text(
                line.text.as_str(),
                FONT_SIZE_PT,
                Mm(line.x_mm),
                Mm(line.baseline_mm),
                &font_ref,
            );
        }
    }

    doc.save_to_bytes()
        .map_err(|e| Error::report(format!("cannot serialize PDF: {:?}", e), FONT_HINT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::layout::PlacedLine;

    #[test]
    fn renders_multiple_pages_with_builtin_font() -> anyhow::Result<()> {
        let pages = vec![
            PageLayout {
                lines: vec![PlacedLine {
                    text: "Hair Dryer Control Report".to_string(),
                    x_mm: 60.0,
                    baseline_mm: 280.0,
                }],
            },
            PageLayout {
                lines: vec![PlacedLine {
                    text: "26. 2024-05-01T09:00:00 | File: a.jpg | Hair dryers: 1".to_string(),
                    x_mm: 10.0,
                    baseline_mm: 280.0,
                }],
            },
        ];
        let bytes = render("Hair Dryer Control Report", &pages, PdfFont::Helvetica)?;
        assert!(bytes.starts_with(b"%PDF"));
        Ok(())
    }

    #[test]
    fn invalid_embedded_font_is_report_error() {
        let pages = vec![PageLayout::default()];
        let err = render("t", &pages, PdfFont::Embedded(b"not a font")).unwrap_err();
        assert!(matches!(err, Error::Report { .. }), "got {:?}", err);
    }
}
