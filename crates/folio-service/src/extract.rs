//! Page extraction from source files.

use std::path::Path;

use tracing::{debug, warn};

use folio_core::{FolioError, Page, Result};

/// Read a document from disk as ordered pages.
///
/// `.pdf` files (by extension or `%PDF` signature) yield one page per PDF
/// page; anything else is read as UTF-8 text.
pub fn load_pages(path: &Path) -> Result<Vec<Page>> {
    let bytes = std::fs::read(path)?;
    let name = path.display().to_string();

    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
        || bytes.starts_with(b"%PDF");

    if is_pdf {
        pdf_pages(&bytes, &name)
    } else {
        let text = String::from_utf8(bytes).map_err(|e| FolioError::Extraction {
            source_name: name,
            reason: format!("not valid UTF-8: {}", e),
        })?;
        Ok(text_pages(&text))
    }
}

/// Split PDF bytes into pages numbered from 1.
///
/// A page without extractable text (a scan, say) is kept as an empty page
/// so later page numbers stay correct.
pub fn pdf_pages(bytes: &[u8], source_name: &str) -> Result<Vec<Page>> {
    let texts = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| FolioError::Extraction {
        source_name: source_name.to_string(),
        reason: e.to_string(),
    })?;

    let pages = Page::from_texts(texts);
    let blank = pages.iter().filter(|p| p.is_blank()).count();
    if blank > 0 {
        warn!("{}: {} of {} pages had no extractable text", source_name, blank, pages.len());
    }
    debug!("{}: extracted {} pages", source_name, pages.len());

    Ok(pages)
}

/// Split plain text into pages on form feeds; text without one is a single page.
pub fn text_pages(text: &str) -> Vec<Page> {
    Page::from_texts(text.split('\x0c'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_pages_split_on_form_feed() {
        let pages = text_pages("Page one.\x0c\x0cPage three.");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], Page::new(1, "Page one."));
        assert!(pages[1].is_blank());
        assert_eq!(pages[2].number, 3);
    }

    #[test]
    fn test_text_without_form_feed_is_one_page() {
        let pages = text_pages("Just one page.\nWith two lines.");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
    }

    #[test]
    fn test_load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Chapter 1\n\nIt begins.\x0cIt ends.").unwrap();

        let pages = load_pages(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "It ends.");
    }

    #[test]
    fn test_load_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = load_pages(&path).unwrap_err();
        assert_eq!(err.error_code(), "EXTRACTION_ERROR");
    }

    #[test]
    fn test_corrupt_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.7 this is not really a pdf").unwrap();

        let err = load_pages(&path).unwrap_err();
        assert_eq!(err.error_code(), "EXTRACTION_ERROR");
    }

    #[test]
    fn test_missing_file() {
        let err = load_pages(Path::new("/nonexistent/book.pdf")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
