//! Invisible text overlay for PDF documents
//!
//! This crate writes text onto the first page of an existing PDF so that it
//! is practically invisible when rendered (opacity 0.001, a near-background
//! color) while staying in the content stream where text extractors find it.
//!
//! The pipeline:
//! - `sanitize`: keep printable ASCII, split into lines
//! - `overlay::build_overlay`: lay the lines out on a single page sized like
//!   the source's first page
//! - `compose::composite`: copy the source pages into a new document and
//!   stamp the overlay page onto the page at the same index

pub mod compose;
pub mod error;
pub mod geometry;
pub mod options;
pub mod overlay;
pub mod report;
pub mod sanitize;

pub use compose::{composite, composite_document};
pub use error::OverlayError;
pub use geometry::PageSize;
pub use options::{OverlayOptions, RgbColor};
pub use overlay::{build_overlay, OverlayDocument, TextRun};
pub use report::OverlayReport;
pub use sanitize::{sanitize, sanitize_lines, SanitizeOrder};

use lopdf::Document;

/// Appended to the uploaded file's base name
pub const OUTPUT_SUFFIX: &str = "Updated.pdf";

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, OverlayError> {
    let doc = Document::load_mem(bytes).map_err(|e| OverlayError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Reject a run before any processing starts
pub fn validate_input(text: &str, file: Option<&[u8]>) -> Result<(), OverlayError> {
    if text.trim().is_empty() {
        return Err(OverlayError::InvalidInput("No text to overlay".into()));
    }
    if file.is_none() {
        return Err(OverlayError::InvalidInput("No PDF selected".into()));
    }
    Ok(())
}

/// Suggested download name: the upload's name without its last extension,
/// followed by [`OUTPUT_SUFFIX`]
///
/// An extension is a `.` followed by at least one character, none of them `/`.
pub fn output_file_name(file_name: &str) -> String {
    let base = match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() && !file_name[dot + 1..].contains('/') => {
            &file_name[..dot]
        }
        _ => file_name,
    };
    format!("{}{}", base, OUTPUT_SUFFIX)
}

/// Overlay `text` onto the PDF in `source_bytes` and return the new PDF
pub fn process(
    text: &str,
    source_bytes: &[u8],
    options: &OverlayOptions,
) -> Result<Vec<u8>, OverlayError> {
    process_with_report(text, source_bytes, options).map(|(bytes, _)| bytes)
}

/// Same as [`process`], also reporting what was done
pub fn process_with_report(
    text: &str,
    source_bytes: &[u8],
    options: &OverlayOptions,
) -> Result<(Vec<u8>, OverlayReport), OverlayError> {
    validate_input(text, Some(source_bytes))?;

    let lines = sanitize_lines(text, options.sanitize_order);
    let source =
        Document::load_mem(source_bytes).map_err(|e| OverlayError::ParseError(e.to_string()))?;
    let page_size = geometry::first_page_size(&source)?;
    tracing::debug!(
        lines = lines.len(),
        width = page_size.width,
        height = page_size.height,
        "loaded source document"
    );

    let overlay = build_overlay(&lines, page_size, options)?;
    let mut output = composite_document(&source, &overlay)?;
    drop(source);

    let page_count = output.get_pages().len() as u32;
    let overlaid_pages = page_count.min(overlay.page_ids().len() as u32);
    let bytes = compose::serialize(&mut output, options.compress)?;

    let report = OverlayReport {
        page_count,
        overlaid_pages,
        line_count: lines.len(),
        input_size_bytes: source_bytes.len(),
        output_size_bytes: bytes.len(),
    };
    Ok((bytes, report))
}
