use serde::Serialize;

/// What one run did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayReport {
    pub page_count: u32,
    /// Pages that received the overlay (index 0 only, by construction)
    pub overlaid_pages: u32,
    pub line_count: usize,
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
}
