//! Overlay page construction
//!
//! Builds a standalone single-page document that holds nothing but the
//! overlay text. Each line is its own text object, drawn top to bottom with
//! an ExtGState carrying the (near zero) alpha. There is no wrapping and no
//! overflow handling: lines past the bottom edge get a negative baseline and
//! stay in the content stream.

use crate::error::OverlayError;
use crate::geometry::PageSize;
use crate::options::{OverlayOptions, RgbColor};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// Resource name of the overlay font
pub const FONT_RESOURCE: &str = "F1";
/// Resource name of the alpha graphics state
pub const GSTATE_RESOURCE: &str = "GS0";

const STANDARD_FONTS: [&str; 14] = [
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Symbol",
    "ZapfDingbats",
];

/// One line of text as drawn on the overlay page
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: RgbColor,
    pub opacity: f32,
}

/// Single-page document holding the overlay text
#[derive(Debug)]
pub struct OverlayDocument {
    document: Document,
    page_size: PageSize,
    runs: Vec<TextRun>,
}

impl OverlayDocument {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    /// Page ids in page order
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.document.get_pages().into_values().collect()
    }

    /// Serialize the overlay on its own, mostly useful for inspection
    pub fn to_bytes(&self) -> Result<Vec<u8>, OverlayError> {
        let mut doc = self.document.clone();
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| OverlayError::SerializationError(e.to_string()))?;
        Ok(buffer)
    }
}

/// Lay out `lines` on a fresh page of `page_size`
pub fn build_overlay<S: AsRef<str>>(
    lines: &[S],
    page_size: PageSize,
    options: &OverlayOptions,
) -> Result<OverlayDocument, OverlayError> {
    let opacity = options.clamped_opacity();
    let runs = layout_runs(lines, page_size, options, opacity);

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(font_name(&options.font).as_bytes().to_vec()),
        "Encoding" => "WinAnsiEncoding",
    });
    let gstate_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(opacity),
        "CA" => Object::Real(opacity),
    });

    let content = Content {
        operations: content_operations(&runs),
    };
    let encoded = content
        .encode()
        .map_err(|e| OverlayError::OperationError(format!("Failed to encode overlay: {}", e)))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page_size.width),
            Object::Real(page_size.height),
        ],
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "Font" => dictionary! { FONT_RESOURCE => Object::Reference(font_id) },
            "ExtGState" => dictionary! { GSTATE_RESOURCE => Object::Reference(gstate_id) },
        },
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    tracing::debug!(
        width = page_size.width,
        height = page_size.height,
        lines = runs.len(),
        "built overlay page"
    );

    Ok(OverlayDocument {
        document: doc,
        page_size,
        runs,
    })
}

fn layout_runs<S: AsRef<str>>(
    lines: &[S],
    page_size: PageSize,
    options: &OverlayOptions,
    opacity: f32,
) -> Vec<TextRun> {
    let mut y = page_size.height - options.top_margin;
    let mut runs = Vec::with_capacity(lines.len());
    for line in lines {
        runs.push(TextRun {
            text: line.as_ref().to_string(),
            x: options.left_margin,
            y,
            size: options.font_size,
            color: options.color,
            opacity,
        });
        y -= options.line_height();
    }
    runs
}

fn content_operations(runs: &[TextRun]) -> Vec<Operation> {
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(GSTATE_RESOURCE.as_bytes().to_vec())]),
    ];
    for run in runs {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![
                Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                Object::Real(run.size),
            ],
        ));
        ops.push(Operation::new(
            "rg",
            vec![
                Object::Real(run.color.r),
                Object::Real(run.color.g),
                Object::Real(run.color.b),
            ],
        ));
        ops.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Real(run.x),
                Object::Real(run.y),
            ],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(
                run.text.as_bytes().to_vec(),
                StringFormat::Literal,
            )],
        ));
        ops.push(Operation::new("ET", vec![]));
    }
    ops.push(Operation::new("Q", vec![]));
    ops
}

fn font_name(requested: &str) -> &str {
    if STANDARD_FONTS.contains(&requested) {
        requested
    } else {
        tracing::warn!(font = requested, "not a standard font, using Helvetica");
        "Helvetica"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry;

    fn shown_strings(overlay: &OverlayDocument) -> Vec<String> {
        let doc = overlay.document();
        let page_id = overlay.page_ids()[0];
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .map(|op| String::from_utf8(op.operands[0].as_str().unwrap().to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn test_page_matches_requested_size() {
        let overlay = build_overlay(&["x"], PageSize::A4, &OverlayOptions::default()).unwrap();
        assert_eq!(overlay.page_ids().len(), 1);
        let size = geometry::first_page_size(overlay.document()).unwrap();
        assert_eq!(size, PageSize::A4);
        assert_eq!(overlay.page_size(), PageSize::A4);
    }

    #[test]
    fn test_lines_step_down_from_top_margin() {
        let overlay = build_overlay(
            &["Hello", "World", "Again"],
            PageSize::new(612.0, 792.0),
            &OverlayOptions::default(),
        )
        .unwrap();
        let ys: Vec<f32> = overlay.runs().iter().map(|r| r.y).collect();
        assert_eq!(ys, vec![742.0, 725.0, 708.0]);
        assert!(overlay.runs().iter().all(|r| r.x == 50.0 && r.size == 12.0));
        assert!(overlay.runs().iter().all(|r| r.opacity == 0.001));
    }

    #[test]
    fn test_content_stream_holds_lines_in_order() {
        let overlay = build_overlay(
            &["Hello", "World"],
            PageSize::LETTER,
            &OverlayOptions::default(),
        )
        .unwrap();
        assert_eq!(shown_strings(&overlay), vec!["Hello", "World"]);
    }

    #[test]
    fn test_parentheses_survive_encoding() {
        let overlay = build_overlay(
            &["Rust (async) \\ tokio"],
            PageSize::LETTER,
            &OverlayOptions::default(),
        )
        .unwrap();
        assert_eq!(shown_strings(&overlay), vec!["Rust (async) \\ tokio"]);
    }

    #[test]
    fn test_graphics_state_carries_opacity() {
        let overlay = build_overlay(&["x"], PageSize::LETTER, &OverlayOptions::default()).unwrap();
        let doc = overlay.document();
        let gstate = doc
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .find(|d| matches!(d.get(b"Type"), Ok(Object::Name(n)) if n == b"ExtGState"))
            .expect("ExtGState present");
        assert_eq!(gstate.get(b"ca").unwrap(), &Object::Real(0.001));
        assert_eq!(gstate.get(b"CA").unwrap(), &Object::Real(0.001));
    }

    #[test]
    fn test_overflowing_lines_go_negative() {
        let lines: Vec<String> = (0..10).map(|i| format!("line {}", i)).collect();
        let overlay =
            build_overlay(&lines, PageSize::new(200.0, 100.0), &OverlayOptions::default()).unwrap();
        assert_eq!(overlay.runs().len(), 10);
        assert!(overlay.runs().last().unwrap().y < 0.0);
        assert_eq!(shown_strings(&overlay).len(), 10);
    }

    #[test]
    fn test_zero_area_page_is_accepted() {
        let size = PageSize::new(0.0, 0.0);
        let overlay = build_overlay(&["hidden"], size, &OverlayOptions::default()).unwrap();
        assert_eq!(overlay.runs()[0].y, -50.0);
    }

    #[test]
    fn test_unknown_font_falls_back_to_helvetica() {
        let options = OverlayOptions {
            font: "Comic Sans".to_string(),
            ..Default::default()
        };
        assert_eq!(font_name(&options.font), "Helvetica");
        assert_eq!(font_name("Courier"), "Courier");
    }

    #[test]
    fn test_overlay_serializes_to_pdf() {
        let overlay = build_overlay(&["x"], PageSize::LETTER, &OverlayOptions::default()).unwrap();
        let bytes = overlay.to_bytes().unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(Document::load_mem(&bytes).unwrap().get_pages().len(), 1);
    }
}
