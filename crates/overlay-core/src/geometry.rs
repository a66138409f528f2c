//! Page geometry
//!
//! Reads page boxes from a parsed document, following the page tree for
//! inherited attributes.

use crate::error::OverlayError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

/// Page attributes a page may inherit from its ancestors in the page tree
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guards against cyclic `Parent` chains in malformed files
const MAX_TREE_DEPTH: usize = 32;

/// Width and height of a page in points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    pub const A4: PageSize = PageSize {
        width: 595.28,
        height: 841.89,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    fn from_box(media_box: [f32; 4]) -> Self {
        Self {
            width: media_box[2] - media_box[0],
            height: media_box[3] - media_box[1],
        }
    }
}

/// Follow a reference to the object it points at
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, OverlayError> {
    match obj {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| OverlayError::OperationError(format!("Broken reference {:?}: {}", id, e))),
        other => Ok(other),
    }
}

/// Look up `key` on the page, then on each ancestor
pub fn find_inherited<'a>(
    doc: &'a Document,
    page_dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_dict;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_object(parent_id).ok()?.as_dict().ok()?;
    }
    None
}

/// The effective MediaBox of a page; US Letter when none is declared
pub fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f32; 4], OverlayError> {
    let page_dict = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|_| {
            OverlayError::OperationError(format!("Page {:?} is not a dictionary", page_id))
        })?;

    match find_inherited(doc, page_dict, b"MediaBox") {
        Some(obj) => {
            let array = resolve(doc, obj)?
                .as_array()
                .map_err(|_| OverlayError::OperationError("MediaBox is not an array".into()))?;
            parse_box_array(doc, array)
        }
        None => {
            tracing::warn!(?page_id, "page has no MediaBox, assuming US Letter");
            Ok([0.0, 0.0, PageSize::LETTER.width, PageSize::LETTER.height])
        }
    }
}

pub fn page_size(doc: &Document, page_id: ObjectId) -> Result<PageSize, OverlayError> {
    media_box(doc, page_id).map(PageSize::from_box)
}

/// Size of the page at index 0
pub fn first_page_size(doc: &Document) -> Result<PageSize, OverlayError> {
    let page_id = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or(OverlayError::EmptyDocument)?;
    page_size(doc, page_id)
}

/// Parse a box array [x1, y1, x2, y2]; entries may be indirect
pub fn parse_box_array(doc: &Document, array: &[Object]) -> Result<[f32; 4], OverlayError> {
    if array.len() != 4 {
        return Err(OverlayError::OperationError(
            "MediaBox must have 4 elements".to_string(),
        ));
    }

    let mut result = [0.0; 4];
    for (i, obj) in array.iter().enumerate() {
        result[i] = as_number(resolve(doc, obj)?).ok_or_else(|| {
            OverlayError::OperationError(format!("MediaBox element {} is not a number", i))
        })?;
    }

    Ok(result)
}

pub fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(n) => Some(*n as f32),
        Object::Real(n) => Some(*n),
        _ => None,
    }
}
