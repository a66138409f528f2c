//! Page compositing
//!
//! The algorithm:
//! 1. Create a new output document with an empty page tree
//! 2. Deep-copy every source page into it, in order, re-pointing `Parent` and
//!    materializing inherited attributes (MediaBox, CropBox, Resources, Rotate)
//! 3. Embed the overlay page as a Form XObject
//! 4. For each copied page that has an overlay page at the same index, draw
//!    the XObject at the origin scaled to the page's own size
//! 5. Compress and serialize
//!
//! The overlay has a single page, so only the page at index 0 gets one.
//! Later pages are copied through untouched.

use crate::error::OverlayError;
use crate::geometry::{self, find_inherited, resolve, PageSize, INHERITABLE_KEYS};
use crate::options::OverlayOptions;
use crate::overlay::OverlayDocument;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

const XOBJECT_PREFIX: &str = "Overlay";
const PRODUCER: &str = concat!("overlay-core ", env!("CARGO_PKG_VERSION"));

/// A page turned into a Form XObject inside the output document
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedPage {
    pub id: ObjectId,
    pub width: f32,
    pub height: f32,
}

/// Parse `source_bytes`, composite `overlay` onto its pages and serialize
pub fn composite(
    source_bytes: &[u8],
    overlay: &OverlayDocument,
    options: &OverlayOptions,
) -> Result<Vec<u8>, OverlayError> {
    let source =
        Document::load_mem(source_bytes).map_err(|e| OverlayError::ParseError(e.to_string()))?;
    let mut output = composite_document(&source, overlay)?;
    drop(source);
    serialize(&mut output, options.compress)
}

/// Build the output document from an already parsed source
pub fn composite_document(
    source: &Document,
    overlay: &OverlayDocument,
) -> Result<Document, OverlayError> {
    let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
    if source_pages.is_empty() {
        return Err(OverlayError::EmptyDocument);
    }

    let (mut output, pages_id) = new_output_document();

    let mut copier = ObjectCopier::new(source);
    let mut page_ids = Vec::with_capacity(source_pages.len());
    for page_id in &source_pages {
        page_ids.push(copier.copy_page(&mut output, *page_id, pages_id)?);
    }

    let overlay_pages = overlay.page_ids();
    let overlaid = page_ids.len().min(overlay_pages.len());

    for (page_id, overlay_page) in page_ids.iter().zip(overlay_pages) {
        let unit = embed_page(&mut output, overlay.document(), overlay_page)?;
        let size = geometry::page_size(&output, *page_id)?;
        draw_page(&mut output, *page_id, &unit, size)?;
    }

    set_page_tree(&mut output, pages_id, &page_ids)?;
    output.prune_objects();

    tracing::debug!(pages = page_ids.len(), overlaid, "composited overlay");

    Ok(output)
}

/// Serialize a document, optionally compressing its streams first
pub fn serialize(doc: &mut Document, compress: bool) -> Result<Vec<u8>, OverlayError> {
    if compress {
        doc.compress();
    }
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| OverlayError::SerializationError(format!("Failed to save PDF: {}", e)))?;
    Ok(buffer)
}

/// Empty document with a catalog and page tree root
fn new_output_document() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => 0,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.trailer.set("Info", Object::Reference(info_id));
    (doc, pages_id)
}

fn set_page_tree(
    doc: &mut Document,
    pages_id: ObjectId,
    page_ids: &[ObjectId],
) -> Result<(), OverlayError> {
    let pages = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| OverlayError::OperationError("Invalid pages dictionary".into()))?;
    pages.set(
        "Kids",
        Object::Array(page_ids.iter().map(|&id| Object::Reference(id)).collect()),
    );
    pages.set("Count", Object::Integer(page_ids.len() as i64));
    Ok(())
}

/// Turn a page of `source` into a Form XObject stored in `dest`
pub fn embed_page(
    dest: &mut Document,
    source: &Document,
    page_id: ObjectId,
) -> Result<EmbeddedPage, OverlayError> {
    let page = source
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| OverlayError::OperationError(format!("Overlay page missing: {}", e)))?;

    let content = source
        .get_page_content(page_id)
        .map_err(|e| OverlayError::OperationError(format!("Overlay content unreadable: {}", e)))?;
    let media_box = geometry::media_box(source, page_id)?;

    let mut copier = ObjectCopier::new(source);
    let resources = match find_inherited(source, page, b"Resources") {
        Some(obj) => copier.copy_object(dest, resolve(source, obj)?),
        None => Object::Dictionary(Dictionary::new()),
    };

    let form = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => media_box.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
            "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 0.into()],
            "Resources" => resources,
        },
        content,
    );
    let id = dest.add_object(form);

    Ok(EmbeddedPage {
        id,
        width: media_box[2] - media_box[0],
        height: media_box[3] - media_box[1],
    })
}

/// Draw `unit` over the existing content of `page_id`, at (0, 0), scaled to `size`
pub fn draw_page(
    doc: &mut Document,
    page_id: ObjectId,
    unit: &EmbeddedPage,
    size: PageSize,
) -> Result<(), OverlayError> {
    let mut page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|_| {
            OverlayError::OperationError(format!("Page {:?} is not a dictionary", page_id))
        })?
        .clone();

    // Resources may be shared with other pages, so edit a private copy
    let mut resources = owned_dict(doc, page.get(b"Resources").ok())?;
    let mut xobjects = owned_dict(doc, resources.get(b"XObject").ok())?;
    let name = unique_name(&xobjects, XOBJECT_PREFIX);
    xobjects.set(name.clone(), Object::Reference(unit.id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let scale_x = scale(size.width, unit.width);
    let scale_y = scale(size.height, unit.height);
    let overlay_ops = Content {
        operations: vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(scale_x),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(scale_y),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = overlay_ops
        .encode()
        .map_err(|e| OverlayError::OperationError(format!("Failed to encode draw: {}", e)))?;

    // Wrap the original content in q/Q so its graphics state can't leak
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let draw_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

    let mut contents = vec![Object::Reference(open_id)];
    match page.get(b"Contents") {
        // Contents may point at an array of streams; nesting it would hide the original
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
            _ => contents.push(Object::Reference(*id)),
        },
        Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
        _ => {}
    }
    contents.push(Object::Reference(draw_id));

    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));
    doc.objects.insert(page_id, Object::Dictionary(page));
    Ok(())
}

fn scale(target: f32, unit: f32) -> f32 {
    if unit == 0.0 {
        1.0
    } else {
        target / unit
    }
}

fn owned_dict(doc: &Document, obj: Option<&Object>) -> Result<Dictionary, OverlayError> {
    match obj {
        Some(obj) => resolve(doc, obj)?
            .as_dict()
            .cloned()
            .map_err(|_| OverlayError::OperationError("Expected a dictionary".into())),
        None => Ok(Dictionary::new()),
    }
}

fn unique_name(dict: &Dictionary, prefix: &str) -> String {
    (0..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|name| !dict.has(name.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

/// Copies objects from one document into another, following references
///
/// Every source id is copied at most once, so shared objects stay shared and
/// reference cycles terminate.
struct ObjectCopier<'a> {
    source: &'a Document,
    map: BTreeMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            map: BTreeMap::new(),
        }
    }

    /// Copy a page, detaching it from the source page tree
    fn copy_page(
        &mut self,
        dest: &mut Document,
        page_id: ObjectId,
        parent_id: ObjectId,
    ) -> Result<ObjectId, OverlayError> {
        let source = self.source;
        let original = source
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|_| {
                OverlayError::OperationError(format!("Page {:?} is not a dictionary", page_id))
            })?;

        let mut page = original.clone();
        page.remove(b"Parent");
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Some(value) = find_inherited(source, original, key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }

        // The page may already have been reached through an annotation's /P
        let new_id = match self.map.get(&page_id) {
            Some(&id) => id,
            None => {
                let id = dest.new_object_id();
                self.map.insert(page_id, id);
                id
            }
        };

        let mut copied = self.copy_dictionary(dest, &page);
        copied.set("Parent", Object::Reference(parent_id));
        dest.objects.insert(new_id, Object::Dictionary(copied));
        Ok(new_id)
    }

    fn copy_reference(&mut self, dest: &mut Document, id: ObjectId) -> ObjectId {
        if let Some(&mapped) = self.map.get(&id) {
            return mapped;
        }
        let new_id = dest.new_object_id();
        self.map.insert(id, new_id);

        let source = self.source;
        let copied = match source.get_object(id) {
            Ok(obj) => self.copy_object(dest, obj),
            Err(_) => {
                tracing::warn!(?id, "dangling reference replaced with null");
                Object::Null
            }
        };
        dest.objects.insert(new_id, copied);
        new_id
    }

    fn copy_object(&mut self, dest: &mut Document, obj: &Object) -> Object {
        match obj {
            Object::Reference(id) => Object::Reference(self.copy_reference(dest, *id)),
            Object::Array(items) => {
                Object::Array(items.iter().map(|o| self.copy_object(dest, o)).collect())
            }
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(dest, dict)),
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.copy_dictionary(dest, &stream.dict);
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    fn copy_dictionary(&mut self, dest: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.copy_object(dest, value));
        }
        copied
    }
}
