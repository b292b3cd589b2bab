//! Page composition and document merging on top of lopdf: overlays are
//! stamped onto background pages as Form XObjects, and whole documents are
//! appended by renumbering their objects into the target.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::Error;
use crate::model::{Diagnostic, MergeResult};
use crate::pdf::OverlayPage;

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 32;
const OVERLAY_XOBJECT: &str = "OfferOverlay";

/// An in-memory document assembled page by page.
#[derive(Clone, Debug)]
pub struct ComposedDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl ComposedDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut composed = Self {
            doc,
            pages_id,
            kids: Vec::new(),
        };
        composed.write_page_tree();
        composed
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    fn write_page_tree(&mut self) {
        let pages = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            (
                "Kids",
                Object::Array(self.kids.iter().map(|&id| Object::Reference(id)).collect()),
            ),
            ("Count", Object::Integer(self.kids.len() as i64)),
        ]);
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));
    }

    /// Move pages of `other` (all of them, or only the first) to the end of
    /// this document. Returns the number of pages added.
    pub fn append(&mut self, mut other: Document, first_page_only: bool) -> Result<usize, Error> {
        other.renumber_objects_with(self.doc.max_id + 1);

        let mut page_ids: Vec<ObjectId> = other.get_pages().into_values().collect();
        if first_page_only {
            page_ids.truncate(1);
        }

        // Flatten inherited attributes before the source page tree is dropped
        let mut pages = Vec::with_capacity(page_ids.len());
        for &id in &page_ids {
            let mut dict = other.get_dictionary(id)?.clone();
            for key in INHERITABLE {
                if !dict.has(key)
                    && let Some(value) = inherited(&other, id, key)
                {
                    dict.set(key, value);
                }
            }
            dict.set("Parent", Object::Reference(self.pages_id));
            pages.push((id, dict));
        }

        self.doc.max_id = self.doc.max_id.max(other.max_id);
        for (id, object) in other.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    self.doc.objects.insert(id, object);
                }
            }
        }

        let added = pages.len();
        for (id, dict) in pages {
            self.doc.objects.insert(id, Object::Dictionary(dict));
            self.kids.push(id);
        }
        self.write_page_tree();
        Ok(added)
    }

    /// Serialize with unreferenced objects pruned and streams compressed.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut doc = self.doc.clone();
        doc.prune_objects();
        doc.compress();
        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| Error::Pdf(format!("failed to save PDF: {e}")))?;
        Ok(out)
    }
}

impl Default for ComposedDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest value of `key` on the page or one of its ancestors.
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn deref<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Page MediaBox as `[llx, lly, urx, ury]`, inherited if necessary.
pub fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let value = inherited(doc, page_id, b"MediaBox")?;
    let Object::Array(arr) = deref(doc, &value) else {
        return None;
    };
    let values: Vec<f32> = arr.iter().filter_map(|o| number(deref(doc, o))).collect();
    <[f32; 4]>::try_from(values).ok()
}

/// Copy the single overlay page into `doc` as a Form XObject and draw it
/// over the existing content of `page_id`.
fn stamp(doc: &mut Document, page_id: ObjectId, overlay: &[u8]) -> Result<(), Error> {
    let mut layer = Document::load_mem(overlay)?;
    layer.renumber_objects_with(doc.max_id + 1);
    let layer_page = *layer
        .get_pages()
        .values()
        .next()
        .ok_or_else(|| Error::Pdf("overlay has no page".into()))?;

    let content = layer.get_page_content(layer_page)?;
    let resources = match inherited(&layer, layer_page, b"Resources") {
        Some(value) => deref(&layer, &value).clone(),
        None => Object::Dictionary(Dictionary::new()),
    };
    let bbox = media_box(&layer, layer_page).unwrap_or([0.0, 0.0, 595.0, 842.0]);

    doc.max_id = doc.max_id.max(layer.max_id);
    for (id, object) in layer.objects {
        match object.type_name().unwrap_or(b"") {
            b"Catalog" | b"Pages" | b"Page" => {}
            _ => {
                doc.objects.insert(id, object);
            }
        }
    }

    let form = Stream::new(
        Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Form".to_vec())),
            (
                "BBox",
                Object::Array(bbox.iter().map(|&v| Object::Real(v)).collect()),
            ),
            ("Resources", resources),
        ]),
        content,
    );
    let form_id = doc.add_object(form);

    // Background resources become a private inline dictionary on the page
    let mut page_resources = match inherited(doc, page_id, b"Resources") {
        Some(value) => match deref(doc, &value) {
            Object::Dictionary(d) => d.clone(),
            _ => Dictionary::new(),
        },
        None => Dictionary::new(),
    };
    let mut xobjects = match page_resources.get(b"XObject") {
        Ok(value) => match deref(doc, value) {
            Object::Dictionary(d) => d.clone(),
            _ => Dictionary::new(),
        },
        Err(_) => Dictionary::new(),
    };
    xobjects.set(OVERLAY_XOBJECT, Object::Reference(form_id));
    page_resources.set("XObject", Object::Dictionary(xobjects));

    let [llx, lly, _, _] = media_box(doc, page_id).unwrap_or([0.0; 4]);
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(arr)) => arr.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(arr)) => arr.clone(),
        _ => Vec::new(),
    };

    // Isolate the background's graphics state from the overlay
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let draw = format!("\nQ\nq 1 0 0 1 {llx} {lly} cm /{OVERLAY_XOBJECT} Do Q\n");
    let close_id = doc.add_object(Stream::new(Dictionary::new(), draw.into_bytes()));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(close_id));

    let page = doc.get_dictionary_mut(page_id)?;
    page.set("Resources", Object::Dictionary(page_resources));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

/// Stamp overlay *i* onto the first page of background *i*. Backgrounds
/// without an overlay pass through unchanged.
pub fn compose(backgrounds: &[Vec<u8>], overlays: &[OverlayPage]) -> Result<ComposedDocument, Error> {
    let t0 = std::time::Instant::now();
    if overlays.len() > backgrounds.len() {
        log::warn!(
            "{} overlay pages but only {} backgrounds, extra overlays ignored",
            overlays.len(),
            backgrounds.len()
        );
    }

    let mut composed = ComposedDocument::new();
    for (i, background) in backgrounds.iter().enumerate() {
        let mut doc = Document::load_mem(background)
            .map_err(|e| Error::Pdf(format!("background page {}: {e}", i + 1)))?;
        let page_id = *doc
            .get_pages()
            .values()
            .next()
            .ok_or_else(|| Error::Pdf(format!("background page {} has no pages", i + 1)))?;
        if let Some(overlay) = overlays.get(i) {
            stamp(&mut doc, page_id, &overlay.bytes)?;
        }
        composed.append(doc, true)?;
    }

    log::info!(
        "Composed {} pages ({} overlays) in {:.1}ms",
        composed.page_count(),
        overlays.len().min(backgrounds.len()),
        t0.elapsed().as_secs_f64() * 1000.0,
    );
    Ok(composed)
}

fn fallback(base: Vec<u8>, page_count: usize, reason: String) -> MergeResult {
    log::warn!("Chart pages dropped, delivering base document: {reason}");
    MergeResult {
        bytes: base,
        page_count,
        success: false,
        diagnostics: vec![Diagnostic::Merge {
            reason: reason.clone(),
        }],
        failure_reason: Some(reason),
    }
}

/// Append the extension produced by `build_extension` to `base`.
///
/// `Ok(None)` from the closure means there is nothing to append. If the
/// closure fails or its output cannot be appended, the base document is
/// returned alone with `success = false`. Only a base document that cannot
/// be serialized is an error.
pub fn merge_documents(
    base: &ComposedDocument,
    build_extension: impl FnOnce() -> Result<Option<Vec<u8>>, Error>,
) -> Result<MergeResult, Error> {
    let base_bytes = base.to_bytes()?;
    let base_pages = base.page_count();

    let extension = match build_extension() {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            return Ok(MergeResult {
                bytes: base_bytes,
                page_count: base_pages,
                success: true,
                failure_reason: None,
                diagnostics: Vec::new(),
            });
        }
        Err(e) => return Ok(fallback(base_bytes, base_pages, e.to_string())),
    };

    let mut merged = base.clone();
    let appended = Document::load_mem(&extension)
        .map_err(Error::from)
        .and_then(|doc| merged.append(doc, false))
        .and_then(|added| merged.to_bytes().map(|bytes| (added, bytes)));

    match appended {
        Ok((added, bytes)) => {
            log::debug!("Appended {added} pages to {base_pages}-page base");
            Ok(MergeResult {
                bytes,
                page_count: merged.page_count(),
                success: true,
                failure_reason: None,
                diagnostics: Vec::new(),
            })
        }
        Err(e) => {
            let err = Error::Merge(e.to_string());
            Ok(fallback(base_bytes, base_pages, err.to_string()))
        }
    }
}
