use std::sync::Arc;

use crate::foundation::error::{PaintError, PaintResult};
use crate::pattern::ShadingIr;

mod cache;
mod font;
mod image;

pub use cache::ObjectCache;
pub use font::{FontObject, Glyph, GlyphCmd, GlyphProgram, TextItem};
pub use image::{ImageData, ImageKind, MaskData};

/// Value stored in an [`ObjectCache`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharedObject {
    /// Font descriptor.
    Font(Arc<FontObject>),
    /// Decoded image.
    Image(Arc<ImageData>),
    /// Shading description referenced by `shadingFill` or a shading pattern.
    Shading(Arc<ShadingIr>),
}

impl SharedObject {
    fn kind(&self) -> &'static str {
        match self {
            Self::Font(_) => "font",
            Self::Image(_) => "image",
            Self::Shading(_) => "shading",
        }
    }
}

/// The two caches a page render reads from.
///
/// Ids starting with `g_` (and all fonts) live in the document-wide cache; everything else is
/// page scoped.
#[derive(Clone, Debug, Default)]
pub struct ObjectScopes {
    /// Document-wide objects.
    pub common: Arc<ObjectCache>,
    /// Objects of one page.
    pub page: Arc<ObjectCache>,
}

impl ObjectScopes {
    /// Pair a document cache with a page cache.
    pub fn new(common: Arc<ObjectCache>, page: Arc<ObjectCache>) -> Self {
        Self { common, page }
    }

    /// Cache responsible for `id`.
    pub fn cache_for(&self, id: &str) -> &Arc<ObjectCache> {
        if id.starts_with("g_") {
            &self.common
        } else {
            &self.page
        }
    }

    /// `true` once `id` is resolved in its cache, or in the document cache (fonts).
    pub fn has(&self, id: &str) -> bool {
        self.cache_for(id).has(id) || self.common.has(id)
    }

    /// Run `callback` once `id` resolves.
    ///
    /// The subscription lives in [`ObjectScopes::cache_for`]; fonts resolved under a page id
    /// are handed to those subscribers when they land in the document cache.
    pub fn on_resolved(&self, id: &str, callback: impl Fn() + Send + Sync + 'static) {
        let callback = Arc::new(callback);
        let cb = callback.clone();
        let cache = self.cache_for(id);
        cache.subscribe(id, move |_| cb());
        if !Arc::ptr_eq(cache, &self.common) && self.common.has(id) {
            callback();
        }
    }

    /// Resolve `id` into the cache responsible for it.
    ///
    /// Fonts always go to the document cache.
    pub fn resolve(&self, id: &str, value: SharedObject) -> bool {
        match value {
            SharedObject::Font(_) => {
                let fresh = self.common.resolve(id, value.clone());
                let cache = self.cache_for(id);
                if fresh && !Arc::ptr_eq(cache, &self.common) {
                    cache.notify_pending(id, &value);
                }
                fresh
            }
            _ => self.cache_for(id).resolve(id, value),
        }
    }

    /// Font by id; fonts always come from the document cache.
    pub fn font(&self, id: &str) -> PaintResult<Arc<FontObject>> {
        match self.common.get(id)? {
            SharedObject::Font(f) => Ok(f),
            other => Err(wrong_kind(id, "font", &other)),
        }
    }

    /// Image by id.
    pub fn image(&self, id: &str) -> PaintResult<Arc<ImageData>> {
        match self.cache_for(id).get(id)? {
            SharedObject::Image(i) => Ok(i),
            other => Err(wrong_kind(id, "image", &other)),
        }
    }

    /// Shading by id.
    pub fn shading(&self, id: &str) -> PaintResult<Arc<ShadingIr>> {
        match self.cache_for(id).get(id)? {
            SharedObject::Shading(s) => Ok(s),
            other => Err(wrong_kind(id, "shading", &other)),
        }
    }
}

fn wrong_kind(id: &str, want: &str, got: &SharedObject) -> PaintError {
    PaintError::malformed(format!(
        "object '{id}' is a {}, expected a {want}",
        got.kind()
    ))
}
