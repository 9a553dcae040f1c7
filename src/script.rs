//! Page scripts: a page, its shared objects and its operator list as one JSON document.
//!
//! ```json
//! {
//!   "viewport": { "view_box": [0, 0, 20, 20], "dont_flip": true },
//!   "background": "#ffffff",
//!   "objects": { "img1": { "image": { "width": 1, "height": 1, "kind": "rgb_24bpp", "data": [255, 0, 0] } } },
//!   "ops": [
//!     { "op": "setFillRGBColor", "args": [255, 0, 0] },
//!     { "op": "rectangle", "args": [0, 0, 10, 10] },
//!     { "op": "fill" }
//!   ]
//! }
//! ```
//!
//! Operators are given by name or by numeric code. Numeric codes are passed through untouched,
//! so a script can exercise how the engine handles unknown entries.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use crate::content::OptionalContentConfig;
use crate::foundation::core::Rgba8;
use crate::foundation::error::{PaintError, PaintResult};
use crate::objects::SharedObject;
use crate::oplist::{Arg, OpCode, OperatorList, OperatorListChunk};
use crate::render::surface::HostSurface;
use crate::task::scheduler::scheduler_for;
use crate::task::session::{DocumentSession, Intent, PageContext, RenderParams};
use crate::viewport::{Viewport, ViewportOpts};

/// Operator reference: camelCase name or raw code.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ScriptOpRef {
    /// Numeric operator code.
    Code(u8),
    /// Operator name such as `"moveTo"`.
    Name(String),
}

/// One operator entry of a script.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ScriptOp {
    /// Operator.
    pub op: ScriptOpRef,
    /// Arguments.
    #[serde(default)]
    pub args: Vec<Arg>,
}

/// A page described in JSON.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PageScript {
    /// Page box and view parameters.
    #[serde(default)]
    pub viewport: ViewportOpts,
    /// Background as `#rrggbb` or `#rrggbbaa`.
    #[serde(default)]
    pub background: Option<String>,
    /// Render through a transparent intermediate target.
    #[serde(default)]
    pub transparency: bool,
    /// Layer visibility.
    #[serde(default)]
    pub optional_content: Option<OptionalContentConfig>,
    /// Shared objects resolved before rendering starts.
    #[serde(default)]
    pub objects: BTreeMap<String, SharedObject>,
    /// Operator entries in order.
    #[serde(default)]
    pub ops: Vec<ScriptOp>,
}

impl PageScript {
    /// Parse a script from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> PaintResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| PaintError::serde(format!("parse page script JSON: {e}")))
    }

    /// Parse a script from a JSON string.
    pub fn from_json(text: &str) -> PaintResult<Self> {
        Self::from_reader(text.as_bytes())
    }

    /// Parse a script from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> PaintResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PaintError::validation(format!("open page script '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Viewport at the script's own parameters.
    pub fn viewport(&self) -> PaintResult<Viewport> {
        self.viewport.build()
    }

    /// Parsed background color.
    pub fn background_color(&self) -> PaintResult<Option<Rgba8>> {
        self.background.as_deref().map(Rgba8::from_hex).transpose()
    }

    /// The whole list as one finished operator list.
    pub fn operator_list(&self) -> PaintResult<OperatorList> {
        let mut list = OperatorList::new();
        for (i, entry) in self.ops.iter().enumerate() {
            list.push_raw(op_code(i, &entry.op)?, entry.args.clone());
        }
        Ok(list.finished())
    }

    /// The list split into chunks of at most `size` entries; the last one is marked final.
    pub fn chunks(&self, size: usize) -> PaintResult<Vec<OperatorListChunk>> {
        let size = size.max(1);
        let mut chunks = Vec::new();
        for (n, part) in self.ops.chunks(size).enumerate() {
            let mut chunk = OperatorListChunk::new();
            for (j, entry) in part.iter().enumerate() {
                chunk.fn_array.push(op_code(n * size + j, &entry.op)?);
                chunk.args_array.push(entry.args.clone());
            }
            chunks.push(chunk);
        }
        match chunks.pop() {
            Some(last) => chunks.push(last.finished()),
            None => chunks.push(OperatorListChunk::new().finished()),
        }
        Ok(chunks)
    }

    /// Resolve every object of the script into `page`'s caches; returns how many were new.
    pub fn resolve_objects(&self, page: &PageContext) -> usize {
        self.objects
            .iter()
            .filter(|(id, obj)| page.resolve(id, (*obj).clone()))
            .count()
    }

    /// Render the script as page 0 of `session` into a fresh surface sized for `viewport`.
    #[tracing::instrument(skip_all, fields(ops = self.ops.len(), ?intent))]
    pub fn render(
        &self,
        session: &DocumentSession,
        viewport: Viewport,
        intent: Intent,
    ) -> PaintResult<HostSurface> {
        let page = session.page(0);
        self.resolve_objects(&page);
        let surface = HostSurface::for_canvas(viewport.canvas())?;

        let mut params = RenderParams::new(viewport)
            .with_intent(intent)
            .with_transparency(self.transparency);
        if let Some(bg) = self.background_color()? {
            params = params.with_background(bg);
        }
        if let Some(oc) = &self.optional_content {
            params = params.with_optional_content(Arc::new(oc.clone()));
        }

        let stream = crate::oplist::OperatorListStream::from_list(self.operator_list()?);
        let mut task = page.render(&surface, stream, params)?;
        let mut scheduler = scheduler_for(intent);
        task.run(scheduler.as_mut())?;
        Ok(surface)
    }
}

fn op_code(index: usize, op: &ScriptOpRef) -> PaintResult<u8> {
    match op {
        ScriptOpRef::Code(code) => Ok(*code),
        ScriptOpRef::Name(name) => OpCode::from_name(name).map(OpCode::code).ok_or_else(|| {
            PaintError::validation(format!("op #{index}: unknown operator name '{name}'"))
        }),
    }
}
