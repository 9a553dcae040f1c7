use crate::engine::GraphicsEngine;
use crate::engine::state::PaintStyle;
use crate::foundation::core::Rgba8;
use crate::foundation::error::{PaintError, PaintResult};
use crate::oplist::{Arg, ArgReader, OpCode};
use crate::render::raster::FillRule;

/// Solid color from `setFillColor`-style components in `[0, 1]`: gray, RGB or CMYK.
pub(crate) fn color_from_components(comps: &[f64]) -> Option<Rgba8> {
    let unit = |v: f64| v.clamp(0.0, 1.0);
    match *comps {
        [g] => Some(Rgba8::from_unit_rgb(unit(g), unit(g), unit(g))),
        [r, g, b] => Some(Rgba8::from_unit_rgb(unit(r), unit(g), unit(b))),
        [c, m, y, k] => {
            let k = unit(k);
            Some(Rgba8::from_unit_rgb(
                (1.0 - unit(c)) * (1.0 - k),
                (1.0 - unit(m)) * (1.0 - k),
                (1.0 - unit(y)) * (1.0 - k),
            ))
        }
        _ => None,
    }
}

fn byte(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

impl GraphicsEngine {
    /// Apply one operator. Dependencies are checked by the caller.
    pub(crate) fn dispatch(&mut self, op: OpCode, args: &[Arg]) -> PaintResult<()> {
        let a = ArgReader::new(op, args);
        match op {
            OpCode::Dependency => {}
            OpCode::SetLineWidth => self.current.line_width = a.num(0)?,
            OpCode::SetLineCap => self.current.line_cap = a.num(0)? as u8,
            OpCode::SetLineJoin => self.current.line_join = a.num(0)? as u8,
            OpCode::SetMiterLimit => self.current.miter_limit = a.num(0)?,
            OpCode::SetDash => self.set_dash(a.num_array(0)?, a.num_or(1, 0.0)?),
            OpCode::SetRenderingIntent | OpCode::SetFlatness => {}
            OpCode::SetGState => self.set_gstate(a.array(0)?)?,
            OpCode::Save => self.save(),
            OpCode::Restore => self.restore(),
            OpCode::Transform => {
                let m = a.matrix(0)?;
                self.current.ctm *= m;
            }

            OpCode::MoveTo
            | OpCode::LineTo
            | OpCode::CurveTo
            | OpCode::CurveTo2
            | OpCode::CurveTo3
            | OpCode::ClosePath
            | OpCode::Rectangle => self.path_op(op, &a.nums_vec()?)?,
            OpCode::ConstructPath => {
                let ops = a.num_array(0)?;
                let coords = a.num_array(1)?;
                self.construct_path(&ops, &coords)?;
            }
            OpCode::Stroke => self.stroke(true)?,
            OpCode::CloseStroke => {
                self.close_path();
                self.stroke(true)?;
            }
            OpCode::Fill => self.fill(FillRule::NonZero, true)?,
            OpCode::EoFill => self.fill(FillRule::EvenOdd, true)?,
            OpCode::FillStroke => self.fill_stroke(FillRule::NonZero)?,
            OpCode::EoFillStroke => self.fill_stroke(FillRule::EvenOdd)?,
            OpCode::CloseFillStroke => {
                self.close_path();
                self.fill_stroke(FillRule::NonZero)?;
            }
            OpCode::CloseEoFillStroke => {
                self.close_path();
                self.fill_stroke(FillRule::EvenOdd)?;
            }
            OpCode::EndPath => self.consume_path(),
            OpCode::Clip => self.pending_clip = Some(FillRule::NonZero),
            OpCode::EoClip => self.pending_clip = Some(FillRule::EvenOdd),

            OpCode::BeginText => self.begin_text(),
            OpCode::EndText => self.end_text(),
            OpCode::SetCharSpacing => self.current.text.char_spacing = a.num(0)?,
            OpCode::SetWordSpacing => self.current.text.word_spacing = a.num(0)?,
            OpCode::SetHScale => self.current.text.hscale = a.num(0)? / 100.0,
            OpCode::SetLeading => self.current.text.leading = -a.num(0)?,
            OpCode::SetFont => self.set_font(a.name(0)?, a.num(1)?)?,
            OpCode::SetTextRenderingMode => self.current.text.render_mode = a.num(0)? as u8,
            OpCode::SetTextRise => self.current.text.rise = a.num(0)?,
            OpCode::MoveText => self.move_text(a.num(0)?, a.num(1)?),
            OpCode::SetLeadingMoveText => {
                let [x, y] = a.nums::<2>(0)?;
                self.current.text.leading = y;
                self.move_text(x, y);
            }
            OpCode::SetTextMatrix => self.set_text_matrix(a.matrix(0)?),
            OpCode::NextLine => self.next_line(),
            OpCode::ShowText | OpCode::ShowSpacedText => self.show_text(a.glyphs(0)?)?,
            OpCode::NextLineShowText => {
                self.next_line();
                self.show_text(a.glyphs(0)?)?;
            }
            OpCode::NextLineSetSpacingShowText => {
                self.current.text.word_spacing = a.num(0)?;
                self.current.text.char_spacing = a.num(1)?;
                self.next_line();
                self.show_text(a.glyphs(2)?)?;
            }
            OpCode::SetCharWidth => {}
            OpCode::SetCharWidthAndBounds => {
                let [_, _, llx, lly, urx, ury] = a.nums::<6>(0)?;
                self.clip_user_rect(llx, lly, urx - llx, ury - lly);
            }

            OpCode::SetStrokeColorSpace | OpCode::SetFillColorSpace => {}
            OpCode::SetStrokeColor => self.current.stroke = PaintStyle::solid(components(&a)?),
            OpCode::SetFillColor => self.current.fill = PaintStyle::solid(components(&a)?),
            OpCode::SetStrokeColorN => self.current.stroke = color_n(&a)?,
            OpCode::SetFillColorN => self.current.fill = color_n(&a)?,
            OpCode::SetStrokeGray => self.current.stroke = PaintStyle::solid(gray(&a)?),
            OpCode::SetFillGray => self.current.fill = PaintStyle::solid(gray(&a)?),
            OpCode::SetStrokeRgbColor => self.current.stroke = PaintStyle::solid(rgb_bytes(&a)?),
            OpCode::SetFillRgbColor => self.current.fill = PaintStyle::solid(rgb_bytes(&a)?),
            OpCode::SetStrokeCmykColor => self.current.stroke = PaintStyle::solid(cmyk(&a)?),
            OpCode::SetFillCmykColor => self.current.fill = PaintStyle::solid(cmyk(&a)?),

            OpCode::ShadingFill => self.shading_fill(a.name(0)?)?,

            OpCode::BeginInlineImage | OpCode::BeginImageData | OpCode::EndInlineImage => {}
            OpCode::PaintXObject => tracing::warn!("unsupported paintXObject entry"),
            OpCode::MarkPoint | OpCode::MarkPointProps => {}
            OpCode::BeginMarkedContent => self.begin_marked_content(None),
            OpCode::BeginMarkedContentProps => {
                let tag = a.name(0).unwrap_or_default();
                let props = (tag == "OC").then(|| a.get(1)).flatten();
                self.begin_marked_content(props);
            }
            OpCode::EndMarkedContent => self.end_marked_content(),
            OpCode::BeginCompat | OpCode::EndCompat => {}

            OpCode::PaintFormXObjectBegin => {
                self.paint_form_begin(a.opt_matrix(0)?, a.opt_rect(1)?);
            }
            OpCode::PaintFormXObjectEnd => self.paint_form_end(),
            OpCode::BeginGroup => self.begin_group(a.group(0)?)?,
            OpCode::EndGroup => self.end_group(a.group(0)?)?,
            OpCode::BeginAnnotations => self.begin_annotations(),
            OpCode::EndAnnotations => self.restore(),
            OpCode::BeginAnnotation => {
                self.begin_annotation(a.opt_rect(0)?, a.opt_matrix(1)?, a.opt_matrix(2)?);
            }
            OpCode::EndAnnotation => self.restore(),

            OpCode::PaintJpegXObject | OpCode::PaintImageXObject => {
                let img = self.objects.image(a.name(0)?)?;
                self.paint_image(&img)?;
            }
            OpCode::PaintInlineImageXObject => self.paint_image(a.image(0)?)?,
            OpCode::PaintInlineImageXObjectGroup => {
                let map = image_map(a.array(1)?)?;
                self.paint_image_group(a.image(0)?, &map)?;
            }
            OpCode::PaintImageXObjectRepeat => {
                let img = self.objects.image(a.name(0)?)?;
                let [sx, sy] = a.nums::<2>(1)?;
                let positions = a.num_array(3)?;
                self.paint_image_repeat(&img, sx, sy, &positions)?;
            }
            OpCode::PaintImageMaskXObject => self.paint_image_mask(a.mask(0)?)?,
            OpCode::PaintImageMaskXObjectGroup => self.paint_image_mask_group(a.masks(0)?)?,
            OpCode::PaintImageMaskXObjectRepeat => {
                let [sx, kx, ky, sy] = a.nums::<4>(1)?;
                let positions = a.num_array(5)?;
                self.paint_image_mask_repeat(a.mask(0)?, [sx, kx, ky, sy], &positions)?;
            }
            OpCode::PaintSolidColorImageMask => self.paint_solid_color_image_mask()?,
        }
        Ok(())
    }

    fn set_dash(&mut self, dashes: Vec<f64>, phase: f64) {
        self.current.dash = if dashes.is_empty() {
            None
        } else {
            Some((dashes, phase))
        };
    }
}

fn components(a: &ArgReader<'_>) -> PaintResult<Rgba8> {
    let comps = a.nums_vec()?;
    color_from_components(&comps)
        .ok_or_else(|| PaintError::malformed(format!("{} color components", comps.len())))
}

fn color_n(a: &ArgReader<'_>) -> PaintResult<PaintStyle> {
    if let Some(Arg::Pattern { pattern }) = a.get(0) {
        return Ok(PaintStyle {
            color: Rgba8::BLACK,
            pattern: Some(pattern.clone()),
        });
    }
    Ok(PaintStyle::solid(components(a)?))
}

fn gray(a: &ArgReader<'_>) -> PaintResult<Rgba8> {
    let g = a.num(0)?.clamp(0.0, 1.0);
    Ok(Rgba8::from_unit_rgb(g, g, g))
}

fn rgb_bytes(a: &ArgReader<'_>) -> PaintResult<Rgba8> {
    let [r, g, b] = a.nums::<3>(0)?;
    Ok(Rgba8::opaque(byte(r), byte(g), byte(b)))
}

fn cmyk(a: &ArgReader<'_>) -> PaintResult<Rgba8> {
    let c = a.nums::<4>(0)?;
    color_from_components(&c).ok_or_else(|| PaintError::malformed("cmyk color"))
}

/// Entry of a `paintInlineImageXObjectGroup` map: a source rect and its placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ImageMapEntry {
    pub(crate) transform: [f64; 6],
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) w: f64,
    pub(crate) h: f64,
}

fn image_map(items: &[Arg]) -> PaintResult<Vec<ImageMapEntry>> {
    let bad = || PaintError::malformed("image group map entry");
    items
        .iter()
        .map(|item| {
            let Arg::Dict(d) = item else {
                return Err(bad());
            };
            let num = |k: &str| d.get(k).and_then(Arg::as_f64).ok_or_else(bad);
            let t = d.get("transform").and_then(Arg::as_array).ok_or_else(bad)?;
            let m = crate::oplist::matrix_from_args(t).ok_or_else(bad)?;
            Ok(ImageMapEntry {
                transform: m.as_coeffs(),
                x: num("x")?,
                y: num("y")?,
                w: num("w")?,
                h: num("h")?,
            })
        })
        .collect()
}
