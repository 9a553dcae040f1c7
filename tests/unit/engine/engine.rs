use super::*;
use crate::objects::{
    FontObject, Glyph, GlyphCmd, GlyphProgram, ImageData, ImageKind, MaskData, SharedObject,
    TextItem,
};
use crate::oplist::{GroupInfo, SmaskInfo, SmaskSubtype};
use crate::render::pool::{PoolOpts, RasterTargetPool};
use crate::viewport::ViewportOpts;

const TASK: TaskId = TaskId(7);
const RED: [u8; 4] = [255, 0, 0, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

struct Harness {
    engine: GraphicsEngine,
    surface: HostSurface,
    pool: SharedPool,
    objects: ObjectScopes,
    cancel: Arc<AtomicBool>,
}

fn harness_with(size: u32, opts: EngineOpts, transparency: bool) -> Harness {
    let pool = RasterTargetPool::shared(PoolOpts::default());
    let objects = ObjectScopes::default();
    let cancel = Arc::new(AtomicBool::new(false));
    let mut engine = GraphicsEngine::new(EngineEnv {
        opts,
        objects: objects.clone(),
        pool: pool.clone(),
        task: TASK,
        optional_content: None,
        cancel: cancel.clone(),
        smask_counter: Arc::new(AtomicU64::new(0)),
    });
    let surface = HostSurface::new(size, size).unwrap();
    let s = f64::from(size);
    let viewport = ViewportOpts::new([0.0, 0.0, s, s])
        .with_dont_flip(true)
        .build()
        .unwrap();
    engine
        .begin(
            surface.clone(),
            BeginParams {
                viewport: &viewport,
                transform: None,
                background: None,
                transparency,
            },
        )
        .unwrap();
    Harness {
        engine,
        surface,
        pool,
        objects,
        cancel,
    }
}

fn harness(size: u32) -> Harness {
    harness_with(size, EngineOpts::default(), false)
}

fn nums(v: &[f64]) -> Vec<Arg> {
    v.iter().copied().map(Arg::Num).collect()
}

fn list(ops: Vec<(OpCode, Vec<Arg>)>) -> OperatorList {
    let mut list = OperatorList::new();
    for (op, args) in ops {
        list.push(op, args);
    }
    list.finished()
}

fn red() -> (OpCode, Vec<Arg>) {
    (OpCode::SetFillRgbColor, nums(&[255.0, 0.0, 0.0]))
}

fn rect(x: f64, y: f64, w: f64, h: f64) -> (OpCode, Vec<Arg>) {
    (OpCode::Rectangle, nums(&[x, y, w, h]))
}

fn op(op: OpCode) -> (OpCode, Vec<Arg>) {
    (op, vec![])
}

fn group(bbox: [f64; 4], smask: Option<SmaskInfo>) -> Vec<Arg> {
    vec![Arg::Group {
        group: GroupInfo {
            bbox,
            matrix: None,
            isolated: true,
            knockout: false,
            smask,
        },
    }]
}

fn px(h: &Harness, x: u32, y: u32) -> [u8; 4] {
    h.surface.pixel(x, y).unwrap().to_array()
}

fn outstanding(h: &Harness) -> usize {
    crate::foundation::core::lock(&h.pool).outstanding(TASK)
}

fn run(h: &mut Harness, l: &OperatorList) {
    let len = l.len();
    assert_eq!(h.engine.execute(l, 0, None), ExecOutcome::Done(len));
}

#[test]
fn red_triangle_stays_inside_its_box() {
    let mut h = harness(20);
    let l = list(vec![
        red(),
        (OpCode::MoveTo, nums(&[0.0, 0.0])),
        (OpCode::LineTo, nums(&[10.0, 0.0])),
        (OpCode::LineTo, nums(&[10.0, 10.0])),
        op(OpCode::ClosePath),
        op(OpCode::Fill),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 8, 2), RED);
    assert_eq!(px(&h, 2, 8), WHITE);
    assert_eq!(px(&h, 15, 15), WHITE);
    assert_eq!(px(&h, 10, 5), WHITE);
    assert_eq!(outstanding(&h), 0);
}

#[test]
fn red_quad_fills_exactly_its_box() {
    let mut h = harness(20);
    let l = list(vec![
        red(),
        (OpCode::MoveTo, nums(&[0.0, 0.0])),
        (OpCode::LineTo, nums(&[10.0, 0.0])),
        (OpCode::LineTo, nums(&[10.0, 10.0])),
        (OpCode::LineTo, nums(&[0.0, 10.0])),
        op(OpCode::ClosePath),
        op(OpCode::Fill),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    for (x, y) in [(0, 0), (9, 0), (0, 9), (9, 9), (5, 5)] {
        assert_eq!(px(&h, x, y), RED, "({x}, {y})");
    }
    for (x, y) in [(10, 0), (0, 10), (10, 10), (19, 19)] {
        assert_eq!(px(&h, x, y), WHITE, "({x}, {y})");
    }
}

#[test]
fn balanced_save_restore_leaves_state_untouched() {
    let mut h = harness(8);
    let before = h.engine.current.ctm;
    let l = list(vec![
        op(OpCode::Save),
        (OpCode::Transform, nums(&[2.0, 0.0, 0.0, 2.0, 3.0, 4.0])),
        (OpCode::SetLineWidth, nums(&[5.0])),
        op(OpCode::Save),
        red(),
        op(OpCode::Restore),
        op(OpCode::Restore),
    ]);
    run(&mut h, &l);

    assert_eq!(h.engine.state_depth(), 0);
    assert_eq!(h.engine.current.ctm, before);
    assert_eq!(h.engine.current.line_width, 1.0);
    assert_eq!(h.engine.current.fill.color, Rgba8::BLACK);
    assert!(h.engine.current.active_smask.is_none());
}

#[test]
fn unbalanced_restore_is_harmless() {
    let mut h = harness(8);
    run(&mut h, &list(vec![op(OpCode::Restore), op(OpCode::Restore)]));
    assert_eq!(h.engine.state_depth(), 0);
}

#[test]
fn pending_clip_does_not_leak_past_restore() {
    let mut h = harness(20);
    let l = list(vec![
        op(OpCode::Save),
        rect(0.0, 0.0, 5.0, 5.0),
        op(OpCode::Clip),
        op(OpCode::Restore),
        red(),
        rect(0.0, 0.0, 20.0, 20.0),
        op(OpCode::Fill),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 2, 2), RED);
    assert_eq!(px(&h, 15, 15), RED);
}

#[test]
fn applied_clip_limits_painting_until_restore() {
    let mut h = harness(20);
    let l = list(vec![
        op(OpCode::Save),
        rect(0.0, 0.0, 5.0, 5.0),
        op(OpCode::Clip),
        op(OpCode::EndPath),
        red(),
        rect(0.0, 0.0, 20.0, 20.0),
        op(OpCode::Fill),
        op(OpCode::Restore),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 2, 2), RED);
    assert_eq!(px(&h, 15, 15), WHITE);
}

#[test]
fn oversized_group_is_clamped_and_stays_aligned() {
    let opts = EngineOpts::default().with_max_group_size(16);
    let mut h = harness_with(40, opts, false);
    let open = list(vec![
        (OpCode::BeginGroup, group([4.0, 4.0, 36.0, 36.0], None)),
        red(),
        rect(4.0, 4.0, 32.0, 32.0),
        op(OpCode::Fill),
    ]);
    run(&mut h, &open);
    {
        let top = &h.engine.levels.last().unwrap().target;
        assert!(top.width <= 16 && top.height <= 16);
        assert_eq!(h.engine.group_level(), 1);
    }
    run(
        &mut h,
        &list(vec![(OpCode::EndGroup, group([4.0, 4.0, 36.0, 36.0], None))]),
    );
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 4, 4), RED);
    assert_eq!(px(&h, 35, 35), RED);
    assert_eq!(px(&h, 3, 3), WHITE);
    assert_eq!(px(&h, 36, 36), WHITE);
    assert_eq!(outstanding(&h), 0);
}

#[test]
fn alpha_soft_mask_hides_uncovered_half() {
    let mut h = harness(20);
    let mask = Some(SmaskInfo::default());
    let l = list(vec![
        (OpCode::BeginGroup, group([0.0, 0.0, 20.0, 20.0], mask.clone())),
        rect(0.0, 0.0, 10.0, 20.0),
        op(OpCode::Fill),
        (OpCode::EndGroup, group([0.0, 0.0, 20.0, 20.0], mask)),
        op(OpCode::Save),
        (
            OpCode::SetGState,
            vec![Arg::Array(vec![Arg::Array(vec![
                Arg::from("SMask"),
                Arg::Bool(true),
            ])])],
        ),
        red(),
        rect(0.0, 0.0, 20.0, 20.0),
        op(OpCode::Fill),
        op(OpCode::Restore),
    ]);
    run(&mut h, &l);
    assert!(h.engine.current.active_smask.is_none());
    assert_eq!(h.engine.group_level(), 0);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 5, 10), RED);
    assert_eq!(px(&h, 15, 10), WHITE);
    assert_eq!(outstanding(&h), 0);
}

#[test]
fn unresolved_dependency_blocks_until_resolved() {
    let mut h = harness(20);
    let l = list(vec![
        (OpCode::Transform, nums(&[10.0, 0.0, 0.0, 10.0, 0.0, 0.0])),
        (OpCode::Dependency, vec![Arg::from("img1")]),
        (OpCode::PaintImageXObject, vec![Arg::from("img1")]),
    ]);
    assert_eq!(
        h.engine.execute(&l, 0, None),
        ExecOutcome::Blocked {
            index: 1,
            id: "img1".to_owned()
        }
    );
    assert_eq!(h.engine.phase(), EnginePhase::Blocked);
    assert_eq!(px(&h, 5, 5), WHITE);

    h.objects.resolve(
        "img1",
        SharedObject::Image(Arc::new(ImageData {
            width: 1,
            height: 1,
            kind: ImageKind::Rgb24Bpp,
            data: vec![255, 0, 0],
        })),
    );
    assert_eq!(h.engine.execute(&l, 1, None), ExecOutcome::Done(3));
    assert_eq!(h.engine.phase(), EnginePhase::Running);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 5, 5), RED);
    assert_eq!(px(&h, 15, 15), WHITE);
}

#[test]
fn nested_lists_skip_missing_dependencies() {
    let mut h = harness(20);
    let nested = list(vec![
        (OpCode::Dependency, vec![Arg::from("missing")]),
        red(),
        rect(0.0, 0.0, 10.0, 10.0),
        op(OpCode::Fill),
    ]);
    h.engine.execute_nested(&nested);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 5, 5), RED);
}

#[test]
fn malformed_entries_are_skipped() {
    let mut h = harness(20);
    let mut l = OperatorList::new();
    l.push_raw(250, vec![]);
    l.push(OpCode::SetLineWidth, vec![Arg::from("wide")]);
    l.push(OpCode::SetFillRgbColor, nums(&[255.0, 0.0, 0.0]));
    l.push(OpCode::Rectangle, nums(&[0.0, 0.0, 10.0, 10.0]));
    l.push(OpCode::Fill, vec![]);
    let l = l.finished();
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 5, 5), RED);
}

#[test]
fn zero_budget_yields_and_resumes() {
    let opts = EngineOpts::default().with_execution_steps(2);
    let mut h = harness_with(8, opts, false);
    let ops = (0..20).map(|_| op(OpCode::Save)).collect();
    let l = list(ops);

    let mut from = 0;
    let mut slices = 0;
    loop {
        match h.engine.execute(&l, from, Some(Duration::ZERO)) {
            ExecOutcome::Yield(i) => {
                assert!(i > from);
                from = i;
                slices += 1;
            }
            ExecOutcome::Done(n) => {
                assert_eq!(n, 20);
                break;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(slices > 1);
    assert_eq!(h.engine.state_depth(), 20);
}

#[test]
fn cancel_flag_stops_execution_and_abort_releases_targets() {
    let mut h = harness_with(20, EngineOpts::default(), true);
    run(
        &mut h,
        &list(vec![(OpCode::BeginGroup, group([0.0, 0.0, 10.0, 10.0], None))]),
    );
    assert!(outstanding(&h) >= 2);
    let writes = h.surface.write_count();

    h.cancel.store(true, Ordering::Release);
    let l = list(vec![red(), rect(0.0, 0.0, 20.0, 20.0), op(OpCode::Fill)]);
    assert_eq!(h.engine.execute(&l, 0, None), ExecOutcome::Cancelled(0));
    h.engine.abort();

    assert_eq!(h.engine.phase(), EnginePhase::Cancelled);
    assert_eq!(outstanding(&h), 0);
    assert_eq!(h.surface.write_count(), writes);
}

#[test]
fn transparent_root_is_composited_at_finish() {
    let mut h = harness_with(20, EngineOpts::default(), true);
    run(
        &mut h,
        &list(vec![red(), rect(0.0, 0.0, 10.0, 10.0), op(OpCode::Fill)]),
    );
    assert_eq!(px(&h, 5, 5), WHITE);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 5, 5), RED);
    assert_eq!(px(&h, 15, 15), WHITE);
    assert_eq!(outstanding(&h), 0);
}

#[test]
fn begin_twice_is_rejected() {
    let mut h = harness(8);
    let viewport = ViewportOpts::new([0.0, 0.0, 8.0, 8.0]).build().unwrap();
    let err = h
        .engine
        .begin(
            h.surface.clone(),
            BeginParams {
                viewport: &viewport,
                transform: None,
                background: None,
                transparency: false,
            },
        )
        .unwrap_err();
    assert!(matches!(err, PaintError::Validation(_)));
}

fn is_red(p: [u8; 4]) -> bool {
    p[0] > 230 && p[1] < 25 && p[2] < 25 && p[3] == 255
}

fn smask(on: bool) -> (OpCode, Vec<Arg>) {
    (
        OpCode::SetGState,
        vec![Arg::Array(vec![Arg::Array(vec![
            Arg::from("SMask"),
            Arg::Bool(on),
        ])])],
    )
}

#[test]
fn nested_render_hands_back_its_painted_target() {
    let h = harness(20);
    let target = RasterTarget::acquire(&h.pool, TASK, "pattern", 8, 8, Affine::IDENTITY).unwrap();
    let mut cell = h.engine.nested(target, Affine::IDENTITY);
    cell.execute_nested(&list(vec![red(), rect(0.0, 0.0, 4.0, 8.0), op(OpCode::Fill)]));

    let root = cell.into_root().unwrap();
    assert_eq!((root.width, root.height), (8, 8));
    let (purpose, pixmap) = root.into_pooled().unwrap();
    assert_eq!(purpose, "pattern");
    let inside = pixmap.sample(1, 1);
    assert_eq!((inside.r, inside.g, inside.a), (255, 0, 255));
    assert_eq!(pixmap.sample(6, 1).a, 0);

    crate::foundation::core::lock(&h.pool).release(TASK, &purpose, pixmap);
    assert_eq!(outstanding(&h), 0);
}

#[test]
fn luminosity_backdrop_covers_pixels_outside_the_mask_group() {
    let mut h = harness(20);
    let mask = Some(SmaskInfo {
        subtype: SmaskSubtype::Luminosity,
        backdrop: Some([255, 255, 255]),
        transfer_map: None,
    });
    let l = list(vec![
        (OpCode::BeginGroup, group([0.0, 0.0, 10.0, 10.0], mask.clone())),
        (OpCode::EndGroup, group([0.0, 0.0, 10.0, 10.0], mask)),
        op(OpCode::Save),
        smask(true),
        red(),
        rect(0.0, 0.0, 20.0, 20.0),
        op(OpCode::Fill),
        op(OpCode::Restore),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 5, 5), RED);
    assert_eq!(px(&h, 15, 15), RED);
    assert_eq!(px(&h, 2, 18), RED);
    assert_eq!(outstanding(&h), 0);
}

#[test]
fn alpha_mask_without_backdrop_clears_outside_its_group() {
    let mut h = harness(20);
    let mask = Some(SmaskInfo::default());
    let l = list(vec![
        (OpCode::BeginGroup, group([0.0, 0.0, 10.0, 10.0], mask.clone())),
        rect(0.0, 0.0, 10.0, 10.0),
        op(OpCode::Fill),
        (OpCode::EndGroup, group([0.0, 0.0, 10.0, 10.0], mask)),
        op(OpCode::Save),
        smask(true),
        red(),
        rect(0.0, 0.0, 20.0, 20.0),
        op(OpCode::Fill),
        op(OpCode::Restore),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 5, 5), RED);
    assert_eq!(px(&h, 15, 5), WHITE);
    assert_eq!(px(&h, 15, 15), WHITE);
}

#[test]
fn luminosity_transfer_function_inverts_the_mask() {
    let mut h = harness(20);
    let mask = Some(SmaskInfo {
        subtype: SmaskSubtype::Luminosity,
        backdrop: None,
        transfer_map: Some((0..=255u8).rev().collect()),
    });
    let l = list(vec![
        (OpCode::BeginGroup, group([0.0, 0.0, 20.0, 20.0], mask.clone())),
        (OpCode::SetFillRgbColor, nums(&[255.0, 255.0, 255.0])),
        rect(0.0, 0.0, 10.0, 20.0),
        op(OpCode::Fill),
        (OpCode::EndGroup, group([0.0, 0.0, 20.0, 20.0], mask)),
        op(OpCode::Save),
        smask(true),
        red(),
        rect(0.0, 0.0, 20.0, 20.0),
        op(OpCode::Fill),
        op(OpCode::Restore),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 5, 10), WHITE);
    assert_eq!(px(&h, 15, 10), RED);
}

#[test]
fn soft_mask_is_suspended_inside_a_nested_state_and_resumed_after_restore() {
    let mut h = harness(20);
    let mask = Some(SmaskInfo::default());
    let l = list(vec![
        (OpCode::BeginGroup, group([0.0, 0.0, 20.0, 20.0], mask.clone())),
        rect(0.0, 0.0, 10.0, 20.0),
        op(OpCode::Fill),
        (OpCode::EndGroup, group([0.0, 0.0, 20.0, 20.0], mask)),
        op(OpCode::Save),
        smask(true),
        red(),
        rect(0.0, 0.0, 20.0, 5.0),
        op(OpCode::Fill),
        op(OpCode::Save),
        smask(false),
        rect(0.0, 5.0, 20.0, 5.0),
        op(OpCode::Fill),
        op(OpCode::Restore),
        rect(0.0, 10.0, 20.0, 5.0),
        op(OpCode::Fill),
        op(OpCode::Restore),
    ]);
    run(&mut h, &l);
    assert!(h.engine.current.active_smask.is_none());
    assert_eq!(h.engine.group_level(), 0);
    h.engine.finish().unwrap();

    // Masked before the nested state.
    assert_eq!(px(&h, 5, 2), RED);
    assert_eq!(px(&h, 15, 2), WHITE);
    // Unmasked while suspended.
    assert_eq!(px(&h, 15, 7), RED);
    // Masked again after the restore.
    assert_eq!(px(&h, 5, 12), RED);
    assert_eq!(px(&h, 15, 12), WHITE);
    assert_eq!(outstanding(&h), 0);
}

#[test]
fn zero_width_stroke_is_one_device_pixel_wide() {
    let mut h = harness(20);
    let l = list(vec![
        (OpCode::SetStrokeRgbColor, nums(&[255.0, 0.0, 0.0])),
        (OpCode::SetLineWidth, nums(&[0.0])),
        (OpCode::MoveTo, nums(&[2.0, 10.5])),
        (OpCode::LineTo, nums(&[18.0, 10.5])),
        op(OpCode::Stroke),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert!(is_red(px(&h, 10, 10)), "{:?}", px(&h, 10, 10));
    assert_eq!(px(&h, 10, 8), WHITE);
    assert_eq!(px(&h, 10, 12), WHITE);
}

#[test]
fn zero_width_stroke_under_anisotropic_scale_stays_one_pixel() {
    let mut h = harness(20);
    assert!(h.engine.single_pixel_width(Affine::scale_non_uniform(0.25, 1.0)) < 0.0);
    let l = list(vec![
        (OpCode::SetStrokeRgbColor, nums(&[255.0, 0.0, 0.0])),
        (OpCode::SetLineWidth, nums(&[0.0])),
        (OpCode::Transform, nums(&[0.25, 0.0, 0.0, 1.0, 0.0, 0.0])),
        (OpCode::MoveTo, nums(&[8.0, 10.5])),
        (OpCode::LineTo, nums(&[72.0, 10.5])),
        op(OpCode::Stroke),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert!(is_red(px(&h, 10, 10)), "{:?}", px(&h, 10, 10));
    assert_eq!(px(&h, 10, 12), WHITE);
    assert_eq!(px(&h, 19, 10), WHITE);
}

fn square_program() -> GlyphProgram {
    GlyphProgram {
        cmds: vec![
            GlyphCmd::MoveTo { x: 0.0, y: 0.0 },
            GlyphCmd::LineTo { x: 1000.0, y: 0.0 },
            GlyphCmd::LineTo { x: 1000.0, y: 1000.0 },
            GlyphCmd::LineTo { x: 0.0, y: 1000.0 },
            GlyphCmd::ClosePath,
        ],
    }
}

fn glyph(width: f64) -> TextItem {
    TextItem::Glyph(Glyph {
        id: 1,
        operator_list_id: None,
        width,
        is_space: false,
        vmetric: None,
        is_in_font: true,
    })
}

fn text_run(mode: f64, glyphs: Vec<TextItem>) -> Vec<(OpCode, Vec<Arg>)> {
    vec![
        op(OpCode::BeginText),
        (OpCode::SetTextRenderingMode, nums(&[mode])),
        (OpCode::SetFont, vec![Arg::from("F1"), Arg::Num(10.0)]),
        red(),
        (OpCode::ShowText, vec![Arg::Glyphs { glyphs }]),
        op(OpCode::EndText),
    ]
}

/// Minimal TrueType font: glyph 0 is empty, glyph 1 is a 1000-unit square on a 1000 em.
fn square_font() -> Vec<u8> {
    fn put(out: &mut Vec<u8>, values: &[i32]) {
        for v in values {
            out.extend_from_slice(&(*v as u16).to_be_bytes());
        }
    }
    let mut glyf = Vec::new();
    put(&mut glyf, &[1, 0, 0, 1000, 1000, 3, 0]);
    glyf.extend_from_slice(&[1, 1, 1, 1]);
    put(&mut glyf, &[0, 0, 1000, 0, 0, 1000, 0, -1000]);
    let mut head = Vec::new();
    put(&mut head, &[1, 0, 1, 0, 0, 0, 0x5F0F, 0x3CF5, 0, 1000]);
    head.extend_from_slice(&[0; 16]);
    put(&mut head, &[0, 0, 1000, 1000, 0, 8, 2, 0, 0]);
    let mut hhea = Vec::new();
    put(&mut hhea, &[1, 0, 1000, 0, 0, 1000, 0, 0, 1000, 1, 0, 0, 0, 0, 0, 0, 0, 2]);
    let mut hmtx = Vec::new();
    put(&mut hmtx, &[1000, 0, 1000, 0]);
    let mut loca = Vec::new();
    put(&mut loca, &[0, 0, glyf.len() as i32 / 2]);
    let mut maxp = Vec::new();
    put(&mut maxp, &[1, 0, 2, 4, 1, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!((glyf.len(), head.len(), hhea.len(), maxp.len()), (34, 54, 36, 32));

    let tables: [(&[u8; 4], Vec<u8>); 6] = [
        (b"glyf", glyf),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"loca", loca),
        (b"maxp", maxp),
    ];
    let mut font = Vec::new();
    put(&mut font, &[1, 0, 6, 64, 2, 32]);
    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        font.extend_from_slice(*tag);
        font.extend_from_slice(&[0; 4]);
        font.extend_from_slice(&(offset as u32).to_be_bytes());
        font.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() + body.len();
    }
    font.extend_from_slice(&body);
    font
}

#[test]
fn outline_text_advances_by_glyph_widths() {
    let mut h = harness(40);
    h.objects.resolve(
        "F1",
        SharedObject::Font(Arc::new(FontObject::new("Outlined").with_outline(1, square_program()))),
    );
    run(&mut h, &list(text_run(0.0, vec![glyph(1500.0), glyph(1000.0)])));
    assert!((h.engine.current.text.x - 25.0).abs() < 1e-9);
    h.engine.finish().unwrap();

    assert!(is_red(px(&h, 5, 5)));
    assert_eq!(px(&h, 12, 5), WHITE);
    assert!(is_red(px(&h, 20, 5)));
    assert_eq!(px(&h, 30, 5), WHITE);
    assert_eq!(px(&h, 5, 15), WHITE);
}

#[test]
fn native_glyph_run_paints_the_font_program() {
    let mut h = harness(40);
    let font = FontObject::new("Square").with_data(square_font());
    assert!(font.native().is_some());
    h.objects.resolve("F1", SharedObject::Font(Arc::new(font)));
    run(&mut h, &list(text_run(0.0, vec![glyph(1500.0), glyph(1000.0)])));
    h.engine.finish().unwrap();

    let first = px(&h, 5, 5);
    let second = px(&h, 20, 5);
    assert!(first[0] > 200 && first[1] < 60, "{first:?}");
    assert!(second[0] > 200 && second[1] < 60, "{second:?}");
    assert_eq!(px(&h, 12, 5), WHITE);
    assert_eq!(px(&h, 5, 15), WHITE);
}

#[test]
fn clip_rendering_mode_clips_later_painting_to_the_glyphs() {
    let mut h = harness(40);
    h.objects.resolve(
        "F1",
        SharedObject::Font(Arc::new(FontObject::new("Outlined").with_outline(1, square_program()))),
    );
    let mut ops = text_run(7.0, vec![glyph(1000.0)]);
    ops.extend([rect(0.0, 0.0, 40.0, 40.0), op(OpCode::Fill)]);
    run(&mut h, &list(ops));
    assert!(h.engine.pending_text_clip.is_none());
    h.engine.finish().unwrap();

    assert!(is_red(px(&h, 5, 5)));
    assert_eq!(px(&h, 15, 5), WHITE);
    assert_eq!(px(&h, 5, 15), WHITE);
    assert_eq!(px(&h, 30, 30), WHITE);
}

fn stencil(width: u32, height: u32, data: Vec<u8>, transform: Option<[f64; 6]>) -> Arc<MaskData> {
    Arc::new(MaskData {
        width,
        height,
        data,
        transform,
        inverse_decode: false,
    })
}

#[test]
fn magnified_image_mask_keeps_hard_edges() {
    let mut h = harness(20);
    // Left column paints, right column is transparent.
    let mask = stencil(2, 2, vec![0x40, 0x40], None);
    let l = list(vec![
        red(),
        (OpCode::Transform, nums(&[20.0, 0.0, 0.0, 20.0, 0.0, 0.0])),
        (OpCode::PaintImageMaskXObject, vec![Arg::Mask { mask }]),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 2, 5), RED);
    assert_eq!(px(&h, 9, 5), RED);
    assert_eq!(px(&h, 10, 5), WHITE);
    assert_eq!(px(&h, 17, 15), WHITE);
    assert_eq!(outstanding(&h), 0);
}

#[test]
fn repeated_image_mask_is_stamped_at_every_position() {
    let mut h = harness(20);
    let mask = stencil(1, 1, vec![0x00], None);
    let l = list(vec![
        red(),
        (
            OpCode::PaintImageMaskXObjectRepeat,
            vec![
                Arg::Mask { mask },
                Arg::Num(5.0),
                Arg::Num(0.0),
                Arg::Num(0.0),
                Arg::Num(5.0),
                Arg::Array(nums(&[0.0, 0.0, 10.0, 10.0])),
            ],
        ),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 2, 2), RED);
    assert_eq!(px(&h, 12, 12), RED);
    assert_eq!(px(&h, 7, 7), WHITE);
    assert_eq!(px(&h, 12, 2), WHITE);
    assert_eq!(outstanding(&h), 0);
}

#[test]
fn image_mask_group_places_each_mask_by_its_transform() {
    let mut h = harness(20);
    let masks = vec![
        stencil(1, 1, vec![0x00], Some([5.0, 0.0, 0.0, 5.0, 0.0, 0.0])),
        stencil(1, 1, vec![0x00], Some([5.0, 0.0, 0.0, 5.0, 10.0, 0.0])),
    ];
    let l = list(vec![
        red(),
        (OpCode::PaintImageMaskXObjectGroup, vec![Arg::Masks { masks }]),
    ]);
    run(&mut h, &l);
    h.engine.finish().unwrap();

    assert_eq!(px(&h, 2, 2), RED);
    assert_eq!(px(&h, 12, 2), RED);
    assert_eq!(px(&h, 7, 2), WHITE);
    assert_eq!(px(&h, 2, 12), WHITE);
    assert_eq!(outstanding(&h), 0);
}
