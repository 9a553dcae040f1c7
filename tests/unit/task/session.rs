use super::*;
use crate::objects::ImageData;
use crate::objects::ImageKind;
use crate::oplist::{OpCode, OperatorList};
use crate::viewport::ViewportOpts;

fn image(id_byte: u8) -> SharedObject {
    SharedObject::Image(Arc::new(ImageData {
        width: 1,
        height: 1,
        kind: ImageKind::Rgb24Bpp,
        data: vec![id_byte, 0, 0],
    }))
}

fn viewport() -> Viewport {
    ViewportOpts::new([0.0, 0.0, 8.0, 8.0])
        .with_dont_flip(true)
        .build()
        .unwrap()
}

#[test]
fn pages_share_the_document_cache_but_not_page_caches() {
    let session = DocumentSession::default();
    let p0 = session.page(0);
    let p1 = session.page(1);

    assert!(p0.resolve("g_shared", image(1)));
    assert!(p0.resolve("img", image(2)));

    assert!(p1.objects().has("g_shared"));
    assert!(!p1.objects().has("img"));
    assert!(session.page(0).objects().has("img"));
}

#[test]
fn teardown_clears_every_cache_and_the_pool() {
    let session = DocumentSession::default();
    let page = session.page(3);
    page.resolve("g_a", image(1));
    page.resolve("b", image(2));

    session.teardown();

    assert!(!page.objects().has("g_a"));
    assert!(!page.objects().has("b"));
    assert!(session.common_objects().is_empty());
    assert_eq!(session.pool_stats().retained_targets, 0);
}

#[test]
fn close_page_drops_only_that_page() {
    let session = DocumentSession::default();
    session.page(0).resolve("x", image(1));
    session.page(1).resolve("x", image(1));

    session.close_page(0);

    assert!(!session.page(0).objects().has("x"));
    assert!(session.page(1).objects().has("x"));
}

#[test]
fn opts_load_from_json_with_defaults() {
    let opts =
        SessionOpts::from_json(r#"{ "engine": { "execution_time_ms": 3 }, "pool": {} }"#).unwrap();
    assert_eq!(opts.engine.execution_time_ms, 3);
    assert_eq!(opts.engine.max_group_size, EngineOpts::default().max_group_size);
    assert_eq!(opts.pool, PoolOpts::default());

    assert!(matches!(
        SessionOpts::from_json("{ nope"),
        Err(PaintError::Serde(_))
    ));
}

#[test]
fn intent_parses_from_cli_names() {
    assert_eq!("print".parse::<Intent>().unwrap(), Intent::Print);
    assert_eq!("display".parse::<Intent>().unwrap(), Intent::Display);
    assert!("screen".parse::<Intent>().is_err());
}

#[test]
fn task_ids_are_unique_per_render() {
    let session = DocumentSession::default();
    let page = session.page(0);
    let list = OperatorListStream::from_list(OperatorList::new().finished());

    let a = HostSurface::new(8, 8).unwrap();
    let b = HostSurface::new(8, 8).unwrap();
    let ta = page
        .render(&a, list.clone(), RenderParams::new(viewport()))
        .unwrap();
    let tb = page.render(&b, list, RenderParams::new(viewport())).unwrap();
    assert_ne!(ta.id(), tb.id());
}

#[test]
fn second_render_on_a_busy_surface_fails_synchronously() {
    let session = DocumentSession::default();
    let page = session.page(0);
    let surface = HostSurface::new(8, 8).unwrap();
    let mut list = OperatorList::new();
    list.push(OpCode::Save, vec![]);
    let stream = OperatorListStream::from_list(list);

    let first = page
        .render(&surface, stream.clone(), RenderParams::new(viewport()))
        .unwrap();
    let err = page
        .render(&surface, stream, RenderParams::new(viewport()))
        .unwrap_err();
    assert!(matches!(err, PaintError::ConcurrentRender(_)));

    drop(first);
    assert!(!surface.is_busy());
}

#[test]
fn teardown_cancels_a_render_blocked_on_a_missing_object() {
    use crate::oplist::Arg;
    use crate::task::scheduler::ImmediateScheduler;

    let session = DocumentSession::default();
    let page = session.page(0);
    let surface = HostSurface::new(8, 8).unwrap();
    let mut list = OperatorList::new();
    list.push(OpCode::Dependency, vec![Arg::from("never")]);
    list.push(OpCode::PaintImageXObject, vec![Arg::from("never")]);
    let mut task = page
        .render(
            &surface,
            OperatorListStream::from_list(list.finished()),
            RenderParams::new(viewport()).with_intent(Intent::Print),
        )
        .unwrap();
    let handle = task.handle();

    let closer = {
        let session = session.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            session.teardown();
        })
    };
    let err = task.run(&mut ImmediateScheduler::new()).unwrap_err();
    closer.join().unwrap();

    match err {
        PaintError::Cancelled(c) => assert_eq!(c.reason, "document session torn down"),
        other => panic!("expected a cancellation, got {other}"),
    }
    assert!(handle.completion().is_some_and(|c| c.is_cancelled()));
    assert!(!surface.is_busy());
}

#[test]
fn teardown_leaves_settled_renders_alone() {
    let session = DocumentSession::default();
    let page = session.page(0);
    let surface = HostSurface::new(8, 8).unwrap();
    let mut task = page
        .render(
            &surface,
            OperatorListStream::from_list(OperatorList::new().finished()),
            RenderParams::new(viewport()),
        )
        .unwrap();
    assert_eq!(task.step(), crate::task::render_task::StepOutcome::Finished);

    session.teardown();

    assert_eq!(
        task.completion(),
        Some(crate::task::render_task::RenderCompletion::Finished)
    );
}

#[test]
fn fonts_resolved_on_one_page_wake_renders_of_another() {
    use crate::objects::FontObject;
    use crate::oplist::Arg;

    let session = DocumentSession::default();
    let waiting = session.page(2);
    let surface = HostSurface::new(8, 8).unwrap();
    let mut list = OperatorList::new();
    list.push(OpCode::Dependency, vec![Arg::from("F9")]);
    list.push(OpCode::SetFont, vec![Arg::from("F9"), Arg::Num(12.0)]);
    let mut task = waiting
        .render(
            &surface,
            OperatorListStream::from_list(list.finished()),
            RenderParams::new(viewport()),
        )
        .unwrap();
    assert!(matches!(
        task.step(),
        crate::task::render_task::StepOutcome::Blocked { .. }
    ));
    assert_eq!(waiting.objects().page.pending(), 1);

    session.page(0).resolve(
        "F9",
        SharedObject::Font(Arc::new(FontObject::new("Helv"))),
    );

    assert_eq!(waiting.objects().page.pending(), 0);
    assert_eq!(
        task.step(),
        crate::task::render_task::StepOutcome::Finished
    );
}
