use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::*;
use crate::objects::{ImageData, ImageKind, ObjectScopes};

fn image(w: u32) -> SharedObject {
    SharedObject::Image(Arc::new(ImageData {
        width: w,
        height: 1,
        kind: ImageKind::Rgb24Bpp,
        data: vec![0; w as usize * 3],
    }))
}

fn width_of(v: &SharedObject) -> u32 {
    match v {
        SharedObject::Image(i) => i.width,
        _ => 0,
    }
}

#[test]
fn get_before_resolve_is_not_resolved() {
    let cache = ObjectCache::new();
    let err = cache.get("img_1").unwrap_err();
    assert_eq!(err.id, "img_1");
    assert!(!cache.has("img_1"));
}

#[test]
fn resolution_is_idempotent_for_readers() {
    let cache = ObjectCache::new();
    assert!(cache.resolve("img_1", image(3)));
    for _ in 0..4 {
        assert_eq!(width_of(&cache.get("img_1").unwrap()), 3);
    }
    assert!(!cache.resolve("img_1", image(9)));
    assert_eq!(width_of(&cache.get("img_1").unwrap()), 3);
    assert_eq!(cache.len(), 1);
}

#[test]
fn pending_subscribers_fire_once_on_resolve() {
    let cache = ObjectCache::new();
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let hits = hits.clone();
        cache.subscribe("img_2", move |v| {
            assert_eq!(width_of(v), 5);
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(cache.is_empty());

    cache.resolve("img_2", image(5));
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    cache.resolve("img_2", image(6));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[test]
fn subscribe_after_resolve_runs_synchronously() {
    let cache = ObjectCache::new();
    cache.resolve("img_3", image(7));
    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    cache.subscribe("img_3", move |v| {
        *slot.lock().unwrap() = Some(width_of(v));
    });
    assert_eq!(*seen.lock().unwrap(), Some(7));
}

#[test]
fn subscriber_may_reenter_the_cache() {
    let cache = Arc::new(ObjectCache::new());
    let inner = cache.clone();
    let hit = Arc::new(AtomicUsize::new(0));
    let h = hit.clone();
    cache.subscribe("img_4", move |_| {
        assert!(inner.has("img_4"));
        h.fetch_add(1, Ordering::SeqCst);
    });
    cache.resolve("img_4", image(1));
    assert_eq!(hit.load(Ordering::SeqCst), 1);
}

#[test]
fn notify_pending_wakes_waiters_without_storing() {
    let cache = ObjectCache::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let s = seen.clone();
    cache.subscribe("f", move |v| {
        s.store(width_of(v) as usize, Ordering::SeqCst);
    });
    assert_eq!(cache.pending(), 1);

    cache.notify_pending("f", &image(4));

    assert_eq!(seen.load(Ordering::SeqCst), 4);
    assert_eq!(cache.pending(), 0);
    assert!(!cache.has("f"));
}

#[test]
fn notify_pending_leaves_resolved_values_alone() {
    let cache = ObjectCache::new();
    cache.resolve("f", image(2));
    cache.notify_pending("f", &image(9));
    assert_eq!(width_of(&cache.get("f").unwrap()), 2);
}

#[test]
fn page_ids_subscribe_only_in_the_page_cache() {
    let scopes = ObjectScopes::default();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    scopes.on_resolved("img", move || {
        h.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(scopes.page.pending(), 1);
    assert_eq!(scopes.common.pending(), 0);

    scopes.resolve("img", image(1));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(scopes.page.pending(), 0);
    assert_eq!(scopes.common.pending(), 0);
}

#[test]
fn fonts_under_page_ids_wake_page_subscribers() {
    use crate::objects::FontObject;

    let scopes = ObjectScopes::default();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    scopes.on_resolved("F1", move || {
        h.fetch_add(1, Ordering::SeqCst);
    });

    scopes.resolve("F1", SharedObject::Font(Arc::new(FontObject::new("Helv"))));

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(scopes.common.has("F1"));
    assert!(!scopes.page.has("F1"));
    assert_eq!(scopes.page.pending(), 0);
    assert!(scopes.font("F1").is_ok());
}
