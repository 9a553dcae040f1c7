use super::*;

const T: TaskId = TaskId(1);

#[test]
fn pool_honors_purpose_cap() {
    let mut p = RasterTargetPool::new(PoolOpts {
        max_pool_bytes: 1 << 30,
        max_per_purpose: 1,
    });

    let a = p.acquire(T, "groupAt0", 8, 8).unwrap();
    let b = p.acquire(T, "groupAt0", 8, 8).unwrap();
    p.release(T, "groupAt0", a);
    p.release(T, "groupAt0", b);

    let st = p.stats();
    assert_eq!(st.retained_targets, 1);
    assert_eq!(st.dropped_on_release, 1);
}

#[test]
fn pool_honors_global_byte_cap() {
    let bytes_8x8 = byte_len(8, 8);
    let mut p = RasterTargetPool::new(PoolOpts {
        max_pool_bytes: bytes_8x8,
        max_per_purpose: 8,
    });

    let a = p.acquire(T, "pattern", 8, 8).unwrap();
    let b = p.acquire(T, "pattern", 8, 8).unwrap();
    p.release(T, "pattern", a);
    p.release(T, "pattern", b);

    let st = p.stats();
    assert_eq!(st.retained_bytes, bytes_8x8);
    assert_eq!(st.retained_targets, 1);
    assert!(st.dropped_on_release >= 1);
}

#[test]
fn reuse_resizes_and_clears() {
    let mut p = RasterTargetPool::new(PoolOpts::default());
    let mut a = p.acquire(T, "maskCanvas", 4, 4).unwrap();
    a.data_as_u8_slice_mut().fill(200);
    p.release(T, "maskCanvas", a);

    let b = p.acquire(T, "maskCanvas", 6, 3).unwrap();
    assert_eq!((b.width(), b.height()), (6, 3));
    assert!(b.data_as_u8_slice().iter().all(|&v| v == 0));
    assert_eq!(p.stats().reused_targets, 1);
    assert_eq!(p.stats().alloc_targets, 1);

    let c = p.acquire(T, "prescale1", 2, 2).unwrap();
    assert_eq!(p.stats().alloc_targets, 2);
    drop((b, c));
}

#[test]
fn outstanding_is_tracked_per_task() {
    let other = TaskId(2);
    let mut p = RasterTargetPool::new(PoolOpts::default());
    let a = p.acquire(T, "groupAt0", 2, 2).unwrap();
    let b = p.acquire(T, "groupAt1", 2, 2).unwrap();
    let c = p.acquire(other, "groupAt0", 2, 2).unwrap();
    assert_eq!(p.outstanding(T), 2);
    assert_eq!(p.outstanding(other), 1);

    p.release(T, "groupAt0", a);
    drop(b);
    p.forget(T);
    assert_eq!(p.outstanding(T), 0);
    assert_eq!(p.outstanding(other), 1);
    p.release(other, "groupAt0", c);
    assert_eq!(p.outstanding(other), 0);
}

#[test]
fn oversized_targets_are_rejected() {
    let mut p = RasterTargetPool::new(PoolOpts::default());
    assert!(p.acquire(T, "groupAt0", 70_000, 1).is_err());
    assert_eq!(p.outstanding(T), 0);
}
