use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    AllocatorConfig, DeallocationPolicy, Deallocator, ElementLayout, FloatAccessor,
    ForeignRuntime, HostBuffer, MemoryView, SystemAllocator, TrackingAllocator, TypedAccessor,
    allocator::{AllocationStats, ForeignAllocator},
};

fn tracked_runtime() -> (ForeignRuntime, Arc<TrackingAllocator<SystemAllocator>>) {
    let allocator = Arc::new(TrackingAllocator::new(SystemAllocator::default()));
    let runtime = ForeignRuntime::new(allocator.clone(), AllocatorConfig::default()).unwrap();
    (runtime, allocator)
}

fn float_layout() -> ElementLayout {
    ElementLayout::of::<f32>().unwrap()
}

fn assert_window_invariant(view: &MemoryView) {
    assert!(view.position() <= view.limit());
    assert!(view.limit() <= view.capacity());
}

#[test]
fn test_allocate_defaults() {
    let (runtime, _) = tracked_runtime();
    for capacity in [0, 1, 7, 1024] {
        let view = MemoryView::allocate_in(&runtime, capacity, float_layout()).unwrap();
        assert_eq!(view.position(), 0);
        assert_eq!(view.limit(), capacity);
        assert_eq!(view.capacity(), capacity);
        assert_eq!(view.element_size(), 4);
        assert!(view.owns_deallocator());
        assert!(!view.address().is_null());
    }
}

#[test]
fn test_allocate_alignment() {
    let (runtime, _) = tracked_runtime();
    let view = MemoryView::allocate_in(&runtime, 3, float_layout()).unwrap();
    assert!((view.address() as usize).is_multiple_of(runtime.config().min_alignment));
}

#[test]
fn test_allocate_zero_filled() {
    let (runtime, _) = tracked_runtime();
    let accessor = FloatAccessor::allocate_in(&runtime, 16).unwrap();
    assert!(accessor.to_vec().iter().all(|&v| v == 0.0));
}

#[test]
fn test_allocate_overflow() {
    let (runtime, allocator) = tracked_runtime();
    let err = MemoryView::allocate_in(&runtime, usize::MAX / 2, float_layout()).unwrap_err();
    assert!(err.is_allocation());
    assert_eq!(allocator.stats().allocations, 0);
}

#[test]
fn test_allocate_exceeds_configured_maximum() {
    let config = AllocatorConfig {
        max_allocation_bytes: 64,
        ..Default::default()
    };
    let runtime = ForeignRuntime::new(Arc::new(SystemAllocator::default()), config).unwrap();
    assert!(MemoryView::allocate_in(&runtime, 16, float_layout()).is_ok());
    let err = MemoryView::allocate_in(&runtime, 17, float_layout()).unwrap_err();
    assert!(err.is_allocation());
}

#[test]
fn test_allocate_refused_by_allocator() {
    let allocator = Arc::new(TrackingAllocator::new(SystemAllocator::default()).with_budget(16));
    let runtime = ForeignRuntime::new(allocator, AllocatorConfig::default()).unwrap();
    let err = FloatAccessor::allocate_in(&runtime, 5).unwrap_err();
    assert!(err.is_allocation());
}

#[test]
fn test_runtime_rejects_invalid_config() {
    let config = AllocatorConfig {
        min_alignment: 0,
        ..Default::default()
    };
    assert!(ForeignRuntime::new(Arc::new(SystemAllocator::default()), config).is_err());
}

#[test]
fn test_runtime_zero_fills_for_non_zeroing_allocator() {
    let config = AllocatorConfig::default();
    let runtime = ForeignRuntime::new(Arc::new(SystemAllocator::new(false)), config).unwrap();
    let accessor = TypedAccessor::<u64>::allocate_in(&runtime, 32).unwrap();
    assert!(accessor.to_vec().iter().all(|&v| v == 0));
}

#[test]
fn test_window_operations() {
    let (runtime, _) = tracked_runtime();
    let mut view = MemoryView::allocate_in(&runtime, 8, float_layout()).unwrap();

    view.set_position(3).unwrap().set_limit(6).unwrap();
    assert_eq!((view.position(), view.limit()), (3, 6));
    assert_eq!(view.remaining(), 3);

    assert!(view.set_position(7).unwrap_err().is_bounds());
    assert!(view.set_limit(9).unwrap_err().is_bounds());
    assert_eq!((view.position(), view.limit()), (3, 6));

    // A limit below the position pulls the position down.
    view.set_limit(2).unwrap();
    assert_eq!((view.position(), view.limit()), (2, 2));
    assert_window_invariant(&view);

    view.set_limit(8).unwrap().set_position(8).unwrap();
    assert_eq!(view.remaining(), 0);
    assert_window_invariant(&view);
}

#[test]
fn test_owned_capacity_is_fixed() {
    let (runtime, _) = tracked_runtime();
    let mut view = MemoryView::allocate_in(&runtime, 8, float_layout()).unwrap();
    assert!(view.set_capacity(4).unwrap_err().is_bounds());
    assert_eq!(view.capacity(), 8);
}

#[test]
fn test_reference_capacity_clamps_window() {
    let mut data = vec![0f32; 8];
    let mut view =
        unsafe { MemoryView::reference(data.as_mut_ptr().cast(), data.len(), float_layout()) }
            .unwrap();
    assert!(!view.owns_deallocator());

    view.set_position(5).unwrap().set_limit(7).unwrap();
    view.set_capacity(6).unwrap();
    assert_eq!((view.position(), view.limit(), view.capacity()), (5, 6, 6));

    view.set_capacity(4).unwrap();
    assert_eq!((view.position(), view.limit(), view.capacity()), (4, 4, 4));
    assert_window_invariant(&view);

    // Growing back up to the referenced extent is allowed, beyond it is not.
    view.set_capacity(8).unwrap();
    assert_eq!(view.capacity(), 8);
    assert_eq!(view.limit(), 4);
    assert!(view.set_capacity(9).unwrap_err().is_bounds());
}

#[test]
fn test_reference_validation() {
    let layout = float_layout();
    assert!(unsafe { MemoryView::reference(std::ptr::null_mut(), 4, layout) }.is_err());

    let empty = unsafe { MemoryView::reference(std::ptr::null_mut(), 0, layout) }.unwrap();
    assert!(empty.is_empty());
    assert!(empty.address().is_null());

    let mut data = vec![0f32; 4];
    let misaligned = unsafe { data.as_mut_ptr().cast::<u8>().add(1) };
    assert!(unsafe { MemoryView::reference(misaligned, 2, layout) }.is_err());
}

#[test]
fn test_reference_never_deallocates() {
    let (runtime, allocator) = tracked_runtime();
    let owner = FloatAccessor::allocate_in(&runtime, 4).unwrap();
    {
        let mut alias = unsafe { FloatAccessor::reference(owner.address(), 4) }.unwrap();
        alias.release();
        assert_eq!(alias.capacity(), 4);
    }
    assert_eq!(allocator.stats().deallocations, 0);
    drop(owner);
    assert_eq!(allocator.stats().deallocations, 1);
}

#[test]
fn test_release_is_idempotent() {
    let (runtime, allocator) = tracked_runtime();
    let mut view = MemoryView::allocate_in(&runtime, 10, float_layout()).unwrap();
    view.set_position(2).unwrap();

    view.release();
    assert!(view.address().is_null());
    assert_eq!(view.capacity(), 0);
    assert!(!view.owns_deallocator());
    assert_window_invariant(&view);

    view.release();
    view.release();
    drop(view);

    assert_eq!(
        allocator.stats(),
        AllocationStats {
            allocations: 1,
            deallocations: 1,
            live_bytes: 0,
        }
    );
}

#[test]
fn test_drop_releases_owned_view() {
    let (runtime, allocator) = tracked_runtime();
    {
        let _a = FloatAccessor::allocate_in(&runtime, 4).unwrap();
        let _b = FloatAccessor::allocate_in(&runtime, 8).unwrap();
        assert_eq!(allocator.stats().live_blocks(), 2);
    }
    assert_eq!(allocator.stats().live_blocks(), 0);
}

#[test]
fn test_suppressed_policy_does_not_deallocate() {
    let (runtime, allocator) = tracked_runtime();
    let mut view = MemoryView::allocate_with_policy(
        &runtime,
        1,
        float_layout(),
        DeallocationPolicy::Suppress,
    )
    .unwrap();
    assert!(!view.owns_deallocator());
    let address = view.address();
    view.release();
    assert_eq!(view.address(), address);
    drop(view);
    assert_eq!(allocator.stats().deallocations, 0);

    // Give the block back so the test does not leak.
    unsafe {
        allocator.deallocate(
            std::ptr::NonNull::new(address).unwrap(),
            4,
            runtime.config().alignment_for(4),
        )
    };
}

#[test]
fn test_attach_and_detach_deallocator() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut data = vec![0u32; 4];
    let mut view = unsafe {
        MemoryView::reference(
            data.as_mut_ptr().cast(),
            data.len(),
            ElementLayout::of::<u32>().unwrap(),
        )
    }
    .unwrap();

    let counter = calls.clone();
    view.attach_deallocator(Deallocator::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }))
    .unwrap();
    assert!(view.owns_deallocator());
    assert!(view.attach_deallocator(Deallocator::new(|| {})).is_err());

    let hook = view.detach_deallocator().unwrap();
    assert!(!view.owns_deallocator());
    view.release();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    hook.run();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_hook_runs_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut data = vec![0u8; 16];
    let mut view =
        unsafe { MemoryView::reference(data.as_mut_ptr(), data.len(), ElementLayout::bytes()) }
            .unwrap();
    let counter = calls.clone();
    view.attach_deallocator(Deallocator::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }))
    .unwrap();
    for _ in 0..5 {
        view.release();
    }
    drop(view);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_indexed_round_trip() {
    let (runtime, _) = tracked_runtime();
    let mut accessor = FloatAccessor::allocate_in(&runtime, 5).unwrap();
    for i in 0..5 {
        accessor.put_at(i, i as f32 * 1.5).unwrap();
    }
    for i in 0..5 {
        assert_eq!(accessor.get_at(i).unwrap(), i as f32 * 1.5);
    }

    accessor.put(42.0).unwrap();
    assert_eq!(accessor.get().unwrap(), 42.0);
}

#[test]
fn test_indexed_out_of_bounds() {
    let (runtime, _) = tracked_runtime();
    let mut accessor = FloatAccessor::from_slice(&runtime, &[1.0, 2.0, 3.0]).unwrap();
    assert!(accessor.get_at(3).unwrap_err().is_bounds());
    assert!(accessor.put_at(3, 9.0).unwrap_err().is_bounds());
    assert!(accessor.put_at(usize::MAX, 9.0).unwrap_err().is_bounds());
    assert_eq!(accessor.to_vec(), vec![1.0, 2.0, 3.0]);

    let mut empty = FloatAccessor::allocate_in(&runtime, 0).unwrap();
    assert!(empty.get().unwrap_err().is_bounds());
    assert!(empty.put(1.0).unwrap_err().is_bounds());
}

#[test]
fn test_indexed_access_ignores_window() {
    let (runtime, _) = tracked_runtime();
    let mut accessor = FloatAccessor::from_slice(&runtime, &[1.0, 2.0, 3.0, 4.0]).unwrap();
    accessor.set_limit(1).unwrap();
    assert_eq!(accessor.get_at(3).unwrap(), 4.0);
    accessor.put_at(2, 30.0).unwrap();
    assert_eq!(accessor.get_at(2).unwrap(), 30.0);
}

#[test]
fn test_bulk_round_trip() {
    let (runtime, _) = tracked_runtime();
    let mut accessor = FloatAccessor::allocate_in(&runtime, 8).unwrap();
    let src = [0.5, 1.5, 2.5, 3.5, 4.5];
    accessor.put_slice(&src).unwrap();
    let mut dest = [0f32; 5];
    accessor.get_slice(&mut dest).unwrap();
    assert_eq!(dest, src);
}

#[test]
fn test_bulk_with_offset() {
    let (runtime, _) = tracked_runtime();
    let mut accessor = FloatAccessor::allocate_in(&runtime, 4).unwrap();
    let src = [9.0, 9.0, 1.0, 2.0, 3.0];
    accessor.put_slice_range(&src, 2, 3).unwrap();
    assert_eq!(accessor.to_vec(), vec![1.0, 2.0, 3.0, 0.0]);

    let mut dest = [7f32; 6];
    accessor.get_slice_range(&mut dest, 1, 2).unwrap();
    assert_eq!(dest, [7.0, 1.0, 2.0, 7.0, 7.0, 7.0]);
}

#[test]
fn test_bulk_ignores_window() {
    let (runtime, _) = tracked_runtime();
    let mut accessor = FloatAccessor::from_slice(&runtime, &[1.0, 2.0, 3.0, 4.0]).unwrap();
    accessor.set_position(2).unwrap();
    let mut dest = [0f32; 2];
    accessor.get_slice(&mut dest).unwrap();
    assert_eq!(dest, [1.0, 2.0]);

    accessor.put_slice(&[8.0]).unwrap();
    assert_eq!(accessor.get_at(0).unwrap(), 8.0);
}

#[test]
fn test_bulk_bounds_leave_memory_untouched() {
    let (runtime, _) = tracked_runtime();
    let mut accessor = FloatAccessor::from_slice(&runtime, &[1.0, 2.0]).unwrap();

    assert!(accessor.put_slice(&[5.0, 6.0, 7.0]).unwrap_err().is_bounds());
    assert!(accessor.put_slice_range(&[5.0, 6.0], 1, 2).unwrap_err().is_bounds());
    assert_eq!(accessor.to_vec(), vec![1.0, 2.0]);

    let mut dest = [0f32; 3];
    assert!(accessor.get_slice(&mut dest).unwrap_err().is_bounds());
    assert!(accessor.get_slice_range(&mut dest, 2, 2).unwrap_err().is_bounds());
    assert_eq!(dest, [0.0; 3]);
}

#[test]
fn test_as_view_respects_window() {
    let (runtime, _) = tracked_runtime();
    let mut accessor = FloatAccessor::allocate_in(&runtime, 4).unwrap();
    accessor.put_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    accessor.set_limit(2).unwrap();

    let window = accessor.as_view();
    assert_eq!(window.to_vec(), vec![1.0, 2.0]);
    assert_eq!((window.start(), window.end()), (0, 2));
    assert_eq!(accessor.get_at(3).unwrap(), 4.0);

    accessor.set_limit(4).unwrap().set_position(1).unwrap();
    let window = accessor.as_view();
    assert_eq!(window.len(), 3);
    assert_eq!(window.iter().copied().sum::<f32>(), 9.0);
    assert_eq!(window.start(), 1);
}

#[test]
fn test_as_view_after_release_is_empty() {
    let (runtime, _) = tracked_runtime();
    let mut accessor = FloatAccessor::from_slice(&runtime, &[1.0, 2.0]).unwrap();
    accessor.release();
    assert!(accessor.as_view().is_empty());
    assert!(accessor.get().unwrap_err().is_bounds());
}

#[test]
fn test_from_host_buffer_copies_window() {
    let (runtime, allocator) = tracked_runtime();
    let buffer = HostBuffer::new(vec![1.0f32, 2.0, 3.0, 4.0, 5.0])
        .with_window(1, 4)
        .unwrap();
    let accessor = FloatAccessor::from_host_buffer(&runtime, &buffer).unwrap();
    assert!(accessor.owns_deallocator());
    assert_eq!(accessor.capacity(), 5);
    assert_eq!((accessor.position(), accessor.limit()), (1, 4));
    assert_eq!(accessor.as_view().to_vec(), vec![2.0, 3.0, 4.0]);
    assert_eq!(allocator.stats().allocations, 1);
}

#[test]
fn test_retype_view() {
    let (runtime, allocator) = tracked_runtime();
    let mut bytes = MemoryView::allocate_in(&runtime, 16, ElementLayout::bytes()).unwrap();
    bytes.set_limit(12).unwrap().set_position(5).unwrap();

    let mut floats = FloatAccessor::retype(bytes).unwrap();
    assert_eq!(floats.capacity(), 4);
    assert_eq!((floats.position(), floats.limit()), (1, 3));
    assert!(floats.owns_deallocator());

    floats.put_at(3, 2.0).unwrap();
    let bits = TypedAccessor::<u32>::retype(floats.into_view()).unwrap();
    assert_eq!(bits.get_at(3).unwrap(), 2.0f32.to_bits());

    drop(bits);
    assert_eq!(allocator.stats().deallocations, 1);
}

#[test]
fn test_retype_rejects_misalignment() {
    let mut data = vec![0u64; 4];
    let misaligned = unsafe { data.as_mut_ptr().cast::<u8>().add(2) };
    let view = unsafe { MemoryView::reference(misaligned, 8, ElementLayout::bytes()) }.unwrap();
    assert!(TypedAccessor::<u32>::retype(view).is_err());
}

#[test]
fn test_generic_element_types() {
    let (runtime, _) = tracked_runtime();
    let mut accessor = TypedAccessor::<i64>::from_slice(&runtime, &[-1, 0, i64::MAX]).unwrap();
    accessor.put_at(1, 77).unwrap();
    assert_eq!(accessor.to_vec(), vec![-1, 77, i64::MAX]);
    assert_eq!(accessor.view().element_size(), 8);
}

#[test]
fn test_views_move_across_threads() {
    let (runtime, allocator) = tracked_runtime();
    let accessor = FloatAccessor::from_slice(&runtime, &[1.0, 2.0, 3.0]).unwrap();
    let sum = std::thread::spawn(move || accessor.as_view().iter().sum::<f32>())
        .join()
        .unwrap();
    assert_eq!(sum, 6.0);
    assert_eq!(allocator.stats().live_blocks(), 0);
}

#[test]
fn test_invariant_holds_across_operation_sequence() {
    const EXTENT: usize = 32;
    let mut data = vec![0f32; EXTENT];
    let mut view =
        unsafe { MemoryView::reference(data.as_mut_ptr().cast(), EXTENT, float_layout()) }
            .unwrap();

    let mut rng = fastrand::Rng::with_seed(0x2545_f491);
    for _ in 0..500 {
        let value = rng.usize(0..EXTENT + 8);
        let (position, limit, capacity) = (view.position(), view.limit(), view.capacity());
        match rng.u8(0..3) {
            0 => match view.set_position(value) {
                Ok(_) => {
                    assert!(value <= limit);
                    assert_eq!(view.position(), value);
                    assert_eq!(view.limit(), limit);
                }
                Err(e) => {
                    assert!(e.is_bounds());
                    assert!(value > limit);
                    assert_eq!(view.position(), position);
                }
            },
            1 => match view.set_limit(value) {
                Ok(_) => {
                    assert!(value <= capacity);
                    assert_eq!(view.limit(), value);
                    assert_eq!(view.position(), position.min(value));
                }
                Err(e) => {
                    assert!(e.is_bounds());
                    assert!(value > capacity);
                    assert_eq!((view.position(), view.limit()), (position, limit));
                }
            },
            _ => match view.set_capacity(value) {
                Ok(_) => {
                    assert!(value <= EXTENT);
                    assert_eq!(view.capacity(), value);
                    assert_eq!(view.limit(), limit.min(value));
                    assert_eq!(view.position(), position.min(view.limit()));
                }
                Err(e) => {
                    assert!(e.is_bounds());
                    assert!(value > EXTENT);
                    assert_eq!(view.capacity(), capacity);
                }
            },
        }
        assert_window_invariant(&view);
    }
}
