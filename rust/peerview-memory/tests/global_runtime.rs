//! Process-wide runtime behavior. Kept in its own test binary so that no other
//! test can load the runtime first.

use peerview_memory::{FloatAccessor, ForeignRuntime, MemoryView, view::ElementLayout};

#[test]
fn test_allocation_requires_loaded_runtime() {
    assert!(!ForeignRuntime::is_loaded());
    let err = FloatAccessor::allocate(4).unwrap_err();
    assert!(err.is_allocation());
    let err = MemoryView::allocate(4, ElementLayout::bytes()).unwrap_err();
    assert!(err.is_allocation());
    assert!(ForeignRuntime::global().is_err());

    ForeignRuntime::load();
    ForeignRuntime::load();
    assert!(ForeignRuntime::is_loaded());
    assert!(ForeignRuntime::install(ForeignRuntime::system()).is_err());

    let mut accessor = FloatAccessor::allocate(4).unwrap();
    accessor.put_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    accessor.set_limit(2).unwrap();
    assert_eq!(accessor.as_view().to_vec(), vec![1.0, 2.0]);
    assert_eq!(accessor.get_at(3).unwrap(), 4.0);
}
