extern crate crayon_bundles;

use crayon_bundles::utils::prelude::*;

#[test]
fn basic() {
    let mut set = ObjectPool::<Handle, i32>::new();

    let e1 = set.create(3);
    assert_eq!(set.get(e1), Some(&3));
    assert_eq!(set.len(), 1);

    if let Some(v) = set.get_mut(e1) {
        *v += 1;
    }

    assert_eq!(set.free(e1), Some(4));
    assert_eq!(set.len(), 0);
    assert_eq!(set.get(e1), None);
    assert_eq!(set.free(e1), None);
    assert!(set.is_empty());
}

#[test]
fn iterator() {
    let mut set = ObjectPool::<Handle, i32>::new();
    for i in 0..10 {
        set.create(i);
    }

    assert!(set.iter().count() == 10);

    for (i, (v, _)) in set.iter().enumerate() {
        assert_eq!(v, Handle::new(i as u32, 1));
    }

    for (i, (handle, &v)) in set.iter().enumerate() {
        assert_eq!(handle.index() as usize, i);
        assert_eq!(v, i as i32);
    }

    let h = Handle::new(4, 1);
    set.free(h);
    assert_eq!(set.create(40), Handle::new(4, 3));
    assert_eq!(set.get(Handle::new(4, 3)), Some(&40));
}
