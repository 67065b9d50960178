use super::handle::HandleLike;
use super::handle_pool::HandlePool;

/// A named object collection. Every time a handle is created or freed, the
/// attached instance `T` is created or dropped with it.
pub struct ObjectPool<H: HandleLike, T: Sized> {
    handles: HandlePool<H>,
    entries: Vec<Option<T>>,
}

impl<H: HandleLike, T: Sized> Default for ObjectPool<H, T> {
    fn default() -> Self {
        ObjectPool::new()
    }
}

impl<H: HandleLike, T: Sized> ObjectPool<H, T> {
    pub fn new() -> Self {
        ObjectPool {
            handles: HandlePool::new(),
            entries: Vec::new(),
        }
    }

    /// Stores `value` and names it with a fresh handle.
    pub fn create(&mut self, value: T) -> H {
        let handle = self.handles.create();
        let index = handle.index() as usize;

        if index >= self.entries.len() {
            self.entries.resize_with(index + 1, || None);
        }

        self.entries[index] = Some(value);

        handle
    }

    #[inline]
    pub fn get(&self, handle: H) -> Option<&T> {
        if self.handles.contains(handle) {
            self.entries[handle.index() as usize].as_ref()
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        if self.handles.contains(handle) {
            self.entries[handle.index() as usize].as_mut()
        } else {
            None
        }
    }

    #[inline]
    pub fn contains(&self, handle: H) -> bool {
        self.handles.contains(handle)
    }

    /// Recycles the value named `handle`.
    pub fn free(&mut self, handle: H) -> Option<T> {
        if self.handles.free(handle) {
            self.entries[handle.index() as usize].take()
        } else {
            None
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over alive handles and their values.
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        let entries = &self.entries;
        self.handles
            .iter()
            .filter_map(move |h| entries[h.index() as usize].as_ref().map(|v| (h, v)))
    }
}

#[cfg(test)]
mod test {
    use super::super::handle::Handle;
    use super::*;

    #[test]
    fn basic() {
        let mut pool = ObjectPool::<Handle, i32>::new();

        let e1 = pool.create(3);
        assert_eq!(pool.get(e1), Some(&3));
        assert_eq!(pool.len(), 1);

        *pool.get_mut(e1).unwrap() = 4;
        assert_eq!(pool.free(e1), Some(4));
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.get(e1), None);
        assert_eq!(pool.free(e1), None);

        let e2 = pool.create(5);
        assert_eq!(e2.index(), e1.index());
        assert_eq!(pool.get(e1), None);
        assert_eq!(pool.iter().collect::<Vec<_>>(), vec![(e2, &5)]);
    }
}
