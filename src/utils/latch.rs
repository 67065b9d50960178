use std::sync::{Condvar, Mutex};

/// A `Latch` starts empty and is set exactly once by whoever finishes the
/// work. The tick thread only ever polls it with `is_set`/`get`; blocking
/// with `wait` is reserved for forced loads.
pub struct Latch<T> {
    m: Mutex<Option<T>>,
    v: Condvar,
}

impl<T> Default for Latch<T> {
    fn default() -> Self {
        Latch::new()
    }
}

impl<T> Latch<T> {
    #[inline]
    pub fn new() -> Self {
        Latch {
            m: Mutex::new(None),
            v: Condvar::new(),
        }
    }

    /// Sets the latch, waking every waiter. Later calls are ignored.
    pub fn set(&self, value: T) {
        let mut guard = self.m.lock().unwrap();
        if guard.is_none() {
            *guard = Some(value);
            self.v.notify_all();
        }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.m.lock().unwrap().is_some()
    }

    /// Blocks current thread until the latch is set.
    pub fn wait(&self) {
        let mut guard = self.m.lock().unwrap();
        while guard.is_none() {
            guard = self.v.wait(guard).unwrap();
        }
    }
}

impl<T: Clone> Latch<T> {
    /// Returns a copy of the value if the latch has been set.
    #[inline]
    pub fn get(&self) -> Option<T> {
        self.m.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn set_once() {
        let latch = Latch::new();
        assert!(!latch.is_set());
        assert_eq!(latch.get(), None);

        latch.set(1);
        latch.set(2);
        assert!(latch.is_set());
        assert_eq!(latch.get(), Some(1));
    }

    #[test]
    fn wait_across_threads() {
        let latch = Arc::new(Latch::new());
        let tx = latch.clone();
        let t = thread::spawn(move || tx.set("done"));

        latch.wait();
        assert_eq!(latch.get(), Some("done"));
        t.join().unwrap();
    }
}
