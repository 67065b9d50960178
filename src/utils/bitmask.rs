//! Growable bit-set used for slot occupancy.

/// A dynamically sized bit-set. Bits beyond the current capacity read as zero.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Bitmask {
    bits: Vec<u64>,
    capacity: usize,
}

impl Bitmask {
    /// Creates a bit-set able to hold `capacity` bits, all zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Bitmask {
            bits: vec![0; Self::words(capacity)],
            capacity,
        }
    }

    #[inline]
    fn words(capacity: usize) -> usize {
        (capacity + 63) / 64
    }

    #[inline]
    fn split(index: usize) -> (usize, u64) {
        (index / 64, 1 << (index % 64))
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grows the bit-set to at least `capacity` bits. Never shrinks.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        if capacity > self.capacity {
            self.bits.resize(Self::words(capacity), 0);
            self.capacity = capacity;
        }
    }

    #[inline]
    pub fn insert(&mut self, index: usize) {
        assert!(index < self.capacity, "bit {} out of range", index);
        let (word, mask) = Self::split(index);
        self.bits[word] |= mask;
    }

    #[inline]
    pub fn remove(&mut self, index: usize) {
        if index < self.capacity {
            let (word, mask) = Self::split(index);
            self.bits[word] &= !mask;
        }
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }

        let (word, mask) = Self::split(index);
        self.bits[word] & mask != 0
    }

    /// Returns the index of the lowest clear bit, or `None` if every bit is set.
    pub fn first_zero(&self) -> Option<usize> {
        for (i, &w) in self.bits.iter().enumerate() {
            if w != !0 {
                let index = i * 64 + (!w).trailing_zeros() as usize;
                return if index < self.capacity {
                    Some(index)
                } else {
                    None
                };
            }
        }

        None
    }

    #[inline]
    pub fn all_set(&self) -> bool {
        self.first_zero().is_none()
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Visits the indices of set bits in ascending order.
    pub fn ones(&self) -> Ones {
        Ones {
            bits: &self.bits,
            word: 0,
            current: self.bits.get(0).cloned().unwrap_or(0),
        }
    }
}

pub struct Ones<'a> {
    bits: &'a [u64],
    word: usize,
    current: u64,
}

impl<'a> Iterator for Ones<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word * 64 + bit);
            }

            self.word += 1;
            if self.word >= self.bits.len() {
                return None;
            }

            self.current = self.bits[self.word];
        }
    }
}
