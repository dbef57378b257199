use super::Particle;

/// Fixed-capacity ring of particles.
///
/// Slots are allocated up front. Until the ring is full, allocation appends at
/// the next free slot; afterwards it reuses the oldest slot and advances the
/// oldest index modulo the capacity. Steady-state operation never allocates.
#[derive(Debug, Clone)]
pub struct ParticlePool {
    slots: Box<[Particle]>,
    /// Slots handed out so far, saturating at the capacity.
    len: usize,
    /// Slot holding the oldest particle once the ring is full.
    oldest: usize,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Particle::default(); capacity].into_boxed_slice(),
            len: 0,
            oldest: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots. Never exceeds the capacity.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Index of the slot the next allocation overwrites once full.
    #[inline]
    pub fn oldest(&self) -> usize {
        self.oldest
    }

    /// Hands out the slot for a new particle, or `None` for a zero-capacity pool.
    pub fn allocate(&mut self) -> Option<&mut Particle> {
        let capacity = self.capacity();
        if capacity == 0 {
            return None;
        }

        let index = if self.len < capacity {
            self.len += 1;
            self.len - 1
        } else {
            let index = self.oldest;
            self.oldest = (self.oldest + 1) % capacity;
            index
        };

        Some(&mut self.slots[index])
    }

    /// Occupied slots, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Particle> + '_ {
        let capacity = self.capacity();
        (0..self.len).map(move |i| &self.slots[(self.oldest + i) % capacity])
    }

    /// Occupied slots in storage order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> + '_ {
        self.slots[..self.len].iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(pool: &mut ParticlePool, tag: f32) {
        let p = pool.allocate().unwrap();
        *p = Particle { size: tag, ..Particle::default() };
    }

    fn tags(pool: &ParticlePool) -> Vec<f32> {
        pool.iter().map(|p| p.size).collect()
    }

    #[test]
    fn appends_until_full() {
        let mut pool = ParticlePool::new(3);
        tagged(&mut pool, 1.0);
        tagged(&mut pool, 2.0);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.oldest(), 0);
        assert_eq!(tags(&pool), vec![1.0, 2.0]);
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut pool = ParticlePool::new(3);
        for tag in 1..=5 {
            tagged(&mut pool, tag as f32);
        }
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.oldest(), 2);
        assert_eq!(tags(&pool), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn oldest_index_wraps_around() {
        let mut pool = ParticlePool::new(2);
        for tag in 1..=6 {
            tagged(&mut pool, tag as f32);
            assert!(pool.len() <= pool.capacity());
        }
        assert_eq!(pool.oldest(), 0);
        assert_eq!(tags(&pool), vec![5.0, 6.0]);
    }

    #[test]
    fn zero_capacity_never_allocates() {
        let mut pool = ParticlePool::new(0);
        assert!(pool.allocate().is_none());
        assert!(pool.is_empty());
        assert_eq!(pool.iter().count(), 0);
    }
}
