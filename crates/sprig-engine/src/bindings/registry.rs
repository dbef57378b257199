use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Opaque handle to a value stored in a [`Registry<T>`].
///
/// A handle stays valid until its value is removed. Slots are reused, but the
/// generation is bumped on removal, so an old handle never aliases a new value.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

// Manual impls: derives would put bounds on `T`.
impl<T> Copy for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage handing out generational [`Handle`]s.
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle {
                index,
                generation: slot.generation,
                _kind: PhantomData,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle {
            index,
            generation: 0,
            _kind: PhantomData,
        }
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Takes the value out, invalidating every copy of `handle`.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Live values, in slot order.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }

    /// Removes every value for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.as_ref().is_some_and(|v| !keep(v)) {
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                self.len -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let mut reg = Registry::new();
        let a = reg.insert("a");
        let b = reg.insert("b");
        assert_eq!(reg.get(a), Some(&"a"));
        assert_eq!(reg.get(b), Some(&"b"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn removed_handle_is_stale() {
        let mut reg = Registry::new();
        let a = reg.insert(1);
        assert_eq!(reg.remove(a), Some(1));
        assert!(!reg.contains(a));
        assert_eq!(reg.remove(a), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn reused_slot_does_not_alias_old_handle() {
        let mut reg = Registry::new();
        let old = reg.insert(1);
        reg.remove(old);
        let new = reg.insert(2);

        assert_eq!(old.index(), new.index());
        assert_ne!(old, new);
        assert_eq!(reg.get(old), None);
        assert_eq!(reg.get(new), Some(&2));
    }

    #[test]
    fn retain_invalidates_dropped_values() {
        let mut reg = Registry::new();
        let odd = reg.insert(1);
        let even = reg.insert(2);
        reg.retain(|v| v % 2 == 0);
        assert!(!reg.contains(odd));
        assert!(reg.contains(even));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn values_skip_removed_slots() {
        let mut reg = Registry::new();
        let a = reg.insert('a');
        reg.insert('b');
        reg.remove(a);
        assert_eq!(reg.values().copied().collect::<Vec<_>>(), vec!['b']);
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut reg = Registry::new();
        let h = reg.insert(10);
        *reg.get_mut(h).unwrap() += 5;
        assert_eq!(reg.get(h), Some(&15));
    }
}
