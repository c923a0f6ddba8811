//! Storage of the tree nodes.
//!
//! Every node of a `Score` lives in one of its arenas and is addressed
//! by a typed `Handle`. Children lists and uplinks are plain handles, so
//! there are no owning cycles: everything is dropped with the score.

use std::{
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use derivative::Derivative;

/// Index of a node of type `T` inside an `Arena<T>`.
///
/// Handles are `Copy` and comparable for any `T`.
#[derive(Derivative)]
#[derivative(
    Debug(bound = ""),
    Clone(bound = ""),
    Copy(bound = ""),
    PartialEq(bound = ""),
    Eq(bound = ""),
    Hash(bound = "")
)]
pub struct Handle<T> {
    index: usize,
    #[derivative(Debug = "ignore")]
    _marker: PhantomData<fn() -> T>,
}
impl<T> Handle<T> {
    fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<T>,
}
impl<T> Arena<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }
    pub fn alloc(&mut self, item: T) -> Handle<T> {
        self.items.push(item);
        Handle::new(self.items.len() - 1)
    }
    /// Allocate a node, that needs to know its own handle.
    pub fn alloc_with(&mut self, make: impl FnOnce(Handle<T>) -> T) -> Handle<T> {
        let handle = Handle::new(self.items.len());
        self.items.push(make(handle));
        handle
    }
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index)
    }
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.items.get_mut(handle.index)
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(idx, item)| (Handle::new(idx), item))
    }
}
impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles are produced only by the arena they index, so indexing
/// can not go out of bounds for a handle of the same score.
impl<T> Index<Handle<T>> for Arena<T> {
    type Output = T;
    fn index(&self, handle: Handle<T>) -> &Self::Output {
        &self.items[handle.index]
    }
}
impl<T> IndexMut<Handle<T>> for Arena<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut Self::Output {
        &mut self.items[handle.index]
    }
}

#[cfg(test)]
mod tests {
    use super::Arena;

    #[derive(Debug, PartialEq)]
    struct NotCloneable(u8);

    #[test]
    fn handles_are_copy() {
        let mut arena = Arena::new();
        let a = arena.alloc(NotCloneable(1));
        let b = arena.alloc(NotCloneable(2));
        let c = a;
        assert_eq!(a, c);
        assert_ne!(a, b);
        arena[b].0 = 5;
        assert_eq!(arena[b], NotCloneable(5));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.iter().map(|(h, _)| h.index()).collect::<Vec<_>>(), [0, 1]);
    }
}
