//! Arena-backed LRU list
//!
//! Entries live in a slot vector and link to each other through slot
//! indices, so promotion and removal are O(1) and slot ids stay stable while
//! an entry is resident. Freed slots are reused.

/// Index of an entry in the arena
pub type SlotId = usize;

#[derive(Debug)]
struct Node<T> {
    value: T,
    older: Option<SlotId>,
    newer: Option<SlotId>,
}

/// Doubly linked LRU list stored in an arena
#[derive(Debug)]
pub struct LruArena<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<SlotId>,
    newest: Option<SlotId>,
    oldest: Option<SlotId>,
    len: usize,
}

impl<T> LruArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            newest: None,
            oldest: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a value as the most recently used entry
    pub fn insert(&mut self, value: T) -> SlotId {
        let node = Node {
            value,
            older: self.newest,
            newer: None,
        };

        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        if let Some(previous) = self.newest {
            if let Some(node) = self.node_mut(previous) {
                node.newer = Some(id);
            }
        }
        self.newest = Some(id);
        if self.oldest.is_none() {
            self.oldest = Some(id);
        }
        self.len += 1;
        id
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slots.get(id)?.as_ref().map(|node| &node.value)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.node_mut(id).map(|node| &mut node.value)
    }

    /// Promote an entry to most recently used
    pub fn touch(&mut self, id: SlotId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        if self.newest != Some(id) {
            self.unlink(id);
            self.link_newest(id);
        }
        true
    }

    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        self.get(id)?;
        self.unlink(id);
        let node = self.slots[id].take()?;
        self.free.push(id);
        self.len -= 1;
        Some(node.value)
    }

    /// Slot of the least recently used entry
    pub fn oldest(&self) -> Option<SlotId> {
        self.oldest
    }

    /// Remove the least recently used entry
    pub fn pop_oldest(&mut self) -> Option<(SlotId, T)> {
        let id = self.oldest?;
        self.remove(id).map(|value| (id, value))
    }

    /// Entries from most to least recently used
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            arena: self,
            next: self.newest,
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.newest = None;
        self.oldest = None;
        self.len = 0;
    }

    fn node_mut(&mut self, id: SlotId) -> Option<&mut Node<T>> {
        self.slots.get_mut(id)?.as_mut()
    }

    fn unlink(&mut self, id: SlotId) {
        let (older, newer) = match self.slots.get(id).and_then(Option::as_ref) {
            Some(node) => (node.older, node.newer),
            None => return,
        };

        match older {
            Some(older) => {
                if let Some(node) = self.node_mut(older) {
                    node.newer = newer;
                }
            }
            None => self.oldest = newer,
        }
        match newer {
            Some(newer) => {
                if let Some(node) = self.node_mut(newer) {
                    node.older = older;
                }
            }
            None => self.newest = older,
        }
    }

    fn link_newest(&mut self, id: SlotId) {
        let previous = self.newest;
        if let Some(node) = self.node_mut(id) {
            node.older = previous;
            node.newer = None;
        }
        if let Some(previous) = previous {
            if let Some(node) = self.node_mut(previous) {
                node.newer = Some(id);
            }
        }
        self.newest = Some(id);
        if self.oldest.is_none() {
            self.oldest = Some(id);
        }
    }
}

impl<T> Default for LruArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a, T> {
    arena: &'a LruArena<T>,
    next: Option<SlotId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (SlotId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.arena.slots.get(id)?.as_ref()?;
        self.next = node.older;
        Some((id, &node.value))
    }
}
