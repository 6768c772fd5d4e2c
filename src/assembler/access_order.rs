// Access-ordered map
//
// Hash index from key to slot, plus an intrusive doubly-linked list threaded
// through the slots in least-recently-touched order. Touching an entry moves
// it to the back, so the front is always the stalest entry.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// End-of-list marker
const NIL: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct Link {
    prev: usize,
    next: usize,
}

impl Link {
    const DETACHED: Link = Link { prev: NIL, next: NIL };
}

/// Map that remembers the order in which entries were last touched
#[derive(Debug)]
pub struct AccessOrderedMap<K, V> {
    entries: Vec<Option<(K, V)>>,
    links: Vec<Link>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    head: usize,
    tail: usize,
}

impl<K, V> Default for AccessOrderedMap<K, V> {
    fn default() -> Self {
        AccessOrderedMap {
            entries: Vec::new(),
            links: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: NIL,
            tail: NIL,
        }
    }
}

impl<K: Hash + Eq + Clone, V> AccessOrderedMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Look up without changing the access order
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.entries[idx].as_ref().map(|(_, v)| v)
    }

    /// Mutable look up without changing the access order
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index.get(key)?;
        self.entries[idx].as_mut().map(|(_, v)| v)
    }

    /// Mark an entry as most recently used. Returns false if absent.
    pub fn touch<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.get(key) {
            Some(&idx) => {
                self.move_to_back(idx);
                true
            }
            None => false,
        }
    }

    /// Insert or replace; either way the entry becomes most recently used.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.index.get(&key) {
            self.move_to_back(idx);
            return self.entries[idx]
                .as_mut()
                .map(|(_, v)| std::mem::replace(v, value));
        }

        let idx = match self.free.pop() {
            Some(idx) => {
                self.entries[idx] = Some((key.clone(), value));
                idx
            }
            None => {
                self.entries.push(Some((key.clone(), value)));
                self.links.push(Link::DETACHED);
                self.entries.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.link_back(idx);
        None
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.index.remove(key)?;
        self.release(idx).map(|(_, v)| v)
    }

    /// Least recently touched entry
    pub fn front(&self) -> Option<(&K, &V)> {
        if self.head == NIL {
            return None;
        }
        self.entries[self.head].as_ref().map(|(k, v)| (k, v))
    }

    pub fn pop_front(&mut self) -> Option<(K, V)> {
        if self.head == NIL {
            return None;
        }
        let entry = self.release(self.head)?;
        let removed = self.index.remove(&entry.0);
        debug_assert!(removed.is_some(), "list and index disagree");
        Some(entry)
    }

    /// Iterate from least to most recently touched
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            map: self,
            cursor: self.head,
        }
    }

    fn move_to_back(&mut self, idx: usize) {
        if self.tail != idx {
            self.unlink(idx);
            self.link_back(idx);
        }
    }

    fn link_back(&mut self, idx: usize) {
        self.links[idx] = Link {
            prev: self.tail,
            next: NIL,
        };
        if self.tail == NIL {
            self.head = idx;
        } else {
            self.links[self.tail].next = idx;
        }
        self.tail = idx;
    }

    fn unlink(&mut self, idx: usize) {
        let Link { prev, next } = self.links[idx];
        if prev == NIL {
            self.head = next;
        } else {
            self.links[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.links[next].prev = prev;
        }
        self.links[idx] = Link::DETACHED;
    }

    /// Unlink a slot and return it to the free list
    fn release(&mut self, idx: usize) -> Option<(K, V)> {
        self.unlink(idx);
        self.free.push(idx);
        self.entries[idx].take()
    }
}

pub struct Iter<'a, K, V> {
    map: &'a AccessOrderedMap<K, V>,
    cursor: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let idx = self.cursor;
        self.cursor = self.map.links[idx].next;
        self.map.entries[idx].as_ref().map(|(k, v)| (k, v))
    }
}
