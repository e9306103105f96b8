//! LRU session cache
//!
//! A bounded `IpAddr -> session` map with most-recently-used promotion and
//! least-recently-used eviction, grounded on the original's `lru.go`
//! (`SessionNode`/`LinkedList`/`LRUCache`). The ordered sequence is realized
//! as an arena of slots addressed by small integer handles rather than
//! `Rc<RefCell<_>>`, per `SPEC_FULL.md` `DESIGN NOTES`.
//!
//! Generic over the session type so the eviction-close behavior (in
//! production, closing a `quinn::Connection` with error code 0 / reason
//! `"done"`) is supplied by the caller and can be swapped for a
//! cheaply-testable stand-in.

use std::collections::HashMap;
use std::net::IpAddr;

struct Node<T> {
    ip: IpAddr,
    session: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Mutual exclusion is the caller's responsibility (see `client::ClientContext`,
/// which wraps this in a `std::sync::Mutex`): every public method here runs to
/// completion without suspending.
pub struct SessionCache<T> {
    capacity: usize,
    slab: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    index: HashMap<IpAddr, usize>,
    /// Most-recently-used end.
    head: Option<usize>,
    /// Least-recently-used end.
    tail: Option<usize>,
}

impl<T: Clone> SessionCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slab: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Looks up `ip`, promoting it to most-recently-used on a hit.
    pub fn get(&mut self, ip: &IpAddr) -> Option<T> {
        let handle = *self.index.get(ip)?;
        self.unlink(handle);
        self.push_front(handle);
        self.slab[handle].as_ref().map(|node| node.session.clone())
    }

    /// Inserts or replaces the session for `ip`. If `ip` is new and this
    /// insertion pushes the cache over capacity, the least-recently-used
    /// entry is unlinked and returned so the caller can close it. Replacing
    /// an existing entry never evicts and never closes the prior session —
    /// the caller owns that decision, matching `SPEC_FULL.md` §4.2.
    pub fn add(&mut self, ip: IpAddr, session: T) -> Option<(IpAddr, T)> {
        if let Some(&handle) = self.index.get(&ip) {
            self.slab[handle].as_mut().unwrap().session = session;
            self.unlink(handle);
            self.push_front(handle);
            return None;
        }

        let handle = self.alloc(Node {
            ip,
            session,
            prev: None,
            next: None,
        });
        self.index.insert(ip, handle);
        self.push_front(handle);

        if self.index.len() > self.capacity {
            self.evict_lru()
        } else {
            None
        }
    }

    fn evict_lru(&mut self) -> Option<(IpAddr, T)> {
        let handle = self.tail?;
        self.unlink(handle);
        let node = self.slab[handle].take().expect("tail handle is occupied");
        self.index.remove(&node.ip);
        self.free.push(handle);
        Some((node.ip, node.session))
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        if let Some(handle) = self.free.pop() {
            self.slab[handle] = Some(node);
            handle
        } else {
            self.slab.push(Some(node));
            self.slab.len() - 1
        }
    }

    fn unlink(&mut self, handle: usize) {
        let (prev, next) = {
            let node = self.slab[handle].as_ref().unwrap();
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.slab[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slab[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
        let node = self.slab[handle].as_mut().unwrap();
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, handle: usize) {
        let old_head = self.head;
        {
            let node = self.slab[handle].as_mut().unwrap();
            node.next = old_head;
            node.prev = None;
        }
        if let Some(old) = old_head {
            self.slab[old].as_mut().unwrap().prev = Some(handle);
        }
        self.head = Some(handle);
        if self.tail.is_none() {
            self.tail = Some(handle);
        }
    }
}

/// A session handle that can be told to wind down. Implemented for
/// `quinn::Connection` in `relay::quic`; tests use a plain marker type.
pub trait CloseableSession {
    fn close_done(&self);
}

impl<T: CloseableSession + Clone> SessionCache<T> {
    /// Like [`SessionCache::add`], but closes the evicted session (if any)
    /// with the application-level "done" signal before returning.
    pub fn add_and_close_evicted(&mut self, ip: IpAddr, session: T) {
        if let Some((_, evicted)) = self.add(ip, session) {
            evicted.close_done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::net::Ipv4Addr;
    use std::rc::Rc;

    #[derive(Clone)]
    struct MockSession(Rc<Cell<bool>>);

    impl MockSession {
        fn new() -> Self {
            Self(Rc::new(Cell::new(false)))
        }
        fn is_closed(&self) -> bool {
            self.0.get()
        }
    }

    impl CloseableSession for MockSession {
        fn close_done(&self) {
            self.0.set(true);
        }
    }

    fn ip(n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, n))
    }

    #[test]
    fn get_on_empty_cache_misses() {
        let mut cache: SessionCache<MockSession> = SessionCache::new(2);
        assert!(cache.get(&ip(1)).is_none());
    }

    #[test]
    fn add_then_get_round_trips() {
        let mut cache = SessionCache::new(2);
        let session = MockSession::new();
        cache.add_and_close_evicted(ip(1), session.clone());
        let got = cache.get(&ip(1)).unwrap();
        assert!(!got.is_closed());
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut cache = SessionCache::new(2);
        cache.add_and_close_evicted(ip(1), MockSession::new());
        cache.add_and_close_evicted(ip(2), MockSession::new());
        cache.add_and_close_evicted(ip(3), MockSession::new());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn eviction_closes_the_least_recently_used_session() {
        let mut cache = SessionCache::new(2);
        let a = MockSession::new();
        let b = MockSession::new();
        let c = MockSession::new();

        cache.add_and_close_evicted(ip(1), a.clone());
        cache.add_and_close_evicted(ip(2), b.clone());
        // Touch `1` so `2` becomes the LRU entry.
        cache.get(&ip(1));
        cache.add_and_close_evicted(ip(3), c.clone());

        assert!(!a.is_closed());
        assert!(b.is_closed());
        assert!(!c.is_closed());
        assert!(cache.get(&ip(2)).is_none());
        assert!(cache.get(&ip(1)).is_some());
        assert!(cache.get(&ip(3)).is_some());
    }

    #[test]
    fn replacing_an_existing_entry_does_not_evict_or_close_anything() {
        let mut cache = SessionCache::new(2);
        let old = MockSession::new();
        let new = MockSession::new();

        cache.add_and_close_evicted(ip(1), old.clone());
        cache.add_and_close_evicted(ip(1), new.clone());

        assert_eq!(cache.len(), 1);
        assert!(!old.is_closed());
        assert!(cache.get(&ip(1)).unwrap().is_closed() == new.is_closed());
    }

    #[test]
    fn reused_slab_slots_do_not_corrupt_ordering() {
        let mut cache = SessionCache::new(2);
        cache.add_and_close_evicted(ip(1), MockSession::new());
        cache.add_and_close_evicted(ip(2), MockSession::new());
        cache.add_and_close_evicted(ip(3), MockSession::new()); // evicts 1, reuses its slot
        cache.add_and_close_evicted(ip(4), MockSession::new()); // evicts 2

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&ip(3)).is_some());
        assert!(cache.get(&ip(4)).is_some());
    }
}
