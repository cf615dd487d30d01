use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: usize,
}

#[derive(Default)]
struct State {
    queue: VecDeque<FrontierEntry>,
    /// URLs currently waiting in `queue`.
    pending: HashSet<String>,
    /// URLs already dequeued, whether or not their fetch succeeded.
    visited: HashSet<String>,
    enqueued: usize,
    /// Distinct unvisited URLs discovered beyond the depth limit.
    too_deep: HashSet<String>,
}

/// FIFO crawl frontier plus visited set behind one lock, so claiming a URL
/// and marking it visited happen together.
pub struct Frontier {
    state: Mutex<State>,
    max_depth: usize,
}

impl Frontier {
    pub fn new(max_depth: usize) -> Self {
        Self { state: Mutex::new(State::default()), max_depth }
    }

    /// Enqueues `url` unless it is too deep, already visited or already
    /// waiting. Returns whether it was added.
    pub fn push(&self, url: Url, depth: usize) -> bool {
        let key = url.as_str().to_string();
        let mut s = self.state.lock();
        if s.visited.contains(&key) || s.pending.contains(&key) {
            return false;
        }
        if depth > self.max_depth {
            s.too_deep.insert(key);
            return false;
        }
        s.pending.insert(key);
        s.queue.push_back(FrontierEntry { url, depth });
        s.enqueued += 1;
        true
    }

    /// Claims the next unvisited entry, marking it visited before it is
    /// handed out.
    pub fn pop(&self) -> Option<FrontierEntry> {
        let mut s = self.state.lock();
        while let Some(entry) = s.queue.pop_front() {
            let key = entry.url.as_str().to_string();
            s.pending.remove(&key);
            if s.visited.insert(key) {
                return Some(entry);
            }
        }
        None
    }

    /// Marks `url` visited without claiming it, e.g. the target of a
    /// redirect. A queued copy is dropped when it reaches the front. Returns
    /// false if it was already visited.
    pub fn mark_visited(&self, url: &Url) -> bool {
        let mut s = self.state.lock();
        s.pending.remove(url.as_str());
        s.too_deep.remove(url.as_str());
        s.visited.insert(url.as_str().to_string())
    }

    pub fn is_visited(&self, url: &Url) -> bool { self.state.lock().visited.contains(url.as_str()) }

    pub fn len(&self) -> usize { self.state.lock().queue.len() }

    pub fn is_empty(&self) -> bool { self.state.lock().queue.is_empty() }

    pub fn visited_count(&self) -> usize { self.state.lock().visited.len() }

    /// Total entries ever accepted by [`Frontier::push`], seeds included.
    pub fn enqueued_count(&self) -> usize { self.state.lock().enqueued }

    /// Distinct URLs turned away by the depth limit and never visited.
    pub fn skipped_depth(&self) -> usize {
        let s = self.state.lock();
        s.too_deep.iter().filter(|k| !s.visited.contains(*k)).count()
    }
}
