//! Matchmaking queue.
//!
//! Clients that asked for a peer wait in an insertion-ordered set. A new
//! request is matched with a uniformly random member, then joins the set
//! itself. Members stay eligible after being matched and only leave when
//! they disconnect.

use indexmap::IndexSet;
use rand::Rng;
use signal_types::ClientId;

/// Ids waiting for a match, in arrival order, without duplicates.
#[derive(Debug, Default)]
pub struct PendingSet {
    members: IndexSet<ClientId>,
}

impl PendingSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a match for `id` and add `id` to the set.
    ///
    /// The requester is never its own match. Returns `None` when no other
    /// member is waiting.
    pub fn request_match(&mut self, id: &ClientId) -> Option<ClientId> {
        self.request_match_with(id, &mut rand::thread_rng())
    }

    /// [`PendingSet::request_match`] with a caller-supplied random source.
    pub fn request_match_with<R: Rng>(&mut self, id: &ClientId, rng: &mut R) -> Option<ClientId> {
        let own_index = self.members.get_index_of(id);
        let candidates = self.members.len() - usize::from(own_index.is_some());

        let target = if candidates == 0 {
            None
        } else {
            // Uniform over every index except our own
            let mut index = rng.gen_range(0..candidates);
            if let Some(own) = own_index {
                if index >= own {
                    index += 1;
                }
            }
            self.members.get_index(index).cloned()
        };

        self.members.insert(id.clone());
        target
    }

    /// Remove `id`; no-op if absent.
    pub fn discard(&mut self, id: &ClientId) -> bool {
        self.members.shift_remove(id)
    }

    /// Whether `id` is waiting.
    pub fn contains(&self, id: &ClientId) -> bool {
        self.members.contains(id)
    }

    /// Number of waiting ids.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Waiting ids in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &ClientId> {
        self.members.iter()
    }
}
