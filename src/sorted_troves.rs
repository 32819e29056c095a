//! # Sorted Troves
//!
//! A doubly-linked list of trove ids ordered by descending nominal collateral ratio (NICR).
//! The head holds the best collateralized trove, the tail the riskiest one.
//!
//! Nodes only store their neighbours. Every comparison asks the caller for the current NICR of
//! the node through `nicr_of`, which includes pending redistribution rewards. A redistribution
//! moves every trove's NICR at once without touching the list, so a key stored at insert time
//! would go stale.
//!
//! Inserting is guided by a pair of neighbour hints. A hint pair that still brackets the key
//! is used directly. A hint that is gone or no longer brackets the key is dropped, and the
//! walk continues from the remaining hint or from the head of the list.

use crate::errors::{TroveError, TroveResult};
use crate::shared_structs::TroveId;
use crate::storage::TroveMap;
use scrypto::prelude::*;

#[derive(ScryptoSbor, Clone, Copy, Debug, Default, PartialEq)]
pub struct Node {
    /// Neighbour closer to the head (higher NICR).
    pub prev: Option<TroveId>,
    /// Neighbour closer to the tail (lower NICR).
    pub next: Option<TroveId>,
}

#[derive(ScryptoSbor, Debug, PartialEq)]
pub struct SortedTroves {
    head: Option<TroveId>,
    tail: Option<TroveId>,
    max_size: u64,
    size: u64,
    nodes: TroveMap<Node>,
}

impl SortedTroves {
    pub fn new(max_size: u64) -> Self {
        Self::with_nodes(max_size, TroveMap::memory())
    }

    /// List whose nodes live in a `KeyValueStore`.
    pub fn new_on_ledger(max_size: u64) -> Self {
        Self::with_nodes(max_size, TroveMap::ledger())
    }

    fn with_nodes(max_size: u64, nodes: TroveMap<Node>) -> Self {
        Self {
            head: None,
            tail: None,
            max_size,
            size: 0,
            nodes,
        }
    }

    pub fn checkpoint(&self) -> Option<Self> {
        Some(Self {
            head: self.head,
            tail: self.tail,
            max_size: self.max_size,
            size: self.size,
            nodes: self.nodes.checkpoint()?,
        })
    }

    /// Inserts `id` with NICR `key` at the position bracketed by the hints, or the nearest
    /// valid one.
    pub fn insert(
        &mut self,
        id: TroveId,
        key: Decimal,
        prev_id: Option<TroveId>,
        next_id: Option<TroveId>,
        nicr_of: &impl Fn(TroveId) -> Decimal,
    ) -> TroveResult<()> {
        if self.is_full() {
            return Err(TroveError::ListFull);
        }
        if self.contains(id) {
            return Err(TroveError::AlreadyInList);
        }
        if id == 0 {
            return Err(TroveError::ZeroId);
        }
        if key <= Decimal::ZERO {
            return Err(TroveError::ZeroKey);
        }

        let (prev, next) = if self.valid_insert_position(key, prev_id, next_id, nicr_of) {
            (prev_id, next_id)
        } else {
            self.find_insert_position(key, prev_id, next_id, nicr_of)
        };

        match prev {
            Some(prev) => self.set_next(prev, Some(id)),
            None => self.head = Some(id),
        }
        match next {
            Some(next) => self.set_prev(next, Some(id)),
            None => self.tail = Some(id),
        }

        self.nodes.insert(id, Node { prev, next });
        self.size += 1;

        Ok(())
    }

    pub fn remove(&mut self, id: TroveId) -> TroveResult<()> {
        let node = self.nodes.remove(id).ok_or(TroveError::NotInList)?;

        match node.prev {
            Some(prev) => self.set_next(prev, node.next),
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.set_prev(next, node.prev),
            None => self.tail = node.prev,
        }

        self.size -= 1;

        Ok(())
    }

    /// Moves `id` to the position matching `new_key`.
    pub fn re_insert(
        &mut self,
        id: TroveId,
        new_key: Decimal,
        prev_id: Option<TroveId>,
        next_id: Option<TroveId>,
        nicr_of: &impl Fn(TroveId) -> Decimal,
    ) -> TroveResult<()> {
        if !self.contains(id) {
            return Err(TroveError::NotInList);
        }
        if new_key <= Decimal::ZERO {
            return Err(TroveError::ZeroKey);
        }

        self.remove(id)?;
        self.insert(id, new_key, prev_id, next_id, nicr_of)
    }

    /// Returns true if a node with `key` fits exactly between `prev_id` and `next_id`.
    pub fn valid_insert_position(
        &self,
        key: Decimal,
        prev_id: Option<TroveId>,
        next_id: Option<TroveId>,
        nicr_of: &impl Fn(TroveId) -> Decimal,
    ) -> bool {
        match (prev_id, next_id) {
            (None, None) => self.is_empty(),
            (None, Some(next)) => self.head == Some(next) && key >= nicr_of(next),
            (Some(prev), None) => self.tail == Some(prev) && key <= nicr_of(prev),
            (Some(prev), Some(next)) => {
                self.get_next(prev) == Some(next) && nicr_of(prev) >= key && key >= nicr_of(next)
            }
        }
    }

    /// Finds the `(prev, next)` pair that `key` belongs between, starting from the hints.
    pub fn find_insert_position(
        &self,
        key: Decimal,
        prev_id: Option<TroveId>,
        next_id: Option<TroveId>,
        nicr_of: &impl Fn(TroveId) -> Decimal,
    ) -> (Option<TroveId>, Option<TroveId>) {
        let prev = prev_id.filter(|prev| self.contains(*prev) && key <= nicr_of(*prev));
        let next = next_id.filter(|next| self.contains(*next) && key >= nicr_of(*next));

        match (prev, next) {
            (None, None) => match self.head {
                Some(head) => self.descend_list(key, head, nicr_of),
                None => (None, None),
            },
            (None, Some(next)) => self.ascend_list(key, next, nicr_of),
            (Some(prev), _) => self.descend_list(key, prev, nicr_of),
        }
    }

    fn descend_list(
        &self,
        key: Decimal,
        start: TroveId,
        nicr_of: &impl Fn(TroveId) -> Decimal,
    ) -> (Option<TroveId>, Option<TroveId>) {
        if self.head == Some(start) && key >= nicr_of(start) {
            return (None, Some(start));
        }

        let mut prev = Some(start);
        let mut next = self.get_next(start);

        while let Some(current) = prev {
            if self.valid_insert_position(key, Some(current), next, nicr_of) {
                break;
            }
            prev = next;
            next = next.and_then(|id| self.get_next(id));
        }

        (prev, next)
    }

    fn ascend_list(
        &self,
        key: Decimal,
        start: TroveId,
        nicr_of: &impl Fn(TroveId) -> Decimal,
    ) -> (Option<TroveId>, Option<TroveId>) {
        if self.tail == Some(start) && key <= nicr_of(start) {
            return (Some(start), None);
        }

        let mut next = Some(start);
        let mut prev = self.get_prev(start);

        while let Some(current) = next {
            if self.valid_insert_position(key, prev, Some(current), nicr_of) {
                break;
            }
            next = prev;
            prev = prev.and_then(|id| self.get_prev(id));
        }

        (prev, next)
    }

    pub fn contains(&self, id: TroveId) -> bool {
        self.nodes.contains(id)
    }

    pub fn is_full(&self) -> bool {
        self.size >= self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get_size(&self) -> u64 {
        self.size
    }

    pub fn get_max_size(&self) -> u64 {
        self.max_size
    }

    /// Raises or lowers the capacity. Cannot go below the current size.
    pub fn set_max_size(&mut self, max_size: u64) -> TroveResult<()> {
        if max_size < self.size {
            return Err(TroveError::ListFull);
        }
        self.max_size = max_size;
        Ok(())
    }

    /// Trove with the highest NICR.
    pub fn get_first(&self) -> Option<TroveId> {
        self.head
    }

    /// Trove with the lowest NICR.
    pub fn get_last(&self) -> Option<TroveId> {
        self.tail
    }

    pub fn get_next(&self, id: TroveId) -> Option<TroveId> {
        self.nodes.get(id).and_then(|node| node.next)
    }

    pub fn get_prev(&self, id: TroveId) -> Option<TroveId> {
        self.nodes.get(id).and_then(|node| node.prev)
    }

    /// Walks the list from head to tail.
    pub fn iter(&self) -> SortedTrovesIter<'_> {
        SortedTrovesIter {
            list: self,
            current: self.head,
        }
    }

    fn set_next(&mut self, id: TroveId, next: Option<TroveId>) {
        self.nodes.update(id, |node| node.next = next);
    }

    fn set_prev(&mut self, id: TroveId, prev: Option<TroveId>) {
        self.nodes.update(id, |node| node.prev = prev);
    }
}

pub struct SortedTrovesIter<'a> {
    list: &'a SortedTroves,
    current: Option<TroveId>,
}

impl<'a> Iterator for SortedTrovesIter<'a> {
    type Item = TroveId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.list.get_next(id);
        Some(id)
    }
}
