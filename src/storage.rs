//! Keyed storage for per-trove engine records.
//!
//! The engine runs in two places: plain Rust tests, and the `TroveManager` component. In the
//! component every record lives in a `KeyValueStore` so that an operation only loads the entries
//! it touches. Tests keep the records in a `BTreeMap`, which can be copied for rollback.

use crate::shared_structs::TroveId;
use scrypto::prelude::*;
use std::collections::BTreeMap;
use std::fmt;

#[derive(ScryptoSbor)]
pub enum TroveMap<V: ScryptoEncode + ScryptoDecode + ScryptoDescribe + ScryptoCategorize> {
    Memory(BTreeMap<TroveId, V>),
    Ledger(KeyValueStore<TroveId, V>),
}

impl<V: ScryptoEncode + ScryptoDecode + ScryptoDescribe + ScryptoCategorize + Clone> TroveMap<V> {
    pub fn memory() -> Self {
        Self::Memory(BTreeMap::new())
    }

    /// Only callable while running inside a component.
    pub fn ledger() -> Self {
        Self::Ledger(KeyValueStore::new())
    }

    pub fn get(&self, id: TroveId) -> Option<V> {
        match self {
            Self::Memory(map) => map.get(&id).cloned(),
            Self::Ledger(store) => store.get(&id).map(|entry| (*entry).clone()),
        }
    }

    pub fn contains(&self, id: TroveId) -> bool {
        match self {
            Self::Memory(map) => map.contains_key(&id),
            Self::Ledger(store) => store.get(&id).is_some(),
        }
    }

    pub fn insert(&mut self, id: TroveId, value: V) {
        match self {
            Self::Memory(map) => {
                map.insert(id, value);
            }
            Self::Ledger(store) => store.insert(id, value),
        }
    }

    pub fn remove(&mut self, id: TroveId) -> Option<V> {
        match self {
            Self::Memory(map) => map.remove(&id),
            Self::Ledger(store) => store.remove(&id),
        }
    }

    /// Loads the entry, lets `update` change it and writes it back. Returns false when absent.
    pub fn update(&mut self, id: TroveId, update: impl FnOnce(&mut V)) -> bool {
        match self.get(id) {
            Some(mut value) => {
                update(&mut value);
                self.insert(id, value);
                true
            }
            None => false,
        }
    }

    /// A copy to restore after a failed operation. `None` for ledger storage, where a failed
    /// operation aborts the transaction instead.
    pub fn checkpoint(&self) -> Option<Self> {
        match self {
            Self::Memory(map) => Some(Self::Memory(map.clone())),
            Self::Ledger(_) => None,
        }
    }
}

impl<V: ScryptoEncode + ScryptoDecode + ScryptoDescribe + ScryptoCategorize + fmt::Debug> fmt::Debug for TroveMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(map) => f.debug_tuple("Memory").field(map).finish(),
            Self::Ledger(store) => f.debug_tuple("Ledger").field(&store.id).finish(),
        }
    }
}

impl<V: ScryptoEncode + ScryptoDecode + ScryptoDescribe + ScryptoCategorize + PartialEq> PartialEq for TroveMap<V> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Memory(a), Self::Memory(b)) => a == b,
            (Self::Ledger(a), Self::Ledger(b)) => a.id == b.id,
            _ => false,
        }
    }
}
