//! # Player State Store
//!
//! Owns every wallet's [`Player`] and serializes writes per wallet.
//!
//! ## Locking Model
//!
//! ```text
//! slots: RwLock<HashMap<wallet, Arc<WalletSlot>>>   (held only to find a slot)
//!   WalletSlot.write_gate: Mutex<()>                 (one writer per wallet)
//!   WalletSlot.snapshot:   RwLock<Arc<Player>>       (swapped on commit)
//! ```
//!
//! A transaction holds the wallet's write gate for its whole read-modify-write,
//! works on a draft copy, persists the draft, and only then publishes it.
//! Readers clone the published snapshot and never wait for an in-flight
//! transaction. Different wallets never contend beyond the slot lookup.

use std::collections::HashMap;
use std::sync::Arc;

use atomicfizz_shared::Player;
use parking_lot::{Mutex, RwLock};

use crate::error::EngineResult;

/// Backing persistence for the store.
pub trait PlayerRepository: Send + Sync {
    /// Last persisted state for the wallet, if any.
    fn load(&self, wallet: &str) -> Option<Player>;

    /// Durably records the player's new state.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the write fails; the store then keeps the
    /// previous snapshot.
    fn persist(&self, player: &Player) -> EngineResult<()>;

    /// Every persisted player. Read once at startup to restore ownership of
    /// exclusive mintables; a repository that keeps nothing returns none.
    fn players(&self) -> Vec<Player> {
        Vec::new()
    }
}

/// Keeps nothing. Players live only as long as the store.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryRepository;

impl PlayerRepository for MemoryRepository {
    fn load(&self, _wallet: &str) -> Option<Player> {
        None
    }

    fn persist(&self, _player: &Player) -> EngineResult<()> {
        Ok(())
    }
}

/// Outcome of a transaction closure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition<T> {
    /// Persist and publish the draft, then return the value.
    Commit(T),
    /// Discard the draft, then return the value.
    Abort(T),
}

struct WalletSlot {
    write_gate: Mutex<()>,
    snapshot: RwLock<Arc<Player>>,
}

/// Per-wallet player state with atomic read-modify-write.
pub struct PlayerStore {
    slots: RwLock<HashMap<String, Arc<WalletSlot>>>,
    repository: Arc<dyn PlayerRepository>,
    starting_hp: u32,
}

impl PlayerStore {
    /// Creates a store over the given repository.
    #[must_use]
    pub fn new(repository: Arc<dyn PlayerRepository>, starting_hp: u32) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            repository,
            starting_hp,
        }
    }

    /// Creates a store with no backing persistence.
    #[must_use]
    pub fn in_memory(starting_hp: u32) -> Self {
        Self::new(Arc::new(MemoryRepository), starting_hp)
    }

    fn slot(&self, wallet: &str) -> Arc<WalletSlot> {
        if let Some(slot) = self.slots.read().get(wallet) {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write();
        let slot = slots.entry(wallet.to_string()).or_insert_with(|| {
            let player = self
                .repository
                .load(wallet)
                .unwrap_or_else(|| Player::with_starting_hp(wallet, self.starting_hp));
            Arc::new(WalletSlot {
                write_gate: Mutex::new(()),
                snapshot: RwLock::new(Arc::new(player)),
            })
        });
        Arc::clone(slot)
    }

    /// Current committed state, creating a default player if absent.
    #[must_use]
    pub fn get(&self, wallet: &str) -> Player {
        Player::clone(&self.snapshot(wallet))
    }

    /// Shared handle to the committed state.
    #[must_use]
    pub fn snapshot(&self, wallet: &str) -> Arc<Player> {
        Arc::clone(&self.slot(wallet).snapshot.read())
    }

    /// Replaces the player with `f(current)`, atomically for this wallet.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the repository rejects the write.
    pub fn update(&self, wallet: &str, f: impl FnOnce(&Player) -> Player) -> EngineResult<Player> {
        self.transact(wallet, |draft| {
            *draft = f(draft);
            Transition::Commit(draft.clone())
        })
    }

    /// Runs `f` on a draft of the wallet's player while holding the wallet's
    /// write gate.
    ///
    /// The draft is published only on [`Transition::Commit`] and only after the
    /// repository accepted it.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the repository rejects a committed draft.
    pub fn transact<T>(&self, wallet: &str, f: impl FnOnce(&mut Player) -> Transition<T>) -> EngineResult<T> {
        let slot = self.slot(wallet);
        let _gate = slot.write_gate.lock();

        let mut draft = Player::clone(&slot.snapshot.read());
        match f(&mut draft) {
            Transition::Abort(value) => Ok(value),
            Transition::Commit(value) => {
                self.repository.persist(&draft)?;
                *slot.snapshot.write() = Arc::new(draft);
                Ok(value)
            }
        }
    }

    /// Number of wallets seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// True if no wallet has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl std::fmt::Debug for PlayerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerStore")
            .field("wallets", &self.len())
            .field("starting_hp", &self.starting_hp)
            .finish_non_exhaustive()
    }
}
