//! # Chain Minting
//!
//! Best-effort minting of high-rarity loot. The engine calls a
//! [`ChainMinter`] only after the player's rewards are committed, and only
//! when simulation is off, so a failed mint never takes a reward back.
//!
//! ```text
//! claim committed ──► rarity >= threshold? ──► minter.mint()
//!                                                 │
//!                          Ok(tx) ──► receipt.chain_tx = Some(tx)
//!                          Err    ──► warn!, receipt.chain_tx = None
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use atomicfizz_shared::LootItem;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ChainNetwork;
use crate::error::{EngineError, EngineResult};

/// Proof of a mint, attached to the claim receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReference {
    /// Network the mint landed on.
    pub network: ChainNetwork,
    /// Transaction signature or hash.
    pub signature: String,
    /// Block explorer link.
    pub explorer_url: String,
}

impl TransactionReference {
    /// Builds the reference with the explorer link for `network`.
    #[must_use]
    pub fn new(network: ChainNetwork, signature: String) -> Self {
        let explorer_url = match network {
            ChainNetwork::Solana => format!("https://solscan.io/tx/{signature}?cluster=devnet"),
            ChainNetwork::Avalanche => format!("https://testnet.snowtrace.io/tx/0x{signature}"),
        };
        Self {
            network,
            signature,
            explorer_url,
        }
    }
}

/// Mints a loot item to a wallet.
pub trait ChainMinter: Send + Sync {
    /// Mints `item` to `wallet`.
    ///
    /// # Errors
    ///
    /// Returns `ChainMint` if the mint did not go through.
    fn mint(&self, wallet: &str, item: &LootItem) -> EngineResult<TransactionReference>;
}

/// Deterministic devnet stand-in: derives a signature from the request
/// instead of submitting a transaction.
#[derive(Debug)]
pub struct DevnetMinter {
    network: ChainNetwork,
    sequence: AtomicU64,
}

impl DevnetMinter {
    /// Creates a minter for `network`.
    #[must_use]
    pub const fn new(network: ChainNetwork) -> Self {
        Self {
            network,
            sequence: AtomicU64::new(0),
        }
    }

    /// Mints issued so far.
    #[must_use]
    pub fn minted(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }
}

impl ChainMinter for DevnetMinter {
    fn mint(&self, wallet: &str, item: &LootItem) -> EngineResult<TransactionReference> {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel);
        let signature = derive_signature(&[wallet.as_bytes(), item.id().as_bytes(), &sequence.to_le_bytes()]);
        Ok(TransactionReference::new(self.network, signature))
    }
}

/// 32-byte hex signature from eight CRC32 lanes over the same input.
fn derive_signature(parts: &[&[u8]]) -> String {
    (0u32..8)
        .flat_map(|lane| {
            let mut hasher = crc32fast::Hasher::new_with_initial(lane.wrapping_mul(0x9E37_79B9));
            for part in parts {
                hasher.update(part);
                hasher.update(&[0xFF]);
            }
            hasher.finalize().to_le_bytes()
        })
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// In-memory minter that records every request. Can be told to fail.
#[derive(Debug, Default)]
pub struct SimulatedMinter {
    network: ChainNetwork,
    fail: bool,
    minted: Mutex<Vec<(String, String)>>,
}

impl SimulatedMinter {
    /// A minter that always succeeds.
    #[must_use]
    pub fn new(network: ChainNetwork) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// A minter that always fails, for exercising the best-effort path.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(wallet, item id)` pairs minted so far, in order.
    #[must_use]
    pub fn minted(&self) -> Vec<(String, String)> {
        self.minted.lock().clone()
    }
}

impl ChainMinter for SimulatedMinter {
    fn mint(&self, wallet: &str, item: &LootItem) -> EngineResult<TransactionReference> {
        if self.fail {
            return Err(EngineError::ChainMint(format!("simulated outage minting {}", item.id())));
        }
        let mut minted = self.minted.lock();
        minted.push((wallet.to_string(), item.id().to_string()));
        Ok(TransactionReference::new(self.network, format!("SIM_{:08}", minted.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atomicfizz_shared::{GenericLoot, Rarity};

    fn relic() -> LootItem {
        LootItem::Generic(GenericLoot {
            id: "relic".into(),
            name: "Legendary Relic".into(),
            rarity: Rarity::Legendary,
            source_location: "Hoover Dam".into(),
            acquired_at: 1,
        })
    }

    #[test]
    fn test_devnet_signatures_are_unique_and_hex() {
        let minter = DevnetMinter::new(ChainNetwork::Solana);
        let a = minter.mint("wallet", &relic()).unwrap();
        let b = minter.mint("wallet", &relic()).unwrap();
        assert_eq!(a.signature.len(), 64);
        assert!(a.signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.signature, b.signature);
        assert!(a.explorer_url.starts_with("https://solscan.io/tx/"));
        assert!(a.explorer_url.ends_with("?cluster=devnet"));
        assert_eq!(minter.minted(), 2);
    }

    #[test]
    fn test_devnet_is_deterministic() {
        let a = DevnetMinter::new(ChainNetwork::Avalanche).mint("w", &relic()).unwrap();
        let b = DevnetMinter::new(ChainNetwork::Avalanche).mint("w", &relic()).unwrap();
        assert_eq!(a, b);
        assert!(a.explorer_url.contains("snowtrace.io/tx/0x"));
    }

    #[test]
    fn test_simulated_records_and_fails() {
        let minter = SimulatedMinter::new(ChainNetwork::Solana);
        let tx = minter.mint("w", &relic()).unwrap();
        assert_eq!(tx.signature, "SIM_00000001");
        assert_eq!(minter.minted(), vec![("w".to_string(), "relic".to_string())]);

        let err = SimulatedMinter::failing().mint("w", &relic()).unwrap_err();
        assert!(matches!(err, EngineError::ChainMint(_)));
    }
}
