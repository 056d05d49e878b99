//! Non-blocking problems detected after money has moved.
//!
//! Overspending an envelope or overdrawing a wallet never rejects a write,
//! instead the response lists what went past its limit.

use serde::{Deserialize, Serialize};

use crate::{envelope::EnvelopeId, wallet::WalletId};

/// A problem with the state of a wallet or envelope after a write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The real balance of a wallet dropped below zero.
    NegativeBalance {
        /// The overdrawn wallet.
        wallet_id: WalletId,
        /// The balance after the write.
        balance: f64,
    },
    /// More has been spent from an envelope than was assigned to it.
    Overspent {
        /// The overspent envelope.
        envelope_id: EnvelopeId,
        /// The budget assigned to the envelope.
        assigned: f64,
        /// The amount spent from the envelope.
        spent: f64,
    },
    /// More budget has been assigned out of a wallet than the wallet holds.
    OverAssigned {
        /// The wallet the budget was assigned from.
        wallet_id: WalletId,
        /// The live budget assigned out of the wallet.
        assigned: f64,
        /// The real balance of the wallet.
        balance: f64,
    },
}
