//! Wallets hold a user's money in a single currency.

mod core;
mod endpoints;
mod movement;

pub use core::{
    NewWallet, Wallet, WalletId, WalletType, create_wallet, create_wallet_table,
    get_referenced_wallet, get_wallet,
};
pub use endpoints::{
    adjust_wallet_endpoint, create_wallet_endpoint, delete_wallet_endpoint, deposit_endpoint,
    get_wallet_endpoint, get_wallet_summary_endpoint, list_wallets_endpoint, transfer_endpoint,
    update_wallet_endpoint, withdraw_endpoint,
};

pub(crate) use core::{apply_balance_delta, check_negative_balance};
