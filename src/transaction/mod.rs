//! Transactions record money moving in and out of wallets.

mod core;
mod endpoints;
mod query;

pub use core::{
    Transaction, TransactionKind, TransactionRequest, create_transaction_table,
    record_transaction,
};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
    list_transactions_endpoint, update_transaction_endpoint,
};
