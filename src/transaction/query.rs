//! Filtering and paging the transaction list.

use rusqlite::{Connection, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error, UserID,
    category::CategoryId,
    envelope::EnvelopeId,
    pagination::{Page, PaginationConfig},
    transaction::core::{Transaction, TransactionKind, map_transaction_row},
    wallet::WalletId,
};

/// The filters and page accepted by the transaction list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionQuery {
    /// Only transactions moving money out of or into this wallet.
    pub wallet_id: Option<WalletId>,
    /// Only expenses spent from this envelope.
    pub envelope_id: Option<EnvelopeId>,
    /// Only transactions in this category.
    pub category_id: Option<CategoryId>,
    /// Only transactions of this kind.
    pub kind: Option<TransactionKind>,
    /// Only transactions on or after this date.
    pub from: Option<Date>,
    /// Only transactions on or before this date.
    pub to: Option<Date>,
    /// The 1-based page number.
    pub page: Option<u64>,
    /// The number of transactions per page.
    pub per_page: Option<u64>,
}

/// Get one page of the live transactions of `user_id` that match `query`,
/// newest first.
///
/// # Errors
///
/// Returns an [Error::InvalidInput] if `from` is after `to` or the page is
/// out of the range allowed by `pagination_config`.
pub fn list_transactions(
    user_id: UserID,
    query: &TransactionQuery,
    pagination_config: &PaginationConfig,
    connection: &Connection,
) -> Result<Page<Transaction>, Error> {
    let page_request = pagination_config.resolve(query.page, query.per_page)?;

    if let (Some(from), Some(to)) = (query.from, query.to)
        && from > to
    {
        return Err(Error::InvalidInput(format!(
            "the start date {from} is after the end date {to}"
        )));
    }

    let mut clauses = vec!["user_id = ?", "deleted_at IS NULL"];
    let mut params = vec![Value::Integer(user_id.as_i64())];

    if let Some(wallet_id) = query.wallet_id {
        clauses.push("(wallet_id = ? OR destination_wallet_id = ?)");
        params.push(Value::Integer(wallet_id));
        params.push(Value::Integer(wallet_id));
    }

    if let Some(envelope_id) = query.envelope_id {
        clauses.push("envelope_id = ?");
        params.push(Value::Integer(envelope_id));
    }

    if let Some(category_id) = query.category_id {
        clauses.push("category_id = ?");
        params.push(Value::Integer(category_id));
    }

    if let Some(kind) = query.kind {
        clauses.push("kind = ?");
        params.push(Value::Text(kind.as_str().to_owned()));
    }

    if let Some(from) = query.from {
        clauses.push("date >= ?");
        params.push(Value::Text(from.to_string()));
    }

    if let Some(to) = query.to {
        clauses.push("date <= ?");
        params.push(Value::Text(to.to_string()));
    }

    let where_clause = clauses.join(" AND ");

    let total_items: i64 = connection.query_row(
        &format!("SELECT COUNT(id) FROM \"transaction\" WHERE {where_clause}"),
        params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    params.push(Value::Integer(page_request.limit()));
    params.push(Value::Integer(page_request.offset()));

    // Sort by date, and then ID to keep transaction order stable after updates
    let items = connection
        .prepare(&format!(
            "SELECT id, user_id, wallet_id, destination_wallet_id, envelope_id, category_id,
                subcategory_id, amount, kind, description, date, version, created_at
             FROM \"transaction\" WHERE {where_clause}
             ORDER BY date DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?
        .query_map(params_from_iter(params.iter()), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(
        items,
        page_request,
        u64::try_from(total_items).unwrap_or_default(),
    ))
}
