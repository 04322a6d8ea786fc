//! Running balance and due clearance.
//!
//! The balance is never stored; it is always recomputed from the history.
//! Corrections are new entries, never edits.

use crate::error::{LedgerError, Result};
use crate::ledger::{canonical_name, LedgerStore};
use crate::money::Money;
use crate::types::{Transaction, DUE_CLEARANCE};

/// Outcome of [`clear_due`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clearance {
    /// A clearance entry for this amount was appended.
    Cleared(Money),
    /// The total due was zero or negative; nothing was written.
    NothingDue(Money),
}

/// Running balance since the latest clearance. See [`crate::types::CustomerRecord::total_due`].
pub fn total_due(store: &LedgerStore, name: &str) -> Result<Money> {
    store
        .get(name)
        .map(|r| r.total_due())
        .ok_or_else(|| LedgerError::NotFound(canonical_name(name)))
}

/// Append a sale: `amount_due = total_amount - amount_paid`.
///
/// Overpayment is accepted and produces a negative due on the entry. The
/// clearance description is refused, since it would settle earlier dues.
pub fn record_transaction(
    store: &mut LedgerStore,
    name: &str,
    description: &str,
    total_amount: Money,
    amount_paid: Money,
) -> Result<Transaction> {
    if amount_paid.is_negative() {
        return Err(LedgerError::NegativePayment(amount_paid));
    }
    if description.trim().eq_ignore_ascii_case(DUE_CLEARANCE) {
        return Err(LedgerError::ReservedDescription(description.to_string()));
    }

    let tx = Transaction::now(description, amount_paid, total_amount - amount_paid);
    let entry = tx.clone();
    store.update(name, move |record| record.transactions.push(entry))?;

    tracing::info!(
        name = %canonical_name(name),
        total = %total_amount,
        paid = %amount_paid,
        due = %tx.amount_due,
        "transaction recorded"
    );
    Ok(tx)
}

/// Zero the running balance with a single "Due Clearance" entry.
pub fn clear_due(store: &mut LedgerStore, name: &str) -> Result<Clearance> {
    let due = total_due(store, name)?;
    if !due.is_positive() {
        tracing::debug!(name = %canonical_name(name), due = %due, "nothing to clear");
        return Ok(Clearance::NothingDue(due));
    }

    let entry = Transaction::now(DUE_CLEARANCE, due, Money::ZERO);
    store.update(name, move |record| record.transactions.push(entry))?;

    tracing::info!(name = %canonical_name(name), cleared = %due, "due cleared");
    Ok(Clearance::Cleared(due))
}

/// Customers with a phone on file and a strictly positive total due, in
/// enumeration order.
pub fn customers_with_dues(store: &LedgerStore) -> Vec<(String, String, Money)> {
    store
        .iter()
        .filter(|(_, r)| !r.phone.trim().is_empty())
        .filter_map(|(name, r)| {
            let due = r.total_due();
            due.is_positive()
                .then(|| (name.to_string(), r.phone.clone(), due))
        })
        .collect()
}
