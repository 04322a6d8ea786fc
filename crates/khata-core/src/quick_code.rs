//! Short numeric aliases derived from phone numbers.

use crate::error::{LedgerError, Result};
use crate::ledger::{canonical_name, LedgerStore, ProfileUpdate};
use std::collections::HashSet;

/// Digits kept from the end of the phone number.
const CODE_LEN: usize = 4;

/// Base code for a phone string: its last four digits, or every digit when
/// there are fewer than four. Non-digits are dropped.
pub fn make_quick_code(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    let start = digits.len().saturating_sub(CODE_LEN);
    digits[start..].iter().collect()
}

/// First free candidate among `base`, `base_1`, `base_2`, ...
///
/// Terminates because `taken` is finite.
pub fn ensure_unique<'a>(base: &str, taken: impl IntoIterator<Item = &'a str>) -> String {
    let taken: HashSet<&str> = taken.into_iter().collect();
    if !taken.contains(base) {
        return base.to_string();
    }
    (1u64..)
        .map(|i| format!("{base}_{i}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

/// Derive, deduplicate and store a quick code for `name`, recording `phone`
/// on the profile. Creates the customer if absent.
///
/// The customer's own previous code does not count as taken, so re-assigning
/// from the same phone keeps the same code.
pub fn assign_quick_code(store: &mut LedgerStore, name: &str, phone: &str) -> Result<String> {
    let key = canonical_name(name);
    if key.is_empty() {
        return Err(LedgerError::EmptyName);
    }

    let base = make_quick_code(phone);
    let code = ensure_unique(&base, store.assigned_codes(Some(&key)));

    store.upsert(
        &key,
        ProfileUpdate {
            phone: Some(phone.to_string()),
            ..Default::default()
        },
    )?;
    let assigned = code.clone();
    store.update(&key, move |record| record.quick_code = Some(assigned))?;

    tracing::info!(name = %key, base = %base, code = %code, "quick code assigned");
    Ok(code)
}

fn normalize(code: &str) -> String {
    code.trim().to_lowercase()
}

/// Every customer whose stored code matches `input`, ignoring case and
/// surrounding whitespace. Callers use the first hit.
pub fn find_by_quick_code(store: &LedgerStore, input: &str) -> Vec<String> {
    let wanted = normalize(input);
    store
        .iter()
        .filter(|(_, r)| r.quick_code.as_deref().map(normalize).as_deref() == Some(wanted.as_str()))
        .map(|(name, _)| name.to_string())
        .collect()
}
