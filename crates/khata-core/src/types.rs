use crate::money::Money;
use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Description written on every due-clearance entry.
pub const DUE_CLEARANCE: &str = "Due Clearance";

/// Face embedding vector produced by the external extractor.
///
/// Stored as a bare JSON array of double-precision numbers, so existing
/// ledgers round-trip without narrowing. Vectors of different lengths come
/// from different extractors and are never compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f64>,
}

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Callers must check [`dim`](Self::dim) first; extra trailing values in
    /// the longer vector are ignored.
    pub fn euclidean_distance(&self, other: &Embedding) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// One append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "date", with = "ledger_date")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "items")]
    pub description: String,
    #[serde(rename = "paid")]
    pub amount_paid: Money,
    /// Positive while the customer still owes money on this entry.
    #[serde(rename = "due")]
    pub amount_due: Money,
}

impl Transaction {
    /// Build an entry stamped with the current local time.
    ///
    /// The timestamp is truncated to the minute, the precision of the
    /// persisted format, so a reloaded entry compares equal to the original.
    pub fn now(description: impl Into<String>, amount_paid: Money, amount_due: Money) -> Self {
        Self {
            timestamp: current_minute(),
            description: description.into(),
            amount_paid,
            amount_due,
        }
    }

    pub fn is_clearance(&self) -> bool {
        self.description == DUE_CLEARANCE && self.amount_due == Money::ZERO
    }
}

fn current_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// A customer's profile and ledger. The name is the key in the store and is
/// not repeated inside the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
    /// Reference to the stored enrollment snapshot, empty until a face is registered.
    #[serde(rename = "photo", default)]
    pub photo_reference: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(rename = "face_encoding", default)]
    pub face_embedding: Option<Embedding>,
    /// Encoded template from a fingerprint SDK. Never populated by this crate.
    #[serde(default)]
    pub fingerprint_template: Option<String>,
    #[serde(default)]
    pub quick_code: Option<String>,
}

impl CustomerRecord {
    /// Running balance: the sum of `amount_due` since the latest due
    /// clearance. A clearance entry settles everything recorded before it.
    pub fn total_due(&self) -> Money {
        let since = self
            .transactions
            .iter()
            .rposition(Transaction::is_clearance)
            .map_or(0, |i| i + 1);
        self.transactions[since..].iter().map(|t| t.amount_due).sum()
    }

    pub fn has_face(&self) -> bool {
        self.face_embedding.is_some()
    }
}

/// `%d-%m-%Y %H:%M`, the format ledger files have always used.
mod ledger_date {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%d-%m-%Y %H:%M";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn entry(paid: i64, due: i64) -> Transaction {
        Transaction {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 5)
                .and_then(|d| d.and_hms_opt(14, 30, 0))
                .unwrap(),
            description: "Maggi x2 = 30".into(),
            amount_paid: Money::from(paid),
            amount_due: Money::from(due),
        }
    }

    #[test]
    fn test_euclidean_distance() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_total_due_sums_history() {
        let mut record = CustomerRecord::default();
        assert_eq!(record.total_due(), Money::ZERO);
        record.transactions.push(entry(100, 50));
        record.transactions.push(entry(0, 30));
        assert_eq!(record.total_due(), Money::from(80));
        record.transactions.push(entry(200, -120));
        assert_eq!(record.total_due(), Money::from(-40));
    }

    #[test]
    fn test_clearance_settles_earlier_entries() {
        let mut record = CustomerRecord::default();
        record.transactions.push(entry(100, 50));
        record.transactions.push(entry(0, 30));
        record.transactions.push(Transaction {
            description: DUE_CLEARANCE.into(),
            ..entry(80, 0)
        });
        assert_eq!(record.total_due(), Money::ZERO);

        record.transactions.push(entry(5, 25));
        assert_eq!(record.total_due(), Money::from(25));
    }

    #[test]
    fn test_transaction_wire_format() {
        let tx = Transaction {
            amount_paid: Money::new(dec!(12.5)),
            ..entry(0, 20)
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["date"], "05-03-2024 14:30");
        assert_eq!(json["items"], "Maggi x2 = 30");
        assert_eq!(json["paid"], 12.5);
        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_now_is_minute_aligned() {
        let tx = Transaction::now("x", Money::ZERO, Money::ZERO);
        assert_eq!(tx.timestamp.second(), 0);
        assert_eq!(tx.timestamp.nanosecond(), 0);
    }

    #[test]
    fn test_record_loads_with_missing_fields() {
        let json = r#"{"phone":"98765","address":"","notes":"","photo":"","transactions":[],"face_encoding":[0.5,0.25],"quick_code":null}"#;
        let record: CustomerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.phone, "98765");
        assert_eq!(record.fingerprint_template, None);
        assert_eq!(record.face_embedding, Some(Embedding::new(vec![0.5, 0.25])));
    }
}
