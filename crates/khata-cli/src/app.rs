//! The shop's ledger together with its collaborators.
//!
//! Operations here are shared by the interactive shell and the one-shot
//! subcommands. They return typed outcomes; wording is up to the caller.

use crate::config::Config;
use anyhow::{Context, Result};
use khata_core::capture::CaptureError;
use khata_core::dues::{self, Clearance};
use khata_core::fingerprint::{FingerprintBackend, NoFingerprint};
use khata_core::ledger::Upsert;
use khata_core::order::{parse_order, Order, OrderError, PriceList};
use khata_core::quick_code::assign_quick_code;
use khata_core::resolver::EnrollError;
use khata_core::{
    FaceLookup, IdentityResolver, JsonFileStore, LedgerError, LedgerStore, Money, ProfileUpdate, Transaction,
};
use khata_io::{due_message, CaptureMode, Fast2Sms, FaceCommand, SmsError, SmsGateway, SmsReceipt};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrderFailure {
    #[error("{}", .0.user_message())]
    Parse(#[from] OrderError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A sale written to the ledger.
#[derive(Debug)]
pub struct RecordedOrder {
    pub order: Order,
    pub transaction: Transaction,
    /// Running total after the sale.
    pub total_due: Money,
}

pub struct App {
    pub store: LedgerStore,
    pub resolver: IdentityResolver,
    prices: PriceList,
    face: Option<FaceCommand>,
    faces_dir: PathBuf,
    sms: Option<Box<dyn SmsGateway>>,
    fingerprint: Box<dyn FingerprintBackend>,
}

impl App {
    /// Load the ledger and wire up configured collaborators.
    ///
    /// A corrupt ledger file is the one error that stops the process.
    pub fn open(config: &Config) -> Result<Self> {
        let backend = JsonFileStore::new(&config.data_file);
        let store = LedgerStore::open(Box::new(backend))
            .with_context(|| format!("cannot load ledger {}", config.data_file.display()))?;

        let sms: Option<Box<dyn SmsGateway>> = match config.sms.clone().map(Fast2Sms::new) {
            Some(Ok(gateway)) => Some(Box::new(gateway)),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "SMS gateway disabled");
                None
            }
            None => None,
        };

        let resolver = IdentityResolver::default()
            .with_threshold(config.match_threshold)
            .with_scan_timeout(config.scan_timeout())
            .with_enroll_timeout(config.enroll_timeout());

        tracing::info!(
            data_file = %config.data_file.display(),
            customers = store.len(),
            face = config.face_command.is_some(),
            sms = sms.is_some(),
            threshold = resolver.threshold(),
            "khata ready"
        );

        Ok(Self {
            store,
            resolver,
            prices: config.load_prices()?,
            face: config.face_command.as_deref().and_then(FaceCommand::parse),
            faces_dir: config.faces_dir.clone(),
            sms,
            fingerprint: Box::new(NoFingerprint),
        })
    }

    /// An app over an existing store with no collaborators configured.
    pub fn with_store(store: LedgerStore) -> Self {
        Self {
            store,
            resolver: IdentityResolver::default(),
            prices: PriceList::default(),
            face: None,
            faces_dir: PathBuf::from("faces"),
            sms: None,
            fingerprint: Box::new(NoFingerprint),
        }
    }

    pub fn with_sms(mut self, gateway: Box<dyn SmsGateway>) -> Self {
        self.sms = Some(gateway);
        self
    }

    /// Create a profile (or update its contact details) and give it a quick
    /// code derived from `phone`.
    pub fn register_customer(
        &mut self,
        name: &str,
        phone: &str,
        address: &str,
        notes: &str,
    ) -> Result<(Upsert, String), LedgerError> {
        let outcome = self.store.upsert(
            name,
            ProfileUpdate {
                phone: Some(phone.trim().to_string()),
                address: Some(address.trim().to_string()),
                notes: Some(notes.trim().to_string()),
            },
        )?;
        let code = assign_quick_code(&mut self.store, name, phone.trim())?;
        Ok((outcome, code))
    }

    /// Parse `text` against the price list and record it for `name`.
    /// Nothing is written when the text does not parse.
    pub fn record_order(&mut self, name: &str, text: &str) -> Result<RecordedOrder, OrderFailure> {
        if !self.store.contains(name) {
            return Err(LedgerError::NotFound(khata_core::canonical_name(name)).into());
        }
        let order = parse_order(text, &self.prices)?;
        let transaction = dues::record_transaction(&mut self.store, name, &order.summary(), order.total(), order.paid)?;
        let total_due = dues::total_due(&self.store, name)?;
        Ok(RecordedOrder {
            order,
            transaction,
            total_due,
        })
    }

    pub fn clear_due(&mut self, name: &str) -> Result<Clearance, LedgerError> {
        dues::clear_due(&mut self.store, name)
    }

    pub fn has_face_capture(&self) -> bool {
        self.face.is_some()
    }

    fn face_command(&self) -> Result<&FaceCommand, CaptureError> {
        self.face
            .as_ref()
            .ok_or_else(|| CaptureError::Unavailable("face capture not configured (set KHATA_FACE_COMMAND)".into()))
    }

    /// Identify whoever is in front of the camera.
    pub fn scan_face(&self) -> Result<FaceLookup, CaptureError> {
        if self.store.gallery().is_empty() {
            return Ok(FaceLookup::NoEnrolled);
        }
        let mut source = self.face_command()?.start(CaptureMode::Scan, None)?;
        self.resolver.scan(&self.store, &mut source)
    }

    /// Capture and store a face for `name`, replacing any previous one.
    pub fn enroll_face(&mut self, name: &str) -> Result<(), EnrollError> {
        let key = khata_core::canonical_name(name);
        if key.is_empty() {
            return Err(LedgerError::EmptyName.into());
        }
        if let Err(e) = std::fs::create_dir_all(&self.faces_dir) {
            tracing::warn!(dir = %self.faces_dir.display(), error = %e, "cannot create snapshot directory");
        }
        let snapshot = self.faces_dir.join(format!("{}.jpg", key.replace(' ', "_")));

        let mut source = self.face_command()?.start(CaptureMode::Enroll, Some(snapshot.as_path()))?;
        self.resolver.enroll(&mut self.store, &key, &mut source)
    }

    pub fn fingerprint_backend(&self) -> &str {
        self.fingerprint.name()
    }

    pub fn has_fingerprint(&self) -> bool {
        self.fingerprint.is_available()
    }

    pub fn register_fingerprint(&mut self, name: &str) -> bool {
        self.fingerprint.register(&khata_core::canonical_name(name), &[])
    }

    fn gateway(&self) -> Result<&dyn SmsGateway, SmsError> {
        self.sms.as_deref().ok_or(SmsError::NotConfigured)
    }

    /// Send `name` a reminder for `due`. `Ok(None)` when there is no phone on file.
    pub fn notify_due(&self, name: &str, due: Money) -> Result<Option<SmsReceipt>, SmsError> {
        let Some(record) = self.store.get(name) else {
            return Ok(None);
        };
        let phone = record.phone.trim();
        if phone.is_empty() {
            return Ok(None);
        }
        let gateway = self.gateway()?;
        let name = khata_core::canonical_name(name);
        gateway.send(phone, &due_message(&name, due)).map(Some).map_err(|e| {
            tracing::warn!(name = %name, error = %e, "due reminder not sent");
            e
        })
    }

    /// Remind every customer with a phone and a positive total due.
    ///
    /// Fails up front only when no gateway is configured; individual send
    /// failures are returned per customer.
    pub fn send_dues(&self) -> Result<Vec<(String, Money, Result<SmsReceipt, SmsError>)>, SmsError> {
        let gateway = self.gateway()?;
        let sent = dues::customers_with_dues(&self.store)
            .into_iter()
            .map(|(name, phone, due)| {
                let result = gateway.send(&phone, &due_message(&name, due));
                if let Err(e) = &result {
                    tracing::warn!(name = %name, error = %e, "due reminder not sent");
                }
                (name, due, result)
            })
            .collect();
        Ok(sent)
    }
}
