//! Fingerprint capability placeholder.
//!
//! No sensor SDK is integrated. The trait fixes the interface a vendor
//! backend would implement; [`NoFingerprint`] is the only backend.

pub trait FingerprintBackend {
    /// Human-readable backend name for capability notices.
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Store `template` for `name`. Returns whether enrollment succeeded.
    fn register(&mut self, name: &str, template: &[u8]) -> bool;

    /// Identify the owner of a captured print.
    fn identify(&mut self, capture: &[u8]) -> Option<String>;
}

/// Always unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFingerprint;

impl FingerprintBackend for NoFingerprint {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn register(&mut self, name: &str, _template: &[u8]) -> bool {
        tracing::debug!(name, "fingerprint registration requested without a sensor backend");
        false
    }

    fn identify(&mut self, _capture: &[u8]) -> Option<String> {
        None
    }
}
