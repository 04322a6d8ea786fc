//! Identity resolution: who is this customer?
//!
//! A customer can be named, identified by quick code, or recognised from a
//! live face capture. Face capture sessions are bounded by a wall-clock
//! timeout and always scan the full gallery as it stands at call time.

use crate::capture::{CaptureError, FaceSource};
use crate::error::LedgerError;
use crate::ledger::{canonical_name, LedgerStore};
use crate::matcher::{EuclideanMatcher, GalleryEntry, MatchResult, Matcher, DEFAULT_MATCH_THRESHOLD};
use crate::quick_code::find_by_quick_code;
use crate::types::Embedding;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ENROLL_TIMEOUT: Duration = Duration::from_secs(12);

/// Outcome of a face scan.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceLookup {
    Matched { name: String, distance: f64 },
    /// Timed out, cancelled, or nobody within the threshold.
    NoMatch,
    /// Nobody has a face on file; the camera was never opened.
    NoEnrolled,
}

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("no face detected before the capture ended")]
    NoFaceDetected,
}

/// True for input that looks like a spoken/typed quick code: 4 to 6 ASCII digits.
pub fn looks_like_code(token: &str) -> bool {
    let token = token.trim();
    (4..=6).contains(&token.len()) && token.chars().all(|c| c.is_ascii_digit())
}

pub struct IdentityResolver<M: Matcher = EuclideanMatcher> {
    matcher: M,
    threshold: f64,
    scan_timeout: Duration,
    enroll_timeout: Duration,
}

impl Default for IdentityResolver<EuclideanMatcher> {
    fn default() -> Self {
        Self::new(EuclideanMatcher)
    }
}

impl<M: Matcher> IdentityResolver<M> {
    pub fn new(matcher: M) -> Self {
        Self {
            matcher,
            threshold: DEFAULT_MATCH_THRESHOLD,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            enroll_timeout: DEFAULT_ENROLL_TIMEOUT,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_enroll_timeout(mut self, timeout: Duration) -> Self {
        self.enroll_timeout = timeout;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Case-normalized exact name lookup; returns the canonical name.
    pub fn by_name(&self, store: &LedgerStore, raw: &str) -> Option<String> {
        let name = canonical_name(raw);
        store.contains(&name).then_some(name)
    }

    /// All customers holding `code`; callers take the first.
    pub fn by_code(&self, store: &LedgerStore, code: &str) -> Vec<String> {
        find_by_quick_code(store, code)
    }

    /// A typed or spoken token: a code-shaped token is tried as a quick code
    /// first, then everything falls back to a name lookup.
    pub fn resolve_token(&self, store: &LedgerStore, token: &str) -> Option<String> {
        if looks_like_code(token) {
            if let Some(name) = self.by_code(store, token).into_iter().next() {
                return Some(name);
            }
        }
        self.by_name(store, token)
    }

    /// Match one embedding against every enrolled customer.
    pub fn by_embedding(&self, store: &LedgerStore, probe: &Embedding) -> MatchResult {
        let gallery: Vec<GalleryEntry<'_>> = store.gallery().into_iter().map(GalleryEntry::from).collect();
        self.matcher.compare(probe, &gallery, self.threshold)
    }

    /// Run a capture session until a face matches, the source ends, or the
    /// scan timeout elapses.
    pub fn scan(&self, store: &LedgerStore, source: &mut dyn FaceSource) -> Result<FaceLookup, CaptureError> {
        let gallery: Vec<GalleryEntry<'_>> = store.gallery().into_iter().map(GalleryEntry::from).collect();
        if gallery.is_empty() {
            tracing::info!("scan skipped: no enrolled faces");
            return Ok(FaceLookup::NoEnrolled);
        }

        let deadline = Instant::now() + self.scan_timeout;
        let mut frames = 0usize;
        let mut best_distance: Option<f64> = None;

        while Instant::now() < deadline {
            let Some(frame) = source.next_frame(deadline)? else {
                tracing::debug!(frames, "capture ended before a match");
                break;
            };
            frames += 1;

            for face in &frame.faces {
                let result = self.matcher.compare(face, &gallery, self.threshold);
                if let Some(d) = result.distance {
                    best_distance = Some(best_distance.map_or(d, |b: f64| b.min(d)));
                }
                if let (true, Some(name), Some(distance)) = (result.matched, result.name, result.distance) {
                    tracing::info!(name = %name, distance, frames, "face matched");
                    return Ok(FaceLookup::Matched { name, distance });
                }
            }
        }

        tracing::info!(
            frames,
            best_distance = ?best_distance,
            threshold = self.threshold,
            enrolled = gallery.len(),
            "no face match"
        );
        Ok(FaceLookup::NoMatch)
    }

    /// Capture the first detected face within the enrollment timeout and
    /// store it for `name`, replacing any previous embedding.
    pub fn enroll(
        &self,
        store: &mut LedgerStore,
        name: &str,
        source: &mut dyn FaceSource,
    ) -> Result<(), EnrollError> {
        if canonical_name(name).is_empty() {
            return Err(LedgerError::EmptyName.into());
        }

        let deadline = Instant::now() + self.enroll_timeout;
        while Instant::now() < deadline {
            let Some(frame) = source.next_frame(deadline)? else {
                break;
            };
            if let Some(face) = frame.faces.into_iter().next() {
                store.set_face(name, face, frame.snapshot)?;
                return Ok(());
            }
        }

        tracing::info!(name = %canonical_name(name), "enrollment found no face");
        Err(EnrollError::NoFaceDetected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CapturedFrame, ScriptedSource};
    use crate::ledger::ProfileUpdate;
    use crate::quick_code::assign_quick_code;

    fn emb(values: &[f64]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    fn frame(faces: &[&[f64]]) -> CapturedFrame {
        CapturedFrame {
            faces: faces.iter().map(|f| emb(f)).collect(),
            snapshot: None,
        }
    }

    fn resolver() -> IdentityResolver {
        IdentityResolver::default()
    }

    fn gallery_store() -> LedgerStore {
        let mut store = LedgerStore::in_memory();
        store.set_face("A", emb(&[0.0, 0.0]), None).unwrap();
        store.set_face("B", emb(&[1.0, 1.0]), None).unwrap();
        store
    }

    #[test]
    fn test_looks_like_code() {
        assert!(looks_like_code("3210"));
        assert!(looks_like_code(" 543210 "));
        assert!(!looks_like_code("321"));
        assert!(!looks_like_code("6543210"));
        assert!(!looks_like_code("32a0"));
    }

    #[test]
    fn test_by_embedding_distances() {
        let mut store = LedgerStore::in_memory();
        store.set_face("A", emb(&[0.40, 0.0]), None).unwrap();
        store.set_face("B", emb(&[0.0, 0.70]), None).unwrap();
        let resolver = resolver();

        let hit = resolver.by_embedding(&store, &emb(&[0.0, 0.0]));
        assert_eq!(hit.name.as_deref(), Some("A"));

        let mut store = LedgerStore::in_memory();
        store.set_face("A", emb(&[0.60, 0.0]), None).unwrap();
        store.set_face("B", emb(&[0.0, 0.70]), None).unwrap();
        let miss = resolver.by_embedding(&store, &emb(&[0.0, 0.0]));
        assert!(!miss.matched);
    }

    #[test]
    fn test_scan_without_enrolled_faces_skips_capture() {
        let mut store = LedgerStore::in_memory();
        store.upsert("Ravi", ProfileUpdate::default()).unwrap();
        let mut source = ScriptedSource::new([frame(&[&[0.0, 0.0]])]);

        let lookup = resolver().scan(&store, &mut source).unwrap();
        assert_eq!(lookup, FaceLookup::NoEnrolled);
        assert_eq!(source.pulled(), 0);
    }

    #[test]
    fn test_scan_matches_across_frames() {
        let store = gallery_store();
        let mut source = ScriptedSource::new([
            frame(&[]),
            frame(&[&[5.0, 5.0]]),
            frame(&[&[3.0, 3.0], &[0.9, 1.1]]),
            frame(&[&[0.0, 0.0]]),
        ]);

        let lookup = resolver().scan(&store, &mut source).unwrap();
        match lookup {
            FaceLookup::Matched { name, distance } => {
                assert_eq!(name, "B");
                assert!(distance < 0.55);
            }
            other => panic!("expected match, got {other:?}"),
        }
        assert_eq!(source.pulled(), 3);
    }

    #[test]
    fn test_scan_source_ends_without_match() {
        let store = gallery_store();
        let mut source = ScriptedSource::new([frame(&[&[5.0, 5.0]])]);
        let lookup = resolver().scan(&store, &mut source).unwrap();
        assert_eq!(lookup, FaceLookup::NoMatch);
    }

    #[test]
    fn test_scan_respects_timeout() {
        let store = gallery_store();
        let mut source = ScriptedSource::new([frame(&[&[0.0, 0.0]])]);
        let resolver = resolver().with_scan_timeout(Duration::ZERO);
        assert_eq!(resolver.scan(&store, &mut source).unwrap(), FaceLookup::NoMatch);
        assert_eq!(source.pulled(), 0);
    }

    #[test]
    fn test_scan_sees_new_enrollments() {
        let mut store = gallery_store();
        let resolver = resolver();
        let probe = [9.0f64, 9.0];

        let mut source = ScriptedSource::new([frame(&[&probe])]);
        assert_eq!(resolver.scan(&store, &mut source).unwrap(), FaceLookup::NoMatch);

        store.set_face("C", emb(&probe), None).unwrap();
        let mut source = ScriptedSource::new([frame(&[&probe])]);
        assert!(matches!(
            resolver.scan(&store, &mut source).unwrap(),
            FaceLookup::Matched { name, .. } if name == "C"
        ));
    }

    #[test]
    fn test_enroll_stores_first_face_and_snapshot() {
        let mut store = LedgerStore::in_memory();
        store.upsert("Ravi", ProfileUpdate::default()).unwrap();
        let mut source = ScriptedSource::new([
            frame(&[]),
            CapturedFrame {
                faces: vec![emb(&[0.1, 0.2]), emb(&[0.9, 0.9])],
                snapshot: Some("faces/Ravi.jpg".into()),
            },
        ]);

        resolver().enroll(&mut store, "ravi", &mut source).unwrap();
        let record = store.get("Ravi").unwrap();
        assert_eq!(record.face_embedding, Some(emb(&[0.1, 0.2])));
        assert_eq!(record.photo_reference, "faces/Ravi.jpg");
    }

    #[test]
    fn test_enroll_without_face() {
        let mut store = LedgerStore::in_memory();
        let mut source = ScriptedSource::new([frame(&[]), frame(&[])]);
        let err = resolver()
            .enroll(&mut store, "Ravi", &mut source)
            .unwrap_err();
        assert!(matches!(err, EnrollError::NoFaceDetected));
        assert!(store.get("Ravi").is_none());
    }

    #[test]
    fn test_resolve_token_prefers_code_then_name() {
        let mut store = LedgerStore::in_memory();
        assign_quick_code(&mut store, "Ravi", "9876543210").unwrap();
        store.upsert("1234", ProfileUpdate::default()).unwrap();
        let resolver = resolver();

        assert_eq!(resolver.resolve_token(&store, " 3210 ").as_deref(), Some("Ravi"));
        assert_eq!(resolver.resolve_token(&store, "RAVI").as_deref(), Some("Ravi"));
        // Code-shaped but unassigned: falls back to the name.
        assert_eq!(resolver.resolve_token(&store, "1234").as_deref(), Some("1234"));
        assert_eq!(resolver.resolve_token(&store, "Sita"), None);
    }
}
