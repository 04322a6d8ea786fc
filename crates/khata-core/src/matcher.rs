//! Nearest-neighbour matching of a probe embedding against the gallery.

use crate::types::Embedding;

/// Default Euclidean distance threshold for a positive match (inclusive).
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.55;

/// One enrolled identity.
#[derive(Debug, Clone, Copy)]
pub struct GalleryEntry<'a> {
    pub name: &'a str,
    pub embedding: &'a Embedding,
}

impl<'a> From<(&'a str, &'a Embedding)> for GalleryEntry<'a> {
    fn from((name, embedding): (&'a str, &'a Embedding)) -> Self {
        Self { name, embedding }
    }
}

/// Result of matching a probe embedding against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance to the nearest comparable entry, `None` if nothing was comparable.
    pub distance: Option<f64>,
    /// Name of the matched customer (if any).
    pub name: Option<String>,
}

impl MatchResult {
    fn no_match(distance: Option<f64>) -> Self {
        Self {
            matched: false,
            distance,
            name: None,
        }
    }
}

/// Strategy for comparing a probe embedding against a gallery of enrolled faces.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry<'_>], threshold: f64) -> MatchResult;
}

/// Euclidean nearest-neighbour matcher.
///
/// Scans every entry on every call. On equal distances the earliest entry
/// wins. Entries of a different dimension than the probe, or with a
/// non-finite distance, are skipped.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry<'_>], threshold: f64) -> MatchResult {
        let mut best: Option<(usize, f64)> = None;

        for (i, entry) in gallery.iter().enumerate() {
            if entry.embedding.dim() != probe.dim() {
                tracing::debug!(
                    name = entry.name,
                    enrolled_dim = entry.embedding.dim(),
                    probe_dim = probe.dim(),
                    "skipping embedding from a different extractor"
                );
                continue;
            }
            let dist = probe.euclidean_distance(entry.embedding);
            if !dist.is_finite() {
                continue;
            }
            // Strict `<` keeps the first of equal minima.
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((i, dist));
            }
        }

        match best {
            Some((idx, dist)) if dist <= threshold => MatchResult {
                matched: true,
                distance: Some(dist),
                name: Some(gallery[idx].name.to_string()),
            },
            Some((_, dist)) => MatchResult::no_match(Some(dist)),
            None => MatchResult::no_match(None),
        }
    }
}
