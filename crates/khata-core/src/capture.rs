//! Seam to the external face capture / embedding extractor.

use crate::types::Embedding;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    /// Camera or extractor not installed or not configured.
    #[error("face capture unavailable: {0}")]
    Unavailable(String),
    #[error("capture I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame from extractor: {0}")]
    Malformed(String),
}

/// Faces found in one video frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedFrame {
    /// One embedding per detected face, in detector order.
    pub faces: Vec<Embedding>,
    /// Reference to a stored still of this frame, if the collaborator saved one.
    pub snapshot: Option<String>,
}

/// A live capture session producing frames until it ends.
pub trait FaceSource {
    /// Block until the next frame is available or `deadline` passes.
    ///
    /// `Ok(None)` means the session ended: the user cancelled, the
    /// collaborator stopped producing frames, or the deadline passed first.
    fn next_frame(&mut self, deadline: Instant) -> Result<Option<CapturedFrame>, CaptureError>;
}

/// Replays a fixed list of frames. Useful for tests and offline replays.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    frames: std::collections::VecDeque<CapturedFrame>,
    pulled: usize,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = CapturedFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            pulled: 0,
        }
    }

    /// Number of frames handed out so far.
    pub fn pulled(&self) -> usize {
        self.pulled
    }
}

impl FaceSource for ScriptedSource {
    fn next_frame(&mut self, deadline: Instant) -> Result<Option<CapturedFrame>, CaptureError> {
        if Instant::now() >= deadline {
            return Ok(None);
        }
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.pulled += 1;
        }
        Ok(frame)
    }
}
