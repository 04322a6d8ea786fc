//! Face capture through an external detector/extractor process.
//!
//! The process owns the camera. It writes one JSON object per video frame to
//! stdout:
//!
//! ```json
//! {"faces": [[0.01, -0.12, ...]], "snapshot": "faces/frame-0042.jpg"}
//! ```
//!
//! `faces` holds one embedding per detected face; `snapshot` is optional.
//! Closing stdout ends the session (the user pressed cancel). Stdout is read
//! on its own thread so a silent extractor cannot hold a session past its
//! deadline.

use khata_core::capture::{CaptureError, CapturedFrame, FaceSource};
use khata_core::Embedding;
use serde::Deserialize;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Instant;

#[derive(Deserialize)]
struct FrameLine {
    #[serde(default)]
    faces: Vec<Vec<f64>>,
    #[serde(default)]
    snapshot: Option<String>,
}

/// Parse one line of extractor output.
pub fn parse_frame_line(line: &str) -> Result<CapturedFrame, CaptureError> {
    let raw: FrameLine =
        serde_json::from_str(line).map_err(|e| CaptureError::Malformed(e.to_string()))?;
    Ok(CapturedFrame {
        faces: raw.faces.into_iter().map(Embedding::new).collect(),
        snapshot: raw.snapshot.filter(|s| !s.is_empty()),
    })
}

/// How to launch the extractor.
#[derive(Debug, Clone)]
pub struct FaceCommand {
    program: String,
    args: Vec<String>,
}

/// Purpose passed to the extractor as its last argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Identify a customer; snapshots are not needed.
    Scan,
    /// Register a face; the extractor should save a snapshot to the given path.
    Enroll,
}

impl FaceCommand {
    /// Split a shell-style command line on whitespace (no quoting).
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Spawn the extractor. `snapshot` is where an enrollment should save its image.
    pub fn start(&self, mode: CaptureMode, snapshot: Option<&Path>) -> Result<CommandFaceSource, CaptureError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        match mode {
            CaptureMode::Scan => {
                cmd.arg("scan");
            }
            CaptureMode::Enroll => {
                cmd.arg("enroll");
                if let Some(path) = snapshot {
                    cmd.arg(path);
                }
            }
        }

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| CaptureError::Unavailable(format!("{}: {e}", self.program)))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(CaptureError::Unavailable("extractor stdout not captured".into()));
        };
        let lines = match spawn_reader(stdout) {
            Ok(lines) => lines,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        tracing::info!(program = %self.program, ?mode, pid = child.id(), "face extractor started");
        Ok(CommandFaceSource { child, lines })
    }
}

/// Forward extractor stdout line by line until EOF, a read error, or the
/// receiving side hangs up.
fn spawn_reader(stdout: ChildStdout) -> io::Result<Receiver<io::Result<String>>> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("face-extractor-stdout".into())
        .spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// A running extractor process. Killed on drop.
pub struct CommandFaceSource {
    child: Child,
    lines: Receiver<io::Result<String>>,
}

impl FaceSource for CommandFaceSource {
    fn next_frame(&mut self, deadline: Instant) -> Result<Option<CapturedFrame>, CaptureError> {
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            let line = match self.lines.recv_timeout(wait) {
                Ok(line) => line?,
                Err(RecvTimeoutError::Timeout) => {
                    tracing::debug!(pid = self.child.id(), "no frame from face extractor before deadline");
                    return Ok(None);
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return parse_frame_line(line).map(Some);
        }
    }
}

impl Drop for CommandFaceSource {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::debug!(error = %e, "face extractor already exited");
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use khata_core::resolver::EnrollError;
    use khata_core::{FaceLookup, IdentityResolver, LedgerStore};
    use std::time::Duration;

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    /// Keeps the camera open but never reports a frame.
    fn silent_extractor() -> FaceCommand {
        FaceCommand {
            program: "sh".into(),
            args: vec!["-c".into(), "sleep 5".into()],
        }
    }

    #[test]
    fn test_parse_frame_line() {
        let frame = parse_frame_line(r#"{"faces": [[0.5, 0.25], [1.0, 0.0]], "snapshot": "faces/Ravi.jpg"}"#).unwrap();
        assert_eq!(frame.faces.len(), 2);
        assert_eq!(frame.faces[0], Embedding::new(vec![0.5, 0.25]));
        assert_eq!(frame.snapshot.as_deref(), Some("faces/Ravi.jpg"));
    }

    #[test]
    fn test_parse_frame_without_faces() {
        let frame = parse_frame_line(r#"{"snapshot": ""}"#).unwrap();
        assert!(frame.faces.is_empty());
        assert_eq!(frame.snapshot, None);
    }

    #[test]
    fn test_parse_malformed_frame() {
        assert!(matches!(
            parse_frame_line("[1, 2"),
            Err(CaptureError::Malformed(_))
        ));
    }

    #[test]
    fn test_face_command_parse() {
        assert!(FaceCommand::parse("   ").is_none());
        let cmd = FaceCommand::parse("python3 extractor.py --camera 0").unwrap();
        assert_eq!(cmd.program, "python3");
        assert_eq!(cmd.args, vec!["extractor.py", "--camera", "0"]);
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let cmd = FaceCommand::parse("/nonexistent/khata-face-extractor").unwrap();
        assert!(matches!(
            cmd.start(CaptureMode::Scan, None),
            Err(CaptureError::Unavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source_reads_frames() {
        let cmd = FaceCommand::parse("sh -c").unwrap();
        // `sh -c <script> scan`: the mode lands in $0 and is ignored.
        let cmd = FaceCommand {
            args: vec![
                "-c".into(),
                r#"printf '{"faces":[]}\n\n{"faces":[[0.1,0.2]]}\n'"#.into(),
            ],
            ..cmd
        };
        let mut source = cmd.start(CaptureMode::Scan, None).unwrap();
        assert_eq!(source.next_frame(soon()).unwrap().unwrap().faces.len(), 0);
        assert_eq!(
            source.next_frame(soon()).unwrap().unwrap().faces,
            vec![Embedding::new(vec![0.1, 0.2])]
        );
        assert!(source.next_frame(soon()).unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_extractor_returns_at_deadline() {
        let mut source = silent_extractor().start(CaptureMode::Scan, None).unwrap();
        let started = Instant::now();
        let frame = source
            .next_frame(started + Duration::from_millis(200))
            .unwrap();
        assert!(frame.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_times_out_on_silent_extractor() {
        let mut store = LedgerStore::in_memory();
        store.set_face("Ravi", Embedding::new(vec![0.1, 0.2]), None).unwrap();
        let resolver = IdentityResolver::default().with_scan_timeout(Duration::from_secs(1));
        let mut source = silent_extractor().start(CaptureMode::Scan, None).unwrap();

        let started = Instant::now();
        assert_eq!(resolver.scan(&store, &mut source).unwrap(), FaceLookup::NoMatch);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_enroll_times_out_on_silent_extractor() {
        let mut store = LedgerStore::in_memory();
        let resolver = IdentityResolver::default().with_enroll_timeout(Duration::from_secs(1));
        let mut source = silent_extractor().start(CaptureMode::Enroll, None).unwrap();

        let started = Instant::now();
        let err = resolver.enroll(&mut store, "Ravi", &mut source).unwrap_err();
        assert!(matches!(err, EnrollError::NoFaceDetected));
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(store.get("Ravi").is_none());
    }
}
