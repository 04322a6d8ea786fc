//! Speech input and output collaborators.
//!
//! Recognition and synthesis run in external programs. Both are best effort:
//! a failed synthesis is logged and dropped, a failed recognition returns an
//! empty string which callers treat as "no input".

use std::io::Write;
use std::process::{Command, Stdio};

/// Renders text to the user.
pub trait Speaker {
    fn say(&self, text: &str);
}

/// Produces recognised text, or an empty string when nothing was heard.
pub trait Listener {
    fn is_available(&self) -> bool;
    fn listen(&mut self) -> String;
}

/// Prints every utterance to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSpeaker;

impl Speaker for ConsoleSpeaker {
    fn say(&self, text: &str) {
        println!("> {text}");
    }
}

/// Prints, then pipes the text to a TTS program's stdin (e.g. `espeak-ng --stdin`).
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    fn speak(&self, text: &str) -> std::io::Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        child.wait()?;
        Ok(())
    }
}

impl Speaker for CommandSpeaker {
    fn say(&self, text: &str) {
        ConsoleSpeaker.say(text);
        if let Err(e) = self.speak(text) {
            tracing::warn!(program = %self.program, error = %e, "speech output failed");
        }
    }
}

/// No recogniser configured; input is typed only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoListener;

impl Listener for NoListener {
    fn is_available(&self) -> bool {
        false
    }

    fn listen(&mut self) -> String {
        String::new()
    }
}

/// Runs a recogniser program with the spoken language as its last argument
/// and takes its trimmed stdout as the recognised text.
#[derive(Debug, Clone)]
pub struct CommandListener {
    program: String,
    args: Vec<String>,
    language: String,
}

impl CommandListener {
    pub fn parse(command_line: &str, language: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            language: language.to_string(),
        })
    }
}

impl Listener for CommandListener {
    fn is_available(&self) -> bool {
        true
    }

    fn listen(&mut self) -> String {
        println!("Listening...");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.language)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        match output {
            Ok(out) if out.status.success() => {
                let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if !text.is_empty() {
                    println!("You said: {text}");
                }
                text
            }
            Ok(out) => {
                tracing::debug!(status = ?out.status.code(), "recogniser heard nothing");
                String::new()
            }
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "speech input failed");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_listener_is_silent() {
        let mut listener = NoListener;
        assert!(!listener.is_available());
        assert_eq!(listener.listen(), "");
    }

    #[test]
    fn test_missing_recogniser_yields_empty() {
        let mut listener = CommandListener::parse("/nonexistent/khata-stt", "hi-IN").unwrap();
        assert_eq!(listener.listen(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_recogniser_output_is_trimmed() {
        // `sh -c 'echo ...' hi-IN`
        let mut listener = CommandListener {
            program: "sh".into(),
            args: vec!["-c".into(), "echo '  view  '".into()],
            language: "hi-IN".into(),
        };
        assert_eq!(listener.listen(), "view");
    }

    #[test]
    fn test_failed_synthesis_is_swallowed() {
        let speaker = CommandSpeaker::parse("/nonexistent/khata-tts").unwrap();
        speaker.say("namaste");
    }

    #[test]
    fn test_parse_rejects_blank_command() {
        assert!(CommandSpeaker::parse("").is_none());
        assert!(CommandListener::parse("  ", "hi-IN").is_none());
    }
}
