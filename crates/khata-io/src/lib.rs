//! khata-io — Collaborators around the ledger core.
//!
//! Face capture via an external extractor process, speech via external
//! recogniser/synthesiser programs, and SMS reminders via Fast2SMS.

pub mod capture;
pub mod sms;
pub mod speech;

pub use capture::{CaptureMode, CommandFaceSource, FaceCommand};
pub use sms::{due_message, Fast2Sms, Fast2SmsConfig, SmsError, SmsGateway, SmsReceipt};
pub use speech::{CommandListener, CommandSpeaker, ConsoleSpeaker, Listener, NoListener, Speaker};
