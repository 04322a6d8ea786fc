//! Interactive shell: main menu, profile menu, voice fallback.
//!
//! Every prompt reads a typed line first. An empty line falls back to the
//! speech recogniser; empty recognised text is "no input". End of input
//! ends the session.

use crate::app::{App, OrderFailure};
use khata_core::capture::CaptureError;
use khata_core::dues::{self, Clearance};
use khata_core::resolver::EnrollError;
use khata_core::router::{route, Intent, ProfileChoice, Route};
use khata_core::{canonical_name, FaceLookup, LedgerError, Money};
use khata_io::{Listener, SmsError, Speaker};
use std::collections::BTreeSet;
use std::io::{BufRead, Write};

const MAIN_PROMPT: &str = "Command (view / add / open_code / open_by_face / register_face / register_fingerprint / send_dues / exit): ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Collaborators that can be missing for a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Capability {
    Voice,
    Face,
    Sms,
    Fingerprint,
}

pub struct Session<'a, R> {
    app: &'a mut App,
    input: R,
    speaker: Box<dyn Speaker>,
    listener: Box<dyn Listener>,
    reported: BTreeSet<Capability>,
}

impl<'a, R: BufRead> Session<'a, R> {
    pub fn new(app: &'a mut App, input: R, speaker: Box<dyn Speaker>, listener: Box<dyn Listener>) -> Self {
        Self {
            app,
            input,
            speaker,
            listener,
            reported: BTreeSet::new(),
        }
    }

    pub fn run(&mut self) {
        self.speaker.say("Namaste! Khata taiyar hai.");
        loop {
            let Some(text) = self.ask(MAIN_PROMPT) else {
                break;
            };
            if text.is_empty() {
                self.speaker.say("Kuch suna nahi. Phir se boliye.");
                continue;
            }

            let flow = match route(&text) {
                Route::Intent(Intent::Exit) => Flow::Quit,
                Route::Intent(Intent::View) => self.view(),
                Route::Intent(Intent::Add) => self.add_customer(),
                Route::Intent(Intent::OpenCode) => self.open_code(),
                Route::Intent(Intent::OpenByFace) => self.open_by_face(),
                Route::Intent(Intent::RegisterFace) => self.register_face_for_named(),
                Route::Intent(Intent::RegisterFingerprint) => self.register_fingerprint(None),
                Route::Intent(Intent::SendDues) => {
                    self.send_dues();
                    Flow::Continue
                }
                Route::QuickCode(code) => self.open_by_code(&code),
                Route::Unrecognized => {
                    self.speaker.say("Samajh nahi aaya. Phir se boliye.");
                    Flow::Continue
                }
            };
            if flow == Flow::Quit {
                break;
            }
        }
        self.speaker.say("Alvida!");
    }

    /// Prompt, then read a typed line or fall back to voice. `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => {
                println!();
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "cannot read input; ending session");
                return None;
            }
        }

        let typed = line.trim();
        if !typed.is_empty() {
            return Some(typed.to_string());
        }
        if self.listener.is_available() {
            Some(self.listener.listen())
        } else {
            self.notice(Capability::Voice, "Voice input not configured; please type.");
            Some(String::new())
        }
    }

    /// Report a missing collaborator, once per session.
    fn notice(&mut self, capability: Capability, text: &str) {
        if self.reported.insert(capability) {
            self.speaker.say(text);
        }
    }

    fn view(&mut self) -> Flow {
        let Some(token) = self.ask("Customer name or quick code: ") else {
            return Flow::Quit;
        };
        if token.is_empty() {
            self.speaker.say("Koi input nahi mila.");
            return Flow::Continue;
        }
        match self.app.resolver.resolve_token(&self.app.store, &token) {
            Some(name) => self.profile(&name),
            None => {
                self.speaker.say(&format!("Customer nahi mila: {token}"));
                Flow::Continue
            }
        }
    }

    fn open_code(&mut self) -> Flow {
        let Some(code) = self.ask("Quick code: ") else {
            return Flow::Quit;
        };
        if code.is_empty() {
            self.speaker.say("Koi input nahi mila.");
            return Flow::Continue;
        }
        self.open_by_code(&code)
    }

    fn open_by_code(&mut self, code: &str) -> Flow {
        match self.app.resolver.by_code(&self.app.store, code).into_iter().next() {
            Some(name) => self.profile(&name),
            None => {
                self.speaker.say(&format!("Is code ka koi customer nahi: {code}"));
                Flow::Continue
            }
        }
    }

    fn add_customer(&mut self) -> Flow {
        let Some(raw) = self.ask("Customer name: ") else {
            return Flow::Quit;
        };
        let name = canonical_name(&raw);
        if name.is_empty() {
            self.speaker.say("Naam khali hai.");
            return Flow::Continue;
        }
        if self.app.store.contains(&name) {
            return self.profile(&name);
        }

        let Some(phone) = self.ask("Phone: ") else {
            return Flow::Quit;
        };
        let Some(address) = self.ask("Address: ") else {
            return Flow::Quit;
        };
        let Some(notes) = self.ask("Notes: ") else {
            return Flow::Quit;
        };

        match self.app.register_customer(&name, &phone, &address, &notes) {
            Ok((_, code)) => {
                self.speaker
                    .say(&format!("Naya customer {name} ban gaya. Quick code: {code}"));
                self.profile(&name)
            }
            Err(e) => {
                self.speaker.say(&format!("Customer save nahi hua: {e}"));
                Flow::Continue
            }
        }
    }

    fn open_by_face(&mut self) -> Flow {
        match self.app.scan_face() {
            Ok(FaceLookup::Matched { name, .. }) => {
                self.speaker.say(&format!("Pehchaan liya: {name}"));
                self.profile(&name)
            }
            Ok(FaceLookup::NoMatch) => {
                self.speaker.say("Koi match nahi mila.");
                Flow::Continue
            }
            Ok(FaceLookup::NoEnrolled) => {
                self.speaker.say("Abhi tak koi face registered nahi hai.");
                Flow::Continue
            }
            Err(e) => {
                self.capture_failed(&e);
                Flow::Continue
            }
        }
    }

    fn capture_failed(&mut self, error: &CaptureError) {
        match error {
            CaptureError::Unavailable(reason) => {
                self.notice(Capability::Face, &format!("Face features disabled: {reason}"));
            }
            other => self.speaker.say(&format!("Face capture failed: {other}")),
        }
    }

    fn register_face_for_named(&mut self) -> Flow {
        if !self.app.has_face_capture() {
            self.capture_failed(&CaptureError::Unavailable(
                "face capture not configured (set KHATA_FACE_COMMAND)".into(),
            ));
            return Flow::Continue;
        }
        let Some(raw) = self.ask("Customer name: ") else {
            return Flow::Quit;
        };
        if canonical_name(&raw).is_empty() {
            self.speaker.say("Naam khali hai.");
            return Flow::Continue;
        }
        self.register_face(&canonical_name(&raw));
        Flow::Continue
    }

    fn register_face(&mut self, name: &str) {
        self.speaker.say("Camera ki taraf dekhiye...");
        match self.app.enroll_face(name) {
            Ok(()) => self.speaker.say(&format!("{name} ka face save ho gaya.")),
            Err(EnrollError::NoFaceDetected) => self.speaker.say("Koi face nahi dikha. Phir koshish kijiye."),
            Err(EnrollError::Capture(e)) => self.capture_failed(&e),
            Err(EnrollError::Ledger(e)) => self.speaker.say(&format!("Face save nahi hua: {e}")),
        }
    }

    fn register_fingerprint(&mut self, name: Option<&str>) -> Flow {
        if !self.app.has_fingerprint() {
            let backend = self.app.fingerprint_backend().to_string();
            self.notice(
                Capability::Fingerprint,
                &format!("Fingerprint device not configured (backend: {backend})."),
            );
            return Flow::Continue;
        }
        let name = match name {
            Some(name) => name.to_string(),
            None => match self.ask("Customer name: ") {
                Some(raw) => canonical_name(&raw),
                None => return Flow::Quit,
            },
        };
        if self.app.register_fingerprint(&name) {
            self.speaker.say(&format!("{name} ka fingerprint save ho gaya."));
        } else {
            self.speaker.say("Fingerprint register nahi hua.");
        }
        Flow::Continue
    }

    fn send_dues(&mut self) {
        match self.app.send_dues() {
            Err(SmsError::NotConfigured) => {
                self.notice(Capability::Sms, "SMS not configured; reminders disabled.");
            }
            Err(e) => self.speaker.say(&format!("SMS failed: {e}")),
            Ok(sent) if sent.is_empty() => self.speaker.say("Kisi ka due baki nahi hai."),
            Ok(sent) => {
                for (name, due, result) in sent {
                    match result {
                        Ok(_) => self.speaker.say(&format!("{name} ko SMS bheja ({due} rupaye).")),
                        Err(e) => self.speaker.say(&format!("{name} ko SMS nahi gaya: {e}")),
                    }
                }
            }
        }
    }

    /// Remind `name` of `due` if they have a phone on file.
    fn notify(&mut self, name: &str, due: Money) {
        match self.app.notify_due(name, due) {
            Ok(Some(_)) => self.speaker.say(&format!("{name} ko SMS bheja.")),
            Ok(None) => {}
            Err(SmsError::NotConfigured) => {
                self.notice(Capability::Sms, "SMS not configured; reminders disabled.");
            }
            Err(e) => self.speaker.say(&format!("SMS nahi gaya: {e}")),
        }
    }

    fn profile(&mut self, name: &str) -> Flow {
        loop {
            let due = match dues::total_due(&self.app.store, name) {
                Ok(due) => due,
                Err(e) => {
                    self.speaker.say(&e.to_string());
                    return Flow::Continue;
                }
            };
            self.speaker.say(&format!("{name}: kul baki {due} rupaye"));
            for (key, label) in ProfileChoice::MENU {
                println!("  {key}. {label}");
            }

            let Some(choice) = self.ask("Choice: ") else {
                return Flow::Quit;
            };
            let Some(choice) = ProfileChoice::parse(&choice) else {
                if choice.is_empty() {
                    self.speaker.say("Koi input nahi mila.");
                } else {
                    self.speaker.say("Galat choice.");
                }
                continue;
            };

            match choice {
                ProfileChoice::AddTransaction => {
                    if self.add_transaction(name) == Flow::Quit {
                        return Flow::Quit;
                    }
                }
                ProfileChoice::ClearDue => self.clear_due(name),
                ProfileChoice::RegisterFace => self.register_face(name),
                ProfileChoice::RegisterFingerprint => {
                    if self.register_fingerprint(Some(name)) == Flow::Quit {
                        return Flow::Quit;
                    }
                }
                ProfileChoice::History => self.history(name),
                ProfileChoice::Back => return Flow::Continue,
            }
        }
    }

    fn add_transaction(&mut self, name: &str) -> Flow {
        let Some(text) = self.ask("Saman aur payment (e.g. Maggi 2 Biscuit 1 50): ") else {
            return Flow::Quit;
        };
        if text.is_empty() {
            self.speaker.say("Koi input nahi mila.");
            return Flow::Continue;
        }

        match self.app.record_order(name, &text) {
            Ok(recorded) => {
                self.speaker.say(&format!(
                    "Record ho gaya: {}. Total {}, diya {}, baki {}.",
                    recorded.order.summary(),
                    recorded.order.total(),
                    recorded.transaction.amount_paid,
                    recorded.transaction.amount_due,
                ));
                if recorded.total_due.is_positive() {
                    self.notify(name, recorded.total_due);
                }
            }
            Err(OrderFailure::Ledger(LedgerError::Store(e))) => {
                self.speaker.say(&format!("Record hua par save nahi hua: {e}"));
            }
            Err(e) => self.speaker.say(&e.to_string()),
        }
        Flow::Continue
    }

    fn clear_due(&mut self, name: &str) {
        match self.app.clear_due(name) {
            Ok(Clearance::Cleared(amount)) => {
                self.speaker.say(&format!("{amount} rupaye ka due clear ho gaya."));
                self.notify(name, Money::ZERO);
            }
            Ok(Clearance::NothingDue(_)) => self.speaker.say("Koi due baki nahi hai."),
            Err(LedgerError::Store(e)) => {
                self.speaker.say(&format!("Due clear hua par save nahi hua: {e}"));
                self.notify(name, Money::ZERO);
            }
            Err(e) => self.speaker.say(&format!("Due clear nahi hua: {e}")),
        }
    }

    fn history(&mut self, name: &str) {
        let Some(record) = self.app.store.get(name) else {
            self.speaker.say(&LedgerError::NotFound(name.to_string()).to_string());
            return;
        };
        match serde_json::to_string_pretty(record) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!(error = %e, "cannot render history"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use khata_core::store::CustomerMap;
    use khata_core::{LedgerStore, MemoryStore, Persistence, StoreError};
    use khata_io::NoListener;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Collects every utterance.
    #[derive(Clone, Default)]
    struct Transcript(Rc<RefCell<Vec<String>>>);

    impl Speaker for Transcript {
        fn say(&self, text: &str) {
            self.0.borrow_mut().push(text.to_string());
        }
    }

    impl Transcript {
        fn lines(&self) -> Vec<String> {
            self.0.borrow().clone()
        }

        fn count(&self, needle: &str) -> usize {
            self.0.borrow().iter().filter(|l| l.contains(needle)).count()
        }
    }

    /// Scripted voice input.
    struct Voice(Vec<String>);

    impl Listener for Voice {
        fn is_available(&self) -> bool {
            true
        }

        fn listen(&mut self) -> String {
            if self.0.is_empty() {
                String::new()
            } else {
                self.0.remove(0)
            }
        }
    }

    /// Backend whose disk goes away once `failing` is set.
    struct FlakyDisk {
        failing: Rc<Cell<bool>>,
    }

    impl Persistence for FlakyDisk {
        fn load(&self) -> Result<CustomerMap, StoreError> {
            Ok(CustomerMap::new())
        }

        fn save(&self, _customers: &CustomerMap) -> Result<(), StoreError> {
            if self.failing.get() {
                return Err(StoreError::Io {
                    path: "customers.json".into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            Ok(())
        }
    }

    fn app() -> (App, MemoryStore) {
        let backend = MemoryStore::new();
        let store = LedgerStore::open(Box::new(backend.clone())).unwrap();
        (App::with_store(store), backend)
    }

    fn run(app: &mut App, script: &str) -> Transcript {
        run_with(app, script, Box::new(NoListener))
    }

    fn run_with(app: &mut App, script: &str, listener: Box<dyn Listener>) -> Transcript {
        let transcript = Transcript::default();
        Session::new(app, script.as_bytes(), Box::new(transcript.clone()), listener).run();
        transcript
    }

    #[test]
    fn test_add_customer_then_order_and_clear() {
        let (mut app, backend) = app();
        let transcript = run(
            &mut app,
            "add\nravi\n9876543210\nGali 4\n\n1\nMaggi 2 Biscuit 1 10\n2\n6\nexit\n",
        );

        let record = app.store.get("Ravi").unwrap();
        assert_eq!(record.quick_code.as_deref(), Some("3210"));
        assert_eq!(record.transactions.len(), 2);
        assert_eq!(record.total_due(), Money::ZERO);
        assert_eq!(transcript.count("Quick code: 3210"), 1);
        assert_eq!(transcript.count("30 rupaye ka due clear"), 1);
        assert!(backend.snapshot().contains_key("Ravi"));
    }

    #[test]
    fn test_quick_code_opens_profile() {
        let (mut app, _) = app();
        app.register_customer("Ravi", "9876543210", "", "").unwrap();

        let transcript = run(&mut app, "3210\n6\nexit\n");
        assert_eq!(transcript.count("Ravi: kul baki 0 rupaye"), 1);
    }

    #[test]
    fn test_view_unknown_customer_continues() {
        let (mut app, _) = app();
        let transcript = run(&mut app, "view\nNobody\nexit\n");
        assert_eq!(transcript.count("Customer nahi mila: Nobody"), 1);
        assert_eq!(transcript.lines().last().map(String::as_str), Some("Alvida!"));
    }

    #[test]
    fn test_bad_order_shows_example() {
        let (mut app, _) = app();
        app.register_customer("Ravi", "9876543210", "", "").unwrap();

        let transcript = run(&mut app, "view\nRavi\n1\nMaggi lots\n6\nexit\n");
        assert_eq!(transcript.count("Maggi 2 Biscuit 1 50"), 1);
        assert!(app.store.get("Ravi").unwrap().transactions.is_empty());
    }

    #[test]
    fn test_end_of_input_ends_session() {
        let (mut app, _) = app();
        app.register_customer("Ravi", "9876543210", "", "").unwrap();
        let transcript = run(&mut app, "view\nRavi\n");
        assert_eq!(transcript.lines().last().map(String::as_str), Some("Alvida!"));
    }

    #[test]
    fn test_capability_notices_once() {
        let (mut app, _) = app();
        let transcript = run(&mut app, "\n\nopen_by_face\nsend_dues\nsend_dues\nregister_face\nregister_fingerprint\nregister_fingerprint\nexit\n");

        assert_eq!(transcript.count("Voice input not configured"), 1);
        assert_eq!(transcript.count("SMS not configured"), 1);
        assert_eq!(transcript.count("Fingerprint device not configured"), 1);
        // No one is enrolled, so the scan never needed the camera.
        assert_eq!(transcript.count("koi face registered nahi"), 1);
        assert_eq!(transcript.count("Face features disabled"), 1);
    }

    #[test]
    fn test_empty_line_falls_back_to_voice() {
        let (mut app, _) = app();
        app.register_customer("Ravi", "9876543210", "", "").unwrap();

        let voice = Voice(vec!["dikhao".into(), "Ravi".into(), "back".into(), "band karo".into()]);
        let transcript = run_with(&mut app, "\n\n\n\n", Box::new(voice));
        assert_eq!(transcript.count("Ravi: kul baki"), 1);
        assert_eq!(transcript.count("Voice input not configured"), 0);
    }

    #[test]
    fn test_clear_due_reports_unsaved_clearance() {
        let failing = Rc::new(Cell::new(false));
        let store = LedgerStore::open(Box::new(FlakyDisk { failing: failing.clone() })).unwrap();
        let mut app = App::with_store(store);
        app.register_customer("Ravi", "9876543210", "", "").unwrap();
        app.record_order("Ravi", "Maggi 2 0").unwrap();
        failing.set(true);

        let transcript = run(&mut app, "view\nRavi\n2\n6\nexit\n");
        assert_eq!(transcript.count("Due clear hua par save nahi hua"), 1);
        assert_eq!(transcript.count("Due clear nahi hua"), 0);
        // The zero-due reminder is still attempted.
        assert_eq!(transcript.count("SMS not configured"), 1);
        assert_eq!(app.store.get("Ravi").unwrap().total_due(), Money::ZERO);
    }

    #[test]
    fn test_history_does_not_mutate() {
        let (mut app, backend) = app();
        app.register_customer("Ravi", "9876543210", "", "").unwrap();
        app.record_order("Ravi", "Maggi 1 0").unwrap();
        let saves = backend.save_count();

        run(&mut app, "view\nRavi\n5\nhistory\n6\nexit\n");
        assert_eq!(backend.save_count(), saves);
    }
}
