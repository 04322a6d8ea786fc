//! Maps free text (typed or recognised speech) to a fixed set of actions.

use crate::resolver::looks_like_code;

/// Main-menu actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    View,
    Add,
    Exit,
    RegisterFace,
    OpenByFace,
    SendDues,
    OpenCode,
    RegisterFingerprint,
}

/// Keywords per intent, checked in this order by substring containment.
/// Hindi/Hinglish words are what shopkeepers actually say.
const KEYWORDS: &[(Intent, &[&str])] = &[
    (Intent::View, &["view", "dikha", "dekha", "view profile", "viewprofile"]),
    (Intent::Add, &["add", "transaction", "add transaction", "daala"]),
    (Intent::Exit, &["exit", "quit", "band", "niklo"]),
    (Intent::RegisterFace, &["register_face", "face register"]),
    (Intent::OpenByFace, &["open_by_face", "scan face", "scanface"]),
    (Intent::SendDues, &["send_dues", "due sms", "notify dues"]),
    (Intent::OpenCode, &["opencode", "code", "open code", "quick code"]),
    (
        Intent::RegisterFingerprint,
        &["register_fingerprint", "fingerprint register"],
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Intent(Intent),
    /// Bare 4–6 digit input: try it as a quick code.
    QuickCode(String),
    Unrecognized,
}

/// First intent whose keyword list has a substring of `text` wins.
pub fn match_intent(text: &str) -> Option<Intent> {
    let text = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, kws)| kws.iter().any(|kw| text.contains(kw)))
        .map(|(intent, _)| *intent)
}

pub fn route(text: &str) -> Route {
    if let Some(intent) = match_intent(text) {
        return Route::Intent(intent);
    }
    let raw = text.trim();
    if looks_like_code(raw) {
        Route::QuickCode(raw.to_string())
    } else {
        Route::Unrecognized
    }
}

/// Choices inside a customer's profile menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileChoice {
    AddTransaction,
    ClearDue,
    RegisterFace,
    RegisterFingerprint,
    History,
    Back,
}

impl ProfileChoice {
    pub const MENU: &'static [(&'static str, &'static str)] = &[
        ("1", "Add transaction (naya saman + payment)"),
        ("2", "Clear due (ek click me baki clear, record banega)"),
        ("3", "Register / Update face"),
        ("4", "Register / Update fingerprint (if device configured)"),
        ("5", "Show full history"),
        ("6", "Back to main menu"),
    ];

    /// Exact match on the number or one of the accepted words.
    pub fn parse(input: &str) -> Option<Self> {
        let choice = input.trim().to_lowercase();
        let parsed = match choice.as_str() {
            "1" | "add" | "add transaction" => Self::AddTransaction,
            "2" | "clear" | "clear due" | "due clear" => Self::ClearDue,
            "3" | "register face" | "face" => Self::RegisterFace,
            "4" | "register fingerprint" | "fingerprint" => Self::RegisterFingerprint,
            "5" | "history" | "show" => Self::History,
            "6" | "back" | "b" => Self::Back,
            _ => return None,
        };
        Some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_route_to_intents() {
        assert_eq!(route("view"), Route::Intent(Intent::View));
        assert_eq!(route("Ravi ka khata dikha"), Route::Intent(Intent::View));
        assert_eq!(route("ADD"), Route::Intent(Intent::Add));
        assert_eq!(route("band karo"), Route::Intent(Intent::Exit));
        assert_eq!(route("scan face"), Route::Intent(Intent::OpenByFace));
        assert_eq!(route("register_face"), Route::Intent(Intent::RegisterFace));
        assert_eq!(route("due sms"), Route::Intent(Intent::SendDues));
        assert_eq!(route("quick code"), Route::Intent(Intent::OpenCode));
        assert_eq!(route("fingerprint register"), Route::Intent(Intent::RegisterFingerprint));
    }

    #[test]
    fn test_table_order_breaks_overlaps() {
        // "view" is checked before "add"/"transaction".
        assert_eq!(route("view transaction"), Route::Intent(Intent::View));
        // "add" is checked before "code".
        assert_eq!(route("add code"), Route::Intent(Intent::Add));
    }

    #[test]
    fn test_digit_fallback() {
        assert_eq!(route(" 3210 "), Route::QuickCode("3210".into()));
        assert_eq!(route("654321"), Route::QuickCode("654321".into()));
        assert_eq!(route("321"), Route::Unrecognized);
        assert_eq!(route("7654321"), Route::Unrecognized);
        assert_eq!(route("hello"), Route::Unrecognized);
        assert_eq!(route(""), Route::Unrecognized);
    }

    #[test]
    fn test_profile_choice() {
        assert_eq!(ProfileChoice::parse("1"), Some(ProfileChoice::AddTransaction));
        assert_eq!(ProfileChoice::parse(" Clear Due "), Some(ProfileChoice::ClearDue));
        assert_eq!(ProfileChoice::parse("face"), Some(ProfileChoice::RegisterFace));
        assert_eq!(ProfileChoice::parse("b"), Some(ProfileChoice::Back));
        assert_eq!(ProfileChoice::parse("7"), None);
        assert_eq!(ProfileChoice::MENU.len(), 6);
    }
}
