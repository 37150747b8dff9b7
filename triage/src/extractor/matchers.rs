//! Ordered intent matchers.
//!
//! Each matcher owns one action family and reports the earliest place its
//! keywords occur. The extractor runs all of them and keeps the hit that
//! starts first in the text; equal offsets go to the matcher listed first.

use std::sync::LazyLock;

use regex::Regex;

use super::Action;

static ADD_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:add|buy|bought|purchased?|acquire)\b").unwrap()
});

// Plain "sell" is deliberately absent: partial sells have no command.
static REMOVE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:remove|delete|sell\s+all|sell\s+everything|sell\s+my\s+entire|sell\s+off|dump|get\s+rid\s+of)\b",
    )
    .unwrap()
});

static UPDATE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:update|set|change|modify|adjust|correct)\b").unwrap()
});

static SHOW_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:show|display|view|list|how\s+much|how\s+many|what\s+is\s+my|what'?s\s+my)\b")
        .unwrap()
});

/// Phrasing that asks for an opinion rather than issuing a command.
static ADVISORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:should\s+(?:i|we)|would\s+you|recommend\w*|advice|advise|best\s+way|what\s+do\s+you\s+think|is\s+it\s+a\s+good|worth\s+buying)\b",
    )
    .unwrap()
});

/// Single-word action keywords, used to keep them out of symbol fallback.
pub(crate) const KEYWORD_WORDS: &[&str] = &[
    "add", "buy", "bought", "purchase", "purchased", "acquire", "remove", "delete", "sell",
    "dump", "update", "set", "change", "modify", "adjust", "correct", "show", "display", "view",
    "list",
];

/// Where an action keyword was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentHit {
    pub action: Action,
    /// Byte offset of the keyword in the original text.
    pub start: usize,
    pub end: usize,
}

/// One action family.
pub trait IntentMatcher: Send + Sync {
    fn action(&self) -> Action;

    /// Earliest keyword occurrence for this family, if any.
    fn find(&self, text: &str) -> Option<IntentHit>;
}

/// Matcher backed by a keyword alternation.
pub struct KeywordMatcher {
    action: Action,
    pattern: &'static Regex,
}

impl KeywordMatcher {
    pub fn new(action: Action, pattern: &'static Regex) -> Self {
        Self { action, pattern }
    }
}

impl IntentMatcher for KeywordMatcher {
    fn action(&self) -> Action {
        self.action
    }

    fn find(&self, text: &str) -> Option<IntentHit> {
        self.pattern.find(text).map(|m| IntentHit {
            action: self.action,
            start: m.start(),
            end: m.end(),
        })
    }
}

/// The built-in families in tie-break order.
pub fn default_matchers() -> Vec<Box<dyn IntentMatcher>> {
    vec![
        Box::new(KeywordMatcher::new(Action::Add, &ADD_KEYWORDS)),
        Box::new(KeywordMatcher::new(Action::Remove, &REMOVE_KEYWORDS)),
        Box::new(KeywordMatcher::new(Action::Update, &UPDATE_KEYWORDS)),
        Box::new(KeywordMatcher::new(Action::Show, &SHOW_KEYWORDS)),
    ]
}

pub fn is_advisory(text: &str) -> bool {
    ADVISORY.is_match(text)
}
