//! Pattern extractor: free text to at most one structured command.
//!
//! Pure and allocation-light. The extractor never performs I/O and is safe
//! to share across tasks.

pub mod fields;
pub mod matchers;

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::portfolio::{AssetType, BondTerms, OptionTerms};

pub use fields::{extract_fields, ExtractedFields};
pub use matchers::{default_matchers, is_advisory, IntentHit, IntentMatcher, KeywordMatcher};

// ── Confidence policy ───────────────────────────────────────────────────────

pub const SHOW_CONFIDENCE: f64 = 0.9;
pub const REMOVE_CONFIDENCE: f64 = 0.9;
/// Add with both quantity and price.
pub const ADD_FULL_CONFIDENCE: f64 = 0.95;
/// Add with quantity but no price.
pub const ADD_QUANTITY_CONFIDENCE: f64 = 0.9;
pub const UPDATE_CONFIDENCE: f64 = 0.85;
/// A command missing something execution needs.
pub const INCOMPLETE_CONFIDENCE: f64 = 0.6;
/// Subtracted when a second action family also appears in the text.
pub const AMBIGUITY_PENALTY: f64 = 0.15;

/// Portfolio command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Remove,
    Update,
    Show,
}

impl Action {
    /// Whether the action changes portfolio state.
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Show)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Remove => write!(f, "remove"),
            Self::Update => write!(f, "update"),
            Self::Show => write!(f, "show"),
        }
    }
}

/// Tentative structured reading of one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandCandidate {
    pub action: Action,
    /// Uppercase ticker, never empty.
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_name: Option<String>,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<OptionTerms>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond: Option<BondTerms>,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Substring of the message the fields were read from.
    pub raw_match: String,
}

impl CommandCandidate {
    /// Candidate for a plain stock command, for callers that build commands
    /// without going through text.
    pub fn new(action: Action, symbol: impl Into<String>) -> Self {
        Self {
            action,
            symbol: symbol.into().to_uppercase(),
            quantity: None,
            avg_cost: None,
            portfolio_name: None,
            asset_type: AssetType::Stock,
            option: None,
            bond: None,
            confidence: 1.0,
            raw_match: String::new(),
        }
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_avg_cost(mut self, cost: Decimal) -> Self {
        self.avg_cost = Some(cost);
        self
    }

    pub fn in_portfolio(mut self, name: impl Into<String>) -> Self {
        self.portfolio_name = Some(name.into());
        self
    }
}

/// Base confidence for what was extracted, before any ambiguity penalty.
fn base_confidence(action: Action, fields: &ExtractedFields) -> f64 {
    match action {
        Action::Show => SHOW_CONFIDENCE,
        Action::Remove => REMOVE_CONFIDENCE,
        Action::Add if fields.quantity.is_none() || !fields.missing_terms().is_empty() => {
            INCOMPLETE_CONFIDENCE
        }
        Action::Add if fields.avg_cost.is_some() => ADD_FULL_CONFIDENCE,
        Action::Add => ADD_QUANTITY_CONFIDENCE,
        Action::Update if fields.quantity.is_none() && fields.avg_cost.is_none() => {
            INCOMPLETE_CONFIDENCE
        }
        Action::Update => UPDATE_CONFIDENCE,
    }
}

/// Ordered matcher set plus field extraction.
pub struct PatternExtractor {
    matchers: Vec<Box<dyn IntentMatcher>>,
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self::with_matchers(default_matchers())
    }

    /// Use a custom matcher list. Order is the tie-break order.
    pub fn with_matchers(matchers: Vec<Box<dyn IntentMatcher>>) -> Self {
        Self { matchers }
    }

    /// Classify one message. Returns `None` when no action keyword is found,
    /// when the message asks for advice, or when no ticker can be read.
    pub fn classify(&self, text: &str) -> Option<CommandCandidate> {
        if is_advisory(text) {
            debug!("advisory phrasing, no command candidate");
            return None;
        }

        let hits: Vec<IntentHit> = self.matchers.iter().filter_map(|m| m.find(text)).collect();
        // min_by_key keeps the first of equal keys, which is matcher order.
        let winner = *hits.iter().min_by_key(|h| h.start)?;
        let ambiguous = hits.iter().any(|h| h.action != winner.action);

        let fields = extract_fields(text, winner.start..winner.end);
        let Some(symbol) = fields.symbol.clone() else {
            debug!(action = %winner.action, "no symbol found, no command candidate");
            return None;
        };

        let mut confidence = base_confidence(winner.action, &fields);
        if ambiguous {
            confidence -= AMBIGUITY_PENALTY;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        let start = fields.spans.iter().map(|r| r.start).min().unwrap_or(winner.start);
        let end = fields.spans.iter().map(|r| r.end).max().unwrap_or(winner.end);
        let raw_match = text.get(start..end).unwrap_or_default().trim().to_string();

        debug!(
            action = %winner.action,
            symbol = %symbol,
            confidence,
            ambiguous,
            "command candidate extracted"
        );

        Some(CommandCandidate {
            action: winner.action,
            symbol,
            quantity: fields.quantity,
            avg_cost: fields.avg_cost,
            portfolio_name: fields.portfolio_name,
            asset_type: fields.asset_type,
            option: fields.option,
            bond: fields.bond,
            confidence,
            raw_match,
        })
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}
