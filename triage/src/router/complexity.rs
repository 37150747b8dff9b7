//! Complexity analyzer for the frontend/backend routing tier.
//!
//! Scores a message on independent lexical signals and recommends where it
//! should be handled: locally in the frontend (greetings, help, reads,
//! guest-only edits) or by the backend (analysis, multi-step requests,
//! long messages, persisted edits).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Messages longer than this many words are sent to the backend.
pub const LONG_MESSAGE_WORDS: usize = 40;

/// Confidence when no signal fires.
pub const DEFAULT_FRONTEND_CONFIDENCE: f64 = 0.6;

const MUTATION_TERMS: &[&str] = &[
    "add", "buy", "bought", "purchase", "sell", "sold", "remove", "delete", "update", "set",
    "change", "modify", "adjust",
];

const CALCULATION_TERMS: &[&str] = &[
    "risk",
    "sharpe",
    "monte carlo",
    "diversif",
    "volatil",
    "value at risk",
    "var ",
    "beta",
    "correlation",
    "optimi",
    "rebalanc",
    "allocation",
    "return",
    "performance",
    "analy",
    "calculate",
    "projection",
    "forecast",
    "drawdown",
    "backtest",
];

const CONJUNCTIONS: &[&str] = &[" and ", " then ", " also ", " after that", " afterwards"];

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "thanks",
    "thank you",
    "good morning",
    "good afternoon",
    "good evening",
];

const HELP_TERMS: &[&str] = &["help", "what can you do", "how do i", "commands", "how does this work"];

const READ_TERMS: &[&str] = &[
    "show", "display", "view", "list", "how much", "how many", "what is my", "what's my",
];

/// Where a message should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteTarget {
    Frontend,
    Backend,
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frontend => write!(f, "frontend"),
            Self::Backend => write!(f, "backend"),
        }
    }
}

/// Kind of lexical evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexitySignal {
    PortfolioMutation,
    Calculation,
    MultiStep,
    Greeting,
    Help,
    ReadOnly,
    LongMessage,
}

impl ComplexitySignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PortfolioMutation => "portfolio_mutation",
            Self::Calculation => "calculation",
            Self::MultiStep => "multi_step",
            Self::Greeting => "greeting",
            Self::Help => "help",
            Self::ReadOnly => "read_only",
            Self::LongMessage => "long_message",
        }
    }
}

/// Session facts the analyzer may weigh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub is_guest_mode: bool,
    /// Messages already exchanged in this session.
    pub message_count: u32,
}

/// Inspectable explanation of a routing recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingReasoning {
    pub signals: Vec<ComplexitySignal>,
    /// Vocabulary that triggered the signals.
    pub matched_terms: Vec<String>,
    pub word_count: usize,
    /// 1 (trivial) to 5 (heavy).
    pub score: u8,
    pub rationale: String,
}

impl RoutingReasoning {
    pub fn has(&self, signal: ComplexitySignal) -> bool {
        self.signals.contains(&signal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityAnalysis {
    pub route_to: RouteTarget,
    pub confidence: f64,
    pub reasoning: RoutingReasoning,
}

impl ComplexityAnalysis {
    /// Compact summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "route={} confidence={:.2} score={}/5 signals={}",
            self.route_to,
            self.confidence,
            self.reasoning.score,
            self.reasoning.signals.len()
        )
    }
}

/// Stateless heuristic scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, text: &str, session: &SessionContext) -> ComplexityAnalysis {
        // Pad so phrase terms match at either end of the message.
        let lower = format!(" {} ", text.to_lowercase());
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();
        let word_count = words.len();

        let mut matched_terms = Vec::new();
        let mut find_words = |terms: &[&str]| {
            let hits: Vec<&str> = terms
                .iter()
                .copied()
                .filter(|t| words.contains(t))
                .collect();
            matched_terms.extend(hits.iter().map(|s| s.to_string()));
            hits.len()
        };
        let mutation_hits = find_words(MUTATION_TERMS);

        let mut find_phrases = |terms: &[&str]| {
            let hits: Vec<&str> = terms
                .iter()
                .copied()
                .filter(|t| lower.contains(t))
                .collect();
            matched_terms.extend(hits.iter().map(|s| s.trim().to_string()));
            !hits.is_empty()
        };
        let calculation = find_phrases(CALCULATION_TERMS);
        let help = find_phrases(HELP_TERMS);
        let read_only = find_phrases(READ_TERMS);
        let conjunction = CONJUNCTIONS.iter().any(|c| lower.contains(c));

        let greeting = word_count <= 5
            && GREETINGS.iter().any(|g| {
                if g.contains(' ') {
                    lower.contains(g)
                } else {
                    words.contains(g)
                }
            });
        let mutation = mutation_hits > 0;
        let multi_step = conjunction && ((mutation && calculation) || mutation_hits > 1);
        let long = word_count > LONG_MESSAGE_WORDS;

        let candidates: &[(bool, ComplexitySignal)] = &[
            (mutation, ComplexitySignal::PortfolioMutation),
            (calculation, ComplexitySignal::Calculation),
            (multi_step, ComplexitySignal::MultiStep),
            (greeting, ComplexitySignal::Greeting),
            (help, ComplexitySignal::Help),
            (read_only, ComplexitySignal::ReadOnly),
            (long, ComplexitySignal::LongMessage),
        ];
        let signals: Vec<ComplexitySignal> = candidates
            .iter()
            .filter(|(fired, _)| *fired)
            .map(|(_, s)| *s)
            .collect();

        // ── Scoring ──────────────────────────────────────────────────────────
        let mut score: u8 = 1;
        if calculation {
            score += 2;
        }
        if multi_step {
            score += 1;
        }
        if long {
            score += 1;
        }
        if mutation {
            score += 1;
        }
        let score = score.min(5);

        // ── Recommendation ───────────────────────────────────────────────────
        let (route_to, confidence, why) = if calculation || multi_step {
            (RouteTarget::Backend, 0.9, "analysis requested")
        } else if mutation && !session.is_guest_mode {
            (RouteTarget::Backend, 0.8, "persisted portfolio change")
        } else if long {
            (RouteTarget::Backend, 0.7, "long message")
        } else if greeting && session.message_count == 0 {
            (RouteTarget::Frontend, 0.95, "opening greeting")
        } else if greeting || help || read_only {
            (RouteTarget::Frontend, 0.85, "simple request")
        } else if mutation {
            (RouteTarget::Frontend, 0.85, "guest-local change")
        } else {
            (
                RouteTarget::Frontend,
                DEFAULT_FRONTEND_CONFIDENCE,
                "no strong signal",
            )
        };

        let mut parts = vec![format!("complexity={}/5", score)];
        if !signals.is_empty() {
            let names: Vec<&str> = signals.iter().map(|s| s.as_str()).collect();
            parts.push(format!("signals=[{}]", names.join(",")));
        }
        parts.push(why.to_string());
        parts.push(format!("→ {}", route_to));

        matched_terms.sort();
        matched_terms.dedup();

        ComplexityAnalysis {
            route_to,
            confidence,
            reasoning: RoutingReasoning {
                signals,
                matched_terms,
                word_count,
                score,
                rationale: parts.join(", "),
            },
        }
    }
}
