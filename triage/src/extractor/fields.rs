//! Field extraction over a masked copy of the message.
//!
//! Every span an extractor consumes is blanked out of the working copy, so a
//! strike price can never be read again as a quantity and a portfolio name
//! can never be read as a ticker. Byte offsets stay aligned with the original
//! text because each consumed byte is replaced by one ASCII space.

use std::ops::Range;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};
use rust_decimal::{Decimal, RoundingStrategy};

use super::matchers::KEYWORD_WORDS;
use crate::portfolio::{AssetType, BondTerms, OptionKind, OptionTerms};

/// Decimal with optional thousands separators.
const NUM: &str = r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)";

/// Fractional digits kept for quantities and prices.
const AMOUNT_SCALE: u32 = 2;

static POSSESSIVE_PORTFOLIO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z][a-z0-9]*['’]s)\s+portfolio\b").unwrap()
});

/// Contractions that look like possessives ("what's portfolio ...").
const NOT_OWNERS: &[&str] = &["what", "that", "it", "there", "here", "who", "let", "how"];

static NAMED_PORTFOLIO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:in|to|from|into|on)\s+)?(?:my|the)\s+([a-z][a-z0-9-]*)\s+portfolio\b")
        .unwrap()
});

static OPTION_CUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:options?|calls|puts|strike)\b").unwrap());

static OPTION_KIND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(call|put)s?\b").unwrap());

static STRIKE_LEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bstrike(?:\s+price)?\s*(?:of|at|@|=|:)?\s*\$?\s*{NUM}"
    ))
    .unwrap()
});

static STRIKE_TRAILING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\$?\s*\b{NUM}\s+strike\b")).unwrap());

static BOND_CUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:bonds?|treasury|treasuries)\b").unwrap());

static COUPON_LEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bcoupon(?:\s+rate)?\s*(?:of|at|=|:)?\s*{NUM}\s*%?"
    ))
    .unwrap()
});

static COUPON_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)\b{NUM}\s*%(?:\s+coupon)?")).unwrap());

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\b(?:expir\w*|exp|maturity|maturing|matures|due)\s*(?:on|:)?\s*)?\b(\d{4}-\d{2}-\d{2})\b",
    )
    .unwrap()
});

static PRICE_CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:(?:@|\bat\b|\bfor\b|\bprice\b|\bcost\b|\bbasis\b)\s*(?:of|to|=|:)?\s*)?\$\s*{NUM}"
    ))
    .unwrap()
});

static PRICE_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:@|\bat\b|\bprice\b|\bcost\b|\bbasis\b)\s*(?:of|to|=|:)?\s*{NUM}"
    ))
    .unwrap()
});

static QUANTITY_UNITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b{NUM}\s*(?:shares?|stocks?|units?|contracts?|bonds?)\b"
    ))
    .unwrap()
});

static QUANTITY_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:quantity|qty|position)\s*(?:of|to|=|:)?\s*{NUM}"
    ))
    .unwrap()
});

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\b{NUM}\b")).unwrap());

static UPPER_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z]{1,5}\b").unwrap());

static SHARES_OF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:shares?\s+)?of\s+([a-z]{1,5})\b").unwrap());

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]+").unwrap());

/// Words that are never tickers, in any case.
const STOPWORDS: &[&str] = &[
    "i", "a", "an", "the", "my", "me", "of", "to", "in", "at", "on", "for", "and", "or", "all",
    "is", "it", "do", "be", "am", "are", "how", "what", "who", "why", "any", "some", "more",
    "with", "from", "into", "per", "usd", "etf", "call", "calls", "put", "puts", "bond", "bonds",
    "note", "notes", "share", "stock", "stocks", "units", "unit", "price", "cost", "basis", "qty",
    "exp", "due", "hi", "hey", "hello", "thanks", "ok",
];

/// Words skipped when looking for a ticker after a keyword or quantity.
const FILLER: &[&str] = &[
    "my", "me", "the", "some", "more", "a", "an", "of", "all", "any", "shares", "share",
    "stock", "stocks", "units", "position", "positions", "holding", "holdings", "in", "to",
    "for", "from", "everything", "entire", "please", "new", "extra", "additional",
];

fn is_reserved(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    STOPWORDS.contains(&lower.as_str()) || KEYWORD_WORDS.contains(&lower.as_str())
}

fn is_filler(word: &str) -> bool {
    FILLER.contains(&word.to_ascii_lowercase().as_str())
}

/// Parse a matched amount; non-positive values count as absent.
pub(crate) fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let value = Decimal::from_str(&cleaned)
        .ok()?
        .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    (value > Decimal::ZERO).then(|| value.normalize())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Everything extracted from one message besides the action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub portfolio_name: Option<String>,
    pub asset_type: AssetType,
    pub option: Option<OptionTerms>,
    pub bond: Option<BondTerms>,
    pub avg_cost: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub symbol: Option<String>,
    /// Byte ranges in the original text that contributed a field.
    pub spans: Vec<Range<usize>>,
}

impl ExtractedFields {
    /// Names of the asset terms an add still needs, empty for stocks.
    pub fn missing_terms(&self) -> Vec<&'static str> {
        match self.asset_type {
            AssetType::Stock => Vec::new(),
            AssetType::Option => self
                .option
                .as_ref()
                .map(OptionTerms::missing_fields)
                .unwrap_or_else(|| OptionTerms::default().missing_fields()),
            AssetType::Bond => self
                .bond
                .as_ref()
                .map(BondTerms::missing_fields)
                .unwrap_or_else(|| BondTerms::default().missing_fields()),
        }
    }
}

/// Working copy of the message with consumed spans blanked.
struct Scratch {
    masked: String,
    spans: Vec<Range<usize>>,
}

impl Scratch {
    fn new(text: &str, keyword: Range<usize>) -> Self {
        let mut scratch = Self {
            masked: text.to_string(),
            spans: Vec::new(),
        };
        scratch.consume(keyword);
        scratch
    }

    fn consume(&mut self, range: Range<usize>) {
        if range.is_empty()
            || !self.masked.is_char_boundary(range.start)
            || !self.masked.is_char_boundary(range.end)
        {
            return;
        }
        let blank = " ".repeat(range.len());
        self.masked.replace_range(range.clone(), &blank);
        self.spans.push(range);
    }

    /// First match of `re` whose capture group 1 satisfies `accept`; the
    /// whole match is consumed and the group text returned.
    fn take_if(&mut self, re: &Regex, accept: impl Fn(&Captures<'_>) -> bool) -> Option<String> {
        let (value, range) = re
            .captures_iter(&self.masked)
            .filter(|caps| accept(caps))
            .find_map(|caps| Some((caps.get(1)?.as_str().to_string(), caps.get(0)?.range())))?;
        self.consume(range);
        Some(value)
    }

    fn take(&mut self, re: &Regex) -> Option<String> {
        self.take_if(re, |_| true)
    }

    /// Next plausible ticker after byte offset `from`, skipping filler.
    fn word_after(&self, from: usize) -> Option<(String, Range<usize>)> {
        let tail = self.masked.get(from..)?;
        for m in WORD.find_iter(tail) {
            let word = m.as_str();
            if is_filler(word) {
                continue;
            }
            if word.len() <= 5 && !is_reserved(word) {
                return Some((word.to_ascii_uppercase(), from + m.start()..from + m.end()));
            }
            return None;
        }
        None
    }
}

/// Extract every field from `text`, given the span of the matched action
/// keyword.
pub fn extract_fields(text: &str, keyword: Range<usize>) -> ExtractedFields {
    let keyword_end = keyword.end;
    let mut s = Scratch::new(text, keyword);
    let mut fields = ExtractedFields {
        portfolio_name: s
            .take_if(&POSSESSIVE_PORTFOLIO, |caps| {
                caps.get(1).is_some_and(|m| {
                    let owner = m
                        .as_str()
                        .trim_end_matches(['s', 'S'])
                        .trim_end_matches(['\'', '’']);
                    !NOT_OWNERS.contains(&owner.to_lowercase().as_str())
                })
            })
            .or_else(|| {
                s.take_if(&NAMED_PORTFOLIO, |caps| {
                    caps.get(1).is_some_and(|m| {
                        !matches!(
                            m.as_str().to_ascii_lowercase().as_str(),
                            "entire" | "whole" | "current" | "own"
                        )
                    })
                })
            }),
        ..Default::default()
    };

    if OPTION_CUE.is_match(&s.masked) {
        fields.asset_type = AssetType::Option;
        let kind = s.take(&OPTION_KIND).and_then(|k| match k.to_ascii_lowercase().as_str() {
            "call" => Some(OptionKind::Call),
            "put" => Some(OptionKind::Put),
            _ => None,
        });
        let strike = s
            .take(&STRIKE_LEADING)
            .or_else(|| s.take(&STRIKE_TRAILING))
            .and_then(|v| parse_amount(&v));
        let expiration = s.take(&DATE).and_then(|v| parse_date(&v));
        fields.option = Some(OptionTerms {
            kind,
            strike,
            expiration,
        });
    } else if BOND_CUE.is_match(&s.masked) {
        fields.asset_type = AssetType::Bond;
        let coupon_rate = s
            .take(&COUPON_LEADING)
            .or_else(|| s.take(&COUPON_PERCENT))
            .and_then(|v| parse_amount(&v));
        let maturity = s.take(&DATE).and_then(|v| parse_date(&v));
        fields.bond = Some(BondTerms {
            coupon_rate,
            maturity,
        });
    }

    fields.avg_cost = s
        .take(&PRICE_CURRENCY)
        .or_else(|| s.take(&PRICE_CUE))
        .and_then(|v| parse_amount(&v));

    let spans_before_quantity = s.spans.len();
    let masked_snapshot = s.masked.clone();
    fields.quantity = s
        .take(&QUANTITY_UNITS)
        .or_else(|| s.take(&QUANTITY_CUE))
        .or_else(|| {
            s.take_if(&BARE_NUMBER, |caps| {
                let Some(m) = caps.get(0) else {
                    return false;
                };
                let before = masked_snapshot[..m.start()].trim_end().chars().last();
                let after = masked_snapshot[m.end()..].trim_start().chars().next();
                before != Some('$') && after != Some('%')
            })
        })
        .and_then(|v| parse_amount(&v));
    let quantity_end = s.spans[spans_before_quantity..].first().map(|r| r.end);

    fields.symbol = find_symbol(&mut s, quantity_end, keyword_end);
    fields.spans = s.spans;
    fields
}

fn find_symbol(s: &mut Scratch, quantity_end: Option<usize>, keyword_end: usize) -> Option<String> {
    let upper = UPPER_TOKEN
        .find_iter(&s.masked)
        .find(|m| !is_reserved(m.as_str()))
        .map(|m| (m.as_str().to_string(), m.range()));
    if let Some((symbol, range)) = upper {
        s.consume(range);
        return Some(symbol);
    }

    if let Some(symbol) = s.take_if(&SHARES_OF, |caps| {
        caps.get(1).is_some_and(|m| !is_reserved(m.as_str()))
    }) {
        return Some(symbol.to_ascii_uppercase());
    }

    let positional = quantity_end
        .and_then(|end| s.word_after(end))
        .or_else(|| s.word_after(keyword_end));
    let (symbol, range) = positional?;
    s.consume(range);
    Some(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: &str) -> Decimal {
        Decimal::from_str(v).unwrap()
    }

    /// Run extraction with the first occurrence of `keyword` as the action.
    fn extract(text: &str, keyword: &str) -> ExtractedFields {
        let start = text.find(keyword).unwrap();
        extract_fields(text, start..start + keyword.len())
    }

    #[test]
    fn test_stock_add_fields() {
        let f = extract("Add 10 shares of AAPL at $150.50", "Add");
        assert_eq!(f.quantity, Some(dec("10")));
        assert_eq!(f.avg_cost, Some(dec("150.5")));
        assert_eq!(f.symbol.as_deref(), Some("AAPL"));
        assert_eq!(f.asset_type, AssetType::Stock);
        assert!(f.portfolio_name.is_none());
    }

    #[test]
    fn test_thousands_and_rounding() {
        let f = extract("buy 1,250.125 MSFT @ 1,020.005", "buy");
        assert_eq!(f.quantity, Some(dec("1250.13")));
        assert_eq!(f.avg_cost, Some(dec("1020.01")));
        assert_eq!(f.symbol.as_deref(), Some("MSFT"));
    }

    #[test]
    fn test_non_positive_quantity_is_absent() {
        let f = extract("add 0 AAPL", "add");
        assert_eq!(f.quantity, None);
        assert_eq!(f.symbol.as_deref(), Some("AAPL"));
    }

    #[test]
    fn test_lowercase_symbol_fallbacks() {
        assert_eq!(
            extract("add some aapl", "add").symbol.as_deref(),
            Some("AAPL")
        );
        assert_eq!(
            extract("how many shares of nvda do i have", "how many")
                .symbol
                .as_deref(),
            Some("NVDA")
        );
        assert_eq!(
            extract("buy 5 tsla", "buy").symbol.as_deref(),
            Some("TSLA")
        );
    }

    #[test]
    fn test_no_symbol_when_only_filler() {
        assert_eq!(extract("show my holdings", "show").symbol, None);
        assert_eq!(extract("how much is my portfolio worth", "how much").symbol, None);
    }

    #[test]
    fn test_portfolio_names() {
        let f = extract("add 10 AAPL to my retirement portfolio", "add");
        assert_eq!(f.portfolio_name.as_deref(), Some("retirement"));
        assert_eq!(f.symbol.as_deref(), Some("AAPL"));

        let f = extract("show TSLA in John's portfolio", "show");
        assert_eq!(f.portfolio_name.as_deref(), Some("John's"));
        assert_eq!(f.symbol.as_deref(), Some("TSLA"));

        let f = extract("show TSLA in john's portfolio", "show");
        assert_eq!(f.portfolio_name.as_deref(), Some("john's"));
        assert_eq!(f.symbol.as_deref(), Some("TSLA"));

        let f = extract("add 5 MSFT to sarah’s Portfolio", "add");
        assert_eq!(f.portfolio_name.as_deref(), Some("sarah’s"));
        assert_eq!(f.symbol.as_deref(), Some("MSFT"));
    }

    #[test]
    fn test_contraction_is_not_a_portfolio_owner() {
        let f = extract("show AAPL, what's portfolio value", "show");
        assert!(f.portfolio_name.is_none());
        assert_eq!(f.symbol.as_deref(), Some("AAPL"));
    }

    #[test]
    fn test_option_terms_do_not_leak_into_quantity() {
        let f = extract(
            "buy 2 AAPL call options strike 150 expiring 2025-06-20 at $3.50",
            "buy",
        );
        assert_eq!(f.asset_type, AssetType::Option);
        let terms = f.option.clone().unwrap();
        assert_eq!(terms.kind, Some(OptionKind::Call));
        assert_eq!(terms.strike, Some(dec("150")));
        assert_eq!(terms.expiration, NaiveDate::from_ymd_opt(2025, 6, 20));
        assert_eq!(f.quantity, Some(dec("2")));
        assert_eq!(f.avg_cost, Some(dec("3.5")));
        assert_eq!(f.symbol.as_deref(), Some("AAPL"));
        assert!(f.missing_terms().is_empty());
    }

    #[test]
    fn test_incomplete_option_reports_missing_terms() {
        let f = extract("buy 1 TSLA put option", "buy");
        assert_eq!(f.asset_type, AssetType::Option);
        assert_eq!(f.missing_terms(), vec!["strike price", "expiration date"]);
    }

    #[test]
    fn test_bond_terms() {
        let f = extract("buy 5 UST bonds coupon 4.25% maturing 2030-05-15", "buy");
        assert_eq!(f.asset_type, AssetType::Bond);
        let terms = f.bond.clone().unwrap();
        assert_eq!(terms.coupon_rate, Some(dec("4.25")));
        assert_eq!(terms.maturity, NaiveDate::from_ymd_opt(2030, 5, 15));
        assert_eq!(f.quantity, Some(dec("5")));
        assert_eq!(f.symbol.as_deref(), Some("UST"));
    }

    #[test]
    fn test_update_price_cue() {
        let f = extract("update AAPL cost to 160", "update");
        assert_eq!(f.avg_cost, Some(dec("160")));
        assert_eq!(f.quantity, None);
        assert_eq!(f.symbol.as_deref(), Some("AAPL"));
    }

    #[test]
    fn test_spans_cover_fields() {
        let text = "add 10 AAPL at $150";
        let f = extract(text, "add");
        let start = f.spans.iter().map(|r| r.start).min().unwrap();
        let end = f.spans.iter().map(|r| r.end).max().unwrap();
        assert_eq!(&text[start..end], text);
    }
}
