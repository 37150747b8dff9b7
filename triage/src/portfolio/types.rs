//! Portfolio state types shared by every store implementation.
//!
//! `Portfolio::apply` is the single code path for add/merge, remove and
//! update, so guest and authenticated stores cannot drift apart.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::store::StoreError;

/// Name given to the portfolio selected when a command names none.
pub const DEFAULT_PORTFOLIO_NAME: &str = "Main Portfolio";

/// Identifier of the default portfolio within an owner's namespace.
pub const DEFAULT_PORTFOLIO_ID: &str = "main";

/// Fractional digits kept for a merged weighted-average cost.
const COST_SCALE: u32 = 6;

/// Who owns a set of portfolios.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerRef {
    /// Authenticated account; backed by persisted storage.
    User(String),
    /// Ephemeral guest session; backed by in-memory storage.
    Guest(String),
}

impl OwnerRef {
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Guest(id) => id,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Guest(_) => "guest",
        }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    #[default]
    Stock,
    Option,
    Bond,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stock => write!(f, "stock"),
            Self::Option => write!(f, "option"),
            Self::Bond => write!(f, "bond"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Call,
    Put,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// Contract terms for an option holding. Every field is required before an
/// option position may be added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTerms {
    pub kind: Option<OptionKind>,
    pub strike: Option<Decimal>,
    pub expiration: Option<NaiveDate>,
}

impl OptionTerms {
    /// Names of the terms that are still unspecified.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.kind.is_none() {
            missing.push("option type (call or put)");
        }
        if self.strike.is_none() {
            missing.push("strike price");
        }
        if self.expiration.is_none() {
            missing.push("expiration date");
        }
        missing
    }
}

/// Terms for a bond holding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondTerms {
    /// Annual coupon rate in percent.
    pub coupon_rate: Option<Decimal>,
    pub maturity: Option<NaiveDate>,
}

impl BondTerms {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.coupon_rate.is_none() {
            missing.push("coupon rate");
        }
        if self.maturity.is_none() {
            missing.push("maturity date");
        }
        missing
    }
}

/// A position in one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_cost: Option<Decimal>,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<OptionTerms>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond: Option<BondTerms>,
}

impl Holding {
    pub fn stock(symbol: impl Into<String>, quantity: Decimal, avg_cost: Option<Decimal>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            avg_cost,
            asset_type: AssetType::Stock,
            option: None,
            bond: None,
        }
    }

    /// Fold another lot of the same symbol into this holding.
    ///
    /// Quantities add and the average cost becomes the quantity-weighted
    /// mean. A lot without a cost leaves the existing cost untouched; a
    /// holding without a cost adopts the incoming one.
    ///
    /// Fails with [`StoreError::AmountOutOfRange`] when the combined amounts
    /// do not fit a `Decimal`; the holding is left unchanged in that case.
    pub fn merge(&mut self, incoming: &Holding) -> Result<(), StoreError> {
        let out_of_range = || StoreError::AmountOutOfRange(self.symbol.clone());
        let new_qty = self
            .quantity
            .checked_add(incoming.quantity)
            .ok_or_else(out_of_range)?;
        let avg_cost = match (self.avg_cost, incoming.avg_cost) {
            (Some(existing), Some(added)) if new_qty > Decimal::ZERO => {
                let total = self
                    .quantity
                    .checked_mul(existing)
                    .zip(incoming.quantity.checked_mul(added))
                    .and_then(|(a, b)| a.checked_add(b))
                    .and_then(|total| total.checked_div(new_qty))
                    .ok_or_else(out_of_range)?;
                Some(total.round_dp(COST_SCALE).normalize())
            }
            (Some(existing), _) => Some(existing),
            (None, added) => added,
        };
        self.avg_cost = avg_cost;
        self.quantity = new_qty;
        if self.option.is_none() {
            self.option = incoming.option.clone();
        }
        if self.bond.is_none() {
            self.bond = incoming.bond.clone();
        }
        Ok(())
    }

    /// One-line human description, e.g. `10 shares of AAPL at $150.00`.
    pub fn describe(&self) -> String {
        let unit = match self.asset_type {
            AssetType::Stock => "shares",
            AssetType::Option => "contracts",
            AssetType::Bond => "bonds",
        };
        match self.avg_cost {
            Some(cost) => format!(
                "{} {} of {} at {}",
                format_quantity(self.quantity),
                unit,
                self.symbol,
                format_money(cost)
            ),
            None => format!(
                "{} {} of {}",
                format_quantity(self.quantity),
                unit,
                self.symbol
            ),
        }
    }
}

/// A named collection of holdings, ordered by insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            holdings: Vec::new(),
        }
    }

    pub fn default_for_owner() -> Self {
        Self::new(DEFAULT_PORTFOLIO_ID, DEFAULT_PORTFOLIO_NAME)
    }

    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings
            .iter()
            .find(|h| h.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Whether `name` refers to this portfolio ("retirement" matches
    /// "Retirement Portfolio").
    pub fn matches_name(&self, name: &str) -> bool {
        let wanted = normalize_portfolio_name(name);
        !wanted.is_empty()
            && (normalize_portfolio_name(&self.name) == wanted
                || self.id.eq_ignore_ascii_case(&wanted))
    }

    /// Apply one mutation in place.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<MutationOutcome, StoreError> {
        match mutation {
            Mutation::AddHolding(incoming) => {
                match self
                    .holdings
                    .iter_mut()
                    .find(|h| h.symbol.eq_ignore_ascii_case(&incoming.symbol))
                {
                    Some(existing) => {
                        let before = existing.clone();
                        existing.merge(incoming)?;
                        Ok(MutationOutcome {
                            before: Some(before),
                            after: Some(existing.clone()),
                        })
                    }
                    None => {
                        self.holdings.push(incoming.clone());
                        Ok(MutationOutcome {
                            before: None,
                            after: Some(incoming.clone()),
                        })
                    }
                }
            }
            Mutation::RemoveHolding { symbol } => {
                let idx = self
                    .holdings
                    .iter()
                    .position(|h| h.symbol.eq_ignore_ascii_case(symbol))
                    .ok_or_else(|| StoreError::HoldingNotFound(symbol.clone()))?;
                let removed = self.holdings.remove(idx);
                Ok(MutationOutcome {
                    before: Some(removed),
                    after: None,
                })
            }
            Mutation::UpdateHolding {
                symbol,
                quantity,
                avg_cost,
            } => {
                let holding = self
                    .holdings
                    .iter_mut()
                    .find(|h| h.symbol.eq_ignore_ascii_case(symbol))
                    .ok_or_else(|| StoreError::HoldingNotFound(symbol.clone()))?;
                let before = holding.clone();
                if let Some(q) = quantity {
                    holding.quantity = *q;
                }
                if let Some(c) = avg_cost {
                    holding.avg_cost = Some(*c);
                }
                Ok(MutationOutcome {
                    before: Some(before),
                    after: Some(holding.clone()),
                })
            }
        }
    }
}

/// A single state change requested of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    /// Insert a holding, merging into an existing one for the same symbol.
    AddHolding(Holding),
    /// Remove the whole position.
    RemoveHolding { symbol: String },
    /// Overwrite quantity and/or average cost of an existing holding.
    UpdateHolding {
        symbol: String,
        quantity: Option<Decimal>,
        avg_cost: Option<Decimal>,
    },
}

/// Holding state on either side of a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub before: Option<Holding>,
    pub after: Option<Holding>,
}

/// Lowercase, trimmed, without a trailing "portfolio".
pub fn normalize_portfolio_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    lower
        .strip_suffix("portfolio")
        .map(str::trim_end)
        .unwrap_or(lower.as_str())
        .to_string()
}

/// Stable identifier for a named portfolio.
pub fn portfolio_slug(name: &str) -> String {
    let slug: String = normalize_portfolio_name(name)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    slug.trim_matches('-').to_string()
}

pub fn format_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}

pub fn format_money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}
