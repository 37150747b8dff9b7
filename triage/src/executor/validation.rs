//! Pre-execution checks.
//!
//! Order matters: required fields, then the symbol, then the owner. Each
//! check fails before any store is touched.

use rust_decimal::Decimal;

use crate::error::ExecutionError;
use crate::extractor::{Action, CommandCandidate};
use crate::portfolio::{AssetType, OwnerRef};

/// Resolve which owner a request acts for.
///
/// Guest mode with a guest session wins; otherwise an authenticated user id;
/// otherwise a bare guest session. Empty identifiers count as absent.
pub fn resolve_owner(
    user_id: Option<&str>,
    guest_session_id: Option<&str>,
    is_guest_mode: bool,
) -> Option<OwnerRef> {
    let user = user_id.map(str::trim).filter(|s| !s.is_empty());
    let guest = guest_session_id.map(str::trim).filter(|s| !s.is_empty());
    match (user, guest) {
        (_, Some(g)) if is_guest_mode => Some(OwnerRef::Guest(g.to_string())),
        (Some(u), _) => Some(OwnerRef::User(u.to_string())),
        (None, Some(g)) => Some(OwnerRef::Guest(g.to_string())),
        (None, None) => None,
    }
}

/// Action-appropriate required fields.
pub fn check_fields(candidate: &CommandCandidate) -> Result<(), ExecutionError> {
    let symbol = || candidate.symbol.clone();
    match candidate.action {
        Action::Add => {
            match candidate.quantity {
                None => {
                    return Err(ExecutionError::MissingQuantity {
                        action: Action::Add,
                        symbol: symbol(),
                    })
                }
                Some(q) if q <= Decimal::ZERO => {
                    return Err(ExecutionError::InvalidQuantity { symbol: symbol() })
                }
                Some(_) => {}
            }
            match candidate.asset_type {
                AssetType::Stock => Ok(()),
                AssetType::Option => {
                    let missing = candidate
                        .option
                        .clone()
                        .unwrap_or_default()
                        .missing_fields();
                    if missing.is_empty() {
                        Ok(())
                    } else {
                        Err(ExecutionError::IncompleteOption {
                            symbol: symbol(),
                            missing: missing.join(", "),
                        })
                    }
                }
                AssetType::Bond => {
                    let missing = candidate
                        .bond
                        .clone()
                        .unwrap_or_default()
                        .missing_fields();
                    if missing.is_empty() {
                        Ok(())
                    } else {
                        Err(ExecutionError::IncompleteBond {
                            symbol: symbol(),
                            missing: missing.join(", "),
                        })
                    }
                }
            }
        }
        Action::Update => match (candidate.quantity, candidate.avg_cost) {
            (Some(q), _) if q <= Decimal::ZERO => {
                Err(ExecutionError::InvalidQuantity { symbol: symbol() })
            }
            (None, None) => Err(ExecutionError::MissingUpdateValue { symbol: symbol() }),
            _ => Ok(()),
        },
        Action::Remove | Action::Show => Ok(()),
    }
}

/// Run every check and return the owner to act for.
pub fn validate(
    candidate: &CommandCandidate,
    user_id: Option<&str>,
    guest_session_id: Option<&str>,
    is_guest_mode: bool,
) -> Result<OwnerRef, ExecutionError> {
    check_fields(candidate)?;
    if candidate.symbol.trim().is_empty() {
        return Err(ExecutionError::MissingSymbol);
    }
    resolve_owner(user_id, guest_session_id, is_guest_mode)
        .ok_or(ExecutionError::AuthenticationRequired)
}
