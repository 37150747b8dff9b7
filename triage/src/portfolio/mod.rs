//! Portfolio state and the store capability.

pub mod file;
pub mod guest;
pub mod store;
pub mod types;

pub use file::FileStore;
pub use guest::GuestStore;
pub use store::{PortfolioStore, SharedPortfolioStore, StoreError, StoreResult};
pub use types::{
    format_money, format_quantity, normalize_portfolio_name, AssetType, BondTerms, Holding,
    Mutation, MutationOutcome, OptionKind, OptionTerms, OwnerRef, Portfolio,
    DEFAULT_PORTFOLIO_ID, DEFAULT_PORTFOLIO_NAME,
};
