//! Group expense splitting: split calculation, balance aggregation and
//! settlement planning, served over HTTP on top of a MongoDB group store.
pub mod auth;
pub mod balance;
pub mod config;
pub mod error;
pub mod exchange;
pub mod money;
pub mod routes;
pub mod schemas;
pub mod split;
pub mod store;

pub use balance::{compute_balances, personal_summary, MemberBalance, PersonalSummary};
pub use error::Error;
pub use exchange::{minimal_transfers, settle_group, settlement_residual, NetPosition, Transfer};
pub use money::Money;
pub use schemas::{Expense, Group, Member, MemberId, Split};
pub use split::{build_splits, custom_split, equal_split, SplitMethod};
