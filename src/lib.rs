//! Escrow ledger: holds third-party funds pending a quorum of approvals
//! and releases or returns them under time- and policy-governed rules.
//!
//! The crate is the escrow record state machine (creation, funding,
//! approval tracking, conditional release, expiry-based refund,
//! administrative override, and external-reference indirection) over a
//! keyed, secondarily-indexed record store. Caller authentication, account
//! lookup, wall-clock time, value movement, and notification delivery are
//! host concerns behind the traits in [`collaborators`].

#![deny(unsafe_code)]

pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod store;
pub mod sweep;
pub mod types;

pub use collaborators::{
    AccountDirectory, AuthContext, Clock, FundTransferGateway, NotificationBus,
};
pub use config::{EscrowPolicyConfig, SIX_MONTHS_IN_SECONDS};
pub use engine::EscrowEngine;
pub use error::EscrowError;
pub use resolver::ExternalKeyResolver;
pub use store::EscrowStore;
pub use sweep::AdminSweep;
pub use types::{
    AccountId, AssetAmount, EscrowKey, EscrowRecord, ExternalReference, NewEscrow,
};
