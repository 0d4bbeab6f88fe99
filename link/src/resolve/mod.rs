//! # Resolution
//!
//! Network-dependent lookups behind the [`LedgerNetwork`] trait, the
//! session-scoped [`Resolver`] that memoizes them, and the signer engine
//! built on top.

pub mod cache;
pub mod horizon;
pub mod memory;
pub mod network;
pub mod signers;

pub use cache::Resolver;
pub use horizon::HorizonClient;
pub use memory::MemoryNetwork;
pub use network::{
    AccountSnapshot, LedgerNetwork, ResolvedAccount, SignerRecord, SubmitResult, Thresholds,
};
pub use signers::{compute_signers, has_signed, signer_statuses, SignerStatus};
