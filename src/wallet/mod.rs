//! Wallet capability.
//!
//! The flow never talks to a key directly; it goes through [`WalletProvider`],
//! which mirrors the two EIP-1193 requests the sign-up needs
//! (`eth_requestAccounts` and `personal_sign`). Errors carry the provider's
//! rejection code so a dismissed prompt can be told apart from a fault.

pub mod local;

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

pub use local::LocalWallet;

/// Boxed future returned by provider methods, so the trait stays object-safe.
pub type WalletFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

pub trait WalletProvider: Send + Sync {
    /// `eth_requestAccounts` - addresses the provider controls, preferred first.
    fn request_accounts(&self) -> WalletFuture<Vec<String>>;

    /// `personal_sign` - EIP-191 signature over `message` by `address`,
    /// returned as 65 bytes of `r || s || v` in `0x`-prefixed hex.
    fn personal_sign(&self, message: String, address: String) -> WalletFuture<String>;
}
