pub mod client;
pub mod config;
pub mod draft;
pub mod error;
pub mod flow;
pub mod guard;
pub mod rest;
pub mod session;
pub mod types;
pub mod wallet;

// ---- Top-level re-exports for ergonomic usage ----

// Client + config
pub use client::CircaClient;
pub use config::CircaConfig;
pub use error::{CircaError, Result};

// REST client
pub use rest::CircaHttpClient;

// Session probe + route guard
pub use guard::{guard, GuardVerdict, Route, RoutePolicy};
pub use session::SessionStatus;

// Sign-up / sign-in flow
pub use flow::{AuthFlow, AuthStage, CompleteOutcome, ConnectOutcome, VerifyOutcome};

// Wallet capability
pub use wallet::{LocalWallet, WalletProvider};

// Draft persistence
pub use draft::{DraftStore, FileDraftStore, MemoryDraftStore, SignupDraft};

// Wire types
pub use types::{
    CompleteSignupRequest, CreateGroupRequest, Group, LoginRequest, MessageResponse, NonceRequest,
    NonceResponse, SignupRequest, UserProfile, VerifyRequest, VerifyResponse,
};
