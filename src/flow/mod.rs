//! The staged sign-up and sign-in flow.
//!
//! [`AuthFlow`] walks a user from a blank profile form to an established
//! session: submit the profile, redeem the emailed magic-link token,
//! attach a wallet, sign the challenge. Each transition talks to the
//! server at most once and reports where control should go next through
//! its outcome value, so embedders can map outcomes onto navigation.

pub mod siwe;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use url::Url;

use crate::client::CircaClient;
use crate::draft::{DraftStore, SignupDraft};
use crate::error::{CircaError, Result};
use crate::guard::Route;
use crate::types::{CompleteSignupRequest, NonceRequest, SignupRequest, VerifyRequest};
use crate::wallet::WalletProvider;

/// Where the flow currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthStage {
    /// Collecting the profile form.
    Draft,
    /// Profile accepted; the magic link is in the user's inbox.
    AwaitingEmailVerification { email: String },
    /// Token redeemed; a wallet still has to be attached.
    AwaitingWalletConnect,
    /// Wallet attached and challenge rendered; awaiting the signature.
    AwaitingSignature { address: String, message: String },
    /// Session established.
    Complete,
}

impl AuthStage {
    pub fn name(&self) -> &'static str {
        match self {
            AuthStage::Draft => "draft",
            AuthStage::AwaitingEmailVerification { .. } => "awaiting email verification",
            AuthStage::AwaitingWalletConnect => "awaiting wallet connect",
            AuthStage::AwaitingSignature { .. } => "awaiting signature",
            AuthStage::Complete => "complete",
        }
    }
}

enum VerifyLatch {
    Untried,
    InFlight,
    Done(VerifyOutcome),
}

/// Flow controller for sign-up and magic-link sign-in.
///
/// Methods take `&self`; the stage lives behind a lock and the one-shot
/// guards are atomics, so a driver may hold the flow in an `Arc` and call
/// into it from wherever its events arrive.
pub struct AuthFlow {
    client: Arc<CircaClient>,
    wallet: Option<Arc<dyn WalletProvider>>,
    drafts: Arc<dyn DraftStore>,
    stage: Mutex<AuthStage>,
    verify: Mutex<VerifyLatch>,
    signing: AtomicBool,
}

impl AuthFlow {
    pub fn new(
        client: Arc<CircaClient>,
        wallet: Option<Arc<dyn WalletProvider>>,
        drafts: Arc<dyn DraftStore>,
    ) -> Self {
        AuthFlow {
            client,
            wallet,
            drafts,
            stage: Mutex::new(AuthStage::Draft),
            verify: Mutex::new(VerifyLatch::Untried),
            signing: AtomicBool::new(false),
        }
    }

    pub fn stage(&self) -> AuthStage {
        self.stage_lock().clone()
    }

    /// A fresh saved draft to pre-fill the profile form with, if any.
    pub fn prefill(&self) -> Result<Option<SignupDraft>> {
        self.drafts.load()
    }

    /// Position a not-yet-complete flow at the wallet step, as when the
    /// connect page is opened directly after verifying elsewhere.
    pub fn enter_wallet_connect(&self) -> Result<()> {
        let mut stage = self.stage_lock();
        if matches!(*stage, AuthStage::Complete) {
            return Err(CircaError::InvalidStage {
                action: "connect a wallet",
                stage: stage.name(),
            });
        }
        *stage = AuthStage::AwaitingWalletConnect;
        Ok(())
    }

    /// Submit the profile form. The draft is persisted before the request
    /// goes out so an interrupted sign-up can resume later; a failed
    /// request leaves both the stage and the draft in place.
    pub async fn submit_profile(
        &self,
        full_name: &str,
        email: &str,
        display_name: &str,
    ) -> Result<String> {
        {
            let stage = self.stage_lock();
            match *stage {
                AuthStage::Draft | AuthStage::AwaitingEmailVerification { .. } => {}
                _ => {
                    return Err(CircaError::InvalidStage {
                        action: "submit the profile",
                        stage: stage.name(),
                    })
                }
            }
        }

        let draft = SignupDraft::new(full_name, email, display_name);
        if let Err(e) = self.drafts.save(&draft) {
            tracing::warn!(error = %e, "could not persist sign-up draft");
        }

        let req = SignupRequest {
            full_name: full_name.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
        };
        let resp = self.client.http_client.signup(&req).await?;

        *self.stage_lock() = AuthStage::AwaitingEmailVerification {
            email: email.to_string(),
        };
        tracing::info!("profile accepted, awaiting email verification");
        Ok(resp
            .message
            .unwrap_or_else(|| "Check your email to verify your account.".to_string()))
    }

    /// Redeem the token carried by a magic link, or a bare token. Goes to
    /// the server at most once for the life of this flow; later calls
    /// replay the first outcome instead of spending the token again.
    pub async fn redeem_token(&self, link_or_token: &str) -> VerifyOutcome {
        let Some(token) = extract_token(link_or_token) else {
            return VerifyOutcome::MissingToken;
        };

        {
            let mut latch = self.verify.lock().unwrap_or_else(|e| e.into_inner());
            match &*latch {
                VerifyLatch::Done(outcome) => return outcome.clone(),
                VerifyLatch::InFlight => {
                    return VerifyOutcome::Failed {
                        message: "verification already in progress".to_string(),
                    }
                }
                VerifyLatch::Untried => *latch = VerifyLatch::InFlight,
            }
        }

        let outcome = match self.client.http_client.verify(&VerifyRequest { token }).await {
            Ok(resp) if resp.needs_wallet => {
                *self.stage_lock() = AuthStage::AwaitingWalletConnect;
                tracing::info!("email verified, wallet connection required");
                VerifyOutcome::WalletRequired
            }
            Ok(_) => {
                *self.stage_lock() = AuthStage::Complete;
                tracing::info!("email verified, session established");
                VerifyOutcome::SignedIn
            }
            Err(CircaError::Api { message, .. }) => VerifyOutcome::Failed { message },
            Err(e) => {
                tracing::debug!(error = %e, "verify request failed");
                VerifyOutcome::Failed {
                    message: "Failed to verify email. Please try again.".to_string(),
                }
            }
        };

        let mut latch = self.verify.lock().unwrap_or_else(|e| e.into_inner());
        *latch = VerifyLatch::Done(outcome.clone());
        outcome
    }

    /// Ask the wallet for an address and prepare the message to sign.
    /// A dismissed prompt is a cancel, not an error; on error nothing is
    /// kept and the stage stays at the wallet step.
    pub async fn connect_wallet(&self) -> Result<ConnectOutcome> {
        {
            let stage = self.stage_lock();
            if !matches!(*stage, AuthStage::AwaitingWalletConnect) {
                return Err(CircaError::InvalidStage {
                    action: "connect a wallet",
                    stage: stage.name(),
                });
            }
        }
        let wallet = self.wallet.as_ref().ok_or(CircaError::WalletUnavailable)?;

        let accounts = match wallet.request_accounts().await {
            Ok(accounts) => accounts,
            Err(e) if e.is_user_rejection() => {
                tracing::debug!("wallet connect dismissed");
                return Ok(ConnectOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        };
        let Some(address) = accounts.into_iter().next() else {
            return Err(CircaError::Wallet {
                code: None,
                message: "no accounts returned by provider".to_string(),
            });
        };

        let resp = self
            .client
            .http_client
            .nonce(&NonceRequest {
                address: address.clone(),
            })
            .await?;
        if let Some(expires_at) = resp.expires_at {
            tracing::debug!(%expires_at, "nonce issued");
        }

        let message = match (resp.message_template, resp.nonce) {
            (Some(message), _) => message,
            (None, Some(nonce)) => {
                let config = &self.client.config;
                siwe::build_signin_message(
                    &config.signin_domain,
                    &address,
                    &config.signin_statement,
                    &config.signin_uri,
                    &nonce,
                    Utc::now(),
                )
            }
            (None, None) => {
                return Err(CircaError::MalformedResponse(
                    "nonce response carries neither messageTemplate nor nonce".to_string(),
                ))
            }
        };

        tracing::info!(address = %address, "wallet connected, challenge ready");
        *self.stage_lock() = AuthStage::AwaitingSignature {
            address: address.clone(),
            message,
        };
        Ok(ConnectOutcome::Connected { address })
    }

    /// Sign the challenge and complete the sign-up. Holds the sole
    /// in-flight signing permit; a second caller gets `Cancelled` right
    /// away instead of triggering a duplicate wallet prompt.
    pub async fn sign_and_complete(&self) -> Result<CompleteOutcome> {
        if self
            .signing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(CompleteOutcome::Cancelled);
        }
        let _permit = SignPermit(&self.signing);

        let (address, message) = {
            let stage = self.stage_lock();
            match &*stage {
                AuthStage::AwaitingSignature { address, message } => {
                    (address.clone(), message.clone())
                }
                _ => {
                    return Err(CircaError::InvalidStage {
                        action: "sign the challenge",
                        stage: stage.name(),
                    })
                }
            }
        };
        let wallet = self.wallet.as_ref().ok_or(CircaError::WalletUnavailable)?;

        let signature = match wallet.personal_sign(message.clone(), address.clone()).await {
            Ok(signature) => signature,
            Err(e) if e.is_user_rejection() => {
                tracing::debug!("signature prompt dismissed");
                return Ok(CompleteOutcome::Cancelled);
            }
            Err(e) => return Err(e),
        };

        let req = CompleteSignupRequest {
            address,
            signature,
            message,
        };
        match self.client.http_client.complete_signup(&req).await {
            Ok(()) => {
                if let Err(e) = self.drafts.clear() {
                    tracing::warn!(error = %e, "could not clear sign-up draft");
                }
                *self.stage_lock() = AuthStage::Complete;
                tracing::info!("sign-up complete, session established");
                Ok(CompleteOutcome::Done)
            }
            Err(e) if e.is_session_expired() => {
                if let Err(e) = self.drafts.clear() {
                    tracing::warn!(error = %e, "could not clear sign-up draft");
                }
                *self.stage_lock() = AuthStage::Draft;
                tracing::warn!("signup session expired, restarting flow");
                Ok(CompleteOutcome::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }

    fn stage_lock(&self) -> MutexGuard<'_, AuthStage> {
        self.stage.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Releases the signing permit when its holder returns.
struct SignPermit<'a>(&'a AtomicBool);

impl Drop for SignPermit<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Pull the `token` query parameter out of a magic link; anything that is
/// not an absolute URL is taken as a bare token.
fn extract_token(link_or_token: &str) -> Option<String> {
    match Url::parse(link_or_token) {
        Ok(url) => url
            .query_pairs()
            .find_map(|(key, value)| (key == "token").then(|| value.into_owned())),
        Err(_) => Some(link_or_token.trim().to_string()),
    }
    .filter(|token| !token.is_empty())
}

// Outcomes of flow transitions.

/// Outcome of redeeming a magic-link token.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Returning user; the session is live.
    SignedIn,
    /// New user; a wallet still has to be attached.
    WalletRequired,
    /// The link carried no token. Nothing was sent.
    MissingToken,
    /// The server refused the token.
    Failed { message: String },
}

impl VerifyOutcome {
    /// Where the driver should send the user next.
    pub fn redirect(&self) -> Option<Route> {
        match self {
            VerifyOutcome::SignedIn => Some(Route::App),
            VerifyOutcome::WalletRequired => Some(Route::ConnectWallet),
            VerifyOutcome::MissingToken | VerifyOutcome::Failed { .. } => Some(Route::Home),
        }
    }
}

/// Outcome of connecting a wallet.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// Challenge rendered; ready for the signature.
    Connected { address: String },
    /// The user dismissed the wallet prompt. Not an error.
    Cancelled,
}

/// Outcome of signing and completing the sign-up.
#[derive(Debug, Clone, PartialEq)]
pub enum CompleteOutcome {
    /// Session established.
    Done,
    /// The prompt was dismissed, or another signature was in flight.
    Cancelled,
    /// The server-side signup session lapsed; the stage is back at the
    /// start and the saved draft is gone.
    SessionExpired,
}

impl CompleteOutcome {
    /// Where the driver should send the user next.
    pub fn redirect(&self) -> Option<Route> {
        match self {
            CompleteOutcome::Done => Some(Route::App),
            CompleteOutcome::SessionExpired => Some(Route::Signup),
            CompleteOutcome::Cancelled => None,
        }
    }
}
