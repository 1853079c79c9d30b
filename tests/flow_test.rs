//! Integration tests for the sign-up flow, driven against a mock API
//! server. Wallet prompts are scripted through test providers so both
//! the happy path and every dismissal/expiry branch can be exercised.

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use circa_client::draft::{DraftStore, MemoryDraftStore};
use circa_client::wallet::{WalletFuture, WalletProvider};
use circa_client::{
    AuthFlow, AuthStage, CircaClient, CircaConfig, CircaError, CompleteOutcome, ConnectOutcome,
    Route, VerifyOutcome,
};

const ADDRESS: &str = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf";

fn signature() -> String {
    format!("0x{}", "11".repeat(65))
}

fn make_client(server: &MockServer) -> Arc<CircaClient> {
    Arc::new(CircaClient::new(CircaConfig::new(server.uri())).unwrap())
}

/// Wallet that always connects and signs, counting sign calls and
/// optionally stalling inside the prompt.
struct ScriptedWallet {
    address: String,
    signature: String,
    sign_calls: Arc<AtomicUsize>,
    sign_delay: Option<Duration>,
}

impl ScriptedWallet {
    fn new() -> Self {
        ScriptedWallet {
            address: ADDRESS.to_string(),
            signature: signature(),
            sign_calls: Arc::new(AtomicUsize::new(0)),
            sign_delay: None,
        }
    }
}

impl WalletProvider for ScriptedWallet {
    fn request_accounts(&self) -> WalletFuture<Vec<String>> {
        let address = self.address.clone();
        Box::pin(async move { Ok(vec![address]) })
    }

    fn personal_sign(&self, _message: String, _address: String) -> WalletFuture<String> {
        let signature = self.signature.clone();
        let calls = self.sign_calls.clone();
        let delay = self.sign_delay;
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(signature)
        })
    }
}

/// Wallet that dismisses prompts the way EIP-1193 providers report it.
struct RejectingWallet {
    reject_connect: bool,
    sign_calls: Arc<AtomicUsize>,
}

impl RejectingWallet {
    fn new(reject_connect: bool) -> Self {
        RejectingWallet {
            reject_connect,
            sign_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn rejection() -> CircaError {
    CircaError::Wallet {
        code: Some(4001),
        message: "User rejected the request.".to_string(),
    }
}

impl WalletProvider for RejectingWallet {
    fn request_accounts(&self) -> WalletFuture<Vec<String>> {
        let reject = self.reject_connect;
        Box::pin(async move {
            if reject {
                Err(rejection())
            } else {
                Ok(vec![ADDRESS.to_string()])
            }
        })
    }

    fn personal_sign(&self, _message: String, _address: String) -> WalletFuture<String> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Err(rejection()) })
    }
}

/// Wallet that connects but controls no accounts.
struct EmptyWallet;

impl WalletProvider for EmptyWallet {
    fn request_accounts(&self) -> WalletFuture<Vec<String>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn personal_sign(&self, _message: String, _address: String) -> WalletFuture<String> {
        Box::pin(async move { Err(rejection()) })
    }
}

// ---------------------------------------------------------------------------
// submit_profile
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_submit_profile_posts_and_advances() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signup"))
        .and(body_json(json!({
            "full_name": "Alice Example",
            "email": "alice@example.com",
            "display_name": "alice"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Check your inbox!"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let drafts = Arc::new(MemoryDraftStore::new());
    let flow = AuthFlow::new(make_client(&server), None, drafts.clone());

    let message = flow
        .submit_profile("Alice Example", "alice@example.com", "alice")
        .await
        .unwrap();
    assert_eq!(message, "Check your inbox!");
    assert_eq!(
        flow.stage(),
        AuthStage::AwaitingEmailVerification {
            email: "alice@example.com".to_string()
        }
    );

    // The draft was captured with a current timestamp.
    let draft = drafts.load().unwrap().expect("draft saved");
    assert_eq!(draft.full_name, "Alice Example");
    assert_eq!(draft.email, "alice@example.com");
    assert_eq!(draft.display_name, "alice");
    assert!((Utc::now() - draft.timestamp).num_seconds() < 60);
}

#[tokio::test]
async fn test_submit_profile_failure_keeps_stage_and_draft() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signup"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({"message": "email already registered"})),
        )
        .mount(&server)
        .await;

    let drafts = Arc::new(MemoryDraftStore::new());
    let flow = AuthFlow::new(make_client(&server), None, drafts.clone());

    let err = flow
        .submit_profile("Alice Example", "alice@example.com", "alice")
        .await
        .unwrap_err();
    match err {
        CircaError::Api { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "email already registered");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The form is not lost: the stage stays put and the draft survives.
    assert_eq!(flow.stage(), AuthStage::Draft);
    assert!(drafts.load().unwrap().is_some());
}

#[tokio::test]
async fn test_submit_profile_generic_message_when_server_sends_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let flow = AuthFlow::new(make_client(&server), None, Arc::new(MemoryDraftStore::new()));
    let message = flow
        .submit_profile("Alice Example", "alice@example.com", "alice")
        .await
        .unwrap();
    assert_eq!(message, "Check your email to verify your account.");
}

// ---------------------------------------------------------------------------
// redeem_token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_verify_without_token_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"needsWallet": true})))
        .expect(0)
        .mount(&server)
        .await;

    let flow = AuthFlow::new(make_client(&server), None, Arc::new(MemoryDraftStore::new()));
    let outcome = flow
        .redeem_token("https://app.circa.test/auth/verify")
        .await;
    assert_eq!(outcome, VerifyOutcome::MissingToken);
    assert_eq!(outcome.redirect(), Some(Route::Home));
}

#[tokio::test]
async fn test_verify_token_spent_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/verify"))
        .and(body_json(json!({"token": "tok-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"needsWallet": true})))
        .expect(1)
        .mount(&server)
        .await;

    let flow = AuthFlow::new(make_client(&server), None, Arc::new(MemoryDraftStore::new()));
    let link = "https://app.circa.test/auth/verify?token=tok-1";

    let first = flow.redeem_token(link).await;
    assert_eq!(first, VerifyOutcome::WalletRequired);
    assert_eq!(first.redirect(), Some(Route::ConnectWallet));
    assert_eq!(flow.stage(), AuthStage::AwaitingWalletConnect);

    // A re-render replays the recorded outcome instead of spending the
    // token again.
    let second = flow.redeem_token(link).await;
    assert_eq!(second, VerifyOutcome::WalletRequired);

    let hits = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/auth/verify")
        .count();
    assert_eq!(hits, 1);
}

#[tokio::test]
async fn test_verify_signed_in_when_no_wallet_needed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"needsWallet": false})))
        .mount(&server)
        .await;

    let flow = AuthFlow::new(make_client(&server), None, Arc::new(MemoryDraftStore::new()));
    let outcome = flow.redeem_token("tok-returning").await;
    assert_eq!(outcome, VerifyOutcome::SignedIn);
    assert_eq!(outcome.redirect(), Some(Route::App));
    assert_eq!(flow.stage(), AuthStage::Complete);
}

#[tokio::test]
async fn test_verify_missing_needs_wallet_means_signed_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let flow = AuthFlow::new(make_client(&server), None, Arc::new(MemoryDraftStore::new()));
    assert_eq!(flow.redeem_token("tok").await, VerifyOutcome::SignedIn);
}

#[tokio::test]
async fn test_verify_failure_reports_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/verify"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({})))
        .mount(&server)
        .await;

    let flow = AuthFlow::new(make_client(&server), None, Arc::new(MemoryDraftStore::new()));
    let outcome = flow.redeem_token("tok-bad").await;
    assert_eq!(
        outcome,
        VerifyOutcome::Failed {
            message: "Invalid or expired verification link".to_string()
        }
    );
    assert_eq!(outcome.redirect(), Some(Route::Home));
    assert_eq!(flow.stage(), AuthStage::Draft);
}

#[tokio::test]
async fn test_verify_transport_failure_is_generic() {
    // Grab a port nothing listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = Arc::new(
        CircaClient::new(CircaConfig::new(format!("http://127.0.0.1:{port}"))).unwrap(),
    );

    let flow = AuthFlow::new(client, None, Arc::new(MemoryDraftStore::new()));
    let outcome = flow.redeem_token("tok").await;
    assert_eq!(
        outcome,
        VerifyOutcome::Failed {
            message: "Failed to verify email. Please try again.".to_string()
        }
    );
}

// ---------------------------------------------------------------------------
// connect_wallet
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_wallet_uses_message_template() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/nonce"))
        .and(body_json(json!({"address": ADDRESS})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"messageTemplate": "please sign this"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let flow = AuthFlow::new(
        make_client(&server),
        Some(Arc::new(ScriptedWallet::new())),
        Arc::new(MemoryDraftStore::new()),
    );
    flow.enter_wallet_connect().unwrap();

    let outcome = flow.connect_wallet().await.unwrap();
    assert_eq!(
        outcome,
        ConnectOutcome::Connected {
            address: ADDRESS.to_string()
        }
    );
    assert_eq!(
        flow.stage(),
        AuthStage::AwaitingSignature {
            address: ADDRESS.to_string(),
            message: "please sign this".to_string()
        }
    );
}

#[tokio::test]
async fn test_connect_wallet_renders_fallback_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/nonce"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nonce": "0xbeef",
            "expiresAt": "2026-08-25T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let flow = AuthFlow::new(
        make_client(&server),
        Some(Arc::new(ScriptedWallet::new())),
        Arc::new(MemoryDraftStore::new()),
    );
    flow.enter_wallet_connect().unwrap();
    flow.connect_wallet().await.unwrap();

    let AuthStage::AwaitingSignature { address, message } = flow.stage() else {
        panic!("expected awaiting signature, got {:?}", flow.stage());
    };
    assert_eq!(address, ADDRESS);
    assert!(message.starts_with(&format!(
        "circa wants you to sign in with your Ethereum account:\n{ADDRESS}\n"
    )));
    assert!(message.contains("\nSign in to Circa\n"));
    assert!(message.contains("\nURI: https://circa.app\n"));
    assert!(message.contains("\nVersion: 1\n"));
    assert!(message.contains("\nNonce: 0xbeef\n"));
    assert!(message.contains("\nIssued At: "));
}

#[tokio::test]
async fn test_connect_wallet_malformed_nonce_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/nonce"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let flow = AuthFlow::new(
        make_client(&server),
        Some(Arc::new(ScriptedWallet::new())),
        Arc::new(MemoryDraftStore::new()),
    );
    flow.enter_wallet_connect().unwrap();

    let err = flow.connect_wallet().await.unwrap_err();
    assert!(matches!(err, CircaError::MalformedResponse(_)));
    // Nothing partial is kept; the step can be retried.
    assert_eq!(flow.stage(), AuthStage::AwaitingWalletConnect);
}

#[tokio::test]
async fn test_connect_wallet_requires_provider() {
    let server = MockServer::start().await;
    let flow = AuthFlow::new(make_client(&server), None, Arc::new(MemoryDraftStore::new()));
    flow.enter_wallet_connect().unwrap();

    let err = flow.connect_wallet().await.unwrap_err();
    assert!(matches!(err, CircaError::WalletUnavailable));
}

#[tokio::test]
async fn test_connect_wallet_rejection_is_cancel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/nonce"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nonce": "n"})))
        .expect(0)
        .mount(&server)
        .await;

    let flow = AuthFlow::new(
        make_client(&server),
        Some(Arc::new(RejectingWallet::new(true))),
        Arc::new(MemoryDraftStore::new()),
    );
    flow.enter_wallet_connect().unwrap();

    let outcome = flow.connect_wallet().await.unwrap();
    assert_eq!(outcome, ConnectOutcome::Cancelled);
    assert_eq!(flow.stage(), AuthStage::AwaitingWalletConnect);
}

#[tokio::test]
async fn test_connect_wallet_empty_accounts_errors() {
    let server = MockServer::start().await;
    let flow = AuthFlow::new(
        make_client(&server),
        Some(Arc::new(EmptyWallet)),
        Arc::new(MemoryDraftStore::new()),
    );
    flow.enter_wallet_connect().unwrap();

    let err = flow.connect_wallet().await.unwrap_err();
    assert!(matches!(err, CircaError::Wallet { code: None, .. }));
    assert!(!err.is_user_rejection());
}

// ---------------------------------------------------------------------------
// sign_and_complete
// ---------------------------------------------------------------------------

async fn flow_at_signature_stage(
    server: &MockServer,
    wallet: Arc<dyn WalletProvider>,
    drafts: Arc<MemoryDraftStore>,
) -> AuthFlow {
    Mock::given(method("POST"))
        .and(path("/auth/nonce"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"messageTemplate": "challenge"})),
        )
        .mount(server)
        .await;

    let flow = AuthFlow::new(make_client(server), Some(wallet), drafts);
    flow.enter_wallet_connect().unwrap();
    let outcome = flow.connect_wallet().await.unwrap();
    assert!(matches!(outcome, ConnectOutcome::Connected { .. }));
    flow
}

#[tokio::test]
async fn test_sign_and_complete_happy_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signup/complete"))
        .and(body_json(json!({
            "address": ADDRESS,
            "signature": signature(),
            "message": "challenge"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let drafts = Arc::new(MemoryDraftStore::new());
    drafts
        .save(&circa_client::SignupDraft::new(
            "Alice Example",
            "alice@example.com",
            "alice",
        ))
        .unwrap();

    let flow =
        flow_at_signature_stage(&server, Arc::new(ScriptedWallet::new()), drafts.clone()).await;

    let outcome = flow.sign_and_complete().await.unwrap();
    assert_eq!(outcome, CompleteOutcome::Done);
    assert_eq!(outcome.redirect(), Some(Route::App));
    assert_eq!(flow.stage(), AuthStage::Complete);
    // The resume draft has served its purpose.
    assert!(drafts.load().unwrap().is_none());
}

#[tokio::test]
async fn test_sign_rejection_keeps_stage_and_permit_free() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signup/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let drafts = Arc::new(MemoryDraftStore::new());
    drafts
        .save(&circa_client::SignupDraft::new(
            "Alice Example",
            "alice@example.com",
            "alice",
        ))
        .unwrap();

    let wallet = Arc::new(RejectingWallet::new(false));
    let flow = flow_at_signature_stage(&server, wallet.clone(), drafts.clone()).await;

    let outcome = flow.sign_and_complete().await.unwrap();
    assert_eq!(outcome, CompleteOutcome::Cancelled);
    assert_eq!(outcome.redirect(), None);
    assert!(matches!(flow.stage(), AuthStage::AwaitingSignature { .. }));
    assert!(drafts.load().unwrap().is_some());

    // The permit was released, so the prompt can be shown again.
    let again = flow.sign_and_complete().await.unwrap();
    assert_eq!(again, CompleteOutcome::Cancelled);
    assert_eq!(wallet.sign_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_session_expired_restarts_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signup/complete"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "signup session expired"})),
        )
        .mount(&server)
        .await;

    let drafts = Arc::new(MemoryDraftStore::new());
    drafts
        .save(&circa_client::SignupDraft::new(
            "Alice Example",
            "alice@example.com",
            "alice",
        ))
        .unwrap();

    let flow =
        flow_at_signature_stage(&server, Arc::new(ScriptedWallet::new()), drafts.clone()).await;

    let outcome = flow.sign_and_complete().await.unwrap();
    assert_eq!(outcome, CompleteOutcome::SessionExpired);
    assert_eq!(outcome.redirect(), Some(Route::Signup));
    assert_eq!(flow.stage(), AuthStage::Draft);
    assert!(drafts.load().unwrap().is_none());
}

#[tokio::test]
async fn test_plain_401_is_error_and_keeps_draft() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signup/complete"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "signature mismatch"})),
        )
        .mount(&server)
        .await;

    let drafts = Arc::new(MemoryDraftStore::new());
    drafts
        .save(&circa_client::SignupDraft::new(
            "Alice Example",
            "alice@example.com",
            "alice",
        ))
        .unwrap();

    let flow =
        flow_at_signature_stage(&server, Arc::new(ScriptedWallet::new()), drafts.clone()).await;

    let err = flow.sign_and_complete().await.unwrap_err();
    match err {
        CircaError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "signature mismatch");
        }
        other => panic!("unexpected error: {other}"),
    }
    // A retryable failure: stage and draft are untouched.
    assert!(matches!(flow.stage(), AuthStage::AwaitingSignature { .. }));
    assert!(drafts.load().unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_sign_prompts_wallet_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signup/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut wallet = ScriptedWallet::new();
    wallet.sign_delay = Some(Duration::from_millis(50));
    let sign_calls = wallet.sign_calls.clone();

    let flow = flow_at_signature_stage(
        &server,
        Arc::new(wallet),
        Arc::new(MemoryDraftStore::new()),
    )
    .await;

    let (first, second) = tokio::join!(flow.sign_and_complete(), flow.sign_and_complete());
    let outcomes = [first.unwrap(), second.unwrap()];
    assert!(outcomes.contains(&CompleteOutcome::Done));
    assert!(outcomes.contains(&CompleteOutcome::Cancelled));
    assert_eq!(sign_calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_flow_requests_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "sent"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"needsWallet": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/nonce"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"messageTemplate": "challenge"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/signup/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let flow = AuthFlow::new(
        make_client(&server),
        Some(Arc::new(ScriptedWallet::new())),
        Arc::new(MemoryDraftStore::new()),
    );

    flow.submit_profile("Alice Example", "alice@example.com", "alice")
        .await
        .unwrap();
    assert_eq!(
        flow.redeem_token("https://app.circa.test/auth/verify?token=tok-1")
            .await,
        VerifyOutcome::WalletRequired
    );
    flow.connect_wallet().await.unwrap();
    assert_eq!(
        flow.sign_and_complete().await.unwrap(),
        CompleteOutcome::Done
    );
    assert_eq!(flow.stage(), AuthStage::Complete);

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/auth/signup",
            "/auth/verify",
            "/auth/nonce",
            "/auth/signup/complete"
        ]
    );
}
