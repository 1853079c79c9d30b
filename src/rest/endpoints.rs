use crate::error::Result;
use crate::rest::CircaHttpClient;
use crate::types::*;

impl CircaHttpClient {
    // --- Session ---

    /// GET /me - Profile of the user the session cookie belongs to.
    pub async fn get_me(&self) -> Result<Option<UserProfile>> {
        self.get_optional("/me", "Unauthorized").await
    }

    // --- Auth ---

    /// POST /auth/signup - Begin email sign-up; the server mails a magic link.
    pub async fn signup(&self, req: &SignupRequest) -> Result<MessageResponse> {
        self.post_json("/auth/signup", req, "Failed to create account")
            .await
    }

    /// POST /auth/login - Request a sign-in magic link for a returning user.
    pub async fn login(&self, req: &LoginRequest) -> Result<MessageResponse> {
        self.post_json("/auth/login", req, "Failed to send login link")
            .await
    }

    /// POST /auth/verify - Redeem a one-time magic-link token.
    pub async fn verify(&self, req: &VerifyRequest) -> Result<VerifyResponse> {
        self.post_json("/auth/verify", req, "Invalid or expired verification link")
            .await
    }

    /// POST /auth/nonce - Obtain a signing challenge for an address.
    pub async fn nonce(&self, req: &NonceRequest) -> Result<NonceResponse> {
        self.post_json("/auth/nonce", req, "Failed to get nonce").await
    }

    /// POST /auth/signup/complete - Submit the signed message; the server
    /// verifies the signature and upgrades the session.
    pub async fn complete_signup(&self, req: &CompleteSignupRequest) -> Result<()> {
        self.post_json_ack("/auth/signup/complete", req, "Failed to complete signup")
            .await
    }

    /// POST /auth/logout - End the current session.
    pub async fn logout(&self) -> Result<()> {
        self.post_empty("/auth/logout", "Failed to sign out").await
    }

    // --- Groups ---

    /// POST /groups - Create a savings circle owned by the current user.
    pub async fn create_group(&self, req: &CreateGroupRequest) -> Result<Group> {
        self.post_json("/groups", req, "Failed to create group").await
    }
}
