/// Configuration for the Circa client.
#[derive(Debug, Clone)]
pub struct CircaConfig {
    /// Base URL for the Circa API server (e.g. `http://localhost:8080`).
    pub base_url: String,
    /// Domain line of the fallback sign-in message.
    pub signin_domain: String,
    /// Statement line of the fallback sign-in message.
    pub signin_statement: String,
    /// URI line of the fallback sign-in message.
    pub signin_uri: String,
}

impl CircaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        CircaConfig {
            base_url: base_url.into(),
            signin_domain: "circa".to_string(),
            signin_statement: "Sign in to Circa".to_string(),
            signin_uri: "https://circa.app".to_string(),
        }
    }
}
