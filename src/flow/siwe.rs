use chrono::{DateTime, SecondsFormat, Utc};

/// Render the fallback sign-in message for servers that return a bare
/// nonce instead of a full `messageTemplate`. The layout follows the
/// EIP-4361 personal-message shape the server's verifier parses.
pub fn build_signin_message(
    domain: &str,
    address: &str,
    statement: &str,
    uri: &str,
    nonce: &str,
    issued_at: DateTime<Utc>,
) -> String {
    format!(
        "{domain} wants you to sign in with your Ethereum account:\n\
         {address}\n\
         \n\
         {statement}\n\
         \n\
         URI: {uri}\n\
         Version: 1\n\
         Nonce: {nonce}\n\
         Issued At: {issued_at}",
        issued_at = issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}
