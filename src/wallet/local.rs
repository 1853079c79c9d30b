use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};

use crate::error::{CircaError, Result};
use crate::wallet::{WalletFuture, WalletProvider};

/// Wallet backed by an in-process secp256k1 key.
///
/// Signs the same way a browser wallet answers `personal_sign`: the
/// message is framed per EIP-191, hashed with keccak-256, and signed
/// recoverably, so the server can derive the address from the signature.
pub struct LocalWallet {
    key: SigningKey,
    address: String,
}

impl LocalWallet {
    /// Build from a 32-byte private key in hex, with or without `0x`.
    pub fn from_hex_key(private_key: &str) -> Result<Self> {
        let stripped = private_key.strip_prefix("0x").unwrap_or(private_key);
        let bytes =
            hex::decode(stripped).map_err(|e| CircaError::InvalidKey(format!("bad hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(CircaError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let key =
            SigningKey::from_slice(&bytes).map_err(|e| CircaError::InvalidKey(e.to_string()))?;
        Ok(Self::from_key(key))
    }

    /// Generate a throwaway key.
    pub fn generate() -> Self {
        Self::from_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    fn from_key(key: SigningKey) -> Self {
        let address = derive_address(&key);
        LocalWallet { key, address }
    }

    /// The wallet's address, `0x`-prefixed lowercase hex.
    pub fn address(&self) -> &str {
        &self.address
    }

    fn sign_message(&self, message: &str) -> Result<String> {
        let digest = eip191_digest(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| CircaError::Signing(e.to_string()))?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(signature.to_bytes().as_slice());
        out[64] = 27 + recovery_id.to_byte();
        Ok(format!("0x{}", hex::encode(out)))
    }
}

impl WalletProvider for LocalWallet {
    fn request_accounts(&self) -> WalletFuture<Vec<String>> {
        let address = self.address.clone();
        Box::pin(async move { Ok(vec![address]) })
    }

    fn personal_sign(&self, message: String, address: String) -> WalletFuture<String> {
        let result = if address.eq_ignore_ascii_case(&self.address) {
            self.sign_message(&message)
        } else {
            Err(CircaError::Signing(format!(
                "cannot sign for unknown address {address}"
            )))
        };
        Box::pin(async move { result })
    }
}

/// Keccak-256 over the EIP-191 personal-message framing:
/// `"\x19Ethereum Signed Message:\n" || byte-length || message`.
pub fn eip191_digest(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

fn derive_address(key: &SigningKey) -> String {
    // Uncompressed SEC1 point, tag byte dropped; the address is the last
    // 20 bytes of the keccak-256 of the remaining 64.
    let point = key.verifying_key().to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}
