//! Ephemeral signing identity of an agent-protocol client.
//!
//! A fresh ed25519 key pair is generated per client instance and never
//! persisted.  The public key doubles as the sender address:
//! `"agent1" + hex(public key)`.

use ed25519_dalek::{Keypair, PublicKey, Signature, Signer, Verifier};
use rand::rngs::OsRng;

use crate::session::SessionError;

/// Prefix of every agent address.
pub const ADDRESS_PREFIX: &str = "agent1";

pub struct Identity {
    keypair: Keypair,
    address: String,
}

impl Identity {
    pub fn generate() -> Self {
        let keypair = Keypair::generate(&mut OsRng);
        let address = format!("{ADDRESS_PREFIX}{}", hex::encode(keypair.public.as_bytes()));
        Self { keypair, address }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Hex-encoded signature over `message`.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.keypair.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity").field("address", &self.address).finish()
    }
}

/// Check a hex signature against the public key embedded in `address`.
///
/// # Errors
///
/// [`SessionError::UnexpectedResponse`] when the address is malformed or the
/// signature does not verify.
pub fn verify(address: &str, message: &[u8], signature: &str) -> Result<(), SessionError> {
    let bad = |what: &str| SessionError::UnexpectedResponse(format!("{what} from {address}"));
    let key_hex = address
        .strip_prefix(ADDRESS_PREFIX)
        .ok_or_else(|| bad("malformed sender address"))?;
    let key_bytes = hex::decode(key_hex).map_err(|_| bad("malformed sender address"))?;
    let key = PublicKey::from_bytes(&key_bytes).map_err(|_| bad("invalid sender key"))?;
    let sig_bytes = hex::decode(signature).map_err(|_| bad("malformed signature"))?;
    let sig = Signature::try_from(sig_bytes.as_slice()).map_err(|_| bad("malformed signature"))?;
    key.verify(message, &sig).map_err(|_| bad("bad signature"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_embeds_public_key() {
        let id = Identity::generate();
        assert!(id.address().starts_with(ADDRESS_PREFIX));
        assert_eq!(id.address().len(), ADDRESS_PREFIX.len() + 64);
        assert_ne!(id.address(), Identity::generate().address());
    }

    #[test]
    fn signatures_verify_only_for_signer_and_message() {
        let id = Identity::generate();
        let sig = id.sign(b"hello");
        assert!(verify(id.address(), b"hello", &sig).is_ok());
        assert!(verify(id.address(), b"hellO", &sig).is_err());
        let other = Identity::generate();
        assert!(verify(other.address(), b"hello", &sig).is_err());
        assert!(verify("nonsense", b"hello", &sig).is_err());
    }
}
