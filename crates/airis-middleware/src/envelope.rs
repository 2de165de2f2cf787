//! Signed message envelope of the agent binding.
//!
//! The payload is the JSON of a [`Model`], base64 encoded.  The signature
//! covers the SHA-256 digest of every routing field plus the payload, so a
//! reply cannot be re-targeted or re-labelled without invalidating it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::identity::{self, Identity};
use crate::protocol::Model;
use crate::session::SessionError;

/// Wire version of [`Envelope`].
pub const ENVELOPE_VERSION: u32 = 1;

/// Seconds an envelope stays valid after it is sealed.
const TTL_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    pub sender: String,
    pub target: String,
    /// Correlates a reply with its request.
    pub session: Uuid,
    pub schema_digest: String,
    pub payload: String,
    /// Unix seconds after which the envelope must be ignored.
    pub expires: i64,
    pub nonce: u64,
    pub signature: String,
}

impl Envelope {
    /// Encode `message`, address it to `target` and sign it with `identity`.
    ///
    /// # Errors
    ///
    /// [`SessionError::Encoding`] when `message` cannot be serialized.
    pub fn seal<M: Model>(
        identity: &Identity,
        target: &str,
        session: Uuid,
        nonce: u64,
        message: &M,
    ) -> Result<Self, SessionError> {
        let mut envelope = Envelope {
            version: ENVELOPE_VERSION,
            sender: identity.address().to_string(),
            target: target.to_string(),
            session,
            schema_digest: M::schema_digest(),
            payload: BASE64.encode(serde_json::to_vec(message)?),
            expires: Utc::now().timestamp() + TTL_SECS,
            nonce,
            signature: String::new(),
        };
        envelope.signature = identity.sign(&envelope.digest());
        Ok(envelope)
    }

    fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_be_bytes());
        hasher.update(self.sender.as_bytes());
        hasher.update(self.target.as_bytes());
        hasher.update(self.session.as_bytes());
        hasher.update(self.schema_digest.as_bytes());
        hasher.update(self.payload.as_bytes());
        hasher.update(self.expires.to_be_bytes());
        hasher.update(self.nonce.to_be_bytes());
        hasher.finalize().into()
    }

    /// Check the signature against the sender address and the expiry.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnexpectedResponse`] on a bad signature or an expired
    /// envelope.
    pub fn verify(&self) -> Result<(), SessionError> {
        identity::verify(&self.sender, &self.digest(), &self.signature)?;
        if self.expires < Utc::now().timestamp() {
            return Err(SessionError::UnexpectedResponse(format!(
                "envelope from {} expired",
                self.sender
            )));
        }
        Ok(())
    }

    /// Decode the payload as `M`, refusing envelopes of any other schema.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnexpectedResponse`] on a schema mismatch and
    /// [`SessionError::Encoding`] on a malformed payload.
    pub fn open<M: Model>(&self) -> Result<M, SessionError> {
        let expected = M::schema_digest();
        if self.schema_digest != expected {
            return Err(SessionError::UnexpectedResponse(format!(
                "schema {} does not match expected {}",
                self.schema_digest, expected
            )));
        }
        let bytes = BASE64
            .decode(&self.payload)
            .map_err(|e| SessionError::Encoding(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
