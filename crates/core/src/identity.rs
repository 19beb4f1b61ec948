use ed25519_dalek::{Signer, Verifier};

use crate::error::CoreError;
use crate::ids::{ActorId, Signature};

/// The signing identity of one engine session. Audit-trail entries are
/// signed with this key so the trail is tamper-evident after export.
pub struct EngineIdentity {
    signing_key: ed25519_dalek::SigningKey,
}

impl EngineIdentity {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut rng),
        }
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(bytes),
        }
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn actor_id(&self) -> ActorId {
        let verifying_key = self.signing_key.verifying_key();
        ActorId::from_bytes(verifying_key.to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key.sign(message);
        Signature::from_bytes(sig.to_bytes())
    }
}

pub fn verify_signature(
    actor_id: &ActorId,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CoreError> {
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(actor_id.as_bytes())
        .map_err(|_| CoreError::InvalidSignature)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CoreError::InvalidSignature)
}
