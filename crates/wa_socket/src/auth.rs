//! Collaborators the handshake calls out to.

use async_trait::async_trait;

use crate::error::{Result, SocketError};

/// Validates the certificate the server sends with its hello.
pub trait CertificateVerifier: Send + Sync {
    fn verify(&self, server_static: &[u8; 32], certificate: &[u8]) -> Result<()>;
}

/// Supplies the registration payload carried in the client finish.
#[async_trait]
pub trait ClientPayload: Send + Sync {
    async fn payload(&self) -> Result<Vec<u8>>;
}

/// Accepts only a server whose static key matches a pinned value.
#[derive(Debug, Clone)]
pub struct PinnedServerKey(pub [u8; 32]);

impl CertificateVerifier for PinnedServerKey {
    fn verify(&self, server_static: &[u8; 32], _certificate: &[u8]) -> Result<()> {
        if server_static != &self.0 {
            return Err(SocketError::CertificateRejected(
                "server static key does not match the pinned key".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ClientPayload for Vec<u8> {
    async fn payload(&self) -> Result<Vec<u8>> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_key_rejects_other_servers() {
        let verifier = PinnedServerKey([7u8; 32]);
        verifier.verify(&[7u8; 32], b"cert").unwrap();
        assert!(matches!(
            verifier.verify(&[8u8; 32], b"cert"),
            Err(SocketError::CertificateRejected(_))
        ));
    }

    #[tokio::test]
    async fn byte_vector_is_its_own_payload() {
        let payload = b"registration".to_vec();
        assert_eq!(payload.payload().await.unwrap(), b"registration");
    }
}
