//! One-way salted password hashing (bcrypt)

use super::AuthError;
use crate::common::config::DEFAULT_BCRYPT_COST;

/// Bcrypt hasher with a fixed work factor
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hashes with a fresh random salt; the salt and cost are embedded in
    /// the returned digest.
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        bcrypt::hash(plaintext, self.cost).map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// A malformed digest verifies as `false`.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        bcrypt::verify(plaintext, digest).unwrap_or(false)
    }

    /// `hash` on the blocking pool.
    pub async fn hash_blocking(&self, plaintext: &str) -> Result<String, AuthError> {
        let hasher = *self;
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    /// `verify` on the blocking pool.
    pub async fn verify_blocking(&self, plaintext: &str, digest: &str) -> bool {
        let hasher = *self;
        let plaintext = plaintext.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .unwrap_or(false)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}
