//! Password hashing for portal accounts (bcrypt)

use bcrypt::{hash, verify, BcryptError};

/// Bcrypt work factor used when none is configured
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Hashes and checks login secrets
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// Create a hasher with the given bcrypt cost (clamped to bcrypt's 4..=31)
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(4, 31),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a secret
    pub fn hash(&self, secret: &str) -> Result<String, BcryptError> {
        hash(secret, self.cost)
    }

    /// Verify a secret against a stored hash; malformed hashes never match
    pub fn verify(&self, secret: &str, stored_hash: &str) -> bool {
        verify(secret, stored_hash).unwrap_or(false)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}
