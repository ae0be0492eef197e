//! Session secrets and password hashing
//!
//! A session secret is a fixed-length random byte string. The client holds
//! its hex encoding as the raw token; the store only ever sees the hex
//! encoded SHA-256 digest of the bytes.

use std::fmt;

use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};

/// Size of a session secret in bytes
pub const SESSION_SECRET_SIZE: usize = 16;
/// Size of a password salt in bytes
const SALT_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("random source failed: {0}")]
    Random(#[from] getrandom::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("invalid session token")]
    InvalidToken,
}

/// A freshly minted or client-presented session secret
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret([u8; SESSION_SECRET_SIZE]);

impl SessionSecret {
    /// Draw a new secret from the OS random source
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; SESSION_SECRET_SIZE];
        getrandom::getrandom(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Parse the raw token a client presents
    pub fn from_hex(token: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(token.trim()).map_err(|_| CryptoError::InvalidToken)?;
        let bytes: [u8; SESSION_SECRET_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidToken)?;
        Ok(Self(bytes))
    }

    /// The raw token handed to the client
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The value persisted in the user's session record
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0))
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(..)")
    }
}

/// Opaque hash / verify capability for passwords
pub trait PasswordHasher: Send + Sync + fmt::Debug {
    fn hash(&self, plaintext: &str) -> Result<String, CryptoError>;

    /// Malformed hashes verify as `false`
    fn verify(&self, hash: &str, plaintext: &str) -> bool;
}

/// Argon2id password hashing with PHC-formatted output
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2Hasher {
    /// Build a hasher with explicit memory (KiB) and iteration costs
    pub fn with_cost(m_cost: u32, t_cost: u32) -> Result<Self, CryptoError> {
        let params = Params::new(m_cost, t_cost, 1, None)
            .map_err(|e| CryptoError::Hash(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut salt = [0u8; SALT_SIZE];
        getrandom::getrandom(&mut salt)?;
        let salt = SaltString::encode_b64(&salt).map_err(|e| CryptoError::Hash(e.to_string()))?;

        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CryptoError::Hash(e.to_string()))
    }

    fn verify(&self, hash: &str, plaintext: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}
