//! RSA key handles.
//!
//! Public keys travel as PEM. We emit PKCS#1 (`BEGIN RSA PUBLIC KEY`) and
//! accept both PKCS#1 and SPKI (`BEGIN PUBLIC KEY`), since the server exports
//! the latter.
//!
//! Private keys only exist unencrypted in memory. At rest they are encrypted
//! PKCS#8 under a [`Passphrase`].
//!
//! # Security
//!
//! The passphrase is derived from a local identifier (by default the OS user
//! name), so anyone who can read the key cache can also derive it. The
//! encryption keeps the cache format stable and compatible; it is not a
//! secrecy boundary.

use std::fmt;

use rand::rngs::OsRng;
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, LineEnding},
    traits::PublicKeyParts,
};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, Result};

/// Bytes of OAEP padding overhead with SHA-1 (2 * 20 + 2).
pub const OAEP_SHA1_OVERHEAD: usize = 42;

/// Domain separator for passphrase derivation.
const PASSPHRASE_CONTEXT: &[u8] = b"cloakline-keystore:";

/// Passphrase protecting the cached private key.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(String);

impl Passphrase {
    /// Derive the passphrase for a local identifier.
    ///
    /// Deterministic: the same identifier always yields the same passphrase,
    /// so a cache written by one run opens in the next.
    pub fn derive(identifier: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(PASSPHRASE_CONTEXT);
        hasher.update(identifier.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Use an explicit passphrase.
    pub fn from_secret(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

/// Parsed RSA public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyHandle {
    key: RsaPublicKey,
}

impl PublicKeyHandle {
    /// Parse a PEM public key (PKCS#1 or SPKI).
    ///
    /// # Errors
    ///
    /// `KeyFormat` if the input is neither.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        RsaPublicKey::from_public_key_pem(raw)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(raw))
            .map(|key| Self { key })
            .map_err(|e| CryptoError::KeyFormat(e.to_string()))
    }

    /// Encode as PKCS#1 PEM, the form sent on `sendPublicKey`.
    pub fn to_pem(&self) -> Result<String> {
        self.key.to_pkcs1_pem(LineEnding::LF).map_err(|e| CryptoError::KeyFormat(e.to_string()))
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.key.size() * 8
    }

    /// Largest plaintext one OAEP block can carry under this key.
    pub fn max_block_len(&self) -> usize {
        self.key.size().saturating_sub(OAEP_SHA1_OVERHEAD)
    }

    pub(crate) fn inner(&self) -> &RsaPublicKey {
        &self.key
    }
}

impl fmt::Debug for PublicKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyHandle").field("bits", &self.bits()).finish()
    }
}

/// Unlocked RSA private key.
#[derive(Clone)]
pub struct PrivateKey {
    key: RsaPrivateKey,
}

impl PrivateKey {
    /// Generate a fresh key of `bits` modulus size.
    pub fn generate(bits: usize) -> Result<Self> {
        RsaPrivateKey::new(&mut OsRng, bits)
            .map(|key| Self { key })
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))
    }

    /// Decrypt an encrypted PKCS#8 PEM with `passphrase`.
    ///
    /// # Errors
    ///
    /// `KeyFormat` if the PEM is malformed or the passphrase is wrong; the two
    /// are indistinguishable by design of PKCS#8 encryption.
    pub fn unlock(pem: &str, passphrase: &Passphrase) -> Result<Self> {
        RsaPrivateKey::from_pkcs8_encrypted_pem(pem.trim(), passphrase.as_bytes())
            .map(|key| Self { key })
            .map_err(|e| CryptoError::KeyFormat(e.to_string()))
    }

    /// Encrypt to PKCS#8 PEM under `passphrase`, for the key cache.
    pub fn lock(&self, passphrase: &Passphrase) -> Result<String> {
        self.key
            .to_pkcs8_encrypted_pem(&mut OsRng, passphrase.as_bytes(), LineEnding::LF)
            .map(|pem| pem.as_str().to_owned())
            .map_err(|e| CryptoError::KeyFormat(e.to_string()))
    }

    /// Matching public key.
    pub fn public_key(&self) -> PublicKeyHandle {
        PublicKeyHandle { key: self.key.to_public_key() }
    }

    pub(crate) fn inner(&self) -> &RsaPrivateKey {
        &self.key
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("bits", &(self.key.size() * 8)).finish_non_exhaustive()
    }
}

/// Local identity keypair as cached on disk.
///
/// The private half stays encrypted until [`KeyPair::unlock`] is called.
#[derive(Clone)]
pub struct KeyPair {
    public: PublicKeyHandle,
    public_pem: String,
    private_pem: String,
}

impl KeyPair {
    /// Assemble from cached PEMs. Validates the public half.
    pub fn from_pems(public_pem: String, private_pem: String) -> Result<Self> {
        let public = PublicKeyHandle::parse(&public_pem)?;
        Ok(Self { public, public_pem, private_pem })
    }

    /// Public key.
    pub fn public_key(&self) -> &PublicKeyHandle {
        &self.public
    }

    /// Public key PEM exactly as cached.
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    /// Encrypted private key PEM exactly as cached.
    pub fn private_pem(&self) -> &str {
        &self.private_pem
    }

    /// Decrypt the private half.
    pub fn unlock(&self, passphrase: &Passphrase) -> Result<PrivateKey> {
        let private = PrivateKey::unlock(&self.private_pem, passphrase)?;
        if private.public_key() != self.public {
            return Err(CryptoError::KeyFormat("cached key halves do not match".into()));
        }
        Ok(private)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair").field("public", &self.public).finish_non_exhaustive()
    }
}
