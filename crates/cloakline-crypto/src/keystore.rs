//! On-disk key cache.
//!
//! Layout under the cache directory:
//!
//! ```text
//! keys/
//! ├── public.pem                 own public key, PKCS#1
//! ├── private.pem                own private key, encrypted PKCS#8
//! └── contacts/
//!     └── <username>_<id>.pem    fetched contact keys
//! ```
//!
//! Once both own-key files exist they are the source of truth and are reused
//! on every run. A half-written cache is treated as absent and regenerated.

use std::{
    fs,
    path::{Path, PathBuf},
};

use cloakline_proto::Contact;

use crate::{
    error::{CryptoError, Result},
    keys::{KeyPair, Passphrase, PrivateKey, PublicKeyHandle},
};

/// Own public key filename.
pub const PUBLIC_KEY_FILE: &str = "public.pem";

/// Own private key filename.
pub const PRIVATE_KEY_FILE: &str = "private.pem";

/// Subdirectory for contact keys.
pub const CONTACTS_DIR: &str = "contacts";

/// Default RSA modulus size for new identities.
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Key cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStoreConfig {
    /// Cache directory, created if missing.
    pub dir: PathBuf,
    /// Stable local identifier the passphrase is derived from.
    pub identity: String,
    /// Modulus size used when generating a new keypair.
    pub key_bits: usize,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        let identity = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "cloakline".to_string());
        Self { dir: PathBuf::from("keys"), identity, key_bits: DEFAULT_KEY_BITS }
    }
}

/// Key cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
    key_bits: usize,
    passphrase: Passphrase,
}

impl KeyStore {
    /// Open (and create if needed) the cache directory.
    pub fn open(config: KeyStoreConfig) -> Result<Self> {
        let contacts = config.dir.join(CONTACTS_DIR);
        fs::create_dir_all(&contacts).map_err(|source| CryptoError::Io { path: contacts, source })?;
        Ok(Self {
            passphrase: Passphrase::derive(&config.identity),
            dir: config.dir,
            key_bits: config.key_bits,
        })
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Passphrase protecting the cached private key.
    pub fn passphrase(&self) -> &Passphrase {
        &self.passphrase
    }

    /// Whether both own-key files are present.
    pub fn is_cached(&self) -> bool {
        self.public_path().is_file() && self.private_path().is_file()
    }

    /// Load the cached keypair, generating and persisting one if absent.
    pub fn get_or_create_key_pair(&self) -> Result<KeyPair> {
        if self.is_cached() {
            tracing::debug!(dir = %self.dir.display(), "key pair cached");
            let public_pem = read(&self.public_path())?;
            let private_pem = read(&self.private_path())?;
            return KeyPair::from_pems(public_pem, private_pem);
        }

        tracing::info!(dir = %self.dir.display(), bits = self.key_bits, "generating new key pair");
        self.generate()
    }

    fn generate(&self) -> Result<KeyPair> {
        let private = PrivateKey::generate(self.key_bits)?;
        let public_pem = private.public_key().to_pem()?;
        let private_pem = private.lock(&self.passphrase)?;

        // Delete-then-write so a stale half never pairs with a fresh one.
        for path in [self.public_path(), self.private_path()] {
            if path.exists() {
                fs::remove_file(&path).map_err(|source| CryptoError::Io { path, source })?;
            }
        }
        write(&self.public_path(), &public_pem)?;
        write(&self.private_path(), &private_pem)?;

        KeyPair::from_pems(public_pem, private_pem)
    }

    /// Parse a PEM public key received from a peer.
    pub fn parse_public_key(raw: &str) -> Result<PublicKeyHandle> {
        PublicKeyHandle::parse(raw)
    }

    /// Path of a contact's cached key.
    pub fn contact_key_path(&self, contact: &Contact) -> PathBuf {
        let name = format!("{}_{}.pem", sanitize(&contact.username), sanitize(&contact.id));
        self.dir.join(CONTACTS_DIR).join(name)
    }

    /// Load a contact's cached public key.
    ///
    /// # Errors
    ///
    /// `KeyNotCached` if no key has been stored for this contact.
    pub fn load_cached_public_key(&self, contact: &Contact) -> Result<PublicKeyHandle> {
        let path = self.contact_key_path(contact);
        if !path.is_file() {
            return Err(CryptoError::KeyNotCached { contact: contact.username.clone() });
        }
        PublicKeyHandle::parse(&read(&path)?)
    }

    /// Store a contact's public key. The PEM is validated first.
    pub fn cache_public_key(&self, contact: &Contact, pem: &str) -> Result<()> {
        PublicKeyHandle::parse(pem)?;
        let path = self.contact_key_path(contact);
        tracing::debug!(contact = %contact.username, path = %path.display(), "caching contact key");
        write(&path, pem)
    }

    fn public_path(&self) -> PathBuf {
        self.dir.join(PUBLIC_KEY_FILE)
    }

    fn private_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| CryptoError::Io { path: path.to_path_buf(), source })
}

fn write(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|source| CryptoError::Io { path: path.to_path_buf(), source })
}

/// Keep filenames portable; usernames are server-controlled.
fn sanitize(part: &str) -> String {
    part.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::testing;

    /// Small keys keep generation fast; strength is not under test here.
    fn store(dir: &TempDir) -> KeyStore {
        KeyStore::open(KeyStoreConfig {
            dir: dir.path().to_path_buf(),
            identity: "tester".into(),
            key_bits: 1024,
        })
        .unwrap()
    }

    #[test]
    fn open_creates_contacts_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("keys");
        let keystore = KeyStore::open(KeyStoreConfig { dir: root.clone(), identity: "tester".into(), key_bits: 1024 })
            .unwrap();

        assert_eq!(keystore.dir(), root.as_path());
        assert!(keystore.dir().join(CONTACTS_DIR).is_dir());
        assert!(!keystore.is_cached());
    }

    #[test]
    fn creates_then_reuses_cache() {
        let dir = TempDir::new().unwrap();
        let keystore = store(&dir);
        assert!(!keystore.is_cached());

        let first = keystore.get_or_create_key_pair().unwrap();
        assert!(keystore.is_cached());

        let second = keystore.get_or_create_key_pair().unwrap();
        assert_eq!(first.public_key(), second.public_key());
        assert_eq!(first.private_pem(), second.private_pem());
    }

    #[test]
    fn cached_private_key_is_encrypted_and_unlocks() {
        let dir = TempDir::new().unwrap();
        let keystore = store(&dir);
        let pair = keystore.get_or_create_key_pair().unwrap();

        let on_disk = fs::read_to_string(dir.path().join(PRIVATE_KEY_FILE)).unwrap();
        assert!(on_disk.contains("ENCRYPTED PRIVATE KEY"));

        let private = pair.unlock(keystore.passphrase()).unwrap();
        assert_eq!(&private.public_key(), pair.public_key());
    }

    #[test]
    fn reopened_store_derives_same_passphrase() {
        let dir = TempDir::new().unwrap();
        let pair = store(&dir).get_or_create_key_pair().unwrap();

        let reopened = store(&dir);
        let again = reopened.get_or_create_key_pair().unwrap();
        assert!(again.unlock(reopened.passphrase()).is_ok());
        assert_eq!(pair.public_key(), again.public_key());
    }

    #[test]
    fn half_cache_is_regenerated() {
        let dir = TempDir::new().unwrap();
        let keystore = store(&dir);
        let first = keystore.get_or_create_key_pair().unwrap();

        fs::remove_file(dir.path().join(PRIVATE_KEY_FILE)).unwrap();
        assert!(!keystore.is_cached());

        let second = keystore.get_or_create_key_pair().unwrap();
        assert_ne!(first.public_key(), second.public_key());
        assert!(second.unlock(keystore.passphrase()).is_ok());
    }

    #[test]
    fn contact_key_cache() {
        let dir = TempDir::new().unwrap();
        let keystore = store(&dir);
        let bob = Contact::new("bob", "17");

        assert!(matches!(
            keystore.load_cached_public_key(&bob),
            Err(CryptoError::KeyNotCached { contact }) if contact == "bob"
        ));

        let pem = testing::server_key().public_key().to_pem().unwrap();
        keystore.cache_public_key(&bob, &pem).unwrap();
        assert_eq!(keystore.load_cached_public_key(&bob).unwrap(), testing::server_key().public_key());

        // Same username, different id: separate entry.
        assert!(keystore.load_cached_public_key(&Contact::new("bob", "18")).is_err());
    }

    #[test]
    fn invalid_contact_key_not_cached() {
        let dir = TempDir::new().unwrap();
        let keystore = store(&dir);
        let bob = Contact::new("bob", "1");

        assert!(matches!(keystore.cache_public_key(&bob, "garbage"), Err(CryptoError::KeyFormat(_))));
        assert!(!keystore.contact_key_path(&bob).exists());
    }

    #[test]
    fn contact_filenames_are_sanitized() {
        let dir = TempDir::new().unwrap();
        let keystore = store(&dir);
        let path = keystore.contact_key_path(&Contact::new("../../etc/passwd", "1"));
        assert_eq!(path.parent().unwrap(), dir.path().join(CONTACTS_DIR));
        assert_eq!(path.file_name().unwrap(), "______etc_passwd_1.pem");
    }
}
