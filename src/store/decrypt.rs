//! Decryption of encrypted cookie values
//!
//! Chrome encrypts cookie values with AES-128-CBC under a key derived from
//! a passphrase it registers in the OS credential store. The key is derived
//! once per run; a wrong passphrase is not transient, so nothing here
//! retries.

use aes::Aes128;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

use crate::error::{CookieFerryError, Result};

/// Credential store identifiers Chrome registers its passphrase under.
pub const CREDENTIAL_SERVICE: &str = "Chrome Safe Storage";
pub const CREDENTIAL_ACCOUNT: &str = "Chrome";

const KEY_DERIVE_SALT: &[u8] = b"saltysalt";
const KEY_DERIVE_ITERATIONS: u32 = 1003;
const KEY_LENGTH: usize = 16;
const AES_IV: &[u8; 16] = b"                ";
const VERSION_PREFIX: &[u8] = b"v10";
const DIGEST_PREFIX_LENGTH: usize = 32;

/// Decrypts single opaque cookie-value blobs with a key derived once at
/// construction.
pub struct CookieDecryptor {
    key: [u8; KEY_LENGTH],
}

impl CookieDecryptor {
    /// Derive the store key from the passphrase in the OS credential store.
    ///
    /// Lookup failure surfaces as a `Decryption` error like any cipher
    /// failure would.
    pub fn from_credential_store() -> Result<Self> {
        let passphrase = read_store_passphrase()?;
        Ok(Self::from_passphrase(&passphrase))
    }

    /// Derive the store key from a known passphrase. Composition-root seam
    /// used by tests and fixtures.
    pub fn from_passphrase(passphrase: &[u8]) -> Self {
        let mut key = [0u8; KEY_LENGTH];
        pbkdf2_hmac::<Sha1>(passphrase, KEY_DERIVE_SALT, KEY_DERIVE_ITERATIONS, &mut key);
        Self { key }
    }

    /// Decrypt one blob into plaintext bytes.
    ///
    /// Callers must hand in a non-empty blob carrying the `v10` marker;
    /// anything else is a bug in the row mapping, not store corruption.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        debug_assert!(blob.starts_with(VERSION_PREFIX));
        let ciphertext = blob.get(VERSION_PREFIX.len()..).ok_or_else(|| {
            CookieFerryError::Decryption("blob shorter than its version marker".to_string())
        })?;

        let mut buffer = ciphertext.to_vec();
        let cipher = cbc::Decryptor::<Aes128>::new_from_slices(&self.key, AES_IV)
            .map_err(|e| CookieFerryError::Decryption(format!("failed to build cipher: {}", e)))?;
        let plaintext = cipher
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)
            .map_err(|_| CookieFerryError::Decryption("bad padding or wrong key".to_string()))?;

        // the store prepends a 32-byte digest of the cookie's domain
        if plaintext.len() < DIGEST_PREFIX_LENGTH {
            return Err(CookieFerryError::Decryption(
                "decrypted value shorter than its digest prefix".to_string(),
            ));
        }
        Ok(plaintext[DIGEST_PREFIX_LENGTH..].to_vec())
    }
}

#[cfg(target_os = "macos")]
fn read_store_passphrase() -> Result<Vec<u8>> {
    use security_framework::passwords::get_generic_password;

    get_generic_password(CREDENTIAL_SERVICE, CREDENTIAL_ACCOUNT)
        .map_err(|e| CookieFerryError::Decryption(format!("keychain lookup failed: {}", e)))
}

#[cfg(target_os = "linux")]
fn read_store_passphrase() -> Result<Vec<u8>> {
    use secret_service::blocking::SecretService;
    use secret_service::EncryptionType;

    let service = SecretService::connect(EncryptionType::Dh).map_err(|e| {
        CookieFerryError::Decryption(format!("failed to connect to secret service: {}", e))
    })?;
    let collection = service
        .get_default_collection()
        .or_else(|_| service.get_any_collection())
        .map_err(|e| {
            CookieFerryError::Decryption(format!("failed to open keyring collection: {}", e))
        })?;
    let items = collection
        .get_all_items()
        .map_err(|e| CookieFerryError::Decryption(format!("failed to read keyring items: {}", e)))?;

    for item in items {
        if item.get_label().unwrap_or_default() == CREDENTIAL_SERVICE {
            if item.is_locked().unwrap_or(false) {
                if let Err(e) = item.unlock() {
                    log::warn!("Failed to unlock keyring item: {}", e);
                }
            }
            return item.get_secret().map_err(|e| {
                CookieFerryError::Decryption(format!("failed to read keyring secret: {}", e))
            });
        }
    }

    Err(CookieFerryError::Decryption(format!(
        "no '{}' entry in the keyring",
        CREDENTIAL_SERVICE
    )))
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn read_store_passphrase() -> Result<Vec<u8>> {
    Err(CookieFerryError::Decryption(
        "no credential store backend for this platform".to_string(),
    ))
}


#[cfg(test)]
mod tests {
    use super::tests_support::encrypt_fixture;
    use super::{CookieDecryptor, VERSION_PREFIX};
    use crate::error::CookieFerryError;

    #[test]
    fn decrypts_a_known_answer_blob() {
        let decryptor = CookieDecryptor::from_passphrase(b"fixture-passphrase");
        let blob = encrypt_fixture(&decryptor, b"session-token-value");
        let plaintext = decryptor.decrypt(&blob).expect("decrypt");
        assert_eq!(plaintext, b"session-token-value");
    }

    #[test]
    fn decrypts_an_empty_plaintext() {
        let decryptor = CookieDecryptor::from_passphrase(b"fixture-passphrase");
        let blob = encrypt_fixture(&decryptor, b"");
        let plaintext = decryptor.decrypt(&blob).expect("decrypt");
        assert!(plaintext.is_empty());
    }

    #[test]
    fn non_block_aligned_ciphertext_fails() {
        let decryptor = CookieDecryptor::from_passphrase(b"fixture-passphrase");
        let mut blob = VERSION_PREFIX.to_vec();
        blob.extend_from_slice(&[0u8; 15]);
        let err = decryptor.decrypt(&blob).expect_err("bad ciphertext");
        assert!(matches!(err, CookieFerryError::Decryption(_)));
    }

    #[test]
    fn wrong_key_never_yields_the_plaintext() {
        let encryptor = CookieDecryptor::from_passphrase(b"fixture-passphrase");
        let blob = encrypt_fixture(&encryptor, b"session-token-value");

        let decryptor = CookieDecryptor::from_passphrase(b"some-other-passphrase");
        match decryptor.decrypt(&blob) {
            Err(e) => assert!(matches!(e, CookieFerryError::Decryption(_))),
            Ok(plaintext) => assert_ne!(plaintext, b"session-token-value"),
        }
    }
}
