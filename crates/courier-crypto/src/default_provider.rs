//! [`DefaultCryptoProvider`]: X25519 + HKDF-SHA256 + XChaCha20-Poly1305 for
//! asymmetric wrap, Ed25519 for signatures, SHA-256 for hashing and
//! thumbprints.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use courier_core::capabilities::SymmetricEncryptionResult;
use courier_core::{CryptoProvider, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::errors::CryptoError;

const X25519_WRAP_INFO: &[u8] = b"courier-asym-wrap-v1";
const SYM_KEY_LEN: usize = 32;
const XNONCE_LEN: usize = 24;

/// The production [`CryptoProvider`] implementation. Stateless: every
/// method call is independently safe to invoke from any thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCryptoProvider;

impl DefaultCryptoProvider {
    /// Creates a new provider. There is no configuration: algorithm choices
    /// are fixed for wire compatibility between peers running this crate.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn derive_wrap_key(shared_secret: &[u8]) -> [u8; SYM_KEY_LEN] {
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut okm = [0u8; SYM_KEY_LEN];
    // The only way `expand` fails is requesting more output than SHA-256's
    // 255*32-byte limit; 32 bytes is always valid.
    #[allow(clippy::expect_used)]
    hk.expand(X25519_WRAP_INFO, &mut okm).expect("32-byte HKDF expand always succeeds");
    okm
}

impl CryptoProvider for DefaultCryptoProvider {
    fn generate_signing_keypair(&self) -> (Vec<u8>, Vec<u8>) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        (signing_key.to_bytes().to_vec(), verifying_key.to_bytes().to_vec())
    }

    fn generate_encryption_keypair(&self) -> (Vec<u8>, Vec<u8>) {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let secret = StaticSecret::from(seed);
        let public = PublicKey::from(&secret);
        let priv_bytes = secret.to_bytes().to_vec();
        seed.zeroize();
        (priv_bytes, public.to_bytes().to_vec())
    }

    fn sign(&self, signing_priv: &[u8], message: &[u8]) -> Vec<u8> {
        let Ok(key_bytes) = <[u8; 32]>::try_from(signing_priv) else {
            // A malformed local key is a caller bug, not attacker input;
            // there is no sane signature to return.
            return Vec::new();
        };
        let signing_key = SigningKey::from_bytes(&key_bytes);
        signing_key.sign(message).to_bytes().to_vec()
    }

    fn verify(&self, signing_pub: &[u8], message: &[u8], signature: &[u8]) -> bool {
        let Ok(pub_bytes) = <[u8; 32]>::try_from(signing_pub) else { return false };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else { return false };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&pub_bytes) else { return false };
        let signature = Signature::from_bytes(&sig_bytes);
        verifying_key.verify(message, &signature).is_ok()
    }

    fn asym_encrypt(&self, recipient_encryption_pub: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let Ok(recipient_bytes) = <[u8; 32]>::try_from(recipient_encryption_pub) else {
            return Vec::new();
        };
        let recipient_public = PublicKey::from(recipient_bytes);

        let mut ephemeral_seed = [0u8; 32];
        OsRng.fill_bytes(&mut ephemeral_seed);
        let ephemeral_secret = StaticSecret::from(ephemeral_seed);
        let ephemeral_public = PublicKey::from(&ephemeral_secret);
        ephemeral_seed.zeroize();

        let shared = ephemeral_secret.diffie_hellman(&recipient_public);
        let wrap_key = derive_wrap_key(shared.as_bytes());

        let mut nonce_bytes = [0u8; XNONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&wrap_key));
        // A freshly generated 24-byte nonce with a 32-byte key cannot fail.
        #[allow(clippy::expect_used)]
        let ciphertext = cipher.encrypt(nonce, plaintext).expect("XChaCha20-Poly1305 encrypt cannot fail");

        let mut out = Vec::with_capacity(32 + XNONCE_LEN + ciphertext.len());
        out.extend_from_slice(ephemeral_public.as_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        out
    }

    fn asym_decrypt(&self, own_encryption_priv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let Ok(priv_bytes) = <[u8; 32]>::try_from(own_encryption_priv) else {
            return Err(CryptoError::InvalidLength { expected: 32, actual: own_encryption_priv.len() }.into());
        };
        if ciphertext.len() < 32 + XNONCE_LEN {
            return Err(CryptoError::InvalidLength { expected: 32 + XNONCE_LEN, actual: ciphertext.len() }.into());
        }
        let (ephemeral_pub_bytes, rest) = ciphertext.split_at(32);
        let (nonce_bytes, aead_ciphertext) = rest.split_at(XNONCE_LEN);

        let Ok(ephemeral_pub_array) = <[u8; 32]>::try_from(ephemeral_pub_bytes) else {
            return Err(CryptoError::InvalidLength { expected: 32, actual: ephemeral_pub_bytes.len() }.into());
        };
        let ephemeral_public = PublicKey::from(ephemeral_pub_array);
        let own_secret = StaticSecret::from(priv_bytes);
        let shared = own_secret.diffie_hellman(&ephemeral_public);
        let wrap_key = derive_wrap_key(shared.as_bytes());

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&wrap_key));
        let nonce = XNonce::from_slice(nonce_bytes);
        let plaintext = cipher.decrypt(nonce, aead_ciphertext).map_err(|_| CryptoError::Unauthenticated)?;
        Ok(plaintext)
    }

    fn sym_encrypt(&self, plaintext: &[u8]) -> SymmetricEncryptionResult {
        let mut key_bytes = [0u8; SYM_KEY_LEN];
        OsRng.fill_bytes(&mut key_bytes);
        let mut nonce_bytes = [0u8; XNONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        let nonce = XNonce::from_slice(&nonce_bytes);
        #[allow(clippy::expect_used)]
        let ciphertext = cipher.encrypt(nonce, plaintext).expect("XChaCha20-Poly1305 encrypt cannot fail");

        SymmetricEncryptionResult { key: key_bytes.to_vec(), iv: nonce_bytes.to_vec(), ciphertext }
    }

    fn sym_decrypt(&self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let Ok(key_bytes) = <[u8; SYM_KEY_LEN]>::try_from(key) else {
            return Err(CryptoError::InvalidLength { expected: SYM_KEY_LEN, actual: key.len() }.into());
        };
        let Ok(nonce_bytes) = <[u8; XNONCE_LEN]>::try_from(iv) else {
            return Err(CryptoError::InvalidLength { expected: XNONCE_LEN, actual: iv.len() }.into());
        };

        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        let nonce = XNonce::from_slice(&nonce_bytes);
        let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| CryptoError::Unauthenticated)?;
        Ok(plaintext)
    }

    fn hash(&self, bytes: &[u8]) -> Vec<u8> {
        use sha2::Digest;
        Sha256::digest(bytes).to_vec()
    }

    fn thumbprint(&self, signing_pub: &[u8]) -> String {
        courier_proto::base64url::encode(&self.hash(signing_pub))
    }
}
