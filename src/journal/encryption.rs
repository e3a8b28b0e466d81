//! This module implements the encryption of journal content.
//!
//! Each journal has its own key, derived from the user's derived key and the journal uid, or a
//! shared key stored (sealed) alongside the journal.  Sealed data is an envelope of a version
//! byte, a 96-bit nonce, and the ChaCha20-Poly1305 ciphertext.  The version byte and a
//! caller-supplied value (usually the journal uid) are authenticated as associated data.
use super::CURRENT_VERSION;
use crate::errors::{Error, Result};
use ring::{aead, digest, hmac, pbkdf2, rand, rand::SecureRandom};

const PBKDF2_ITERATIONS: u32 = if cfg!(test) { 1_000 } else { 600_000 };
const NONCE_LEN: usize = 12;

/// Derive the key material used to encrypt a user's journals from their username and
/// encryption password.  This is deliberately slow, and should be done once, at login.
pub fn derive_key(username: &str, password: &str) -> String {
    let mut key = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        std::num::NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(std::num::NonZeroU32::MIN),
        username.as_bytes(),
        password.as_bytes(),
        &mut key,
    );
    to_hex(&key)
}

/// Lower-case hex encoding.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A Cryptor stores the keys for one journal (or user-info record) and can seal, unseal and
/// authenticate data with them.
pub(crate) struct Cryptor {
    version: u8,
    key: aead::LessSafeKey,
    mac_key: hmac::Key,
    rng: rand::SystemRandom,
}

impl Cryptor {
    /// Make a cryptor from a user's derived key, for the given salt (a journal uid, or
    /// `"userInfo"`).
    pub(crate) fn new(version: u32, derived_key: &str, salt: &str) -> Result<Self> {
        let salt = hmac::Key::new(hmac::HMAC_SHA256, salt.as_bytes());
        let master = hmac::sign(&salt, derived_key.as_bytes());
        Cryptor::from_key(version, master.as_ref())
    }

    /// Make a cryptor from raw key material, such as a journal's shared key.
    pub(crate) fn from_key(version: u32, key: &[u8]) -> Result<Self> {
        if version > CURRENT_VERSION {
            return Err(Error::VersionTooNew {
                version,
                supported: CURRENT_VERSION,
            });
        }
        let version = u8::try_from(version)
            .map_err(|_| Error::Integrity(format!("Invalid version {version}")))?;

        let master = hmac::Key::new(hmac::HMAC_SHA256, key);
        let enc = hmac::sign(&master, b"enc");
        let unbound = aead::UnboundKey::new(&aead::CHACHA20_POLY1305, enc.as_ref())
            .map_err(|_| anyhow::anyhow!("Could not create encryption key"))?;
        let mac = hmac::sign(&master, b"mac");
        Ok(Cryptor {
            version,
            key: aead::LessSafeKey::new(unbound),
            mac_key: hmac::Key::new(hmac::HMAC_SHA256, mac.as_ref()),
            rng: rand::SystemRandom::new(),
        })
    }

    fn aad(version: u8, aad: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(aad.len() + 1);
        result.push(version);
        result.extend_from_slice(aad);
        result
    }

    /// Encrypt the given payload, binding it to `aad`.
    pub(crate) fn seal(&self, payload: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_buf = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_buf)
            .map_err(|_| anyhow::anyhow!("error generating random nonce"))?;
        let nonce = aead::Nonce::assume_unique_for_key(nonce_buf);

        let mut in_out = payload.to_vec();
        self.key
            .seal_in_place_append_tag(
                nonce,
                aead::Aad::from(Cryptor::aad(self.version, aad)),
                &mut in_out,
            )
            .map_err(|_| anyhow::anyhow!("error while sealing"))?;

        let mut envelope = Vec::with_capacity(1 + NONCE_LEN + in_out.len());
        envelope.push(self.version);
        envelope.extend_from_slice(&nonce_buf);
        envelope.extend_from_slice(&in_out);
        Ok(envelope)
    }

    /// Decrypt an envelope produced by [`Cryptor::seal`] with the same `aad`.
    pub(crate) fn unseal(&self, envelope: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let Some((&version, rest)) = envelope.split_first() else {
            return Err(Error::Integrity("Sealed data is empty".into()));
        };
        if u32::from(version) > CURRENT_VERSION {
            return Err(Error::VersionTooNew {
                version: version.into(),
                supported: CURRENT_VERSION,
            });
        }
        if rest.len() < NONCE_LEN {
            return Err(Error::Integrity("Sealed data is truncated".into()));
        }
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let nonce = aead::Nonce::try_assume_unique_for_key(nonce)
            .map_err(|_| Error::Integrity("Invalid nonce".into()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, aead::Aad::from(Cryptor::aad(version, aad)), &mut in_out)
            .map_err(|_| Error::Integrity("Sealed data failed verification".into()))?;
        let len = plaintext.len();
        in_out.truncate(len);
        Ok(in_out)
    }

    /// Authenticate a sequence of byte strings, as if concatenated.
    pub(crate) fn hmac(&self, parts: &[&[u8]]) -> Vec<u8> {
        let mut ctx = hmac::Context::with_key(&self.mac_key);
        for part in parts {
            ctx.update(part);
        }
        ctx.sign().as_ref().to_vec()
    }

    /// Fill a new buffer with random bytes.
    pub(crate) fn random_key(&self) -> Result<Vec<u8>> {
        let mut key = vec![0u8; 32];
        self.rng
            .fill(&mut key)
            .map_err(|_| anyhow::anyhow!("error generating random key"))?;
        Ok(key)
    }
}

/// The SHA-256 digest of a key, used as its public fingerprint.
pub(crate) fn fingerprint(key: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA256, key).as_ref().to_vec()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cryptor(salt: &str) -> Cryptor {
        Cryptor::new(CURRENT_VERSION, "derived", salt).unwrap()
    }

    #[test]
    fn round_trip() {
        let c = cryptor("journal");
        let sealed = c.seal(b"hello", b"journal").unwrap();
        assert_eq!(sealed[0], CURRENT_VERSION as u8);
        assert_eq!(c.unseal(&sealed, b"journal").unwrap(), b"hello");
    }

    #[test]
    fn round_trip_empty() {
        let c = cryptor("journal");
        let sealed = c.seal(b"", b"").unwrap();
        assert_eq!(c.unseal(&sealed, b"").unwrap(), b"");
    }

    #[test]
    fn wrong_aad() {
        let c = cryptor("journal");
        let sealed = c.seal(b"hello", b"journal").unwrap();
        assert!(matches!(
            c.unseal(&sealed, b"other"),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn wrong_salt() {
        let sealed = cryptor("a").seal(b"hello", b"").unwrap();
        assert!(matches!(
            cryptor("b").unseal(&sealed, b""),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn tampered_ciphertext() {
        let c = cryptor("journal");
        let mut sealed = c.seal(b"hello", b"").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 1;
        assert!(matches!(
            c.unseal(&sealed, b""),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn tampered_version() {
        let c = cryptor("journal");
        let mut sealed = c.seal(b"hello", b"").unwrap();
        sealed[0] = 1;
        assert!(matches!(
            c.unseal(&sealed, b""),
            Err(Error::Integrity(_))
        ));
        sealed[0] = 9;
        assert!(matches!(
            c.unseal(&sealed, b""),
            Err(Error::VersionTooNew { version: 9, .. })
        ));
    }

    #[test]
    fn truncated() {
        let c = cryptor("journal");
        assert!(matches!(
            c.unseal(&[], b""),
            Err(Error::Integrity(_))
        ));
        assert!(matches!(
            c.unseal(&[2, 0, 0], b""),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn version_too_new() {
        assert!(matches!(
            Cryptor::new(CURRENT_VERSION + 1, "derived", "salt"),
            Err(Error::VersionTooNew { .. })
        ));
    }

    #[test]
    fn hmac_is_keyed() {
        let a = cryptor("a");
        assert_eq!(a.hmac(&[b"ab", b"c"]), a.hmac(&[b"a", b"bc"]));
        assert_ne!(a.hmac(&[b"abc"]), cryptor("b").hmac(&[b"abc"]));
    }

    #[test]
    fn derive_key_is_deterministic() {
        let key = derive_key("alice", "secret");
        assert_eq!(key.len(), 64);
        assert_eq!(key, derive_key("alice", "secret"));
        assert_ne!(key, derive_key("bob", "secret"));
    }

    #[test]
    fn hex() {
        assert_eq!(to_hex(&[0, 15, 255]), "000fff");
    }
}
