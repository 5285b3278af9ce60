use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Number of bytes in an account address.
pub const ADDRESS_LEN: usize = 20;

/// Account address of a ledger caller.
///
/// An `Identity` is derived deterministically from an ed25519 public key
/// using BLAKE3 and truncated to 20 bytes. It renders as `0x` followed by
/// 40 lowercase hex characters, the same shape as the account addresses the
/// custody service has always exposed from its `/owner` endpoint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity {
    address: [u8; ADDRESS_LEN],
}

impl Identity {
    /// Derive the address owned by an ed25519 public key.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"custody-identity-v1:");
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();

        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&digest.as_bytes()[..ADDRESS_LEN]);
        Self { address }
    }

    /// Derive the address from a hex-encoded ed25519 public key.
    pub fn from_public_key_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| TypeError::InvalidPublicKey(e.to_string()))?;
        Ok(Self::from_public_key(&key))
    }

    /// The all-zero address. Used for unauthenticated callers; no key maps to it.
    pub const fn zero() -> Self {
        Self {
            address: [0; ADDRESS_LEN],
        }
    }

    /// Returns `true` for the all-zero address.
    pub fn is_zero(&self) -> bool {
        self.address == [0; ADDRESS_LEN]
    }

    /// Create from raw address bytes.
    pub fn from_raw(address: [u8; ADDRESS_LEN]) -> Self {
        Self { address }
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.address
    }

    /// Full `0x`-prefixed hex address.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.address))
    }

    /// Short form for log lines (`0x` + first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("0x{}", hex::encode(&self.address[..4]))
    }

    /// Parse a `0x`-prefixed address. Hex digits may be in either case.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| TypeError::MissingPrefix(s.to_string()))?;
        let bytes = hex::decode(body).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != ADDRESS_LEN {
            return Err(TypeError::InvalidLength {
                expected: ADDRESS_LEN,
                actual: bytes.len(),
            });
        }
        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&bytes);
        Ok(Self { address })
    }
}

impl FromStr for Identity {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_hex()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.short_id())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// An ed25519 signing key together with the address it controls.
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a fresh key from the operating system RNG.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing: SigningKey::generate(&mut rng),
        }
    }

    /// Load a key from its 32-byte hex-encoded secret.
    pub fn from_secret_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self {
            signing: SigningKey::from_bytes(&secret),
        })
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing.to_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing.verifying_key().as_bytes())
    }

    /// The address controlled by this key.
    pub fn identity(&self) -> Identity {
        Identity::from_public_key(&self.signing.verifying_key())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}
