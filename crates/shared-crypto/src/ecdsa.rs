//! # ECDSA Signatures (secp256k1)
//!
//! Ethereum-style recoverable signatures over a 32-byte prehash.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization on signing (EIP-2)
//! - Recovery accepts high-S input, as the `ecrecover` precompile must

use crate::hashing::keccak256;
use crate::CryptoError;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use zeroize::Zeroize;

/// Recoverable signature in `(y_parity, r, s)` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecoverableSignature {
    /// Parity of the ephemeral point's y coordinate (0 or 1)
    pub y_parity: u8,
    /// r scalar, big-endian
    pub r: [u8; 32],
    /// s scalar, big-endian
    pub s: [u8; 32],
}

impl RecoverableSignature {
    /// Build from raw components.
    pub fn new(y_parity: u8, r: [u8; 32], s: [u8; 32]) -> Self {
        Self { y_parity, r, s }
    }

    /// True when `s` is in the lower half of the curve order.
    pub fn is_low_s(&self) -> bool {
        match self.to_k256() {
            Ok(sig) => sig.normalize_s().is_none(),
            Err(_) => false,
        }
    }

    fn to_k256(self) -> Result<Signature, CryptoError> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        Signature::from_slice(&bytes).map_err(|_| CryptoError::InvalidSignature)
    }
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Create from a secret key slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Self::from_bytes(array)
    }

    /// Ethereum address: last 20 bytes of keccak256 of the uncompressed public key.
    pub fn address(&self) -> [u8; 20] {
        public_key_to_address(self.signing_key.verifying_key())
    }

    /// Sign a 32-byte prehash (deterministic RFC 6979, low-S).
    pub fn sign_prehash(&self, prehash: &[u8; 32]) -> Result<RecoverableSignature, CryptoError> {
        let (sig, recid) = self
            .signing_key
            .sign_prehash_recoverable(prehash)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(RecoverableSignature {
            y_parity: u8::from(recid.is_y_odd()),
            r,
            s,
        })
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

/// Recover the signer address from a prehash and signature.
///
/// # Errors
///
/// Returns `InvalidRecoveryId` for a parity other than 0/1, `InvalidSignature`
/// when r or s is zero or not below the curve order, and `RecoveryFailed` when
/// no point corresponds to the signature.
pub fn recover_address(
    prehash: &[u8; 32],
    signature: &RecoverableSignature,
) -> Result<[u8; 20], CryptoError> {
    if signature.y_parity > 1 {
        return Err(CryptoError::InvalidRecoveryId(signature.y_parity));
    }
    let mut sig = signature.to_k256()?;
    let mut is_y_odd = signature.y_parity == 1;
    // k256 refuses high-S on recovery; negating s flips the parity of R.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        is_y_odd = !is_y_odd;
    }
    let recid = RecoveryId::new(is_y_odd, false);
    let key = VerifyingKey::recover_from_prehash(prehash, &sig, recid)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(public_key_to_address(&key))
}

fn public_key_to_address(key: &VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_one() -> Secp256k1KeyPair {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        Secp256k1KeyPair::from_bytes(secret).unwrap()
    }

    #[test]
    fn test_known_address() {
        assert_eq!(
            hex::encode(key_one().address()),
            "7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_sign_recover() {
        let keypair = Secp256k1KeyPair::generate();
        let prehash = keccak256(b"hello secp256k1");

        let sig = keypair.sign_prehash(&prehash).unwrap();
        let recovered = recover_address(&prehash, &sig).unwrap();

        assert_eq!(recovered, keypair.address());
        assert!(sig.is_low_s());
    }

    #[test]
    fn test_wrong_message_recovers_other_address() {
        let keypair = key_one();
        let sig = keypair.sign_prehash(&keccak256(b"message1")).unwrap();
        let recovered = recover_address(&keccak256(b"message2"), &sig);

        assert_ne!(recovered.ok(), Some(keypair.address()));
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Secp256k1KeyPair::from_bytes([0xABu8; 32]).unwrap();
        let prehash = keccak256(b"deterministic test");

        assert_eq!(
            keypair.sign_prehash(&prehash).unwrap(),
            keypair.sign_prehash(&prehash).unwrap()
        );
    }

    #[test]
    fn test_high_s_still_recovers() {
        // secp256k1 group order n
        let n: [u8; 32] = [
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0xff, 0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c,
            0xd0, 0x36, 0x41, 0x41,
        ];
        let keypair = key_one();
        let prehash = keccak256(b"malleable");
        let sig = keypair.sign_prehash(&prehash).unwrap();

        // s' = n - s, parity flipped
        let mut high_s = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let diff = n[i] as i16 - sig.s[i] as i16 - borrow;
            if diff < 0 {
                high_s[i] = (diff + 256) as u8;
                borrow = 1;
            } else {
                high_s[i] = diff as u8;
                borrow = 0;
            }
        }
        let flipped = RecoverableSignature::new(sig.y_parity ^ 1, sig.r, high_s);

        assert!(!flipped.is_low_s());
        assert_eq!(recover_address(&prehash, &flipped).unwrap(), keypair.address());
    }

    #[test]
    fn test_zero_r_rejected() {
        let sig = RecoverableSignature::new(0, [0u8; 32], [1u8; 32]);
        assert_eq!(
            recover_address(&[7u8; 32], &sig),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn test_invalid_recovery_id() {
        let sig = RecoverableSignature::new(2, [1u8; 32], [1u8; 32]);
        assert_eq!(
            recover_address(&[7u8; 32], &sig),
            Err(CryptoError::InvalidRecoveryId(2))
        );
    }

    #[test]
    fn test_roundtrip_bytes() {
        let original = Secp256k1KeyPair::generate();
        let restored = Secp256k1KeyPair::from_bytes(original.to_bytes()).unwrap();
        assert_eq!(original.address(), restored.address());
    }
}
