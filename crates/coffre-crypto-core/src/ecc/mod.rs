//! NIST P-256 elliptic-curve engine: key generation, ECDSA (SHA-256
//! digests), ECDH, and ECIES hybrid encryption.
//!
//! The arithmetic is carried entirely by the in-tree fixed-width digit
//! vectors ([`vli`]) and Jacobian point routines ([`point`]) rather than an
//! external curve crate, so the engine stays auditable down to the digit
//! level and free of platform-specific assembly.

mod curve;
mod ecies;
mod point;
mod vli;

pub use ecies::{ecies_decrypt, ecies_encrypt, ECIES_OVERHEAD};

use crate::error::CryptoError;
use crate::memory::SecretBytes;
use curve::{CURVE_GX, CURVE_GY, CURVE_N, MU_N, NUM_DIGITS};
use point::{scalar_mult, AffinePoint};
use std::cmp::Ordering;
use std::fmt;
use vli::Vli;
use zeroize::Zeroize;

/// One curve coordinate in bytes.
pub const COORD_LEN: usize = 32;

/// Serialized public key: `0x04 || X || Y` (uncompressed SEC1).
pub const PUBLIC_KEY_LEN: usize = 65;

/// Serialized signature: `r || s`, both big-endian coordinates.
pub const SIGNATURE_LEN: usize = 64;

const UNCOMPRESSED_TAG: u8 = 0x04;

/// Give up signing after this many nonces come out unusable. With a sound
/// CSPRNG a single retry is already astronomically unlikely.
const MAX_SIGN_ATTEMPTS: usize = 16;

const GENERATOR: AffinePoint = AffinePoint { x: CURVE_GX, y: CURVE_GY };

// ---------------------------------------------------------------------------
// Key types
// ---------------------------------------------------------------------------

/// A private scalar, stored big-endian in locked memory. Always in the range
/// `[1, n - 1]` by construction.
pub struct PrivateKey {
    scalar: SecretBytes<COORD_LEN>,
}

impl PrivateKey {
    fn as_vli(&self) -> Vli {
        vli::from_be_bytes(self.scalar.expose())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(***)")
    }
}

/// A validated public point on the curve.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PublicKey {
    point: AffinePoint,
}

impl PublicKey {
    /// Serialize to the uncompressed SEC1 form `0x04 || X || Y`.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out[0] = UNCOMPRESSED_TAG;
        out[1..=COORD_LEN].copy_from_slice(&vli::to_be_bytes(&self.point.x));
        out[COORD_LEN.saturating_add(1)..].copy_from_slice(&vli::to_be_bytes(&self.point.y));
        out
    }

    /// Parse and validate an uncompressed SEC1 public key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicKey`] on wrong length, wrong tag,
    /// out-of-range coordinates, the zero point, or a point off the curve.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PUBLIC_KEY_LEN || bytes[0] != UNCOMPRESSED_TAG {
            return Err(CryptoError::InvalidPublicKey);
        }
        let mut x = [0u8; COORD_LEN];
        let mut y = [0u8; COORD_LEN];
        x.copy_from_slice(&bytes[1..=COORD_LEN]);
        y.copy_from_slice(&bytes[COORD_LEN.saturating_add(1)..]);
        let point = AffinePoint {
            x: vli::from_be_bytes(&x),
            y: vli::from_be_bytes(&y),
        };
        if !point::is_on_curve(&point) {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(Self { point })
    }
}

/// A detached ECDSA signature over a SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Signature {
    r: [u8; COORD_LEN],
    s: [u8; COORD_LEN],
}

impl Signature {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..COORD_LEN].copy_from_slice(&self.r);
        out[COORD_LEN..].copy_from_slice(&self.s);
        out
    }

    /// Parse a raw `r || s` signature. Range checks happen at verify time.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Signature`] if `bytes` is not exactly 64 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(CryptoError::Signature(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; COORD_LEN];
        let mut s = [0u8; COORD_LEN];
        r.copy_from_slice(&bytes[..COORD_LEN]);
        s.copy_from_slice(&bytes[COORD_LEN..]);
        Ok(Self { r, s })
    }
}

// ---------------------------------------------------------------------------
// Key generation
// ---------------------------------------------------------------------------

/// Derive a keypair deterministically from 32 seed bytes: the scalar is the
/// seed reduced modulo the group order. The same seed always yields the same
/// keypair, which is what keeps a device identity stable across restarts.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if the seed reduces to zero (a
/// `2^-224` accident that callers with random seeds simply retry).
pub fn keypair_from_seed(seed: &[u8; COORD_LEN]) -> Result<(PrivateKey, PublicKey), CryptoError> {
    let mut d = reduce_mod_n(&vli::from_be_bytes(seed));
    if vli::is_zero(&d) {
        return Err(CryptoError::KeyDerivation("seed reduces to the zero scalar".into()));
    }
    let point = scalar_mult(&GENERATOR, &d)
        .to_affine()
        .ok_or_else(|| CryptoError::KeyDerivation("scalar produced the identity point".into()))?;
    let private = PrivateKey {
        scalar: SecretBytes::new(vli::to_be_bytes(&d)),
    };
    d.zeroize();
    Ok((private, PublicKey { point }))
}

/// Generate a fresh random keypair.
///
/// # Errors
///
/// Returns [`CryptoError::SecureMemory`] if the CSPRNG fails, or
/// [`CryptoError::KeyDerivation`] if every attempt produced a zero scalar.
pub fn generate_keypair() -> Result<(PrivateKey, PublicKey), CryptoError> {
    for _ in 0..MAX_SIGN_ATTEMPTS {
        let seed = SecretBytes::<COORD_LEN>::random()?;
        match keypair_from_seed(seed.expose()) {
            Ok(pair) => return Ok(pair),
            Err(CryptoError::KeyDerivation(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Err(CryptoError::KeyDerivation("keypair generation attempts exhausted".into()))
}

/// Check that a public point lies on the curve and is not the identity.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidPublicKey`] otherwise.
pub fn validate_public_key(key: &PublicKey) -> Result<(), CryptoError> {
    if point::is_on_curve(&key.point) {
        Ok(())
    } else {
        Err(CryptoError::InvalidPublicKey)
    }
}

// ---------------------------------------------------------------------------
// ECDSA
// ---------------------------------------------------------------------------

/// Reduce a 256-bit value modulo n. One conditional subtract suffices since
/// the input is below `2n`.
fn reduce_mod_n(v: &Vli) -> Vli {
    let mut out = *v;
    if vli::cmp(&out, &CURVE_N) != Ordering::Less {
        vli::sub_assign(&mut out, &CURVE_N);
    }
    out
}

/// One signing attempt with the given nonce. `None` means the nonce was
/// unusable (zero, or it produced a zero `r` or `s`) and the caller should
/// draw a fresh one.
fn sign_with_nonce(d: &Vli, e: &Vli, k: &Vli) -> Option<Signature> {
    if vli::is_zero(k) || vli::cmp(k, &CURVE_N) != Ordering::Less {
        return None;
    }
    let p = scalar_mult(&GENERATOR, k).to_affine()?;
    let r = reduce_mod_n(&p.x);
    if vli::is_zero(&r) {
        return None;
    }
    // s = (e + r d) / k mod n
    let mut s = vli::mod_mult(&r, d, &CURVE_N, &MU_N);
    s = vli::mod_add(e, &s, &CURVE_N);
    let mut k_inv = vli::mod_inv(k, &CURVE_N);
    s = vli::mod_mult(&s, &k_inv, &CURVE_N, &MU_N);
    k_inv.zeroize();
    if vli::is_zero(&s) {
        return None;
    }
    Some(Signature {
        r: vli::to_be_bytes(&r),
        s: vli::to_be_bytes(&s),
    })
}

/// Sign a SHA-256 digest, drawing a random nonce per attempt.
///
/// # Errors
///
/// Returns [`CryptoError::SecureMemory`] on CSPRNG failure or
/// [`CryptoError::Signature`] if every nonce attempt was unusable.
pub fn ecdsa_sign(key: &PrivateKey, digest: &[u8; 32]) -> Result<Signature, CryptoError> {
    let mut d = key.as_vli();
    let e = reduce_mod_n(&vli::from_be_bytes(digest));
    for _ in 0..MAX_SIGN_ATTEMPTS {
        let nonce = SecretBytes::<COORD_LEN>::random()?;
        let mut k = reduce_mod_n(&vli::from_be_bytes(nonce.expose()));
        let result = sign_with_nonce(&d, &e, &k);
        k.zeroize();
        if let Some(sig) = result {
            d.zeroize();
            return Ok(sig);
        }
    }
    d.zeroize();
    Err(CryptoError::Signature("signing attempts exhausted".into()))
}

/// Verify an ECDSA signature over a SHA-256 digest.
///
/// # Errors
///
/// Returns [`CryptoError::Authentication`] when the signature does not
/// verify, including out-of-range `r` or `s` components.
pub fn ecdsa_verify(
    key: &PublicKey,
    digest: &[u8; 32],
    signature: &Signature,
) -> Result<(), CryptoError> {
    let r = vli::from_be_bytes(&signature.r);
    let s = vli::from_be_bytes(&signature.s);
    if vli::is_zero(&r)
        || vli::is_zero(&s)
        || vli::cmp(&r, &CURVE_N) != Ordering::Less
        || vli::cmp(&s, &CURVE_N) != Ordering::Less
    {
        return Err(CryptoError::Authentication);
    }
    let e = reduce_mod_n(&vli::from_be_bytes(digest));

    // (x, _) = (e / s) G + (r / s) Q, accept when x mod n == r.
    let s_inv = vli::mod_inv(&s, &CURVE_N);
    let u1 = vli::mod_mult(&e, &s_inv, &CURVE_N, &MU_N);
    let u2 = vli::mod_mult(&r, &s_inv, &CURVE_N, &MU_N);
    let mut sum = scalar_mult(&GENERATOR, &u1);
    sum.add(&scalar_mult(&key.point, &u2));
    let Some(affine) = sum.to_affine() else {
        return Err(CryptoError::Authentication);
    };
    if reduce_mod_n(&affine.x) == r {
        Ok(())
    } else {
        Err(CryptoError::Authentication)
    }
}

// ---------------------------------------------------------------------------
// ECDH
// ---------------------------------------------------------------------------

/// ECDH: the x coordinate of `private * public`, big-endian.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidPublicKey`] if the product degenerates to
/// the identity point.
pub fn ecdh_shared_secret(
    public: &PublicKey,
    private: &PrivateKey,
) -> Result<SecretBytes<COORD_LEN>, CryptoError> {
    let mut d = private.as_vli();
    let shared = scalar_mult(&public.point, &d).to_affine();
    d.zeroize();
    let affine = shared.ok_or(CryptoError::InvalidPublicKey)?;
    Ok(SecretBytes::new(vli::to_be_bytes(&affine.x)))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(hex: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, b) in out.iter_mut().enumerate() {
            *b = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).unwrap();
        }
        out
    }

    // SHA256("test private key") reduced mod n, with its public point.
    const D_HEX: &str = "1bcdec945680543edf8428285692a2ad9a0df628d0cc030f314ab64e06aa4531";
    const QX_HEX: &str = "dfda8ed6a09dd73294d96cf5cbc979d97f59fecc028dff8c46d95cf24e7c54d8";
    const QY_HEX: &str = "5d4f349d4ff7b49e3b38eee7556e450fd44c35059fe32dd7bab83486a92d1d99";

    fn known_keypair() -> (PrivateKey, PublicKey) {
        keypair_from_seed(&seed(D_HEX)).unwrap()
    }

    #[test]
    fn keypair_from_seed_matches_known_point() {
        let (_, public) = known_keypair();
        let bytes = public.to_bytes();
        assert_eq!(bytes[0], 0x04);
        assert_eq!(&bytes[1..33], &seed(QX_HEX));
        assert_eq!(&bytes[33..], &seed(QY_HEX));
    }

    #[test]
    fn keypair_from_seed_is_deterministic() {
        let (a_priv, a_pub) = known_keypair();
        let (b_priv, b_pub) = known_keypair();
        assert_eq!(a_pub, b_pub);
        assert_eq!(a_priv.scalar.expose(), b_priv.scalar.expose());
    }

    #[test]
    fn public_key_round_trips_through_bytes() {
        let (_, public) = known_keypair();
        let parsed = PublicKey::from_bytes(&public.to_bytes()).unwrap();
        assert_eq!(parsed, public);
    }

    #[test]
    fn from_bytes_rejects_malformed_keys() {
        let (_, public) = known_keypair();
        let good = public.to_bytes();

        let mut wrong_tag = good;
        wrong_tag[0] = 0x03;
        assert!(matches!(
            PublicKey::from_bytes(&wrong_tag),
            Err(CryptoError::InvalidPublicKey)
        ));

        let mut off_curve = good;
        off_curve[64] ^= 1;
        assert!(matches!(
            PublicKey::from_bytes(&off_curve),
            Err(CryptoError::InvalidPublicKey)
        ));

        assert!(matches!(
            PublicKey::from_bytes(&good[..64]),
            Err(CryptoError::InvalidPublicKey)
        ));
    }

    #[test]
    fn sign_with_fixed_nonce_matches_known_vector() {
        // e = SHA256("sample message"), k = SHA256("nonce") mod n.
        let d = vli::from_be_bytes(&seed(D_HEX));
        let e = reduce_mod_n(&vli::from_be_bytes(&seed(
            "59162c6b059f619b0538f592de24e163061316572869ffc9a2648315dbe75997",
        )));
        let k = vli::from_be_bytes(&seed(
            "78377b525757b494427f89014f97d79928f3938d14eb51e20fb5dec9834eb304",
        ));
        let sig = sign_with_nonce(&d, &e, &k).unwrap();
        assert_eq!(
            sig.r,
            seed("03b163f70c355463a1e7befbe3cce8bfc49d4b8e45da209515ebe300472c59f9")
        );
        assert_eq!(
            sig.s,
            seed("60fd36babc77503f8e5a516591b814a1a1f114bddfe8689b14162d44ec0dc004")
        );
    }

    #[test]
    fn sign_verify_round_trip() {
        let (private, public) = known_keypair();
        let digest = seed("59162c6b059f619b0538f592de24e163061316572869ffc9a2648315dbe75997");
        let sig = ecdsa_sign(&private, &digest).unwrap();
        ecdsa_verify(&public, &digest, &sig).unwrap();
    }

    #[test]
    fn verify_rejects_wrong_digest() {
        let (private, public) = known_keypair();
        let digest = [0x42u8; 32];
        let sig = ecdsa_sign(&private, &digest).unwrap();
        let mut other = digest;
        other[0] ^= 1;
        assert!(matches!(
            ecdsa_verify(&public, &other, &sig),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn verify_rejects_tampered_signature() {
        let (private, public) = known_keypair();
        let digest = [0x42u8; 32];
        let sig = ecdsa_sign(&private, &digest).unwrap();
        let mut bytes = sig.to_bytes();
        bytes[10] ^= 0x80;
        let tampered = Signature::from_bytes(&bytes).unwrap();
        assert!(matches!(
            ecdsa_verify(&public, &digest, &tampered),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn verify_rejects_zero_components() {
        let (_, public) = known_keypair();
        let digest = [0x42u8; 32];
        let zero_sig = Signature::from_bytes(&[0u8; 64]).unwrap();
        assert!(matches!(
            ecdsa_verify(&public, &digest, &zero_sig),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let (private, _) = known_keypair();
        let (_, other_public) = generate_keypair().unwrap();
        let digest = [0x42u8; 32];
        let sig = ecdsa_sign(&private, &digest).unwrap();
        assert!(matches!(
            ecdsa_verify(&other_public, &digest, &sig),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn ecdh_matches_known_vector_and_agrees() {
        // Alice: d = SHA256("alice") mod n; Bob: d = SHA256("bob") mod n.
        let (alice_priv, alice_pub) = keypair_from_seed(&seed(
            "2bd806c97f0e00af1a1fc3328fa763a9269723c8db8fac4f93af71db186d6e90",
        ))
        .unwrap();
        let (bob_priv, bob_pub) = keypair_from_seed(&seed(
            "81b637d8fcd2c6da6359e6963113a1170de795e4b725b84d1e0b4cfd9ec58ce9",
        ))
        .unwrap();
        let z_ab = ecdh_shared_secret(&bob_pub, &alice_priv).unwrap();
        let z_ba = ecdh_shared_secret(&alice_pub, &bob_priv).unwrap();
        assert_eq!(z_ab.expose(), z_ba.expose());
        assert_eq!(
            z_ab.expose(),
            &seed("6fc4941ebb7fcd045823cdd727b75d249338b3f9c28cd0eab0a710429f8dc82a")
        );
    }

    #[test]
    fn fresh_keypairs_are_distinct_and_valid() {
        let (_, a) = generate_keypair().unwrap();
        let (_, b) = generate_keypair().unwrap();
        assert_ne!(a, b);
        validate_public_key(&a).unwrap();
        validate_public_key(&b).unwrap();
    }

    #[test]
    fn private_key_debug_is_masked() {
        let (private, _) = known_keypair();
        assert_eq!(format!("{private:?}"), "PrivateKey(***)");
    }
}
