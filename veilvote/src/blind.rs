//! Chaumian RSA blind signatures over ballot ciphertexts.
//!
//! The registrar signs a ballot it cannot read: the voter multiplies the
//! ballot digest by `r^e` before sending it, and divides the signature by
//! `r` afterwards. Signing and verification both hash the ballot through
//! [`ballot_digest`], so the two sides can never disagree about what was
//! signed.

use crate::election::VoteCiphertext;
use crate::Error;

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::One;
use rand::{CryptoRng, RngCore};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

const BLIND_DOMAIN: &[u8] = b"veilvote blind ballot v1";

fn public_modulus(key: &RsaPublicKey) -> BigUint {
    BigUint::from_bytes_be(&key.n().to_bytes_be())
}

fn public_exponent(key: &RsaPublicKey) -> BigUint {
    BigUint::from_bytes_be(&key.e().to_bytes_be())
}

/// Hash a ballot ciphertext into the RSA message space.
pub fn ballot_digest(vote: &VoteCiphertext) -> Result<BigUint, Error> {
    let encoded = serde_cbor::to_vec(vote)?;
    let mut hasher = Sha256::new();
    hasher.update(BLIND_DOMAIN);
    hasher.update(&encoded);
    Ok(BigUint::from_bytes_be(&hasher.finalize()))
}

/// Blind a ballot for signing. Returns the blinded digest and the blinding
/// factor the voter must keep to unblind the signature.
pub fn blind<R: RngCore + CryptoRng>(
    registrar_key: &RsaPublicKey,
    vote: &VoteCiphertext,
    rng: &mut R,
) -> Result<(BigUint, BigUint), Error> {
    let n = public_modulus(registrar_key);
    let e = public_exponent(registrar_key);
    let digest = ballot_digest(vote)?;

    // The blinding factor must be invertible mod n.
    let factor = loop {
        let candidate = rng.gen_biguint_range(&BigUint::from(2u32), &n);
        if candidate.gcd(&n).is_one() {
            break candidate;
        }
    };

    let blinded = (digest * factor.modpow(&e, &n)) % &n;
    Ok((blinded, factor))
}

/// Raw RSA signature over a blinded digest: `m'^d mod n`.
pub fn blind_sign(signing_key: &RsaPrivateKey, blinded: &BigUint) -> BigUint {
    let n = BigUint::from_bytes_be(&signing_key.n().to_bytes_be());
    let d = BigUint::from_bytes_be(&signing_key.d().to_bytes_be());
    blinded.modpow(&d, &n)
}

/// Remove the blinding factor from a signature.
pub fn unblind(
    registrar_key: &RsaPublicKey,
    blind_signature: &BigUint,
    factor: &BigUint,
) -> Result<BigUint, Error> {
    let n = public_modulus(registrar_key);
    let inverse = factor
        .modinv(&n)
        .ok_or(Error::BlindSignatureInvalid)?;
    Ok((blind_signature * inverse) % &n)
}

/// Check an unblinded signature: `s^e ≡ H(vote) (mod n)`.
pub fn blind_verify(
    registrar_key: &RsaPublicKey,
    vote: &VoteCiphertext,
    signature: &BigUint,
) -> Result<bool, Error> {
    let n = public_modulus(registrar_key);
    let e = public_exponent(registrar_key);
    let digest = ballot_digest(vote)? % &n;
    Ok(signature.modpow(&e, &n) == digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::tests::test_rsa_keys;
    use rand::rngs::OsRng;

    fn sample_vote(seed: u32) -> VoteCiphertext {
        VoteCiphertext {
            a: BigUint::from(seed),
            b: BigUint::from(seed ^ 0xffff),
        }
    }

    #[test]
    fn blind_sign_round_trip() {
        let (sk, pk) = test_rsa_keys();
        let vote = sample_vote(1234);

        let (blinded, factor) = blind(&pk, &vote, &mut OsRng).unwrap();
        let blind_signature = blind_sign(&sk, &blinded);
        let signature = unblind(&pk, &blind_signature, &factor).unwrap();

        assert!(blind_verify(&pk, &vote, &signature).unwrap());
    }

    #[test]
    fn signature_does_not_transfer_to_another_ballot() {
        let (sk, pk) = test_rsa_keys();

        let (blinded, factor) = blind(&pk, &sample_vote(1), &mut OsRng).unwrap();
        let signature = unblind(&pk, &blind_sign(&sk, &blinded), &factor).unwrap();

        assert!(!blind_verify(&pk, &sample_vote(2), &signature).unwrap());
    }

    #[test]
    fn signer_never_sees_the_digest() {
        let (_, pk) = test_rsa_keys();
        let vote = sample_vote(77);

        let digest = ballot_digest(&vote).unwrap();
        let (blinded_once, _) = blind(&pk, &vote, &mut OsRng).unwrap();
        let (blinded_twice, _) = blind(&pk, &vote, &mut OsRng).unwrap();

        // Fresh blinding factors give unlinkable blinded messages.
        assert_ne!(blinded_once, digest);
        assert_ne!(blinded_once, blinded_twice);
    }
}
