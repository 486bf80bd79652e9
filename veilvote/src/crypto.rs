//! The shared cryptographic toolkit: Diffie–Hellman over the fixed group,
//! key derivation, the AES-CBC + HMAC-SHA256 encrypt-then-MAC channel
//! primitive, RSA signatures, and the Fiat–Shamir hashes used by the
//! Σ-protocols.
//!
//! Every frame on an authenticated channel is `iv ‖ ciphertext ‖ tag` with
//! the tag computed over `iv ‖ ciphertext`. A tag mismatch is always fatal
//! to the session that observed it.

use crate::{Error, GroupParams};

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use num_bigint::{BigUint, RandBigInt};
use rand::{CryptoRng, RngCore};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub const AES_KEY_LENGTH: usize = 32;
pub const AES_IV_LENGTH: usize = 16;
pub const HMAC_KEY_LENGTH: usize = 32;
pub const HMAC_TAG_LENGTH: usize = 32;

pub type AesKey = [u8; AES_KEY_LENGTH];
pub type HmacKey = [u8; HMAC_KEY_LENGTH];

/// Number of bits in the RSA keys used by the registrar and tallyer.
pub const RSA_KEY_BITS: usize = 2048;

/// Sample a secret exponent uniformly from `[2, q - 1]`.
pub fn random_scalar<R: RngCore + CryptoRng>(params: &GroupParams, rng: &mut R) -> BigUint {
    rng.gen_biguint_range(&BigUint::from(2u32), &params.q)
}

/// Generate an ephemeral DH keypair `(a, g^a mod p)`.
pub fn dh_keypair<R: RngCore + CryptoRng>(
    params: &GroupParams,
    rng: &mut R,
) -> (BigUint, BigUint) {
    let secret = random_scalar(params, rng);
    let public = params.g.modpow(&secret, &params.p);
    (secret, public)
}

/// Complete the key agreement: `peer^a mod p`.
pub fn dh_shared(params: &GroupParams, secret: &BigUint, peer_public: &BigUint) -> BigUint {
    peer_public.modpow(secret, &params.p)
}

fn hkdf_expand(shared: &BigUint, info: &[u8]) -> [u8; 32] {
    let ikm = shared.to_bytes_be();
    let h = Hkdf::<Sha256>::new(None, &ikm);
    let mut out = [0u8; 32];
    h.expand(info, &mut out)
        .expect("veilvote: HKDF output length is valid");
    out
}

/// Derive the channel AES key from a DH shared secret.
pub fn derive_aes_key(shared: &BigUint) -> AesKey {
    hkdf_expand(shared, b"veilvote aes key")
}

/// Derive the channel HMAC key from a DH shared secret.
///
/// Uses a distinct domain string so the two keys are independent even
/// though they come from the same secret.
pub fn derive_hmac_key(shared: &BigUint) -> HmacKey {
    hkdf_expand(shared, b"veilvote hmac key")
}

/// AES-256-CBC encrypt under a fresh random IV. Returns `(ciphertext, iv)`.
pub fn aes_encrypt<R: RngCore + CryptoRng>(
    key: &AesKey,
    plaintext: &[u8],
    rng: &mut R,
) -> (Vec<u8>, [u8; AES_IV_LENGTH]) {
    let mut iv = [0u8; AES_IV_LENGTH];
    rng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(key, &iv)
        .expect("veilvote: AES key and IV lengths are fixed");
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    (ciphertext, iv)
}

/// AES-256-CBC decrypt.
pub fn aes_decrypt(key: &AesKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    let cipher = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| Error::Decryption)?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Decryption)
}

fn hmac_tag(key: &HmacKey, data: &[u8]) -> [u8; HMAC_TAG_LENGTH] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .expect("veilvote: HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Frame a plaintext for the authenticated channel: `iv ‖ ct ‖ tag`.
pub fn encrypt_and_tag<R: RngCore + CryptoRng>(
    aes_key: &AesKey,
    hmac_key: &HmacKey,
    plaintext: &[u8],
    rng: &mut R,
) -> Vec<u8> {
    let (ciphertext, iv) = aes_encrypt(aes_key, plaintext, rng);

    let mut frame = Vec::with_capacity(AES_IV_LENGTH + ciphertext.len() + HMAC_TAG_LENGTH);
    frame.extend_from_slice(&iv);
    frame.extend_from_slice(&ciphertext);
    let tag = hmac_tag(hmac_key, &frame);
    frame.extend_from_slice(&tag);
    frame
}

/// Verify and open a channel frame. A MAC mismatch is `Error::ChannelIntegrity`;
/// callers must close the connection when they see it.
pub fn decrypt_and_verify(
    aes_key: &AesKey,
    hmac_key: &HmacKey,
    frame: &[u8],
) -> Result<Vec<u8>, Error> {
    if frame.len() < AES_IV_LENGTH + HMAC_TAG_LENGTH {
        return Err(Error::ChannelIntegrity);
    }
    let (body, tag) = frame.split_at(frame.len() - HMAC_TAG_LENGTH);

    let mut mac = <HmacSha256 as Mac>::new_from_slice(hmac_key)
        .expect("veilvote: HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(tag).map_err(|_| Error::ChannelIntegrity)?;

    let (iv, ciphertext) = body.split_at(AES_IV_LENGTH);
    aes_decrypt(aes_key, iv, ciphertext)
}

/// Hash two wire labels into a table-entry mask: `SHA-256(lhs ‖ rhs)`.
pub fn hash_inputs(lhs: &[u8], rhs: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(lhs);
    hasher.update(rhs);
    hasher.finalize().into()
}

/// Domain-separated Fiat–Shamir hash over a sequence of group elements,
/// reduced mod `q`. Each integer is length-prefixed big-endian so the
/// encoding is unambiguous.
fn hash_to_scalar(params: &GroupParams, domain: &[u8], values: &[&BigUint]) -> BigUint {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for value in values {
        let bytes = value.to_bytes_be();
        hasher.update((bytes.len() as u32).to_be_bytes());
        hasher.update(&bytes);
    }
    BigUint::from_bytes_be(&hasher.finalize()) % &params.q
}

/// Challenge for the disjunctive ballot proof.
#[allow(clippy::too_many_arguments)]
pub fn hash_ballot_proof(
    params: &GroupParams,
    pk: &BigUint,
    a: &BigUint,
    b: &BigUint,
    a0: &BigUint,
    b0: &BigUint,
    a1: &BigUint,
    b1: &BigUint,
) -> BigUint {
    hash_to_scalar(
        params,
        b"veilvote ballot zkp v1",
        &[pk, a, b, a0, b0, a1, b1],
    )
}

/// Challenge for the Chaum–Pedersen partial-decryption proof.
pub fn hash_decryption_proof(
    params: &GroupParams,
    pk_i: &BigUint,
    a: &BigUint,
    b: &BigUint,
    u: &BigUint,
    v: &BigUint,
) -> BigUint {
    hash_to_scalar(params, b"veilvote decryption zkp v1", &[pk_i, a, b, u, v])
}

/// Generate an RSA signing/verification keypair.
pub fn rsa_generate_keys<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<(RsaPrivateKey, RsaPublicKey), Error> {
    let private = RsaPrivateKey::new(rng, RSA_KEY_BITS)?;
    let public = private.to_public_key();
    Ok((private, public))
}

/// RSA-PKCS#1 v1.5 signature over the SHA-256 digest of `message`.
pub fn rsa_sign(key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>, Error> {
    let digest = Sha256::digest(message);
    Ok(key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)?)
}

/// Verify an RSA-PKCS#1 v1.5 signature.
pub fn rsa_verify(key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool {
    let digest = Sha256::digest(message);
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .is_ok()
}
