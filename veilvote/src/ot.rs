//! Bellare–Micali 1-out-of-2 oblivious transfer over the shared DH group,
//! layered on an established authenticated channel.
//!
//! The receiver's public value either is a fresh DH value (`choice = 0`)
//! or hides one behind the sender's value (`choice = 1`); the sender
//! derives one key per branch and encrypts each message under its own
//! key. The receiver can only ever compute the key for its choice — the
//! other branch would require breaking DDH.

use crate::channel::{Channel, SecureChannel};
use crate::crypto;
use crate::{Error, GroupParams, Message};

use rand::{CryptoRng, RngCore};
use tracing::debug;

/// Transfer exactly one of `m0`, `m1`, without learning which.
pub fn ot_send<C: Channel, R: RngCore + CryptoRng>(
    channel: &mut SecureChannel<C>,
    params: &GroupParams,
    m0: &[u8],
    m1: &[u8],
    rng: &mut R,
) -> Result<(), Error> {
    let GroupParams { p, .. } = params;

    // Our ephemeral value A = g^a.
    let (a, big_a) = crypto::dh_keypair(params, rng);
    channel.send_message(&Message::OtPublicValue {
        public_value: big_a.clone(),
    })?;

    let big_b = channel.read_message()?.into_ot_public_value()?;

    // Branch keys: k0 from B^a, k1 from (B / A)^a. At most one of the two
    // is a value the receiver can also derive.
    let k0 = crypto::derive_aes_key(&crypto::dh_shared(params, &a, &big_b));
    let b_over_a = (&big_b
        * big_a
            .modinv(p)
            .expect("veilvote: group element has an inverse mod p"))
        % p;
    let k1 = crypto::derive_aes_key(&crypto::dh_shared(params, &a, &b_over_a));

    let (e0, iv0) = crypto::aes_encrypt(&k0, m0, rng);
    let (e1, iv1) = crypto::aes_encrypt(&k1, m1, rng);
    debug!("ot: sent encrypted message pair");
    channel.send_message(&Message::OtEncryptedPair { e0, iv0, e1, iv1 })
}

/// Receive the message selected by `choice`.
pub fn ot_recv<C: Channel, R: RngCore + CryptoRng>(
    channel: &mut SecureChannel<C>,
    params: &GroupParams,
    choice: bool,
    rng: &mut R,
) -> Result<Vec<u8>, Error> {
    let GroupParams { p, .. } = params;

    let big_a = channel.read_message()?.into_ot_public_value()?;

    let (b, g_to_b) = crypto::dh_keypair(params, rng);
    let big_b = if choice {
        (&big_a * &g_to_b) % p
    } else {
        g_to_b
    };
    channel.send_message(&Message::OtPublicValue { public_value: big_b })?;

    let key = crypto::derive_aes_key(&crypto::dh_shared(params, &b, &big_a));

    let (e0, iv0, e1, iv1) = channel.read_message()?.into_ot_encrypted_pair()?;
    let plaintext = if choice {
        crypto::aes_decrypt(&key, &iv1, &e1)?
    } else {
        crypto::aes_decrypt(&key, &iv0, &e0)?
    };
    debug!(choice, "ot: recovered selected message");
    Ok(plaintext)
}
