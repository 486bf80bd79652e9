//! Session key agreement. Two flavors:
//!
//! * a plain anonymous DH exchange between garbler and evaluator, and
//! * a server-signed exchange for voter↔registrar and voter↔tallyer,
//!   where the server echoes the client's public value and signs both so
//!   the client knows it reached the right counterparty.
//!
//! Both end in the same place: independent AES and HMAC keys derived from
//! the shared secret by domain-separated expansion.

use crate::channel::Channel;
use crate::crypto::{self, AesKey, HmacKey};
use crate::{Error, GroupParams, Message};

use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use rsa::{RsaPrivateKey, RsaPublicKey};

fn derive_keys(shared: &BigUint) -> (AesKey, HmacKey) {
    (crypto::derive_aes_key(shared), crypto::derive_hmac_key(shared))
}

/// The byte string signed in the server handshake: both public values,
/// length-prefixed, server first.
fn signing_payload(server_public: &BigUint, user_public: &BigUint) -> Vec<u8> {
    let mut payload = Vec::new();
    for value in [server_public, user_public] {
        let bytes = value.to_bytes_be();
        payload.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        payload.extend_from_slice(&bytes);
    }
    payload
}

/// Anonymous exchange, initiating side: send our public value first.
pub fn plain_handshake_initiate<C: Channel, R: RngCore + CryptoRng>(
    channel: &mut C,
    params: &GroupParams,
    rng: &mut R,
) -> Result<(AesKey, HmacKey), Error> {
    let (secret, public) = crypto::dh_keypair(params, rng);

    channel.send(&Message::DhPublicValue { public_value: public }.pack()?)?;
    let peer = Message::unpack(&channel.read()?)?.into_dh_public_value()?;

    Ok(derive_keys(&crypto::dh_shared(params, &secret, &peer)))
}

/// Anonymous exchange, responding side: read the peer's value first.
pub fn plain_handshake_respond<C: Channel, R: RngCore + CryptoRng>(
    channel: &mut C,
    params: &GroupParams,
    rng: &mut R,
) -> Result<(AesKey, HmacKey), Error> {
    let (secret, public) = crypto::dh_keypair(params, rng);

    let peer = Message::unpack(&channel.read()?)?.into_dh_public_value()?;
    channel.send(&Message::DhPublicValue { public_value: public }.pack()?)?;

    Ok(derive_keys(&crypto::dh_shared(params, &secret, &peer)))
}

/// Client side of the signed exchange. Verifies the server's signature and
/// that our own public value came back; aborts the session otherwise.
pub fn client_handshake<C: Channel, R: RngCore + CryptoRng>(
    channel: &mut C,
    params: &GroupParams,
    server_verification_key: &RsaPublicKey,
    rng: &mut R,
) -> Result<(AesKey, HmacKey), Error> {
    let (secret, public) = crypto::dh_keypair(params, rng);

    channel.send(
        &Message::DhPublicValue {
            public_value: public.clone(),
        }
        .pack()?,
    )?;

    let (server_public, echoed_public, signature) =
        Message::unpack(&channel.read()?)?.into_signed_dh()?;

    let payload = signing_payload(&server_public, &echoed_public);
    if !crypto::rsa_verify(server_verification_key, &payload, &signature)
        || echoed_public != public
    {
        channel.close();
        return Err(Error::HandshakeSignature);
    }

    Ok(derive_keys(&crypto::dh_shared(params, &secret, &server_public)))
}

/// Server side of the signed exchange.
pub fn server_handshake<C: Channel, R: RngCore + CryptoRng>(
    channel: &mut C,
    params: &GroupParams,
    signing_key: &RsaPrivateKey,
    rng: &mut R,
) -> Result<(AesKey, HmacKey), Error> {
    let (secret, public) = crypto::dh_keypair(params, rng);

    let user_public = Message::unpack(&channel.read()?)?.into_dh_public_value()?;

    let payload = signing_payload(&public, &user_public);
    let signature = crypto::rsa_sign(signing_key, &payload)?;
    channel.send(
        &Message::SignedDhPublicValues {
            server_public_value: public,
            user_public_value: user_public.clone(),
            signature,
        }
        .pack()?,
    )?;

    Ok(derive_keys(&crypto::dh_shared(params, &secret, &user_public)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemChannel;
    use rand::rngs::OsRng;
    use std::thread;

    #[test]
    fn plain_handshake_agrees_on_keys() {
        let params = GroupParams::standard();
        let (mut left, mut right) = MemChannel::pair();

        let initiator = {
            let params = params.clone();
            thread::spawn(move || plain_handshake_initiate(&mut left, &params, &mut OsRng).unwrap())
        };
        let responder_keys = plain_handshake_respond(&mut right, &params, &mut OsRng).unwrap();
        let initiator_keys = initiator.join().unwrap();

        assert_eq!(initiator_keys.0, responder_keys.0);
        assert_eq!(initiator_keys.1, responder_keys.1);
    }

    #[test]
    fn signed_handshake_agrees_and_pins_the_server() {
        let params = GroupParams::standard();
        let (server_sk, server_vk) = crypto::tests::test_rsa_keys();

        let (mut client_end, mut server_end) = MemChannel::pair();
        let server_side = {
            let params = params.clone();
            thread::spawn(move || server_handshake(&mut server_end, &params, &server_sk, &mut OsRng).unwrap())
        };
        let client_keys = client_handshake(&mut client_end, &params, &server_vk, &mut OsRng).unwrap();
        let server_keys = server_side.join().unwrap();

        assert_eq!(client_keys.0, server_keys.0);
        assert_eq!(client_keys.1, server_keys.1);
    }

    #[test]
    fn client_rejects_a_wrong_server_key() {
        let params = GroupParams::standard();
        let (server_sk, _) = crypto::tests::test_rsa_keys();
        let (_, unrelated_vk) = crypto::tests::test_rsa_keys();

        let (mut client_end, mut server_end) = MemChannel::pair();
        let server_side = {
            let params = params.clone();
            thread::spawn(move || server_handshake(&mut server_end, &params, &server_sk, &mut OsRng))
        };
        let result = client_handshake(&mut client_end, &params, &unrelated_vk, &mut OsRng);
        let _ = server_side.join().unwrap();

        assert!(matches!(result, Err(Error::HandshakeSignature)));
    }
}
