//! The tallyer: gatekeeper of the vote store. A ballot is appended only if
//! its proof checks out against the election key and its unblinded
//! registrar signature is genuine; the tallyer then counter-signs the
//! whole tuple so every row is later verifiable on its own.

use crate::channel::{Channel, SecureChannel};
use crate::store::{Store, VoteRow};
use crate::{blind, crypto, election, handshake, Error, GroupParams};

use num_bigint::BigUint;
use rand::rngs::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::info;

pub struct Tallyer {
    params: GroupParams,
    election_pk: BigUint,
    signing_key: RsaPrivateKey,
    registrar_key: RsaPublicKey,
}

impl Tallyer {
    pub fn new(
        params: GroupParams,
        election_pk: BigUint,
        signing_key: RsaPrivateKey,
        registrar_key: RsaPublicKey,
    ) -> Self {
        Tallyer {
            params,
            election_pk,
            signing_key,
            registrar_key,
        }
    }

    /// Handle one vote-casting session on an accepted connection.
    ///
    /// Rejected ballots (bad proof, bad signature) are not persisted and
    /// the error says which check failed.
    pub fn handle_cast<C: Channel, S: Store>(
        &self,
        mut channel: C,
        store: &mut S,
    ) -> Result<VoteRow, Error> {
        let (aes_key, hmac_key) =
            handshake::server_handshake(&mut channel, &self.params, &self.signing_key, &mut OsRng)?;
        let mut channel = SecureChannel::new(channel, aes_key, hmac_key);

        let (vote, zkp, unblinded_signature) = channel.read_message()?.into_cast_ballot()?;

        election::verify_vote_zkp(&self.params, &vote, &zkp, &self.election_pk)?;
        if !blind::blind_verify(&self.registrar_key, &vote, &unblinded_signature)? {
            return Err(Error::BlindSignatureInvalid);
        }

        let payload = VoteRow::signing_payload(&vote, &zkp, &unblinded_signature)?;
        let tallyer_signature = crypto::rsa_sign(&self.signing_key, &payload)?;

        let row = VoteRow {
            vote,
            zkp,
            unblinded_signature,
            tallyer_signature,
        };
        store.append_vote(row.clone());
        info!("accepted ballot into the vote store");

        channel.close();
        Ok(row)
    }
}
