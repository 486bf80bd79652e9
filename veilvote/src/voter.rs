//! The voter's three acts: register (encrypt, prove, blind, get signed),
//! cast (unblind, send), and verify (re-check the whole election and
//! recover the tally).

use crate::channel::{Channel, SecureChannel};
use crate::election::{VoteCiphertext, VoteZkp};
use crate::serde_hex::{BigUintHex, Hex};
use crate::store::Store;
use crate::{blind, election, handshake, Error, GroupParams, Message};

use num_bigint::BigUint;
use rand::rngs::OsRng;
use rsa::RsaPublicKey;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Everything a voter must retain between registering and casting:
/// the encrypted ballot, its proof, the registrar's blind signature, and
/// the blinding factor needed to unblind it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Registration {
    pub vote: VoteCiphertext,
    pub zkp: VoteZkp,
    #[serde(with = "BigUintHex")]
    pub registrar_signature: BigUint,
    #[serde(with = "BigUintHex")]
    pub blinding_factor: BigUint,
}

pub struct Voter {
    params: GroupParams,
    election_pk: BigUint,
    registrar_key: RsaPublicKey,
    tallyer_key: RsaPublicKey,
}

impl Voter {
    pub fn new(
        params: GroupParams,
        election_pk: BigUint,
        registrar_key: RsaPublicKey,
        tallyer_key: RsaPublicKey,
    ) -> Self {
        Voter {
            params,
            election_pk,
            registrar_key,
            tallyer_key,
        }
    }

    /// Register with the registrar over an established connection:
    /// encrypt the raw vote, prove it is 0 or 1, blind the ciphertext
    /// digest, and trade it for a blind signature.
    pub fn register<C: Channel>(
        &self,
        mut channel: C,
        voter_id: &str,
        vote: bool,
    ) -> Result<Registration, Error> {
        let (aes_key, hmac_key) =
            handshake::client_handshake(&mut channel, &self.params, &self.registrar_key, &mut OsRng)?;
        let mut channel = SecureChannel::new(channel, aes_key, hmac_key);

        let (ciphertext, zkp) =
            election::generate_vote(&self.params, vote, &self.election_pk, &mut OsRng);
        let (blinded, blinding_factor) = blind::blind(&self.registrar_key, &ciphertext, &mut OsRng)?;

        channel.send_message(&Message::Register {
            voter_id: voter_id.to_string(),
            blinded_ballot: blinded,
        })?;
        let (_, registrar_signature) = channel.read_message()?.into_blind_signature()?;
        channel.close();

        info!(voter_id = %voter_id, "registered");
        Ok(Registration {
            vote: ciphertext,
            zkp,
            registrar_signature,
            blinding_factor,
        })
    }

    /// Cast the registered ballot with the tallyer over an established
    /// connection, unblinding the registrar's signature on the way out.
    pub fn cast<C: Channel>(&self, mut channel: C, registration: &Registration) -> Result<(), Error> {
        let (aes_key, hmac_key) =
            handshake::client_handshake(&mut channel, &self.params, &self.tallyer_key, &mut OsRng)?;
        let mut channel = SecureChannel::new(channel, aes_key, hmac_key);

        let unblinded_signature = blind::unblind(
            &self.registrar_key,
            &registration.registrar_signature,
            &registration.blinding_factor,
        )?;

        channel.send_message(&Message::CastBallot {
            vote: registration.vote.clone(),
            zkp: registration.zkp.clone(),
            unblinded_signature,
        })?;
        channel.close();
        info!("ballot cast");
        Ok(())
    }

    /// Verify the election from a store snapshot and recover the result.
    ///
    /// Re-validates every ballot (invalid ones are ignored), checks each
    /// arbiter's decryption proof against its published share, and
    /// recovers the tally. Returns `(zero_votes, one_votes, success)`;
    /// an invalid decryption proof yields `success = false`, while
    /// inconsistent decryptions are a hard [`Error::TallyRecoveryFailure`].
    pub fn verify<S: Store>(
        &self,
        store: &S,
        arbiter_keys: &BTreeMap<String, BigUint>,
    ) -> Result<(u64, u64, bool), Error> {
        let valid: Vec<_> = store
            .all_votes()
            .into_iter()
            .filter(|row| {
                election::verify_vote_row(
                    &self.params,
                    &self.election_pk,
                    &self.registrar_key,
                    &self.tallyer_key,
                    row,
                )
            })
            .collect();

        let aggregate = election::combine_votes(&self.params, valid.iter().map(|row| &row.vote));
        let fingerprint = election::aggregate_fingerprint(&aggregate);

        // Only decryptions of the aggregate we just recomputed count;
        // rows for a stale aggregate are someone else's adjudication.
        let mut partials = Vec::new();
        for row in store.all_partial_decryptions() {
            if election::aggregate_fingerprint(&row.dec.aggregate) != fingerprint {
                warn!(arbiter_id = %row.arbiter_id, "skipping decryption of a different aggregate");
                continue;
            }

            let public_share = match arbiter_keys.get(&row.arbiter_id) {
                Some(share) => share,
                None => {
                    warn!(arbiter_id = %row.arbiter_id, "decryption by unknown arbiter");
                    return Ok((0, 0, false));
                }
            };
            if election::verify_partial_decryption(&self.params, public_share, &row.dec, &row.zkp)
                .is_err()
            {
                warn!(arbiter_id = %row.arbiter_id, "decryption proof failed");
                return Ok((0, 0, false));
            }
            partials.push(row.dec);
        }

        let accepted = valid.len() as u64;
        let one_votes =
            election::combine_results(&self.params, &aggregate, partials.iter(), accepted)?;
        Ok((accepted - one_votes, one_votes, true))
    }
}
