//! An arbiter holds one additive share of the election secret. After
//! voting closes it re-validates every stored ballot, combines the valid
//! ones homomorphically, and publishes its partial decryption of the
//! aggregate together with a Chaum–Pedersen proof.

use crate::store::{PartialDecryptionRow, Store, VoteRow};
use crate::{election, Error, GroupParams};

use num_bigint::BigUint;
use rand::rngs::OsRng;
use rsa::RsaPublicKey;
use tracing::info;

pub struct Arbiter {
    pub arbiter_id: String,
    params: GroupParams,
    secret_share: BigUint,
    public_share: BigUint,
    election_pk: BigUint,
    registrar_key: RsaPublicKey,
    tallyer_key: RsaPublicKey,
}

impl Arbiter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        arbiter_id: String,
        params: GroupParams,
        secret_share: BigUint,
        public_share: BigUint,
        election_pk: BigUint,
        registrar_key: RsaPublicKey,
        tallyer_key: RsaPublicKey,
    ) -> Self {
        Arbiter {
            arbiter_id,
            params,
            secret_share,
            public_share,
            election_pk,
            registrar_key,
            tallyer_key,
        }
    }

    /// Generate a fresh key share `(sk_i, pk_i)` for a new arbiter.
    pub fn keygen(params: &GroupParams) -> (BigUint, BigUint) {
        election::generate_key_share(params, &mut OsRng)
    }

    /// Re-validate the stored ballots and return the surviving rows.
    /// Invalid rows are dropped, never an error.
    pub fn valid_votes<S: Store>(&self, store: &S) -> Vec<VoteRow> {
        store
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
            .collect()
    }

    /// Adjudicate: combine the valid ballots and publish this arbiter's
    /// partial decryption of the aggregate.
    pub fn adjudicate<S: Store>(&self, store: &mut S) -> Result<PartialDecryptionRow, Error> {
        let valid = self.valid_votes(store);
        info!(
            arbiter_id = %self.arbiter_id,
            accepted = valid.len(),
            "adjudicating over validated ballots"
        );

        let aggregate = election::combine_votes(&self.params, valid.iter().map(|row| &row.vote));
        let (dec, zkp) = election::partial_decrypt(
            &self.params,
            &aggregate,
            &self.secret_share,
            &self.public_share,
            &mut OsRng,
        );

        let row = PartialDecryptionRow {
            arbiter_id: self.arbiter_id.clone(),
            dec,
            zkp,
        };
        store.insert_partial_decryption(row.clone());
        Ok(row)
    }
}
