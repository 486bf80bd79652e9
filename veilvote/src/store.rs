//! The shared vote store the registrar, tallyer, arbiters, and verifying
//! voters all consume. The core only sees this narrow trait; embedders
//! decide where rows actually live.

use crate::election::{
    aggregate_fingerprint, DecryptionZkp, PartialDecryption, VoteCiphertext, VoteZkp,
};
use crate::serde_hex::{BigUintHex, Hex};
use crate::Error;

use num_bigint::BigUint;
use std::collections::BTreeMap;

/// One registered voter: the blind signature issued over their blinded
/// ballot. First registration wins; re-registration returns this row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoterRow {
    pub voter_id: String,
    #[serde(with = "BigUintHex")]
    pub registrar_signature: BigUint,
}

/// One accepted ballot, verifiable on its own: the ciphertext, its proof,
/// the unblinded registrar signature, and the tallyer's acceptance
/// signature over all three.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoteRow {
    pub vote: VoteCiphertext,
    pub zkp: VoteZkp,
    #[serde(with = "BigUintHex")]
    pub unblinded_signature: BigUint,
    #[serde(with = "hex::serde")]
    pub tallyer_signature: Vec<u8>,
}

impl VoteRow {
    /// The exact byte string the tallyer signs (and everyone verifies):
    /// a CBOR encoding of the ciphertext, proof, and registrar signature.
    pub fn signing_payload(
        vote: &VoteCiphertext,
        zkp: &VoteZkp,
        unblinded_signature: &BigUint,
    ) -> Result<Vec<u8>, Error> {
        #[derive(Serialize)]
        struct Payload<'a> {
            vote: &'a VoteCiphertext,
            zkp: &'a VoteZkp,
            #[serde(with = "BigUintHex")]
            unblinded_signature: &'a BigUint,
        }
        Ok(serde_cbor::to_vec(&Payload {
            vote,
            zkp,
            unblinded_signature,
        })?)
    }
}

/// One arbiter's published partial decryption.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartialDecryptionRow {
    pub arbiter_id: String,
    pub dec: PartialDecryption,
    pub zkp: DecryptionZkp,
}

/// The vote store
pub trait Store {
    /// Look up a voter's stored blind signature.
    fn find_voter(&self, voter_id: &str) -> Option<VoterRow>;

    /// Record a registration. Must be idempotent: a voter id that is
    /// already present keeps its original signature.
    fn insert_voter(&mut self, row: VoterRow);

    /// Snapshot of all accepted ballots, in acceptance order.
    fn all_votes(&self) -> Vec<VoteRow>;

    /// Append an accepted ballot.
    fn append_vote(&mut self, row: VoteRow);

    /// Snapshot of all published partial decryptions.
    fn all_partial_decryptions(&self) -> Vec<PartialDecryptionRow>;

    /// Record a partial decryption, keyed by
    /// `(arbiter_id, aggregate fingerprint)`; the first row for a key wins.
    fn insert_partial_decryption(&mut self, row: PartialDecryptionRow);
}

/// A simple store backed by in-memory maps
#[derive(Serialize, Deserialize, Default, Clone)]
pub struct MemStore {
    voters: BTreeMap<String, VoterRow>,
    votes: Vec<VoteRow>,
    partial_decryptions: BTreeMap<(String, String), PartialDecryptionRow>,
}

impl Store for MemStore {
    fn find_voter(&self, voter_id: &str) -> Option<VoterRow> {
        self.voters.get(voter_id).cloned()
    }

    fn insert_voter(&mut self, row: VoterRow) {
        self.voters.entry(row.voter_id.clone()).or_insert(row);
    }

    fn all_votes(&self) -> Vec<VoteRow> {
        self.votes.clone()
    }

    fn append_vote(&mut self, row: VoteRow) {
        self.votes.push(row);
    }

    fn all_partial_decryptions(&self) -> Vec<PartialDecryptionRow> {
        self.partial_decryptions.values().cloned().collect()
    }

    fn insert_partial_decryption(&mut self, row: PartialDecryptionRow) {
        let key = (
            row.arbiter_id.clone(),
            aggregate_fingerprint(&row.dec.aggregate),
        );
        self.partial_decryptions.entry(key).or_insert(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    fn voter(id: &str, sig: u32) -> VoterRow {
        VoterRow {
            voter_id: id.to_string(),
            registrar_signature: BigUint::from(sig),
        }
    }

    #[test]
    fn first_registration_wins() {
        let mut store = MemStore::default();
        store.insert_voter(voter("alice", 11));
        store.insert_voter(voter("alice", 22));

        let row = store.find_voter("alice").unwrap();
        assert_eq!(row.registrar_signature, BigUint::from(11u32));
        assert!(store.find_voter("bob").is_none());
    }

    #[test]
    fn partial_decryptions_are_keyed_by_arbiter_and_aggregate() {
        let aggregate = VoteCiphertext {
            a: BigUint::one(),
            b: BigUint::one(),
        };
        let row = PartialDecryptionRow {
            arbiter_id: "arbiter-1".to_string(),
            dec: PartialDecryption {
                d: BigUint::one(),
                aggregate,
            },
            zkp: DecryptionZkp {
                u: BigUint::one(),
                v: BigUint::one(),
                s: BigUint::one(),
            },
        };

        let mut store = MemStore::default();
        store.insert_partial_decryption(row.clone());
        store.insert_partial_decryption(row);
        assert_eq!(store.all_partial_decryptions().len(), 1);
    }
}
