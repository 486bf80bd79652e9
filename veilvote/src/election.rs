//! ElGamal ballot encryption with a disjunctive zero-knowledge proof,
//! homomorphic aggregation, and distributed-trust decryption with
//! Chaum–Pedersen equality proofs.
//!
//! A ballot encrypts `v ∈ {0, 1}` as `(a, b) = (g^r, pk^r · g^v)`. The
//! attached proof shows, without revealing `v`, that the ciphertext
//! encrypts 0 or encrypts 1: the branch for the real `v` is proven
//! honestly and the other branch is simulated, with the Fiat–Shamir
//! challenge split across the two.

use crate::crypto;
use crate::serde_hex::{BigUintHex, Hex};
use crate::{Error, GroupParams, ProofError};

use num_bigint::BigUint;
use num_traits::One;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

/// An ElGamal ballot ciphertext over the election public key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoteCiphertext {
    #[serde(with = "BigUintHex")]
    pub a: BigUint,
    #[serde(with = "BigUintHex")]
    pub b: BigUint,
}

/// Disjunctive proof that a ballot encrypts 0 or 1.
///
/// `c0 + c1` must equal the transcript hash mod `q`; each branch carries
/// its own commitment pair and response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoteZkp {
    #[serde(with = "BigUintHex")]
    pub a0: BigUint,
    #[serde(with = "BigUintHex")]
    pub b0: BigUint,
    #[serde(with = "BigUintHex")]
    pub a1: BigUint,
    #[serde(with = "BigUintHex")]
    pub b1: BigUint,
    #[serde(with = "BigUintHex")]
    pub c0: BigUint,
    #[serde(with = "BigUintHex")]
    pub c1: BigUint,
    #[serde(with = "BigUintHex")]
    pub r0: BigUint,
    #[serde(with = "BigUintHex")]
    pub r1: BigUint,
}

/// One arbiter's share `d = a^{sk_i}` of a decryption, together with the
/// aggregate ciphertext it was computed over.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartialDecryption {
    #[serde(with = "BigUintHex")]
    pub d: BigUint,
    pub aggregate: VoteCiphertext,
}

/// Chaum–Pedersen proof that `log_a(d) = log_g(pk_i)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DecryptionZkp {
    #[serde(with = "BigUintHex")]
    pub u: BigUint,
    #[serde(with = "BigUintHex")]
    pub v: BigUint,
    #[serde(with = "BigUintHex")]
    pub s: BigUint,
}

fn mod_inv(value: &BigUint, modulus: &BigUint) -> BigUint {
    value
        .modinv(modulus)
        .expect("veilvote: group element has an inverse mod p")
}

fn sub_mod(lhs: &BigUint, rhs: &BigUint, modulus: &BigUint) -> BigUint {
    ((lhs % modulus) + modulus - (rhs % modulus)) % modulus
}

/// Encrypt a one-bit vote and prove it well-formed.
pub fn generate_vote<R: RngCore + CryptoRng>(
    params: &GroupParams,
    vote: bool,
    pk: &BigUint,
    rng: &mut R,
) -> (VoteCiphertext, VoteZkp) {
    let GroupParams { p, q, g } = params;

    let r = crypto::random_scalar(params, rng);
    let a = g.modpow(&r, p);
    let b = if vote {
        (pk.modpow(&r, p) * g) % p
    } else {
        pk.modpow(&r, p)
    };
    let ciphertext = VoteCiphertext { a: a.clone(), b: b.clone() };

    // Simulated branch for 1 - v: pick the challenge and response first,
    // then solve for commitments that satisfy the verifier's equations.
    let simulated_c = crypto::random_scalar(params, rng);
    let simulated_r = crypto::random_scalar(params, rng);
    // The simulated branch treats (a, b / g^{1-v}) as an encryption of zero.
    let simulated_b = if vote {
        b.clone()
    } else {
        (&b * mod_inv(g, p)) % p
    };
    let simulated_a_commit =
        (g.modpow(&simulated_r, p) * mod_inv(&a.modpow(&simulated_c, p), p)) % p;
    let simulated_b_commit =
        (pk.modpow(&simulated_r, p) * mod_inv(&simulated_b.modpow(&simulated_c, p), p)) % p;

    // Honest branch: a plain Chaum–Pedersen commitment.
    let w = crypto::random_scalar(params, rng);
    let honest_a_commit = g.modpow(&w, p);
    let honest_b_commit = pk.modpow(&w, p);

    let (a0, b0, a1, b1) = if vote {
        (
            simulated_a_commit.clone(),
            simulated_b_commit.clone(),
            honest_a_commit,
            honest_b_commit,
        )
    } else {
        (
            honest_a_commit,
            honest_b_commit,
            simulated_a_commit.clone(),
            simulated_b_commit.clone(),
        )
    };

    let challenge = crypto::hash_ballot_proof(params, pk, &a, &b, &a0, &b0, &a1, &b1);
    let honest_c = sub_mod(&challenge, &simulated_c, q);
    let honest_r = (&w + (&honest_c * &r) % q) % q;

    let zkp = if vote {
        VoteZkp {
            a0,
            b0,
            a1,
            b1,
            c0: simulated_c,
            c1: honest_c,
            r0: simulated_r,
            r1: honest_r,
        }
    } else {
        VoteZkp {
            a0,
            b0,
            a1,
            b1,
            c0: honest_c,
            c1: simulated_c,
            r0: honest_r,
            r1: simulated_r,
        }
    };

    (ciphertext, zkp)
}

/// Verify a ballot proof against the election public key.
///
/// Each clause is checked in turn and reports itself on failure.
pub fn verify_vote_zkp(
    params: &GroupParams,
    vote: &VoteCiphertext,
    zkp: &VoteZkp,
    pk: &BigUint,
) -> Result<(), ProofError> {
    let GroupParams { p, q, g } = params;
    let VoteCiphertext { a, b } = vote;

    let challenge =
        crypto::hash_ballot_proof(params, pk, a, b, &zkp.a0, &zkp.b0, &zkp.a1, &zkp.b1);
    if (&zkp.c0 + &zkp.c1) % q != challenge {
        return Err(ProofError::ChallengeSum);
    }

    // Branch 0: (a, b) encrypts 0.
    if g.modpow(&zkp.r0, p) != (&zkp.a0 * a.modpow(&zkp.c0, p)) % p {
        return Err(ProofError::ZeroBranchGenerator);
    }
    if pk.modpow(&zkp.r0, p) != (&zkp.b0 * b.modpow(&zkp.c0, p)) % p {
        return Err(ProofError::ZeroBranchKey);
    }

    // Branch 1: (a, b / g) encrypts 0.
    let b_over_g = (b * mod_inv(g, p)) % p;
    if g.modpow(&zkp.r1, p) != (&zkp.a1 * a.modpow(&zkp.c1, p)) % p {
        return Err(ProofError::OneBranchGenerator);
    }
    if pk.modpow(&zkp.r1, p) != (&zkp.b1 * b_over_g.modpow(&zkp.c1, p)) % p {
        return Err(ProofError::OneBranchKey);
    }

    Ok(())
}

/// Homomorphically combine ballots; the plaintext of the result is the sum
/// of the individual votes.
pub fn combine_votes<'a, I>(params: &GroupParams, votes: I) -> VoteCiphertext
where
    I: IntoIterator<Item = &'a VoteCiphertext>,
{
    let mut a = BigUint::one();
    let mut b = BigUint::one();
    for vote in votes {
        a = (a * &vote.a) % &params.p;
        b = (b * &vote.b) % &params.p;
    }
    VoteCiphertext { a, b }
}

/// Compute one arbiter's partial decryption of the aggregate, with a DLEQ
/// proof binding it to the arbiter's public share.
pub fn partial_decrypt<R: RngCore + CryptoRng>(
    params: &GroupParams,
    aggregate: &VoteCiphertext,
    sk_i: &BigUint,
    pk_i: &BigUint,
    rng: &mut R,
) -> (PartialDecryption, DecryptionZkp) {
    let GroupParams { p, q, g } = params;

    let d = aggregate.a.modpow(sk_i, p);
    let decryption = PartialDecryption {
        d,
        aggregate: aggregate.clone(),
    };

    let r = crypto::random_scalar(params, rng);
    let u = aggregate.a.modpow(&r, p);
    let v = g.modpow(&r, p);
    let sigma = crypto::hash_decryption_proof(params, pk_i, &aggregate.a, &aggregate.b, &u, &v);
    let s = (&r + (&sigma * sk_i) % q) % q;

    (decryption, DecryptionZkp { u, v, s })
}

/// Verify an arbiter's DLEQ proof: `a^s = u · d^σ` and `g^s = v · pk_i^σ`.
pub fn verify_partial_decryption(
    params: &GroupParams,
    pk_i: &BigUint,
    decryption: &PartialDecryption,
    zkp: &DecryptionZkp,
) -> Result<(), ProofError> {
    let GroupParams { p, g, .. } = params;
    let VoteCiphertext { a, b } = &decryption.aggregate;

    let sigma = crypto::hash_decryption_proof(params, pk_i, a, b, &zkp.u, &zkp.v);

    if a.modpow(&zkp.s, p) != (&zkp.u * decryption.d.modpow(&sigma, p)) % p {
        return Err(ProofError::DecryptionAggregate);
    }
    if g.modpow(&zkp.s, p) != (&zkp.v * pk_i.modpow(&sigma, p)) % p {
        return Err(ProofError::DecryptionShare);
    }
    Ok(())
}

/// Combine the arbiters' partial decryptions and recover the tally by
/// searching `g^m` for `m ∈ [0, max_tally]`.
///
/// `max_tally` is the number of accepted ballots; the sum of one-bit votes
/// cannot exceed it, so anything larger means the decryptions were
/// inconsistent.
pub fn combine_results<'a, I>(
    params: &GroupParams,
    aggregate: &VoteCiphertext,
    partials: I,
    max_tally: u64,
) -> Result<u64, Error>
where
    I: IntoIterator<Item = &'a PartialDecryption>,
{
    let GroupParams { p, g, .. } = params;

    let mut combined = BigUint::one();
    for partial in partials {
        combined = (combined * &partial.d) % p;
    }
    let g_to_tally = (&aggregate.b * mod_inv(&combined, p)) % p;

    let mut accumulator = BigUint::one();
    for tally in 0..=max_tally {
        if accumulator == g_to_tally {
            return Ok(tally);
        }
        accumulator = (accumulator * g) % p;
    }
    Err(Error::TallyRecoveryFailure)
}

/// Generate one arbiter's key share `(sk_i, pk_i = g^{sk_i})`.
pub fn generate_key_share<R: RngCore + CryptoRng>(
    params: &GroupParams,
    rng: &mut R,
) -> (BigUint, BigUint) {
    let sk = crypto::random_scalar(params, rng);
    let pk = params.g.modpow(&sk, &params.p);
    (sk, pk)
}

/// The election public key is the product of the arbiters' public shares.
pub fn election_public_key<'a, I>(params: &GroupParams, shares: I) -> BigUint
where
    I: IntoIterator<Item = &'a BigUint>,
{
    let mut pk = BigUint::one();
    for share in shares {
        pk = (pk * share) % &params.p;
    }
    pk
}

/// Check one stored ballot end to end: its proof, the unblinded registrar
/// signature, and the tallyer's acceptance signature. Aggregating callers
/// drop rows that fail instead of erroring.
pub fn verify_vote_row(
    params: &GroupParams,
    election_pk: &BigUint,
    registrar_key: &rsa::RsaPublicKey,
    tallyer_key: &rsa::RsaPublicKey,
    row: &crate::store::VoteRow,
) -> bool {
    if let Err(err) = verify_vote_zkp(params, &row.vote, &row.zkp, election_pk) {
        tracing::warn!(%err, "dropping ballot: invalid proof");
        return false;
    }
    match crate::blind::blind_verify(registrar_key, &row.vote, &row.unblinded_signature) {
        Ok(true) => {}
        _ => {
            tracing::warn!("dropping ballot: registrar signature does not verify");
            return false;
        }
    }
    let payload =
        match crate::store::VoteRow::signing_payload(&row.vote, &row.zkp, &row.unblinded_signature)
        {
            Ok(payload) => payload,
            Err(_) => return false,
        };
    if !crypto::rsa_verify(tallyer_key, &payload, &row.tallyer_signature) {
        tracing::warn!("dropping ballot: tallyer signature does not verify");
        return false;
    }
    true
}

/// A short stable identifier for an aggregate ciphertext, used to key the
/// partial-decryption store.
pub fn aggregate_fingerprint(aggregate: &VoteCiphertext) -> String {
    let mut hasher = Sha256::new();
    for part in [&aggregate.a, &aggregate.b] {
        let bytes = part.to_bytes_be();
        hasher.update((bytes.len() as u32).to_be_bytes());
        hasher.update(&bytes);
    }
    hex::encode(&hasher.finalize()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn setup() -> (GroupParams, BigUint, BigUint) {
        let params = GroupParams::standard();
        let (sk, pk) = generate_key_share(&params, &mut OsRng);
        (params, sk, pk)
    }

    #[test]
    fn honest_ballots_verify() {
        let (params, _, pk) = setup();
        for vote in [false, true] {
            let (ciphertext, zkp) = generate_vote(&params, vote, &pk, &mut OsRng);
            verify_vote_zkp(&params, &ciphertext, &zkp, &pk).unwrap();
        }
    }

    #[test]
    fn tampered_ballot_proofs_fail() {
        let (params, _, pk) = setup();
        let (ciphertext, zkp) = generate_vote(&params, true, &pk, &mut OsRng);

        let bump = |value: &BigUint| value + 1u32;

        let tampered = [
            VoteZkp { a0: bump(&zkp.a0), ..zkp.clone() },
            VoteZkp { b0: bump(&zkp.b0), ..zkp.clone() },
            VoteZkp { a1: bump(&zkp.a1), ..zkp.clone() },
            VoteZkp { b1: bump(&zkp.b1), ..zkp.clone() },
            VoteZkp { c0: bump(&zkp.c0), ..zkp.clone() },
            VoteZkp { c1: bump(&zkp.c1), ..zkp.clone() },
            VoteZkp { r0: bump(&zkp.r0), ..zkp.clone() },
            VoteZkp { r1: bump(&zkp.r1), ..zkp.clone() },
        ];
        for zkp in &tampered {
            assert!(verify_vote_zkp(&params, &ciphertext, zkp, &pk).is_err());
        }

        // A two-vote ciphertext cannot carry a valid proof either.
        let stuffed = VoteCiphertext {
            a: ciphertext.a.clone(),
            b: (&ciphertext.b * &params.g) % &params.p,
        };
        assert!(verify_vote_zkp(&params, &stuffed, &zkp, &pk).is_err());
    }

    #[test]
    fn single_share_tally_round_trip() {
        let (params, sk, pk) = setup();

        let votes: Vec<_> = [true, false, true, true]
            .iter()
            .map(|v| generate_vote(&params, *v, &pk, &mut OsRng).0)
            .collect();
        let aggregate = combine_votes(&params, votes.iter());

        let (partial, zkp) = partial_decrypt(&params, &aggregate, &sk, &pk, &mut OsRng);
        verify_partial_decryption(&params, &pk, &partial, &zkp).unwrap();

        let tally = combine_results(&params, &aggregate, [&partial], 4);
        assert_eq!(tally.unwrap(), 3);
    }

    #[test]
    fn two_share_tally_round_trip() {
        let params = GroupParams::standard();
        let (sk1, pk1) = generate_key_share(&params, &mut OsRng);
        let (sk2, pk2) = generate_key_share(&params, &mut OsRng);
        let pk = election_public_key(&params, [&pk1, &pk2]);

        let votes: Vec<_> = [false, true, true]
            .iter()
            .map(|v| generate_vote(&params, *v, &pk, &mut OsRng).0)
            .collect();
        let aggregate = combine_votes(&params, votes.iter());

        let (partial1, _) = partial_decrypt(&params, &aggregate, &sk1, &pk1, &mut OsRng);
        let (partial2, _) = partial_decrypt(&params, &aggregate, &sk2, &pk2, &mut OsRng);

        let tally =
            combine_results(&params, &aggregate, vec![&partial1, &partial2], 3).unwrap();
        assert_eq!(tally, 2);
    }

    #[test]
    fn forged_share_fails_dleq() {
        let (params, sk, pk) = setup();
        let (ciphertext, _) = generate_vote(&params, true, &pk, &mut OsRng);

        let (mut partial, zkp) = partial_decrypt(&params, &ciphertext, &sk, &pk, &mut OsRng);
        partial.d = (&partial.d * &params.g) % &params.p;

        assert!(verify_partial_decryption(&params, &pk, &partial, &zkp).is_err());
    }

    #[test]
    fn inconsistent_decryptions_fail_recovery() {
        let (params, sk, pk) = setup();
        let (ciphertext, _) = generate_vote(&params, true, &pk, &mut OsRng);
        let (mut partial, _) = partial_decrypt(&params, &ciphertext, &sk, &pk, &mut OsRng);
        partial.d = (&partial.d * &params.g) % &params.p;

        let result = combine_results(&params, &ciphertext, [&partial], 10);
        assert!(matches!(result, Err(Error::TallyRecoveryFailure)));
    }
}
