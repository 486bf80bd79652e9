use super::*;

use num_bigint::BigUint;
use rand::rngs::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;

fn test_rsa_keys() -> (RsaPrivateKey, RsaPublicKey) {
    let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
    let public = private.to_public_key();
    (private, public)
}

// ---------------------------------------------------------------------
// Yao garbled-circuit end-to-end scenarios
// ---------------------------------------------------------------------

fn run_sfe(circuit_text: &str, garbler_input: &[bool], evaluator_input: &[bool]) -> String {
    let params = GroupParams::standard();
    let circuit = Circuit::parse(circuit_text).unwrap();
    let (garbler_end, evaluator_end) = MemChannel::pair();

    let garbler_side = {
        let circuit = circuit.clone();
        let params = params.clone();
        let input = garbler_input.to_vec();
        thread::spawn(move || Garbler::new(circuit, garbler_end, params).run(&input).unwrap())
    };

    let evaluator_output = Evaluator::new(circuit, evaluator_end, params)
        .run(evaluator_input)
        .unwrap();
    let garbler_output = garbler_side.join().unwrap();

    // Both parties learn the same decoded result.
    assert_eq!(garbler_output, evaluator_output);
    evaluator_output
}

#[test]
fn yao_and_gate() {
    assert_eq!(run_sfe("1 3 1 1 1\n1 0 1 2\n", &[true], &[true]), "1");
    assert_eq!(run_sfe("1 3 1 1 1\n1 0 1 2\n", &[true], &[false]), "0");
    assert_eq!(run_sfe("1 3 1 1 1\n1 0 1 2\n", &[false], &[true]), "0");
}

#[test]
fn yao_xor_gate() {
    assert_eq!(run_sfe("1 3 1 1 1\n2 0 1 2\n", &[true], &[false]), "1");
    assert_eq!(run_sfe("1 3 1 1 1\n2 0 1 2\n", &[true], &[true]), "0");
}

#[test]
fn yao_not_gate() {
    // NOT of the garbler's single input; the evaluator contributes nothing.
    assert_eq!(run_sfe("1 2 1 0 1\n3 0 0 1\n", &[false], &[]), "1");
    assert_eq!(run_sfe("1 2 1 0 1\n3 0 0 1\n", &[true], &[]), "0");
}

#[test]
fn yao_two_gate_composition() {
    // (g AND e) XOR (NOT g): wires 0,1 inputs; 2 = AND, 3 = NOT g, 4 = out.
    let circuit = "3 5 1 1 1\n1 0 1 2\n3 0 0 3\n2 2 3 4\n";
    assert_eq!(run_sfe(circuit, &[false], &[true]), "1");
    assert_eq!(run_sfe(circuit, &[true], &[true]), "1");
    assert_eq!(run_sfe(circuit, &[true], &[false]), "0");
}

// ---------------------------------------------------------------------
// Election end-to-end scenarios
// ---------------------------------------------------------------------

struct Election {
    params: GroupParams,
    voter: Voter,
    registrar: Registrar,
    tallyer: Tallyer,
    arbiters: Vec<Arbiter>,
    arbiter_keys: BTreeMap<String, BigUint>,
    store: Arc<Mutex<MemStore>>,
}

fn setup_election(num_arbiters: usize) -> Election {
    let params = GroupParams::standard();
    let (registrar_sk, registrar_vk) = test_rsa_keys();
    let (tallyer_sk, tallyer_vk) = test_rsa_keys();

    let shares: Vec<_> = (0..num_arbiters)
        .map(|_| Arbiter::keygen(&params))
        .collect();
    let election_pk = election_public_key(&params, shares.iter().map(|(_, pk)| pk));

    let arbiters: Vec<_> = shares
        .iter()
        .enumerate()
        .map(|(index, (sk, pk))| {
            Arbiter::new(
                format!("arbiter-{}", index),
                params.clone(),
                sk.clone(),
                pk.clone(),
                election_pk.clone(),
                registrar_vk.clone(),
                tallyer_vk.clone(),
            )
        })
        .collect();
    let arbiter_keys: BTreeMap<String, BigUint> = shares
        .iter()
        .enumerate()
        .map(|(index, (_, pk))| (format!("arbiter-{}", index), pk.clone()))
        .collect();

    Election {
        voter: Voter::new(
            params.clone(),
            election_pk.clone(),
            registrar_vk.clone(),
            tallyer_vk.clone(),
        ),
        registrar: Registrar::new(params.clone(), registrar_sk),
        tallyer: Tallyer::new(params.clone(), election_pk, tallyer_sk, registrar_vk),
        arbiters,
        arbiter_keys,
        store: Arc::new(Mutex::new(MemStore::default())),
        params,
    }
}

impl Election {
    /// Register over a loopback connection, with the registrar session on
    /// its own thread the way a listener would run it.
    fn register(&self, voter_id: &str, vote: bool) -> Registration {
        let (voter_end, registrar_end) = MemChannel::pair();
        let store = Arc::clone(&self.store);

        thread::scope(|scope| {
            let registrar = &self.registrar;
            scope.spawn(move || {
                let mut store = store.lock().unwrap();
                registrar
                    .handle_registration(registrar_end, &mut *store)
                    .unwrap();
            });
            self.voter.register(voter_end, voter_id, vote).unwrap()
        })
    }

    fn cast(&self, registration: &Registration) {
        let (voter_end, tallyer_end) = MemChannel::pair();
        let store = Arc::clone(&self.store);

        thread::scope(|scope| {
            let tallyer = &self.tallyer;
            scope.spawn(move || {
                let mut store = store.lock().unwrap();
                tallyer.handle_cast(tallyer_end, &mut *store).unwrap();
            });
            self.voter.cast(voter_end, registration).unwrap();
        });
    }

    fn adjudicate_all(&self) {
        let mut store = self.store.lock().unwrap();
        for arbiter in &self.arbiters {
            arbiter.adjudicate(&mut *store).unwrap();
        }
    }

    fn verify(&self) -> Result<(u64, u64, bool), Error> {
        let store = self.store.lock().unwrap();
        self.voter.verify(&*store, &self.arbiter_keys)
    }
}

#[test]
fn three_voters_two_arbiters_tally() {
    let election = setup_election(2);

    for (voter_id, vote) in [("alice", false), ("bob", true), ("carol", true)] {
        let registration = election.register(voter_id, vote);
        election.cast(&registration);
    }
    election.adjudicate_all();

    let (zeros, ones, success) = election.verify().unwrap();
    assert!(success);
    assert_eq!(zeros, 1);
    assert_eq!(ones, 2);
}

#[test]
fn tampered_ballot_is_dropped_not_fatal() {
    let election = setup_election(2);

    for (voter_id, vote) in [("alice", false), ("bob", true), ("carol", true)] {
        let registration = election.register(voter_id, vote);
        election.cast(&registration);
    }

    // Corrupt one stored ballot's proof after acceptance.
    {
        let mut store = election.store.lock().unwrap();
        let mut votes = store.all_votes();
        votes[1].zkp.c0 += 1u32;
        let mut tampered = MemStore::default();
        for row in votes {
            tampered.append_vote(row);
        }
        *store = tampered;
    }

    election.adjudicate_all();
    let (zeros, ones, success) = election.verify().unwrap();
    assert!(success, "verification succeeds over the remaining ballots");
    assert_eq!(zeros + ones, 2);
    assert_eq!(ones, 1);
}

#[test]
fn re_registration_returns_the_same_signature() {
    let election = setup_election(1);

    let first = election.register("alice", true);
    let second = election.register("alice", false);

    // The registrar must answer with the stored signature, byte for byte.
    assert_eq!(first.registrar_signature, second.registrar_signature);

    let stored = election
        .store
        .lock()
        .unwrap()
        .find_voter("alice")
        .unwrap();
    assert_eq!(stored.registrar_signature, first.registrar_signature);
}

#[test]
fn tallyer_rejects_ballot_without_registration() {
    let election = setup_election(1);

    // A well-formed ballot whose registrar signature has been corrupted.
    let registration = election.register("alice", true);
    let forged = Registration {
        registrar_signature: &registration.registrar_signature + 1u32,
        ..registration
    };

    let (voter_end, tallyer_end) = MemChannel::pair();
    let store = Arc::clone(&election.store);
    let result = thread::scope(|scope| {
        let tallyer = &election.tallyer;
        let handle = scope.spawn(move || {
            let mut store = store.lock().unwrap();
            tallyer.handle_cast(tallyer_end, &mut *store)
        });
        let _ = election.voter.cast(voter_end, &forged);
        handle.join().unwrap()
    });

    assert!(matches!(result, Err(Error::BlindSignatureInvalid)));
    assert!(election.store.lock().unwrap().all_votes().is_empty());
}

#[test]
fn forged_partial_decryption_fails_verification() {
    let election = setup_election(2);

    let registration = election.register("alice", true);
    election.cast(&registration);
    election.adjudicate_all();

    // Corrupt one arbiter's share after publication.
    {
        let mut store = election.store.lock().unwrap();
        let mut rows = store.all_partial_decryptions();
        rows[0].dec.d = (&rows[0].dec.d * &election.params.g) % &election.params.p;

        let mut forged = MemStore::default();
        for row in store.all_votes() {
            forged.append_vote(row);
        }
        for row in rows {
            forged.insert_partial_decryption(row);
        }
        *store = forged;
    }

    let (_, _, success) = election.verify().unwrap();
    assert!(!success);
}
