//! Garbled-circuit construction: free-XOR wire labels and tag-verified
//! garbled tables.
//!
//! Every wire carries two `LABEL_LENGTH`-byte labels related by a single
//! session-wide offset Δ (`ones[i] = zeros[i] ⊕ Δ`), so XOR gates need no
//! table at all. AND and NOT tables encrypt the output label under a hash
//! of the input labels, with a run of `LABEL_TAG_LENGTH` zero bytes as the
//! validity tag the evaluator checks during trial decryption.

use crate::circuit::{Circuit, GateKind};
use crate::crypto;
use crate::params::{DUMMY_RHS, LABEL_LENGTH, LABEL_TAG_LENGTH};
use crate::Error;

use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng, RngCore};

/// Width of one garbled-table entry: a masked label plus its zero tag.
pub const ENTRY_LENGTH: usize = LABEL_LENGTH + LABEL_TAG_LENGTH;

/// An opaque wire label.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireLabel {
    #[serde(with = "hex::serde")]
    pub bytes: [u8; LABEL_LENGTH],
}

impl WireLabel {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; LABEL_LENGTH];
        rng.fill_bytes(&mut bytes);
        WireLabel { bytes }
    }

    pub fn xor(&self, other: &WireLabel) -> WireLabel {
        let mut bytes = [0u8; LABEL_LENGTH];
        for (out, (a, b)) in bytes.iter_mut().zip(self.bytes.iter().zip(other.bytes.iter())) {
            *out = a ^ b;
        }
        WireLabel { bytes }
    }

    /// The fixed public right-hand label for NOT gates.
    pub fn dummy_rhs() -> WireLabel {
        WireLabel { bytes: DUMMY_RHS }
    }
}

/// One garbled gate: permuted ciphertext entries (2 for NOT, 4 for AND,
/// none for XOR under free-XOR).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GarbledGate {
    pub entries: Vec<Vec<u8>>,
}

/// The zero/one labels for every wire, plus the free-XOR offset that
/// relates them. Known only to the garbler and never serialized.
pub struct GarbledLabels {
    pub zeros: Vec<WireLabel>,
    pub ones: Vec<WireLabel>,
    delta: WireLabel,
}

impl GarbledLabels {
    /// Draw Δ and one fresh zero-label per wire; every one-label is the
    /// zero-label offset by Δ. The top-order bit of Δ is forced to 1
    /// (point-and-permute reserved bit).
    pub fn generate<R: RngCore + CryptoRng>(circuit: &Circuit, rng: &mut R) -> Self {
        let mut delta = WireLabel::random(rng);
        delta.bytes[0] |= 0x80;

        let mut zeros = Vec::with_capacity(circuit.num_wire);
        let mut ones = Vec::with_capacity(circuit.num_wire);
        for _ in 0..circuit.num_wire {
            let zero = WireLabel::random(rng);
            ones.push(zero.xor(&delta));
            zeros.push(zero);
        }

        GarbledLabels { zeros, ones, delta }
    }

    /// The session offset Δ.
    pub fn offset(&self) -> WireLabel {
        self.delta
    }

    /// Select the labels matching `bits`, for wires starting at `begin`.
    pub fn select(&self, bits: &[bool], begin: usize) -> Vec<WireLabel> {
        bits.iter()
            .enumerate()
            .map(|(i, bit)| {
                if *bit {
                    self.ones[begin + i]
                } else {
                    self.zeros[begin + i]
                }
            })
            .collect()
    }
}

/// Encrypt one table entry: `H(lhs ‖ rhs) ⊕ (output ‖ 0^TAG)`.
pub fn encrypt_entry(lhs: &WireLabel, rhs: &WireLabel, output: &WireLabel) -> Vec<u8> {
    let mask = crypto::hash_inputs(&lhs.bytes, &rhs.bytes);

    let mut entry = vec![0u8; ENTRY_LENGTH];
    entry[..LABEL_LENGTH].copy_from_slice(&output.bytes);
    for (byte, mask_byte) in entry.iter_mut().zip(mask.iter()) {
        *byte ^= mask_byte;
    }
    entry
}

/// Try to open one table entry with the labels in hand. `Some(label)` iff
/// the trailing tag bytes decrypt to all zeros.
pub fn decrypt_entry(entry: &[u8], lhs: &WireLabel, rhs: &WireLabel) -> Option<WireLabel> {
    if entry.len() != ENTRY_LENGTH {
        return None;
    }
    let mask = crypto::hash_inputs(&lhs.bytes, &rhs.bytes);

    let mut plain = [0u8; ENTRY_LENGTH];
    for (out, (e, m)) in plain.iter_mut().zip(entry.iter().zip(mask.iter())) {
        *out = e ^ m;
    }
    if plain[LABEL_LENGTH..].iter().any(|byte| *byte != 0) {
        return None;
    }

    let mut bytes = [0u8; LABEL_LENGTH];
    bytes.copy_from_slice(&plain[..LABEL_LENGTH]);
    Some(WireLabel { bytes })
}

/// Garble every gate of the circuit. Entries within a gate are uniformly
/// shuffled so their position carries no information about the inputs; the
/// caller seeds `rng` once per session.
pub fn garble_circuit<R: Rng + CryptoRng>(
    circuit: &Circuit,
    labels: &GarbledLabels,
    rng: &mut R,
) -> Result<Vec<GarbledGate>, Error> {
    let mut tables = Vec::with_capacity(circuit.gates.len());

    for gate in &circuit.gates {
        let x0 = &labels.zeros[gate.lhs];
        let x1 = &labels.ones[gate.lhs];
        let z0 = &labels.zeros[gate.output];
        let z1 = &labels.ones[gate.output];

        let mut entries = match gate.kind {
            GateKind::And => {
                let y0 = &labels.zeros[gate.rhs];
                let y1 = &labels.ones[gate.rhs];
                vec![
                    encrypt_entry(x0, y0, z0),
                    encrypt_entry(x0, y1, z0),
                    encrypt_entry(x1, y0, z0),
                    encrypt_entry(x1, y1, z1),
                ]
            }
            // Free-XOR: the output label is the XOR of the input labels,
            // so there is nothing to transmit.
            GateKind::Xor => Vec::new(),
            GateKind::Not => {
                let dummy = WireLabel::dummy_rhs();
                vec![
                    encrypt_entry(x0, &dummy, z1),
                    encrypt_entry(x1, &dummy, z0),
                ]
            }
        };
        entries.shuffle(rng);

        tables.push(GarbledGate { entries });
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn test_rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(0x5eed)
    }

    #[test]
    fn all_wires_share_one_offset() {
        let circuit = Circuit::parse("1 3 1 1 1\n1 0 1 2\n").unwrap();
        let labels = GarbledLabels::generate(&circuit, &mut test_rng());

        let delta = labels.offset();
        for wire in 0..circuit.num_wire {
            assert_eq!(labels.zeros[wire].xor(&labels.ones[wire]), delta);
        }
        // Reserved point-and-permute bit.
        assert_eq!(delta.bytes[0] & 0x80, 0x80);
    }

    #[test]
    fn entry_round_trip_and_tag_rejection() {
        let mut rng = test_rng();
        let lhs = WireLabel::random(&mut rng);
        let rhs = WireLabel::random(&mut rng);
        let out = WireLabel::random(&mut rng);

        let entry = encrypt_entry(&lhs, &rhs, &out);
        assert_eq!(decrypt_entry(&entry, &lhs, &rhs), Some(out));

        // Wrong input labels fail the zero-tag check.
        let other = WireLabel::random(&mut rng);
        assert_eq!(decrypt_entry(&entry, &other, &rhs), None);
    }

    #[test]
    fn xor_gates_are_table_free() {
        let circuit = Circuit::parse("1 3 1 1 1\n2 0 1 2\n").unwrap();
        let mut rng = test_rng();
        let labels = GarbledLabels::generate(&circuit, &mut rng);
        let tables = garble_circuit(&circuit, &labels, &mut rng).unwrap();

        assert!(tables[0].entries.is_empty());
    }

    #[test]
    fn and_gate_decrypts_to_truth_table() {
        let circuit = Circuit::parse("1 3 1 1 1\n1 0 1 2\n").unwrap();
        let mut rng = test_rng();
        let labels = GarbledLabels::generate(&circuit, &mut rng);
        let tables = garble_circuit(&circuit, &labels, &mut rng).unwrap();

        for (x, y) in [(false, false), (false, true), (true, false), (true, true)] {
            let lhs = labels.select(&[x], 0)[0];
            let rhs = labels.select(&[y], 1)[0];

            let opened: Vec<WireLabel> = tables[0]
                .entries
                .iter()
                .filter_map(|entry| decrypt_entry(entry, &lhs, &rhs))
                .collect();
            assert_eq!(opened.len(), 1, "exactly one entry must open");

            let expected = if x && y {
                labels.ones[2]
            } else {
                labels.zeros[2]
            };
            assert_eq!(opened[0], expected);
        }
    }
}
