//! The evaluating party's session driver: receive the garbled circuit,
//! pick up input labels over OT, walk the gates, and trade the output
//! labels for the decoded result.

use crate::channel::{Channel, SecureChannel};
use crate::circuit::{Circuit, GateKind};
use crate::garble::{decrypt_entry, GarbledGate, WireLabel};
use crate::{handshake, ot, Error, GroupParams};

use rand::rngs::OsRng;
use tracing::{debug, info};

pub struct Evaluator<C: Channel> {
    circuit: Circuit,
    channel: C,
    params: GroupParams,
}

impl<C: Channel> Evaluator<C> {
    pub fn new(circuit: Circuit, channel: C, params: GroupParams) -> Self {
        Evaluator {
            circuit,
            channel,
            params,
        }
    }

    /// Run one secure-function-evaluation session as the evaluator.
    pub fn run(mut self, input: &[bool]) -> Result<String, Error> {
        if input.len() != self.circuit.evaluator_input_length {
            return Err(Error::CircuitMalformed(format!(
                "evaluator input is {} bits, circuit wants {}",
                input.len(),
                self.circuit.evaluator_input_length
            )));
        }

        let (aes_key, hmac_key) =
            handshake::plain_handshake_respond(&mut self.channel, &self.params, &mut OsRng)?;
        let mut channel = SecureChannel::new(self.channel, aes_key, hmac_key);

        let tables = channel.read_message()?.into_garbled_tables()?;
        if tables.len() != self.circuit.num_gate {
            return Err(Error::CircuitMalformed(format!(
                "received {} garbled tables, circuit has {} gates",
                tables.len(),
                self.circuit.num_gate
            )));
        }

        let garbler_labels = channel.read_message()?.into_garbler_inputs()?;
        if garbler_labels.len() != self.circuit.garbler_input_length {
            return Err(Error::CircuitMalformed(
                "wrong number of garbler input labels".to_string(),
            ));
        }

        let mut wires: Vec<Option<WireLabel>> = vec![None; self.circuit.num_wire];
        for (wire, label) in self.circuit.garbler_input_wires().zip(garbler_labels) {
            wires[wire] = Some(label);
        }

        // Our own labels arrive by OT, one transfer per input bit.
        for (offset, bit) in input.iter().enumerate() {
            let bytes = ot::ot_recv(&mut channel, &self.params, *bit, &mut OsRng)?;
            let bytes: [u8; crate::params::LABEL_LENGTH] = bytes
                .try_into()
                .map_err(|_| Error::CircuitMalformed("OT label has wrong length".to_string()))?;
            wires[self.circuit.garbler_input_length + offset] = Some(WireLabel { bytes });
        }
        debug!("evaluator: input labels installed");

        for (gate, table) in self.circuit.gates.iter().zip(tables.iter()) {
            let lhs = wires[gate.lhs].ok_or_else(|| {
                Error::CircuitMalformed(format!("gate reads unset wire {}", gate.lhs))
            })?;

            let output = match gate.kind {
                GateKind::And => {
                    let rhs = wires[gate.rhs].ok_or_else(|| {
                        Error::CircuitMalformed(format!("gate reads unset wire {}", gate.rhs))
                    })?;
                    trial_decrypt(table, &lhs, &rhs)?
                }
                // Free-XOR: no table, the labels XOR directly.
                GateKind::Xor => {
                    let rhs = wires[gate.rhs].ok_or_else(|| {
                        Error::CircuitMalformed(format!("gate reads unset wire {}", gate.rhs))
                    })?;
                    lhs.xor(&rhs)
                }
                GateKind::Not => trial_decrypt(table, &lhs, &WireLabel::dummy_rhs())?,
            };
            wires[gate.output] = Some(output);
        }

        let mut final_labels = Vec::with_capacity(self.circuit.output_length);
        for wire in self.circuit.output_wires() {
            final_labels.push(wires[wire].ok_or_else(|| {
                Error::CircuitMalformed(format!("output wire {} was never assigned", wire))
            })?);
        }
        channel.send_message(&crate::Message::FinalLabels {
            labels: final_labels,
        })?;

        let output = channel.read_message()?.into_final_output()?;
        info!(output = %output, "evaluator: session complete");
        Ok(output)
    }
}

/// Try every entry of a garbled table; exactly one should carry a valid
/// zero tag for the labels in hand. None valid means the garbling was
/// corrupted, and the session cannot continue.
fn trial_decrypt(
    table: &GarbledGate,
    lhs: &WireLabel,
    rhs: &WireLabel,
) -> Result<WireLabel, Error> {
    table
        .entries
        .iter()
        .find_map(|entry| decrypt_entry(entry, lhs, rhs))
        .ok_or_else(|| {
            Error::CircuitMalformed("no garbled-table entry carries a valid tag".to_string())
        })
}
