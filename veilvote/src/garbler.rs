//! The garbling party's session driver: garble, ship tables and labels,
//! feed the evaluator its input labels through OT, and decode the output.

use crate::channel::{Channel, SecureChannel};
use crate::circuit::Circuit;
use crate::garble::{garble_circuit, GarbledLabels};
use crate::{handshake, ot, Error, GroupParams, Message};

use rand::rngs::OsRng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info};

pub struct Garbler<C: Channel> {
    circuit: Circuit,
    channel: C,
    params: GroupParams,
}

impl<C: Channel> Garbler<C> {
    pub fn new(circuit: Circuit, channel: C, params: GroupParams) -> Self {
        Garbler {
            circuit,
            channel,
            params,
        }
    }

    /// Run one secure-function-evaluation session as the garbler.
    ///
    /// `input` is the garbler's own input bits. Returns the decoded output
    /// bit string, which is also sent back to the evaluator.
    pub fn run(mut self, input: &[bool]) -> Result<String, Error> {
        if input.len() != self.circuit.garbler_input_length {
            return Err(Error::CircuitMalformed(format!(
                "garbler input is {} bits, circuit wants {}",
                input.len(),
                self.circuit.garbler_input_length
            )));
        }

        let (aes_key, hmac_key) =
            handshake::plain_handshake_initiate(&mut self.channel, &self.params, &mut OsRng)?;
        let mut channel = SecureChannel::new(self.channel, aes_key, hmac_key);

        // One crypto-seeded RNG per session covers the labels, Δ, and the
        // table shuffles.
        let mut session_rng = ChaCha20Rng::from_entropy();
        let labels = GarbledLabels::generate(&self.circuit, &mut session_rng);
        let tables = garble_circuit(&self.circuit, &labels, &mut session_rng)?;
        info!(gates = self.circuit.num_gate, "garbler: circuit garbled");

        channel.send_message(&Message::GarbledTables { tables })?;
        channel.send_message(&Message::GarblerInputs {
            labels: labels.select(input, 0),
        })?;

        // The evaluator picks up one label per input wire, obliviously.
        for wire in self.circuit.evaluator_input_wires() {
            ot::ot_send(
                &mut channel,
                &self.params,
                &labels.zeros[wire].bytes,
                &labels.ones[wire].bytes,
                &mut OsRng,
            )?;
        }
        debug!("garbler: evaluator input labels transferred");

        let final_labels = channel.read_message()?.into_final_labels()?;
        if final_labels.len() != self.circuit.output_length {
            return Err(Error::CircuitMalformed(format!(
                "received {} output labels, circuit has {}",
                final_labels.len(),
                self.circuit.output_length
            )));
        }

        // One bit per output wire, matched against that wire's own pair.
        let mut output = String::with_capacity(self.circuit.output_length);
        for (label, wire) in final_labels.iter().zip(self.circuit.output_wires()) {
            if *label == labels.zeros[wire] {
                output.push('0');
            } else if *label == labels.ones[wire] {
                output.push('1');
            } else {
                return Err(Error::CircuitMalformed(format!(
                    "output label for wire {} matches neither of its labels",
                    wire
                )));
            }
        }

        channel.send_message(&Message::FinalOutput {
            output: output.clone(),
        })?;
        info!(output = %output, "garbler: session complete");
        Ok(output)
    }
}
