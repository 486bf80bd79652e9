//! Boolean-circuit model and the text format the two SFE parties agree on:
//! five counts followed by one `type lhs rhs output` line per gate.

use crate::Error;
use num_enum::TryFromPrimitive;
use std::convert::TryFrom;
use std::ops::Range;
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GateKind {
    And = 1,
    Xor = 2,
    Not = 3,
}

/// One gate. Wire indices reference wires defined before this gate;
/// NOT gates ignore `rhs` (written as 0 by convention).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    pub kind: GateKind,
    pub lhs: usize,
    pub rhs: usize,
    pub output: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    pub num_gate: usize,
    pub num_wire: usize,
    pub garbler_input_length: usize,
    pub evaluator_input_length: usize,
    pub output_length: usize,
    pub gates: Vec<Gate>,
}

impl Circuit {
    /// Parse the whitespace-separated circuit text format.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut tokens = text.split_whitespace();
        let mut next_count = |what: &str| -> Result<usize, Error> {
            tokens
                .next()
                .ok_or_else(|| Error::CircuitMalformed(format!("missing {}", what)))?
                .parse::<usize>()
                .map_err(|_| Error::CircuitMalformed(format!("invalid {}", what)))
        };

        let num_gate = next_count("gate count")?;
        let num_wire = next_count("wire count")?;
        let garbler_input_length = next_count("garbler input length")?;
        let evaluator_input_length = next_count("evaluator input length")?;
        let output_length = next_count("output length")?;

        let mut gates = Vec::with_capacity(num_gate);
        for index in 0..num_gate {
            let kind = next_count("gate type")?;
            let kind = GateKind::try_from(u8::try_from(kind).unwrap_or(0))
                .map_err(|_| Error::CircuitMalformed(format!("unknown gate type {}", kind)))?;
            let lhs = next_count("lhs wire")?;
            let rhs = next_count("rhs wire")?;
            let output = next_count("output wire")?;

            if lhs >= num_wire || rhs >= num_wire || output >= num_wire {
                return Err(Error::CircuitMalformed(format!(
                    "gate {} references a wire outside 0..{}",
                    index, num_wire
                )));
            }
            gates.push(Gate {
                kind,
                lhs,
                rhs,
                output,
            });
        }

        if tokens.next().is_some() {
            return Err(Error::CircuitMalformed(
                "trailing tokens after the last gate".to_string(),
            ));
        }

        let circuit = Circuit {
            num_gate,
            num_wire,
            garbler_input_length,
            evaluator_input_length,
            output_length,
            gates,
        };
        circuit.check_counts()?;
        Ok(circuit)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Circuit::parse(&text)
    }

    fn check_counts(&self) -> Result<(), Error> {
        let input_wires = self.garbler_input_length + self.evaluator_input_length;
        if input_wires > self.num_wire || self.output_length > self.num_wire {
            return Err(Error::CircuitMalformed(
                "input or output counts exceed the wire count".to_string(),
            ));
        }
        Ok(())
    }

    /// Wires carrying the garbler's input bits.
    pub fn garbler_input_wires(&self) -> Range<usize> {
        0..self.garbler_input_length
    }

    /// Wires carrying the evaluator's input bits.
    pub fn evaluator_input_wires(&self) -> Range<usize> {
        self.garbler_input_length..self.garbler_input_length + self.evaluator_input_length
    }

    /// Output wires are the last `output_length` wires by convention.
    pub fn output_wires(&self) -> Range<usize> {
        self.num_wire - self.output_length..self.num_wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AND_CIRCUIT: &str = "1 3 1 1 1\n1 0 1 2\n";

    #[test]
    fn parses_single_and_gate() {
        let circuit = Circuit::parse(AND_CIRCUIT).unwrap();
        assert_eq!(circuit.num_gate, 1);
        assert_eq!(circuit.num_wire, 3);
        assert_eq!(circuit.gates[0].kind, GateKind::And);
        assert_eq!(circuit.output_wires(), 2..3);
        assert_eq!(circuit.evaluator_input_wires(), 1..2);
    }

    #[test]
    fn rejects_unknown_gate_type() {
        let result = Circuit::parse("1 3 1 1 1\n9 0 1 2\n");
        assert!(matches!(result, Err(Error::CircuitMalformed(_))));
    }

    #[test]
    fn rejects_out_of_range_wires() {
        let result = Circuit::parse("1 3 1 1 1\n1 0 5 2\n");
        assert!(matches!(result, Err(Error::CircuitMalformed(_))));
    }

    #[test]
    fn rejects_truncated_gate_list() {
        let result = Circuit::parse("2 4 1 1 1\n1 0 1 2\n");
        assert!(matches!(result, Err(Error::CircuitMalformed(_))));
    }
}
