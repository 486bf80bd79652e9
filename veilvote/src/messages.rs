//! Wire messages. Handshake messages travel as plain frames; everything
//! after key agreement goes through the authenticated channel. Payload
//! integers are hex-armored, so a captured transcript is greppable.

use crate::election::{VoteCiphertext, VoteZkp};
use crate::garble::{GarbledGate, WireLabel};
use crate::serde_hex::{BigUintHex, Hex};
use crate::Error;

use num_bigint::BigUint;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum Message {
    /// A bare DH public value (client hello, and both SFE parties).
    DhPublicValue {
        #[serde(with = "BigUintHex")]
        public_value: BigUint,
    },

    /// The server's half of the signed handshake: both public values plus
    /// an RSA signature over them.
    SignedDhPublicValues {
        #[serde(with = "BigUintHex")]
        server_public_value: BigUint,
        #[serde(with = "BigUintHex")]
        user_public_value: BigUint,
        #[serde(with = "hex::serde")]
        signature: Vec<u8>,
    },

    /// OT: a party's ephemeral public value.
    OtPublicValue {
        #[serde(with = "BigUintHex")]
        public_value: BigUint,
    },

    /// OT: both messages, each encrypted under its branch key.
    OtEncryptedPair {
        #[serde(with = "hex::serde")]
        e0: Vec<u8>,
        #[serde(with = "hex::serde")]
        iv0: [u8; 16],
        #[serde(with = "hex::serde")]
        e1: Vec<u8>,
        #[serde(with = "hex::serde")]
        iv1: [u8; 16],
    },

    /// Garbler → evaluator: every gate's (shuffled) table.
    GarbledTables { tables: Vec<GarbledGate> },

    /// Garbler → evaluator: labels for the garbler's own input wires.
    GarblerInputs { labels: Vec<WireLabel> },

    /// Evaluator → garbler: the labels on the output wires.
    FinalLabels { labels: Vec<WireLabel> },

    /// Garbler → evaluator: the decoded output bit string.
    FinalOutput { output: String },

    /// Voter → registrar: a blinded ballot to sign.
    Register {
        voter_id: String,
        #[serde(with = "BigUintHex")]
        blinded_ballot: BigUint,
    },

    /// Registrar → voter: the (possibly previously issued) blind signature.
    BlindSignature {
        voter_id: String,
        #[serde(with = "BigUintHex")]
        signature: BigUint,
    },

    /// Voter → tallyer: the ballot, its proof, and the unblinded
    /// registrar signature.
    CastBallot {
        vote: VoteCiphertext,
        zkp: VoteZkp,
        #[serde(with = "BigUintHex")]
        unblinded_signature: BigUint,
    },
}

impl Message {
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn unpack(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_cbor::from_slice(bytes)?)
    }

    pub fn into_dh_public_value(self) -> Result<BigUint, Error> {
        match self {
            Message::DhPublicValue { public_value } => Ok(public_value),
            _ => Err(Error::UnexpectedMessage {
                expected: "dh_public_value",
            }),
        }
    }

    pub fn into_signed_dh(self) -> Result<(BigUint, BigUint, Vec<u8>), Error> {
        match self {
            Message::SignedDhPublicValues {
                server_public_value,
                user_public_value,
                signature,
            } => Ok((server_public_value, user_public_value, signature)),
            _ => Err(Error::UnexpectedMessage {
                expected: "signed_dh_public_values",
            }),
        }
    }

    pub fn into_ot_public_value(self) -> Result<BigUint, Error> {
        match self {
            Message::OtPublicValue { public_value } => Ok(public_value),
            _ => Err(Error::UnexpectedMessage {
                expected: "ot_public_value",
            }),
        }
    }

    pub fn into_ot_encrypted_pair(self) -> Result<(Vec<u8>, [u8; 16], Vec<u8>, [u8; 16]), Error> {
        match self {
            Message::OtEncryptedPair { e0, iv0, e1, iv1 } => Ok((e0, iv0, e1, iv1)),
            _ => Err(Error::UnexpectedMessage {
                expected: "ot_encrypted_pair",
            }),
        }
    }

    pub fn into_garbled_tables(self) -> Result<Vec<GarbledGate>, Error> {
        match self {
            Message::GarbledTables { tables } => Ok(tables),
            _ => Err(Error::UnexpectedMessage {
                expected: "garbled_tables",
            }),
        }
    }

    pub fn into_garbler_inputs(self) -> Result<Vec<WireLabel>, Error> {
        match self {
            Message::GarblerInputs { labels } => Ok(labels),
            _ => Err(Error::UnexpectedMessage {
                expected: "garbler_inputs",
            }),
        }
    }

    pub fn into_final_labels(self) -> Result<Vec<WireLabel>, Error> {
        match self {
            Message::FinalLabels { labels } => Ok(labels),
            _ => Err(Error::UnexpectedMessage {
                expected: "final_labels",
            }),
        }
    }

    pub fn into_final_output(self) -> Result<String, Error> {
        match self {
            Message::FinalOutput { output } => Ok(output),
            _ => Err(Error::UnexpectedMessage {
                expected: "final_output",
            }),
        }
    }

    pub fn into_register(self) -> Result<(String, BigUint), Error> {
        match self {
            Message::Register {
                voter_id,
                blinded_ballot,
            } => Ok((voter_id, blinded_ballot)),
            _ => Err(Error::UnexpectedMessage {
                expected: "register",
            }),
        }
    }

    pub fn into_blind_signature(self) -> Result<(String, BigUint), Error> {
        match self {
            Message::BlindSignature { voter_id, signature } => Ok((voter_id, signature)),
            _ => Err(Error::UnexpectedMessage {
                expected: "blind_signature",
            }),
        }
    }

    pub fn into_cast_ballot(self) -> Result<(VoteCiphertext, VoteZkp, BigUint), Error> {
        match self {
            Message::CastBallot {
                vote,
                zkp,
                unblinded_signature,
            } => Ok((vote, zkp, unblinded_signature)),
            _ => Err(Error::UnexpectedMessage {
                expected: "cast_ballot",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        let message = Message::Register {
            voter_id: "alice".to_string(),
            blinded_ballot: BigUint::from(0xdeadbeefu32),
        };

        let packed = message.pack().unwrap();
        let (voter_id, ballot) = Message::unpack(&packed)
            .unwrap()
            .into_register()
            .unwrap();
        assert_eq!(voter_id, "alice");
        assert_eq!(ballot, BigUint::from(0xdeadbeefu32));
    }

    #[test]
    fn typed_accessor_rejects_wrong_variant() {
        let message = Message::FinalOutput {
            output: "101".to_string(),
        };
        assert!(matches!(
            message.into_register(),
            Err(Error::UnexpectedMessage { .. })
        ));
    }
}
