//! The registrar: blind-signs one ballot per voter identity.
//!
//! Registration is idempotent. A voter who reconnects (lost response,
//! crashed client, or simply retrying) gets back the signature from their
//! first registration, byte for byte; nothing a repeat registration sends
//! can change what was stored.

use crate::channel::{Channel, SecureChannel};
use crate::store::{Store, VoterRow};
use crate::{blind, handshake, Error, GroupParams, Message};

use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use tracing::{debug, info};

pub struct Registrar {
    params: GroupParams,
    signing_key: RsaPrivateKey,
}

impl Registrar {
    pub fn new(params: GroupParams, signing_key: RsaPrivateKey) -> Self {
        Registrar {
            params,
            signing_key,
        }
    }

    /// Handle one registration session on an accepted connection.
    ///
    /// Performs the server-signed handshake, reads the blinded ballot,
    /// signs it (or retrieves the stored signature), persists the voter
    /// row, and replies. MAC failures abort the session.
    pub fn handle_registration<C: Channel, S: Store>(
        &self,
        mut channel: C,
        store: &mut S,
    ) -> Result<VoterRow, Error> {
        let (aes_key, hmac_key) =
            handshake::server_handshake(&mut channel, &self.params, &self.signing_key, &mut OsRng)?;
        let mut channel = SecureChannel::new(channel, aes_key, hmac_key);

        let (voter_id, blinded_ballot) = channel.read_message()?.into_register()?;

        let row = match store.find_voter(&voter_id) {
            Some(existing) => {
                debug!(voter_id = %voter_id, "repeat registration, returning stored signature");
                existing
            }
            None => {
                let signature = blind::blind_sign(&self.signing_key, &blinded_ballot);
                info!(voter_id = %voter_id, "issued blind signature");
                VoterRow {
                    voter_id: voter_id.clone(),
                    registrar_signature: signature,
                }
            }
        };

        channel.send_message(&Message::BlindSignature {
            voter_id,
            signature: row.registrar_signature.clone(),
        })?;
        store.insert_voter(row.clone());
        channel.close();
        Ok(row)
    }
}
