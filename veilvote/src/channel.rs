//! Transport seams. The protocols in this crate never touch sockets
//! directly: they talk to a [`Channel`], an opaque frame pipe provided by
//! the embedding process, and upgrade it to a [`SecureChannel`] once a
//! handshake has produced keys.

use crate::crypto::{self, AesKey, HmacKey};
use crate::{Error, Message};

use rand::rngs::OsRng;
use std::sync::mpsc::{self, Receiver, Sender};

/// A reliable, ordered, frame-oriented byte pipe.
pub trait Channel {
    fn send(&mut self, frame: &[u8]) -> Result<(), Error>;
    fn read(&mut self) -> Result<Vec<u8>, Error>;
    fn close(&mut self);
}

/// An in-memory loopback channel. `MemChannel::pair()` returns two
/// connected endpoints, letting every protocol in this crate run
/// end-to-end inside a test process.
pub struct MemChannel {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl MemChannel {
    pub fn pair() -> (MemChannel, MemChannel) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        (
            MemChannel { tx: tx_a, rx: rx_a },
            MemChannel { tx: tx_b, rx: rx_b },
        )
    }
}

impl Channel for MemChannel {
    fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        self.tx
            .send(frame.to_vec())
            .map_err(|_| Error::ChannelClosed)
    }

    fn read(&mut self) -> Result<Vec<u8>, Error> {
        self.rx.recv().map_err(|_| Error::ChannelClosed)
    }

    fn close(&mut self) {
        // Dropping the sender is what unblocks the peer; nothing to do
        // until then.
    }
}

/// An authenticated message channel layered over a raw [`Channel`]:
/// every message is CBOR-packed and framed as `iv ‖ ciphertext ‖ tag`
/// (encrypt-then-MAC).
pub struct SecureChannel<C: Channel> {
    inner: C,
    aes_key: AesKey,
    hmac_key: HmacKey,
}

impl<C: Channel> SecureChannel<C> {
    pub fn new(inner: C, aes_key: AesKey, hmac_key: HmacKey) -> Self {
        SecureChannel {
            inner,
            aes_key,
            hmac_key,
        }
    }

    pub fn send_message(&mut self, message: &Message) -> Result<(), Error> {
        let plaintext = message.pack()?;
        let frame = crypto::encrypt_and_tag(&self.aes_key, &self.hmac_key, &plaintext, &mut OsRng);
        self.inner.send(&frame)
    }

    /// Read and authenticate the next message. On a MAC failure the
    /// underlying channel is closed before the error is surfaced; the
    /// session cannot continue.
    pub fn read_message(&mut self) -> Result<Message, Error> {
        let frame = self.inner.read()?;
        let plaintext = match crypto::decrypt_and_verify(&self.aes_key, &self.hmac_key, &frame) {
            Ok(plaintext) => plaintext,
            Err(err) => {
                self.inner.close();
                return Err(err);
            }
        };
        Message::unpack(&plaintext)
    }

    pub fn close(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_channel_delivers_frames_in_order() {
        let (mut left, mut right) = MemChannel::pair();

        left.send(b"one").unwrap();
        left.send(b"two").unwrap();
        assert_eq!(right.read().unwrap(), b"one");
        assert_eq!(right.read().unwrap(), b"two");

        right.send(b"reply").unwrap();
        assert_eq!(left.read().unwrap(), b"reply");
    }

    #[test]
    fn read_after_peer_drop_reports_closed() {
        let (left, mut right) = MemChannel::pair();
        drop(left);
        assert!(matches!(right.read(), Err(Error::ChannelClosed)));
    }
}
