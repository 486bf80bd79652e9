#[macro_use]
extern crate serde;

mod arbiter;
mod blind;
mod channel;
mod circuit;
mod crypto;
mod election;
mod error;
mod evaluator;
mod garble;
mod garbler;
mod handshake;
mod keys;
mod messages;
mod ot;
mod params;
mod registrar;
mod serde_hex;
mod store;
mod tallyer;
mod voter;

pub use arbiter::*;
pub use blind::*;
pub use channel::*;
pub use circuit::*;
pub use crypto::*;
pub use election::*;
pub use error::*;
pub use evaluator::*;
pub use garble::*;
pub use garbler::*;
pub use handshake::*;
pub use keys::*;
pub use messages::*;
pub use ot::*;
pub use params::*;
pub use registrar::*;
pub use serde_hex::*;
pub use store::*;
pub use tallyer::*;
pub use voter::*;

#[cfg(test)]
mod tests;
