// Hex-armored serde adapters for the big integers that appear in wire
// messages and persisted rows.
use crate::Error;
use num_bigint::BigUint;
use std::borrow::Cow;

pub use hex_buffer_serde::Hex;

// a single-purpose type for use in `#[serde(with)]`
pub enum BigUintHex {}

impl Hex<BigUint> for BigUintHex {
    type Error = Error;

    fn create_bytes(value: &BigUint) -> Cow<[u8]> {
        value.to_bytes_be().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<BigUint, Error> {
        Ok(BigUint::from_bytes_be(bytes))
    }
}
