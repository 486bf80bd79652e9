//! File-backed key material: RSA keys as PKCS#8 PEM, group elements as
//! hex, and the election public key assembled from the arbiters' published
//! shares.

use crate::election;
use crate::{Error, GroupParams};

use num_bigint::BigUint;
use num_traits::Num;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::path::Path;

pub fn save_rsa_private_key<P: AsRef<Path>>(path: P, key: &RsaPrivateKey) -> Result<(), Error> {
    key.write_pkcs8_pem_file(path, LineEnding::LF)
        .map_err(|err| Error::Key(err.to_string()))
}

pub fn load_rsa_private_key<P: AsRef<Path>>(path: P) -> Result<RsaPrivateKey, Error> {
    RsaPrivateKey::read_pkcs8_pem_file(path).map_err(|err| Error::Key(err.to_string()))
}

pub fn save_rsa_public_key<P: AsRef<Path>>(path: P, key: &RsaPublicKey) -> Result<(), Error> {
    key.write_public_key_pem_file(path, LineEnding::LF)
        .map_err(|err| Error::Key(err.to_string()))
}

pub fn load_rsa_public_key<P: AsRef<Path>>(path: P) -> Result<RsaPublicKey, Error> {
    RsaPublicKey::read_public_key_pem_file(path).map_err(|err| Error::Key(err.to_string()))
}

/// Save a group element or secret share as lowercase hex.
pub fn save_integer<P: AsRef<Path>>(path: P, value: &BigUint) -> Result<(), Error> {
    Ok(std::fs::write(path, value.to_str_radix(16))?)
}

pub fn load_integer<P: AsRef<Path>>(path: P) -> Result<BigUint, Error> {
    let text = std::fs::read_to_string(&path)?;
    BigUint::from_str_radix(text.trim(), 16)
        .map_err(|_| Error::Key(format!("{}: not a hex integer", path.as_ref().display())))
}

/// Load every arbiter's public share and multiply them into the election
/// public key.
pub fn load_election_public_key<P: AsRef<Path>>(
    params: &GroupParams,
    share_paths: &[P],
) -> Result<BigUint, Error> {
    let mut shares = Vec::with_capacity(share_paths.len());
    for path in share_paths {
        shares.push(load_integer(path)?);
    }
    Ok(election::election_public_key(params, shares.iter()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn integer_round_trip() {
        let dir = std::env::temp_dir().join("veilvote-keys-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("share.hex");

        let params = GroupParams::standard();
        let (_, pk) = election::generate_key_share(&params, &mut OsRng);

        save_integer(&path, &pk).unwrap();
        assert_eq!(load_integer(&path).unwrap(), pk);
    }

    #[test]
    fn election_key_is_product_of_shares() {
        let dir = std::env::temp_dir().join("veilvote-election-key-test");
        std::fs::create_dir_all(&dir).unwrap();

        let params = GroupParams::standard();
        let (_, pk1) = election::generate_key_share(&params, &mut OsRng);
        let (_, pk2) = election::generate_key_share(&params, &mut OsRng);

        let path1 = dir.join("arbiter1.hex");
        let path2 = dir.join("arbiter2.hex");
        save_integer(&path1, &pk1).unwrap();
        save_integer(&path2, &pk2).unwrap();

        let pk = load_election_public_key(&params, &[&path1, &path2]).unwrap();
        assert_eq!(pk, (&pk1 * &pk2) % &params.p);
    }
}
