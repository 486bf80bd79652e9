use lazy_static::lazy_static;
use num_bigint::BigUint;
use num_traits::Num;

/// Wire-label width in bytes.
pub const LABEL_LENGTH: usize = 16;

/// Width of the all-zero tag appended to a label before table encryption.
/// `LABEL_LENGTH + LABEL_TAG_LENGTH` equals the SHA-256 output width, so a
/// table entry is masked by exactly one hash block.
pub const LABEL_TAG_LENGTH: usize = 16;

/// Fixed public right-hand label used when garbling and evaluating NOT
/// gates, which have no real second input.
pub const DUMMY_RHS: [u8; LABEL_LENGTH] = [0x5a; LABEL_LENGTH];

/// The discrete-log group all protocol algebra runs in: a safe prime `p`,
/// the prime order `q = (p - 1) / 2` of the quadratic-residue subgroup, and
/// a generator `g` of that subgroup.
///
/// Treated as a read-only record threaded through constructors; nothing in
/// this crate reaches for ambient group state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParams {
    pub p: BigUint,
    pub q: BigUint,
    pub g: BigUint,
}

impl GroupParams {
    /// The standard production group (RFC 3526 group 14, 2048-bit MODP).
    ///
    /// `g = 4` is a square and therefore generates the order-`q` subgroup.
    pub fn standard() -> Self {
        STANDARD_GROUP.clone()
    }
}

lazy_static! {
    static ref STANDARD_GROUP: GroupParams = {
        let p = BigUint::from_str_radix(MODP_2048_PRIME, 16)
            .expect("veilvote: invalid built-in group modulus");
        let q = (&p - 1u32) >> 1;
        GroupParams {
            p,
            q,
            g: BigUint::from(4u32),
        }
    };
}

// RFC 3526, section 3.
const MODP_2048_PRIME: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
                               29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
                               EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
                               E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
                               EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D\
                               C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F\
                               83655D23DCA3AD961C62F356208552BB9ED529077096966D\
                               670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
                               E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9\
                               DE2BCBF6955817183995497CEA956AE515D2261898FA0510\
                               15728E5A8AACAA68FFFFFFFFFFFFFFFF";

#[cfg(test)]
mod tests {
    use super::*;
    use num_integer::Integer;
    use num_traits::One;

    #[test]
    fn standard_group_is_well_formed() {
        let group = GroupParams::standard();
        assert_eq!(&group.p, &(&group.q * 2u32 + 1u32));
        assert!(group.p.is_odd());

        // g generates the order-q subgroup: g^q = 1 and g != 1.
        assert!(!group.g.is_one());
        assert!(group.g.modpow(&group.q, &group.p).is_one());
    }
}
