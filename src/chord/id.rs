use std::fmt;

use num_bigint::BigUint;
use sha1::{Digest, Sha1};

use crate::chord::KEY_SIZE;

/// Position on the identifier circle: a 160-bit unsigned integer kept as
/// big-endian bytes, so the derived ordering is the numeric one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id([u8; 20]);

impl Id {
    /// SHA-1 of a string, the placement rule for both endpoints and keys.
    pub fn of(elt: &str) -> Self {
        let digest = Sha1::digest(elt.as_bytes());
        let mut id = [0u8; 20];
        id.copy_from_slice(&digest);
        Id(id)
    }

    /// Big-endian bytes with leading zeros stripped, the form identifiers
    /// take on the wire.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let start = self.0.iter().position(|&b| b != 0).unwrap_or(20);
        self.0[start..].to_vec()
    }

    /// Reads up to 20 big-endian bytes, left-padding short input.
    pub fn from_be_slice(bytes: &[u8]) -> Self {
        let mut id = [0u8; 20];
        let len = bytes.len().min(20);
        id[20 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
        Id(id)
    }

    /// Parses a 40-digit hex identifier, as given to `-i`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != 20 {
            return None;
        }
        Some(Self::from_be_slice(&bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn from_biguint(value: BigUint) -> Self {
        let bytes = value.to_bytes_be();
        Self::from_be_slice(&bytes)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({}..)", &self.to_hex()[..8])
    }
}

/// True when `elt` lies strictly after `start` going clockwise and is
/// encountered before `end` (or equals `end`, if `inclusive`). When
/// `start == end` the interval covers the whole circle except `start`
/// itself, which is what makes lookups terminate on a single-node ring.
pub fn between(start: Id, elt: Id, end: Id, inclusive: bool) -> bool {
    if end > start {
        (start < elt && elt < end) || (inclusive && elt == end)
    } else {
        start < elt || elt < end || (inclusive && elt == end)
    }
}

/// Target point for finger `k` of `address`: hash(address) + 2^(k-1),
/// wrapping mod 2^160.
pub fn jump(address: &str, finger: usize) -> Id {
    let n = BigUint::from_bytes_be(&Id::of(address).0);
    let distance = BigUint::from(1u8) << (finger - 1);
    let modulus = BigUint::from(1u8) << KEY_SIZE;
    Id::from_biguint((n + distance) % modulus)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> Id {
        Id::from_be_slice(&n.to_be_bytes())
    }

    #[test]
    fn hashes_match_known_sha1_vectors() {
        assert_eq!(
            Id::of("abc").to_hex(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            Id::of("").to_hex(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn ordering_is_numeric_big_endian() {
        assert!(id(2) > id(1));
        assert!(id(0x1_0000) > id(0xffff));
        assert_eq!(id(7), id(7));
    }

    #[test]
    fn between_on_a_simple_interval() {
        assert!(between(id(1), id(5), id(10), false));
        assert!(!between(id(1), id(1), id(10), false));
        assert!(!between(id(1), id(10), id(10), false));
        assert!(between(id(1), id(10), id(10), true));
        assert!(!between(id(1), id(11), id(10), true));
    }

    #[test]
    fn between_wraps_past_zero() {
        assert!(between(id(10), id(12), id(3), false));
        assert!(between(id(10), id(1), id(3), false));
        assert!(!between(id(10), id(5), id(3), false));
        assert!(between(id(10), id(3), id(3), true));
    }

    #[test]
    fn degenerate_interval_admits_everything_but_its_endpoint() {
        assert!(between(id(7), id(3), id(7), false));
        assert!(between(id(7), id(100), id(7), false));
        assert!(!between(id(7), id(7), id(7), false));
        assert!(between(id(7), id(7), id(7), true));
    }

    #[test]
    fn jump_adds_powers_of_two_mod_ring_size() {
        let address = "127.0.0.1:3410";
        let n = BigUint::from_bytes_be(&hex::decode(Id::of(address).to_hex()).unwrap());
        let modulus = BigUint::from(1u8) << KEY_SIZE;

        let plus_one = (n.clone() + BigUint::from(1u8)) % modulus.clone();
        assert_eq!(jump(address, 1), Id::from_biguint(plus_one));

        let plus_top = (n + (BigUint::from(1u8) << (KEY_SIZE - 1))) % modulus;
        assert_eq!(jump(address, KEY_SIZE), Id::from_biguint(plus_top));
    }

    #[test]
    fn wire_bytes_round_trip() {
        let x = Id::of("round-trip");
        assert_eq!(Id::from_be_slice(&x.to_be_bytes()), x);
        assert!(x.to_be_bytes().len() <= 20);

        assert!(id(0).to_be_bytes().is_empty());
        assert_eq!(Id::from_be_slice(&[]), id(0));
        assert_eq!(Id::from_be_slice(&[0, 0, 5]), id(5));
    }

    #[test]
    fn hex_identifier_parsing() {
        let hex = "a9993e364706816aba3e25717850c26c9cd0d89d";
        assert_eq!(Id::from_hex(hex).map(|i| i.to_hex()).as_deref(), Some(hex));
        assert!(Id::from_hex("a9993e").is_none());
        assert!(Id::from_hex("zz993e364706816aba3e25717850c26c9cd0d89d").is_none());
        assert!(Id::from_hex("").is_none());
    }
}
