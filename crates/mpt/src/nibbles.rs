//! Nibble paths (§3 "Nibble path").

/// An owned sequence of 0-15 valued nibbles, length 0-64.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Nibbles(Vec<u8>);

impl Nibbles {
    pub const MAX_LEN: usize = 64;

    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_nibbles(nibbles: Vec<u8>) -> Self {
        debug_assert!(nibbles.len() <= Self::MAX_LEN);
        debug_assert!(nibbles.iter().all(|&n| n < 16));
        Self(nibbles)
    }

    /// Decode a full big-endian byte string into its 2-per-byte nibble
    /// expansion (used for `keccak256(key)` paths).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut out = Vec::with_capacity(bytes.len() * 2);
        for b in bytes {
            out.push(b >> 4);
            out.push(b & 0x0f);
        }
        Self(out)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn get(&self, i: usize) -> u8 {
        self.0[i]
    }

    pub fn view(&self) -> NibblesView<'_> {
        NibblesView(&self.0)
    }

    pub fn slice(&self, range: std::ops::Range<usize>) -> NibblesView<'_> {
        NibblesView(&self.0[range])
    }

    pub fn concat(&self, other: &Nibbles) -> Nibbles {
        let mut out = Vec::with_capacity(self.0.len() + other.0.len());
        out.extend_from_slice(&self.0);
        out.extend_from_slice(&other.0);
        Nibbles(out)
    }

    pub fn common_prefix_len(&self, other: &Nibbles) -> usize {
        self.view().common_prefix_len(other.view())
    }

    /// Single-byte-prefix compact encoding (EIP spec "hex prefix"): bit 4
    /// of the first nibble marks odd length, bit 5 marks leaf/terminator.
    pub fn compact_encode(&self, is_leaf: bool) -> Vec<u8> {
        let odd = self.0.len() % 2 == 1;
        let mut out = Vec::with_capacity(self.0.len() / 2 + 1);
        let mut flag = if is_leaf { 0x20 } else { 0x00 };
        if odd {
            flag |= 0x10;
        }
        if odd {
            out.push(flag | self.0[0]);
            let mut iter = self.0[1..].chunks_exact(2);
            for pair in &mut iter {
                out.push((pair[0] << 4) | pair[1]);
            }
        } else {
            out.push(flag);
            for pair in self.0.chunks_exact(2) {
                out.push((pair[0] << 4) | pair[1]);
            }
        }
        out
    }

    pub fn compact_decode(bytes: &[u8]) -> (Nibbles, bool) {
        if bytes.is_empty() {
            return (Nibbles::new(), false);
        }
        let is_leaf = bytes[0] & 0x20 != 0;
        let odd = bytes[0] & 0x10 != 0;
        let mut nibbles = Vec::with_capacity(bytes.len() * 2);
        if odd {
            nibbles.push(bytes[0] & 0x0f);
        }
        for &b in &bytes[1..] {
            nibbles.push(b >> 4);
            nibbles.push(b & 0x0f);
        }
        (Nibbles(nibbles), is_leaf)
    }
}

/// A borrowed view over a nibble sequence, for allocation-free traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NibblesView<'a>(&'a [u8]);

impl<'a> NibblesView<'a> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> u8 {
        self.0[i]
    }

    pub fn sub(&self, start: usize) -> NibblesView<'a> {
        NibblesView(&self.0[start..])
    }

    pub fn to_owned_path(&self) -> Nibbles {
        Nibbles(self.0.to_vec())
    }

    pub fn common_prefix_len(&self, other: NibblesView<'_>) -> usize {
        self.0.iter().zip(other.0.iter()).take_while(|(a, b)| a == b).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_expands_two_nibbles_per_byte() {
        let n = Nibbles::from_bytes(&[0xab, 0xcd]);
        assert_eq!(n.as_slice(), &[0xa, 0xb, 0xc, 0xd]);
    }

    #[test]
    fn common_prefix_len_stops_at_first_divergence() {
        let a = Nibbles::from_nibbles(vec![1, 2, 3, 4]);
        let b = Nibbles::from_nibbles(vec![1, 2, 9, 4]);
        assert_eq!(a.common_prefix_len(&b), 2);
    }

    #[test]
    fn compact_encode_decode_round_trips_even_and_odd() {
        for (nibbles, is_leaf) in [
            (vec![1, 2, 3, 4], true),
            (vec![1, 2, 3], false),
            (vec![], true),
            (vec![5], false),
        ] {
            let n = Nibbles::from_nibbles(nibbles.clone());
            let encoded = n.compact_encode(is_leaf);
            let (decoded, decoded_leaf) = Nibbles::compact_decode(&encoded);
            assert_eq!(decoded.as_slice(), nibbles.as_slice());
            assert_eq!(decoded_leaf, is_leaf);
        }
    }
}
