//! 2-bit nucleotide encoding of k-mers.
//!
//! A k-mer of `k <= 32` bases is packed into the low `2k` bits of a `u64`,
//! first base in the most significant position, with `A=0, C=1, G=2, T=3`.
//! Lexicographic order of codes is therefore lexicographic order of k-mers.

/// Maximum k-mer size that fits into a `u64`.
pub const MAX_K: u8 = 32;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// 2-bit code of a nucleotide, `None` for anything outside ACGT(U).
#[inline]
pub fn base_code(b: u8) -> Option<u8> {
    match b {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' | b'U' | b'u' => Some(3),
        _ => None,
    }
}

#[inline]
fn mask(k: u8) -> u64 {
    if k >= 32 {
        u64::MAX
    } else {
        (1u64 << (2 * k as u32)) - 1
    }
}

/// ```
/// use lexichain::libs::nt::*;
/// assert_eq!(encode_kmer(b"ACGT"), Some(0b00_01_10_11));
/// assert_eq!(encode_kmer(b"ACNT"), None);
/// ```
pub fn encode_kmer(seq: &[u8]) -> Option<u64> {
    if seq.is_empty() || seq.len() > MAX_K as usize {
        return None;
    }
    let mut code = 0u64;
    for &b in seq {
        code = (code << 2) | base_code(b)? as u64;
    }
    Some(code)
}

/// ```
/// use lexichain::libs::nt::*;
/// let code = encode_kmer(b"ACTGAC").unwrap();
/// assert_eq!(decode_kmer(code, 6), "ACTGAC");
/// ```
pub fn decode_kmer(code: u64, k: u8) -> String {
    (0..k)
        .map(|i| BASES[kmer_base_at(code, k, i) as usize] as char)
        .collect()
}

/// Reverse complement of a k-mer code.
///
/// ```
/// use lexichain::libs::nt::*;
/// let code = encode_kmer(b"AACGT").unwrap();
/// assert_eq!(decode_kmer(kmer_rc(code, 5), 5), "ACGTT");
/// ```
pub fn kmer_rc(code: u64, k: u8) -> u64 {
    let mut src = code;
    let mut rc = 0u64;
    for _ in 0..k {
        rc = (rc << 2) | (3 - (src & 3));
        src >>= 2;
    }
    rc
}

/// Base `i` (0-based, from the left) of a k-mer code.
#[inline]
pub fn kmer_base_at(code: u64, k: u8, i: u8) -> u8 {
    ((code >> (2 * (k - i - 1) as u32)) & 3) as u8
}

/// The first `n` bases of a k-mer, as an n-mer code.
#[inline]
pub fn kmer_prefix(code: u64, k: u8, n: u8) -> u64 {
    if n == 0 {
        return 0;
    }
    code >> (2 * (k - n) as u32)
}

/// The k-mer with its first `n` bases removed, as a (k-n)-mer code.
#[inline]
pub fn kmer_suffix(code: u64, k: u8, n: u8) -> u64 {
    code & mask(k - n)
}

/// Length of the longest common prefix of two k-mer codes of the same size.
///
/// ```
/// use lexichain::libs::nt::*;
/// let a = encode_kmer(b"ACTGAC").unwrap();
/// let b = encode_kmer(b"ACTGTT").unwrap();
/// assert_eq!(longest_prefix(a, b, 6), 4);
/// assert_eq!(longest_prefix(a, a, 6), 6);
/// ```
#[inline]
pub fn longest_prefix(a: u64, b: u64, k: u8) -> u8 {
    let diff = (a ^ b) & mask(k);
    if diff == 0 {
        return k;
    }
    let shifted = diff << (64 - 2 * k as u32);
    ((shifted.leading_zeros() >> 1) as u8).min(k)
}

/// Longest common prefix of two codes of possibly different lengths.
#[inline]
pub fn longest_prefix2(a: u64, ka: u8, b: u64, kb: u8) -> u8 {
    let n = ka.min(kb);
    if n == 0 {
        return 0;
    }
    longest_prefix(kmer_prefix(a, ka, n), kmer_prefix(b, kb, n), n)
}

/// Homopolymers, dinucleotide repeats and heavily biased k-mers.
pub fn is_low_complexity(code: u64, k: u8) -> bool {
    if k < 3 {
        return false;
    }

    let mut counts = [0u8; 4];
    for i in 0..k {
        counts[kmer_base_at(code, k, i) as usize] += 1;
    }
    let max = *counts.iter().max().unwrap_or(&0) as u32;
    if max * 5 >= k as u32 * 4 {
        return true;
    }

    // period 2: the k-mer equals itself shifted by one dinucleotide
    let head = kmer_prefix(code, k, k - 2);
    let tail = kmer_suffix(code, k, 2);
    head == tail
}

/// Rolling k-mer iterator yielding `(position, code)`, skipping any window
/// containing a non-ACGT byte.
pub struct KmerIter<'a> {
    seq: &'a [u8],
    k: u8,
    pos: usize,
    code: u64,
    valid: u8,
}

impl<'a> KmerIter<'a> {
    pub fn new(seq: &'a [u8], k: u8) -> Self {
        assert!(k >= 1 && k <= MAX_K, "k-mer size out of range: {}", k);
        Self {
            seq,
            k,
            pos: 0,
            code: 0,
            valid: 0,
        }
    }
}

impl<'a> Iterator for KmerIter<'a> {
    type Item = (usize, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let m = mask(self.k);
        while self.pos < self.seq.len() {
            let b = self.seq[self.pos];
            self.pos += 1;
            match base_code(b) {
                Some(c) => {
                    self.code = ((self.code << 2) | c as u64) & m;
                    if self.valid < self.k {
                        self.valid += 1;
                    }
                    if self.valid == self.k {
                        return Some((self.pos - self.k as usize, self.code));
                    }
                }
                None => {
                    self.code = 0;
                    self.valid = 0;
                }
            }
        }
        None
    }
}

#[inline]
fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' | b'u' => b'a',
        _ => b'N',
    }
}

/// ```
/// use lexichain::libs::nt::rev_comp;
/// assert_eq!(rev_comp(b"AACGTN"), b"NACGTT".to_vec());
/// ```
pub fn rev_comp(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_suffix() {
        let code = encode_kmer(b"ACTGAC").unwrap();
        assert_eq!(decode_kmer(kmer_prefix(code, 6, 2), 2), "AC");
        assert_eq!(decode_kmer(kmer_suffix(code, 6, 2), 4), "TGAC");
        assert_eq!(kmer_base_at(code, 6, 2), 3);
        assert_eq!(kmer_prefix(code, 6, 6), code);
        assert_eq!(kmer_suffix(code, 6, 0), code);
    }

    #[test]
    fn test_longest_prefix_full_width() {
        let a = encode_kmer(&[b'G'; 32]).unwrap();
        let mut seq = vec![b'G'; 32];
        seq[20] = b'A';
        let b = encode_kmer(&seq).unwrap();
        assert_eq!(longest_prefix(a, b, 32), 20);
        assert_eq!(longest_prefix(a, a, 32), 32);
    }

    #[test]
    fn test_longest_prefix2() {
        let a = encode_kmer(b"ACTG").unwrap();
        let b = encode_kmer(b"ACTGAC").unwrap();
        assert_eq!(longest_prefix2(a, 4, b, 6), 4);
        let c = encode_kmer(b"AG").unwrap();
        assert_eq!(longest_prefix2(c, 2, b, 6), 1);
    }

    #[test]
    fn test_kmer_iter() {
        let kmers: Vec<_> = KmerIter::new(b"ACGNTTGA", 3)
            .map(|(p, c)| (p, decode_kmer(c, 3)))
            .collect();
        assert_eq!(
            kmers,
            vec![
                (0, "ACG".to_string()),
                (4, "TTG".to_string()),
                (5, "TGA".to_string())
            ]
        );
    }

    #[test]
    fn test_low_complexity() {
        let poly = encode_kmer(&[b'A'; 16]).unwrap();
        assert!(is_low_complexity(poly, 16));
        let di = encode_kmer(b"ACACACACACACACAC").unwrap();
        assert!(is_low_complexity(di, 16));
        let biased = encode_kmer(b"AAAAAAAAAAAAAGTC").unwrap();
        assert!(is_low_complexity(biased, 16));
        let normal = encode_kmer(b"ACGTTGCAAGCTTGCA").unwrap();
        assert!(!is_low_complexity(normal, 16));
    }

    #[test]
    fn test_rc_involution() {
        let code = encode_kmer(b"GATTACAGATTACAGATTACAGATTACAGATT").unwrap();
        assert_eq!(kmer_rc(kmer_rc(code, 32), 32), code);
    }
}
