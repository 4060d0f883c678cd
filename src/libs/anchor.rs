//! Anchors (substring pairs) between a query and a target, and the cleanup
//! passes run on them before chaining.

use anyhow::anyhow;
use std::cmp::Ordering;
use std::fmt;

/// A shared substring of `len` bases at `q_begin` in the query and
/// `t_begin` in the target. Ranges are 0-based and half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Anchor {
    pub q_begin: u32,
    pub t_begin: u32,
    pub len: u8,
    /// Mismatches tolerated by the seed lookup that produced this anchor.
    pub mismatch: u8,
    pub q_rc: bool,
    pub t_rc: bool,
}

impl Anchor {
    pub fn new(q_begin: u32, t_begin: u32, len: u8) -> Self {
        Self {
            q_begin,
            t_begin,
            len,
            ..Default::default()
        }
    }

    #[inline]
    pub fn q_end(&self) -> u32 {
        self.q_begin + self.len as u32
    }

    #[inline]
    pub fn t_end(&self) -> u32 {
        self.t_begin + self.len as u32
    }

    /// Both anchors describe the same relative orientation.
    #[inline]
    pub fn same_strand(&self, other: &Anchor) -> bool {
        (self.q_rc ^ self.t_rc) == (other.q_rc ^ other.t_rc)
    }

    /// `other`'s query x target rectangle lies inside this one.
    #[inline]
    pub fn contains(&self, other: &Anchor) -> bool {
        self.same_strand(other)
            && other.q_begin >= self.q_begin
            && other.q_end() <= self.q_end()
            && other.t_begin >= self.t_begin
            && other.t_end() <= self.t_end()
    }
}

/// Euclidean distance between the begin points of two anchors.
#[inline]
pub fn distance(a: &Anchor, b: &Anchor) -> f64 {
    let q = a.q_begin as f64 - b.q_begin as f64;
    let t = a.t_begin as f64 - b.t_begin as f64;
    (q * q + t * t).sqrt()
}

/// Off-diagonal drift between two anchors: `| |dq| - |dt| |`.
#[inline]
pub fn gap(a: &Anchor, b: &Anchor) -> f64 {
    let q = a.q_begin.abs_diff(b.q_begin);
    let t = a.t_begin.abs_diff(b.t_begin);
    q.abs_diff(t) as f64
}

fn strand_char(rc: bool) -> char {
    if rc {
        '-'
    } else {
        '+'
    }
}

fn parse_strand(s: &str) -> anyhow::Result<bool> {
    match s {
        "+" | "0" => Ok(false),
        "-" | "1" => Ok(true),
        _ => Err(anyhow!("Invalid strand: {}", s)),
    }
}

impl std::str::FromStr for Anchor {
    type Err = anyhow::Error;

    /// `q_begin  t_begin  len  [mismatch  [q_strand  t_strand]]`, tab-separated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim_end().split('\t').collect();
        if fields.len() < 3 {
            return Err(anyhow!("Invalid anchor line: fewer than 3 columns"));
        }

        let parse_u32 = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| anyhow!("Invalid position: {}", s))
        };
        let len = fields[2]
            .parse::<u8>()
            .map_err(|_| anyhow!("Invalid anchor length: {}", fields[2]))?;
        if len == 0 {
            return Err(anyhow!("Anchor length must be positive"));
        }

        let mut anchor = Anchor::new(parse_u32(fields[0])?, parse_u32(fields[1])?, len);
        if let Some(m) = fields.get(3) {
            anchor.mismatch = m
                .parse::<u8>()
                .map_err(|_| anyhow!("Invalid mismatch count: {}", m))?;
        }
        if fields.len() >= 6 {
            anchor.q_rc = parse_strand(fields[4])?;
            anchor.t_rc = parse_strand(fields[5])?;
        }

        Ok(anchor)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.q_begin,
            self.t_begin,
            self.len,
            self.mismatch,
            strand_char(self.q_rc),
            strand_char(self.t_rc)
        )
    }
}

/// Ascending query begin, descending query end on ties.
fn cmp_query(a: &Anchor, b: &Anchor) -> Ordering {
    a.q_begin
        .cmp(&b.q_begin)
        .then_with(|| b.q_end().cmp(&a.q_end()))
}

/// Sorts anchors and removes duplicates and anchors nested inside another
/// anchor in both query and target.
///
/// Only kept anchors whose query begin is within the sweep window are
/// inspected. The window is `k`, widened to the longest anchor in the list
/// when one is longer, since a container begins at most that far back.
pub fn clear_substr_pairs(anchors: &mut Vec<Anchor>, k: usize) {
    if anchors.len() < 2 {
        return;
    }
    anchors.sort_by(cmp_query);

    let longest = anchors.iter().map(|a| a.len as u32).max().unwrap_or(0);
    let window = longest.max(k as u32);

    let mut kept = 0;
    for i in 0..anchors.len() {
        let a = anchors[i];
        let lower = a.q_begin.saturating_sub(window);
        let nested = anchors[..kept]
            .iter()
            .rev()
            .take_while(|p| p.q_begin >= lower)
            .any(|p| p.contains(&a));
        if !nested {
            anchors[kept] = a;
            kept += 1;
        }
    }
    anchors.truncate(kept);
}

/// Removes head and tail runs of anchors produced by tandem repeats or
/// low-complexity sequence. Expects anchors sorted by query begin.
///
/// A step between neighbours belongs to a repeat run when both begin at the
/// same query or target position, or when they overlap almost completely in
/// the query while drifting off-diagonal by more than `k`; and the two are
/// closer than `min_distance`.
pub fn trim_substr_pairs(anchors: &mut Vec<Anchor>, k: usize, min_distance: f64) {
    let n = anchors.len();
    if n < 2 {
        return;
    }

    let in_repeat = |p: &Anchor, v: &Anchor| -> bool {
        if distance(p, v) >= min_distance {
            return false;
        }
        if v.q_begin == p.q_begin || v.t_begin == p.t_begin {
            return true;
        }
        let overlap = p.q_end().saturating_sub(v.q_begin);
        let shorter = p.len.min(v.len) as u32;
        gap(p, v) > k as f64 && overlap * 10 >= shorter * 9
    };

    let mut start = 0;
    while start + 1 < n && in_repeat(&anchors[start], &anchors[start + 1]) {
        start += 1;
    }
    if start == n - 1 {
        anchors.clear();
        return;
    }

    let mut end = n - 1;
    while end > start && in_repeat(&anchors[end - 1], &anchors[end]) {
        end -= 1;
    }
    if end == start {
        anchors.clear();
        return;
    }

    if start > 0 || end < n - 1 {
        anchors.truncate(end + 1);
        anchors.drain(..start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_anchors(rng: &mut SmallRng, n: usize) -> Vec<Anchor> {
        (0..n)
            .map(|_| {
                let q = rng.gen_range(0..200);
                let diag = rng.gen_range(0..3) * 7;
                Anchor::new(q, q + diag + rng.gen_range(0..3), rng.gen_range(5..=31))
            })
            .collect()
    }

    #[test]
    fn test_parse_anchor() {
        let a: Anchor = "12\t340\t26".parse().unwrap();
        assert_eq!(a, Anchor::new(12, 340, 26));
        assert_eq!(a.q_end(), 38);
        assert_eq!(a.t_end(), 366);

        let b: Anchor = "1\t2\t3\t1\t+\t-".parse().unwrap();
        assert_eq!(b.mismatch, 1);
        assert!(!b.q_rc && b.t_rc);
        assert_eq!(b.to_string(), "1\t2\t3\t1\t+\t-");
        assert_eq!(b.to_string().parse::<Anchor>().unwrap(), b);

        assert!("1\t2".parse::<Anchor>().is_err());
        assert!("1\t2\t0".parse::<Anchor>().is_err());
        assert!("1\t2\t300".parse::<Anchor>().is_err());
        assert!("x\t2\t3".parse::<Anchor>().is_err());
        assert!("1\t2\t3\t0\t+\t?".parse::<Anchor>().is_err());
    }

    #[test]
    fn test_distance_gap() {
        let a = Anchor::new(0, 0, 10);
        let b = Anchor::new(3, 4, 10);
        assert_eq!(distance(&a, &b), 5.0);
        assert_eq!(gap(&a, &b), 1.0);
        assert_eq!(gap(&b, &a), 1.0);
    }

    #[test]
    fn test_clear_substr_pairs() {
        let mut anchors = vec![
            Anchor::new(10, 110, 20),
            Anchor::new(0, 100, 20),
            Anchor::new(12, 112, 5),  // nested in (10, 110)
            Anchor::new(0, 100, 20),  // duplicate
            Anchor::new(12, 300, 5),  // same query, other target
            Anchor::new(10, 110, 10), // nested, same begin
        ];
        clear_substr_pairs(&mut anchors, 31);
        assert_eq!(
            anchors,
            vec![
                Anchor::new(0, 100, 20),
                Anchor::new(10, 110, 20),
                Anchor::new(12, 300, 5),
            ]
        );
    }

    #[test]
    fn test_clear_anchor_longer_than_k() {
        let mut anchors = vec![
            Anchor::new(50, 50, 10),
            Anchor::new(0, 0, 100),
            Anchor::new(95, 95, 5),
        ];
        clear_substr_pairs(&mut anchors, 32);
        assert_eq!(anchors, vec![Anchor::new(0, 0, 100)]);
    }

    #[test]
    fn test_clear_keeps_other_strand() {
        let mut rc = Anchor::new(12, 112, 5);
        rc.q_rc = true;
        let mut anchors = vec![Anchor::new(10, 110, 20), rc];
        clear_substr_pairs(&mut anchors, 31);
        assert_eq!(anchors.len(), 2);
    }

    #[test]
    fn test_clear_idempotent_and_no_nesting() {
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..50 {
            let mut anchors = random_anchors(&mut rng, 120);
            clear_substr_pairs(&mut anchors, 31);

            for (i, a) in anchors.iter().enumerate() {
                for (j, b) in anchors.iter().enumerate() {
                    if i != j {
                        assert!(!a.contains(b), "{:?} contains {:?}", a, b);
                    }
                }
            }
            for w in anchors.windows(2) {
                assert!(cmp_query(&w[0], &w[1]) != Ordering::Greater);
            }

            let once = anchors.clone();
            clear_substr_pairs(&mut anchors, 31);
            assert_eq!(once, anchors);
        }
    }

    #[test]
    fn test_trim_head_and_tail() {
        let mut anchors = vec![
            Anchor::new(0, 500, 15),
            Anchor::new(0, 520, 15), // same query begin as the previous one
            Anchor::new(40, 560, 20),
            Anchor::new(80, 600, 20),
            Anchor::new(120, 640, 20),
            Anchor::new(150, 640, 15), // same target begin as the previous one
        ];
        trim_substr_pairs(&mut anchors, 31, 100.0);
        assert_eq!(
            anchors,
            vec![
                Anchor::new(0, 520, 15),
                Anchor::new(40, 560, 20),
                Anchor::new(80, 600, 20),
                Anchor::new(120, 640, 20),
            ]
        );
    }

    #[test]
    fn test_trim_respects_distance() {
        let mut anchors = vec![
            Anchor::new(0, 500, 15),
            Anchor::new(0, 5000, 15),
            Anchor::new(40, 5040, 20),
        ];
        let before = anchors.clone();
        trim_substr_pairs(&mut anchors, 31, 100.0);
        assert_eq!(anchors, before);
    }

    #[test]
    fn test_trim_all_repeat() {
        let mut anchors = vec![
            Anchor::new(0, 500, 15),
            Anchor::new(0, 510, 15),
            Anchor::new(0, 520, 15),
        ];
        trim_substr_pairs(&mut anchors, 31, 100.0);
        assert!(anchors.is_empty());

        let mut single = vec![Anchor::new(0, 500, 15)];
        trim_substr_pairs(&mut single, 31, 100.0);
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_trim_jump_inside_repeat() {
        let mut anchors = vec![
            Anchor::new(100, 1000, 20),
            Anchor::new(101, 1060, 20), // overlaps 19 bases, drifts 59
            Anchor::new(140, 1100, 20),
            Anchor::new(180, 1140, 20),
        ];
        trim_substr_pairs(&mut anchors, 31, 100.0);
        assert_eq!(anchors[0], Anchor::new(101, 1060, 20));
        assert_eq!(anchors.len(), 3);
    }
}
