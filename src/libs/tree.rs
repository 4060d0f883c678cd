//! Radix tree over 2-bit encoded k-mers with mismatch-tolerant prefix search.
//!
//! Nodes live in an arena and are addressed by index; each node holds a
//! path-compressed prefix (possibly several bases) and up to four children
//! keyed by the next base. Leaves sit at depth `k` and carry every value
//! inserted under the same key.
//!
//! [`PrefixTree::search`] returns all stored k-mers that share at least `p`
//! leading bases with the query, each annotated with its actual shared
//! prefix length, so deeper mismatches are tolerated.

use crate::libs::nt;
use crate::libs::pool::Recycle;

type NodeIndex = u32;
type LeafIndex = u32;

const ROOT: NodeIndex = 0;

#[derive(Debug, Clone)]
struct Node {
    prefix: u64,
    len: u8,
    children: [Option<NodeIndex>; 4],
    leaf: Option<LeafIndex>,
}

impl Node {
    fn new(prefix: u64, len: u8) -> Self {
        Self {
            prefix,
            len,
            children: [None; 4],
            leaf: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Leaf {
    key: u64,
    values: Vec<u64>,
}

/// One hit of a prefix search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch<'a> {
    /// The stored k-mer.
    pub kmer: u64,
    /// Shared leading bases between the query and `kmer`.
    pub len_prefix: u8,
    /// All values inserted under `kmer`.
    pub values: &'a [u64],
}

#[derive(Debug, Clone)]
pub struct PrefixTree {
    k: u8,
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
}

impl PrefixTree {
    /// An empty tree for k-mers of `k` bases.
    pub fn new(k: u8) -> Self {
        assert!(k >= 1 && k <= nt::MAX_K, "k-mer size out of range: {}", k);
        Self {
            k,
            nodes: vec![Node::new(0, 0)],
            leaves: Vec::new(),
        }
    }

    pub fn k(&self) -> u8 {
        self.k
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Drops all keys, keeping the allocated arenas.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0] = Node::new(0, 0);
        self.leaves.clear();
    }

    /// Inserts `value` under the k-mer `key`.
    ///
    /// A repeated key appends to the existing value list.
    pub fn insert(&mut self, key: u64, value: u64) {
        debug_assert!(self.k == 32 || key >> (2 * self.k as u32) == 0);

        let mut node = ROOT;
        let mut rest = key;
        let mut klen = self.k;

        loop {
            if klen == 0 {
                self.attach_value(node, key, value);
                return;
            }

            let base = nt::kmer_base_at(rest, klen, 0) as usize;
            let child = match self.nodes[node as usize].children[base] {
                Some(c) => c,
                None => {
                    let c = self.push_node(rest, klen);
                    self.nodes[node as usize].children[base] = Some(c);
                    self.attach_value(c, key, value);
                    return;
                }
            };

            let (cp, cl) = {
                let c = &self.nodes[child as usize];
                (c.prefix, c.len)
            };
            let matched = nt::longest_prefix2(rest, klen, cp, cl);

            if matched < cl {
                // split the child edge at the divergence point
                let mid = self.push_node(nt::kmer_prefix(cp, cl, matched), matched);
                let lower_prefix = nt::kmer_suffix(cp, cl, matched);
                let lower_len = cl - matched;
                {
                    let c = &mut self.nodes[child as usize];
                    c.prefix = lower_prefix;
                    c.len = lower_len;
                }
                let lower_base = nt::kmer_base_at(lower_prefix, lower_len, 0) as usize;
                self.nodes[mid as usize].children[lower_base] = Some(child);
                self.nodes[node as usize].children[base] = Some(mid);
                node = mid;
            } else {
                node = child;
            }

            rest = nt::kmer_suffix(rest, klen, matched);
            klen -= matched;
        }
    }

    fn push_node(&mut self, prefix: u64, len: u8) -> NodeIndex {
        self.nodes.push(Node::new(prefix, len));
        (self.nodes.len() - 1) as NodeIndex
    }

    fn attach_value(&mut self, node: NodeIndex, key: u64, value: u64) {
        match self.nodes[node as usize].leaf {
            Some(l) => self.leaves[l as usize].values.push(value),
            None => {
                self.leaves.push(Leaf {
                    key,
                    values: vec![value],
                });
                self.nodes[node as usize].leaf = Some((self.leaves.len() - 1) as LeafIndex);
            }
        }
    }

    /// Values stored under exactly `key`.
    pub fn get(&self, key: u64) -> Option<&[u64]> {
        let mut node = ROOT;
        let mut rest = key;
        let mut klen = self.k;
        while klen > 0 {
            let base = nt::kmer_base_at(rest, klen, 0) as usize;
            let child = self.nodes[node as usize].children[base]?;
            let c = &self.nodes[child as usize];
            if c.len > klen || nt::kmer_prefix(rest, klen, c.len) != c.prefix {
                return None;
            }
            rest = nt::kmer_suffix(rest, klen, c.len);
            klen -= c.len;
            node = child;
        }
        self.nodes[node as usize]
            .leaf
            .map(|l| self.leaves[l as usize].values.as_slice())
    }

    /// All stored k-mers sharing at least `min_prefix` leading bases with
    /// `key`, in lexicographic order. `min_prefix` is clamped to `[1, k]`.
    ///
    /// Returns `None` when nothing qualifies.
    pub fn search(&self, key: u64, min_prefix: u8) -> Option<Vec<SearchMatch<'_>>> {
        let p = min_prefix.clamp(1, self.k);

        let mut node = ROOT;
        let mut rest = key;
        let mut klen = self.k;
        let mut shared = 0u8;
        let mut target = None;

        while klen > 0 {
            let base = nt::kmer_base_at(rest, klen, 0) as usize;
            let child = match self.nodes[node as usize].children[base] {
                Some(c) => c,
                None => break,
            };
            let (cp, cl) = {
                let c = &self.nodes[child as usize];
                (c.prefix, c.len)
            };
            let matched = nt::longest_prefix2(rest, klen, cp, cl);
            if matched < cl {
                // partial match inside the edge
                if shared + matched >= p {
                    target = Some(child);
                }
                break;
            }

            shared += cl;
            if shared >= p {
                target = Some(child);
                break;
            }
            rest = nt::kmer_suffix(rest, klen, cl);
            klen -= cl;
            node = child;
        }

        let target = target?;

        // collect every leaf below the match root
        let mut results = Vec::new();
        let mut stack = vec![target];
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n as usize];
            if let Some(l) = node.leaf {
                let leaf = &self.leaves[l as usize];
                results.push(SearchMatch {
                    kmer: leaf.key,
                    len_prefix: nt::longest_prefix(key, leaf.key, self.k),
                    values: leaf.values.as_slice(),
                });
            }
            stack.extend(node.children.iter().rev().flatten());
        }

        if results.is_empty() {
            None
        } else {
            Some(results)
        }
    }
}

impl Recycle for PrefixTree {
    fn recycle(&mut self) {
        self.clear();
    }
}
