//! Random access to target sequences by name and half-open range.

use anyhow::{anyhow, bail};
use indexmap::IndexMap;

/// Hands out already-decoded subsequences of named sequences.
pub trait SeqFetch {
    fn seq_len(&self, name: &str) -> Option<usize>;

    /// Bases `[begin, end)` of `name`.
    fn fetch(&self, name: &str, begin: usize, end: usize) -> anyhow::Result<&[u8]>;
}

/// Sequences held in memory, in file order.
#[derive(Debug, Clone, Default)]
pub struct Genomes {
    seqs: IndexMap<String, Vec<u8>>,
}

impl Genomes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every record of a FASTA file, `stdin` or `.gz` included.
    ///
    /// ```no_run
    /// use lexichain::libs::genome::{Genomes, SeqFetch};
    /// let genomes = Genomes::from_fasta("tests/compare/target.fa").unwrap();
    /// let head = genomes.fetch("target1", 0, 10).unwrap();
    /// assert_eq!(head.len(), 10);
    /// ```
    pub fn from_fasta(infile: &str) -> anyhow::Result<Self> {
        let reader = crate::reader(infile)?;
        let mut fa_in = noodles_fasta::io::Reader::new(reader);

        let mut genomes = Self::new();
        for result in fa_in.records() {
            let record = result?;
            let name = String::from_utf8(record.name().into())?;
            let seq = record.sequence().as_ref().to_ascii_uppercase();
            if genomes.seqs.contains_key(&name) {
                bail!("duplicated sequence name in {}: {}", infile, name);
            }
            genomes.seqs.insert(name, seq);
        }

        Ok(genomes)
    }

    pub fn insert(&mut self, name: &str, seq: &[u8]) {
        self.seqs.insert(name.to_string(), seq.to_vec());
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.seqs.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.seqs.get(name).map(|v| v.as_slice())
    }
}

impl SeqFetch for Genomes {
    fn seq_len(&self, name: &str) -> Option<usize> {
        self.seqs.get(name).map(|v| v.len())
    }

    fn fetch(&self, name: &str, begin: usize, end: usize) -> anyhow::Result<&[u8]> {
        let seq = self
            .get(name)
            .ok_or_else(|| anyhow!("sequence not found: {}", name))?;
        if begin > end || end > seq.len() {
            bail!(
                "range {}-{} out of bounds for {} ({} bp)",
                begin,
                end,
                name,
                seq.len()
            );
        }
        Ok(&seq[begin..end])
    }
}
