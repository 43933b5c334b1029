use crate::error::{Error, Result};

/// Nucleotide alphabet; a residue's code is its position here
pub const NUCLEOTIDES: [char; 4] = ['A', 'C', 'G', 'T'];

/// Patient id assigned to every k-mer record (single-patient tables)
pub const KMER_PATIENT_ID: usize = 0;

/// One raw row of a k-mer table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmerRow {
    pub kmer: String,
    pub count: u64,
}

/// A k-mer row turned into model inputs
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedKmer {
    /// Nucleotide codes, one per position
    pub codes: Vec<u8>,
    /// Patient the count was observed in
    pub patient: usize,
    /// ln(count + 1)
    pub label: f32,
}

/// Map a nucleotide to its code
pub fn encode_residue(residue: char) -> Option<u8> {
    match residue {
        'A' => Some(0),
        'C' => Some(1),
        'G' => Some(2),
        'T' => Some(3),
        _ => None,
    }
}

/// Encode a k-mer string as nucleotide codes, failing on any other character
pub fn encode_kmer(kmer: &str) -> Result<Vec<u8>> {
    kmer.chars()
        .enumerate()
        .map(|(position, residue)| {
            encode_residue(residue).ok_or_else(|| Error::InvalidResidue {
                kmer: kmer.to_string(),
                residue,
                position,
            })
        })
        .collect()
}

/// Inverse of [`encode_kmer`]
pub fn decode_kmer(codes: &[u8]) -> Result<String> {
    codes
        .iter()
        .map(|&code| {
            NUCLEOTIDES
                .get(code as usize)
                .copied()
                .ok_or(Error::InvalidCode(code))
        })
        .collect()
}

/// ln(count + 1); zero counts map to zero
pub fn count_label(count: u64) -> f32 {
    (count as f64 + 1.0).ln() as f32
}

/// Encode a raw table row
pub fn encode_row(row: &KmerRow) -> Result<EncodedKmer> {
    Ok(EncodedKmer {
        codes: encode_kmer(&row.kmer)?,
        patient: KMER_PATIENT_ID,
        label: count_label(row.count),
    })
}
