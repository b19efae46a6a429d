use anyhow::Result;
use bio::io::fasta;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt, fs::File, io::Read};

#[derive(Debug)]
pub enum AlignmentError {
    Empty,
    UnequalLength {
        name: String,
        expected: usize,
        found: usize,
    },
}

impl Error for AlignmentError {}

impl fmt::Display for AlignmentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlignmentError::Empty => {
                write!(f, "Alignment has no sequences or no columns")
            }
            AlignmentError::UnequalLength {
                name,
                expected,
                found,
            } => write!(
                f,
                "Sequence '{name}' has length {found}, expected {expected}"
            ),
        }
    }
}

/// A parsed multiple sequence alignment. All rows have the same length;
/// this is checked once at construction and relied upon afterwards.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Alignment {
    names: Vec<String>,
    rows: Vec<Vec<u8>>,
}

impl Alignment {
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<u8>>) -> Result<Self, AlignmentError> {
        let expected = match rows.first() {
            Some(first) if !first.is_empty() => first.len(),
            _ => return Err(AlignmentError::Empty),
        };
        for (i, row) in rows.iter().enumerate() {
            if row.len() != expected {
                let name = names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("#{}", i + 1));
                return Err(AlignmentError::UnequalLength {
                    name,
                    expected,
                    found: row.len(),
                });
            }
        }
        Ok(Self { names, rows })
    }

    /// Reads a row-aligned FASTA/A2M file; `.gz` input is decompressed on
    /// the fly.
    pub fn from_fasta_file(filename: &str) -> Result<Self> {
        let file = File::open(filename)?;
        let reader: Box<dyn Read> = if filename.ends_with(".gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let mut names = Vec::new();
        let mut rows = Vec::new();
        for record in fasta::Reader::new(reader).records() {
            let record = record?;
            names.push(record.id().to_string());
            rows.push(record.seq().to_vec());
        }
        Ok(Self::from_rows(names, rows)?)
    }

    #[inline(always)]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline(always)]
    pub fn n_columns(&self) -> usize {
        self.rows.first().map_or(0, |row| row.len())
    }

    #[inline(always)]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline(always)]
    pub fn row(&self, i: usize) -> Option<&[u8]> {
        self.rows.get(i).map(|row| row.as_slice())
    }

    /// The symbols at position `i` across all rows, in row order.
    /// `i` must be below `n_columns()`.
    pub fn column(&self, i: usize) -> Vec<u8> {
        self.rows.iter().map(|row| row[i]).collect()
    }
}
