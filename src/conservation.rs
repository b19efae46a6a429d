use crate::{
    alignment::Alignment,
    alphabet::{self, AMINO_ACIDS},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const DEFAULT_MIN_SAMPLE: usize = 6;
const DEFAULT_PRECISION: u32 = 3;

/// Tunables for the per-column score. `min_sample` is the smallest number
/// of non-gap residues a column needs before its entropy is considered
/// meaningful; `precision` is the decimal width of reported values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    pub min_sample: usize,
    pub precision: u32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            min_sample: DEFAULT_MIN_SAMPLE,
            precision: DEFAULT_PRECISION,
        }
    }
}

/// Residue frequencies of one alignment column. The 20 amino-acid
/// fractions are normalized over the non-gap count and sum to 1 unless the
/// column has no recognized residues at all; the gap fraction is
/// normalized over the total row count, not the non-gap count.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyProfile {
    amino_acids: [f64; 20],
    gap: f64,
}

impl FrequencyProfile {
    #[inline(always)]
    pub fn amino_acids(&self) -> &[f64; 20] {
        &self.amino_acids
    }

    /// Frequency of one amino acid, by letter.
    #[inline(always)]
    pub fn get(&self, aa: u8) -> Option<f64> {
        alphabet::index_of(aa).map(|i| self.amino_acids[i])
    }

    #[inline(always)]
    pub fn gap(&self) -> f64 {
        self.gap
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConservationRecord {
    position: usize,
    reference: char,
    conservation: f64,
    profile: FrequencyProfile,
    unrecognized: usize,
}

impl ConservationRecord {
    /// 1-based alignment position.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The first row's symbol at this column. An annotation only, it takes
    /// no part in the score and may be a gap or an unrecognized symbol.
    #[inline(always)]
    pub fn reference(&self) -> char {
        self.reference
    }

    #[inline(always)]
    pub fn conservation(&self) -> f64 {
        self.conservation
    }

    #[inline(always)]
    pub fn profile(&self) -> &FrequencyProfile {
        &self.profile
    }

    /// Symbols in this column that are neither amino acid nor gap. They
    /// are excluded from every count.
    #[inline(always)]
    pub fn unrecognized(&self) -> usize {
        self.unrecognized
    }
}

/// Per-column conservation scores and frequency profiles for a whole
/// alignment, in column order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConservationProfile {
    records: Vec<ConservationRecord>,
    n_rows: usize,
}

impl ConservationProfile {
    /// Runs the single analysis pass. Columns are independent, so they are
    /// processed in parallel and reassembled in column order.
    pub fn new_from_alignment(alignment: &Alignment, settings: &AnalyzerSettings) -> Self {
        let records = (0..alignment.n_columns())
            .into_par_iter()
            .map(|i| Self::analyze_column(i, &alignment.column(i), settings))
            .collect();
        Self {
            records,
            n_rows: alignment.n_rows(),
        }
    }

    fn analyze_column(
        index: usize,
        column: &[u8],
        settings: &AnalyzerSettings,
    ) -> ConservationRecord {
        let mut counts = [0usize; 20];
        let mut gap_count = 0;
        let mut unrecognized = 0;
        for &symbol in column {
            if let Some(i) = alphabet::index_of(symbol) {
                counts[i] += 1;
            } else if alphabet::is_gap(symbol) {
                gap_count += 1;
            } else {
                unrecognized += 1;
            }
        }
        let total_non_gap: usize = counts.iter().sum();
        let gap_fraction = gap_count as f64 / column.len() as f64;

        let mut frequencies = [0.0; 20];
        if total_non_gap > 0 {
            for (frequency, count) in frequencies.iter_mut().zip(counts.iter()) {
                *frequency = *count as f64 / total_non_gap as f64;
            }
        }

        let conservation = if total_non_gap < settings.min_sample {
            0.0
        } else {
            // 0*log2(0) counts as 0, so zero frequencies are skipped
            let entropy: f64 = frequencies
                .iter()
                .filter(|&&p| p > 0.0)
                .map(|&p| -p * p.log2())
                .sum();
            let max_entropy = (AMINO_ACIDS.len() as f64).log2();
            (1.0 - entropy / max_entropy) * (1.0 - gap_fraction)
        };

        for frequency in frequencies.iter_mut() {
            *frequency = round_to(*frequency, settings.precision);
        }
        ConservationRecord {
            position: index + 1,
            reference: column[0] as char,
            conservation: round_to(conservation, settings.precision),
            profile: FrequencyProfile {
                amino_acids: frequencies,
                gap: round_to(gap_fraction, settings.precision),
            },
            unrecognized,
        }
    }

    #[inline(always)]
    pub fn records(&self) -> &[ConservationRecord] {
        &self.records
    }

    #[inline(always)]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[inline(always)]
    pub fn n_columns(&self) -> usize {
        self.records.len()
    }

    pub fn unrecognized_total(&self) -> usize {
        self.records.iter().map(|record| record.unrecognized()).sum()
    }

    pub fn mean_conservation(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.records.iter().map(|record| record.conservation()).sum();
        sum / self.records.len() as f64
    }

    /// Residue rows for the heatmap: gap first, then the 20 amino acids,
    /// matching the CSV column order.
    pub fn frequency_matrix(&self) -> Vec<Vec<f64>> {
        let mut matrix = Vec::with_capacity(AMINO_ACIDS.len() + 1);
        matrix.push(
            self.records
                .iter()
                .map(|record| record.profile().gap())
                .collect(),
        );
        for i in 0..AMINO_ACIDS.len() {
            matrix.push(
                self.records
                    .iter()
                    .map(|record| record.profile().amino_acids()[i])
                    .collect(),
            );
        }
        matrix
    }

    /// Row labels for `frequency_matrix`.
    pub fn residue_labels() -> Vec<String> {
        let mut labels = vec!["-".to_string()];
        labels.extend(AMINO_ACIDS.iter().map(|aa| (*aa as char).to_string()));
        labels
    }

    pub fn conservation_row(&self) -> Vec<f64> {
        self.records
            .iter()
            .map(|record| record.conservation())
            .collect()
    }

    /// 1-based position labels, in column order.
    pub fn positions(&self) -> Vec<usize> {
        self.records.iter().map(|record| record.position()).collect()
    }
}

#[inline(always)]
fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(rows: &[&str]) -> ConservationProfile {
        let names = (1..=rows.len()).map(|i| format!("seq{i}")).collect();
        let rows = rows.iter().map(|row| row.as_bytes().to_vec()).collect();
        let alignment = Alignment::from_rows(names, rows).unwrap();
        ConservationProfile::new_from_alignment(&alignment, &AnalyzerSettings::default())
    }

    fn single_column(symbols: &str) -> ConservationRecord {
        let rows: Vec<String> = symbols.chars().map(|c| c.to_string()).collect();
        let rows: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        analyze(&rows).records()[0].clone()
    }

    #[test]
    fn test_fully_conserved_column() {
        let record = single_column("AAAAAAAAAA");
        assert_eq!(record.position(), 1);
        assert_eq!(record.reference(), 'A');
        assert_eq!(record.conservation(), 1.0);
        assert_eq!(record.profile().get(b'A'), Some(1.0));
        assert_eq!(record.profile().gap(), 0.0);
    }

    #[test]
    fn test_gap_penalty() {
        // 8 of 10 rows carry A, 2 a gap: raw score 1.0, penalized by 0.8
        let record = single_column("AAAAAAAA--");
        assert_eq!(record.conservation(), 0.8);
        assert_eq!(record.profile().get(b'A'), Some(1.0));
        assert_eq!(record.profile().gap(), 0.2);
    }

    #[test]
    fn test_two_residue_column() {
        // 3 A + 3 V + 4 gaps: entropy 1 bit of max log2(20)
        let record = single_column("AAAVVV--..");
        assert_eq!(record.profile().get(b'A'), Some(0.5));
        assert_eq!(record.profile().get(b'V'), Some(0.5));
        assert_eq!(record.profile().gap(), 0.4);
        assert_eq!(record.conservation(), 0.461);
    }

    #[test]
    fn test_below_min_sample() {
        let record = single_column("LLLLL-----");
        assert_eq!(record.conservation(), 0.0);
        assert_eq!(record.profile().get(b'L'), Some(1.0));
    }

    #[test]
    fn test_all_gap_column() {
        let record = single_column("-----.....");
        assert_eq!(record.conservation(), 0.0);
        assert_eq!(record.profile().gap(), 1.0);
        assert!(record.profile().amino_acids().iter().all(|&f| f == 0.0));
    }

    #[test]
    fn test_unrecognized_symbols_are_excluded_but_counted() {
        let record = single_column("KKKKKKKKKX");
        assert_eq!(record.unrecognized(), 1);
        assert_eq!(record.profile().get(b'K'), Some(1.0));
        assert_eq!(record.profile().gap(), 0.0);
        assert_eq!(record.conservation(), 1.0);
    }

    #[test]
    fn test_lowercase_is_unrecognized() {
        let record = single_column("AAAAAAAAAa");
        assert_eq!(record.unrecognized(), 1);
        assert_eq!(record.profile().get(b'A'), Some(1.0));
        assert_eq!(record.conservation(), 1.0);
    }

    #[test]
    fn test_frequencies_sum_to_one() {
        let record = single_column("ACDEFGHIK-");
        let sum: f64 = record.profile().amino_acids().iter().sum();
        assert!((sum - 1.0).abs() < 2e-3);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let profile = analyze(&[
            "ACDEFGHA",
            "ACDEFGHC",
            "ACDEFGHD",
            "ACDEFGHE",
            "ACDEFGHF",
            "ACDEFGHG",
            "AC-EFGHH",
            "AC.EFGHI",
            "ACXEFGHK",
            "AC-EFGHL",
        ]);
        for record in profile.records() {
            assert!(record.conservation() >= 0.0);
            assert!(record.conservation() <= 1.0);
        }
    }

    #[test]
    fn test_idempotence() {
        let rows = [
            "AAKL-G", "AAKL-G", "AVKL-G", "AVK--G", "A-K--G", "A-K--C", "AAKL-C", "AAKL-C",
            "A.KL.C", "A.KL.G",
        ];
        let first = analyze(&rows);
        let second = analyze(&rows);
        for (a, b) in first.records().iter().zip(second.records()) {
            assert_eq!(a.conservation(), b.conservation());
            assert_eq!(a.profile(), b.profile());
        }
    }

    fn analyze_single_column(symbols: &str, settings: &AnalyzerSettings) -> ConservationProfile {
        let rows: Vec<Vec<u8>> = symbols.chars().map(|c| vec![c as u8]).collect();
        let names = (1..=rows.len()).map(|i| format!("seq{i}")).collect();
        let alignment = Alignment::from_rows(names, rows).unwrap();
        ConservationProfile::new_from_alignment(&alignment, settings)
    }

    #[test]
    fn test_custom_min_sample() {
        let settings = AnalyzerSettings {
            min_sample: 3,
            ..Default::default()
        };
        let profile = analyze_single_column("LLLLL-----", &settings);
        // 5 residues now clear the threshold; raw 1.0 penalized by gap 0.5
        assert_eq!(profile.records()[0].conservation(), 0.5);
    }

    #[test]
    fn test_custom_precision() {
        let settings = AnalyzerSettings {
            precision: 1,
            ..Default::default()
        };
        let profile = analyze_single_column("AAAVVV--..", &settings);
        assert_eq!(profile.records()[0].conservation(), 0.5);
        assert_eq!(profile.records()[0].profile().gap(), 0.4);
    }

    #[test]
    fn test_matrix_layout() {
        let profile = analyze(&["AC", "A-", "AC", "AC", "AC", "AC", "AC", "AC", "AC", "AC"]);
        let matrix = profile.frequency_matrix();
        let labels = ConservationProfile::residue_labels();
        assert_eq!(matrix.len(), 21);
        assert_eq!(labels.len(), 21);
        assert_eq!(labels[0], "-");
        assert_eq!(labels[1], "A");
        assert_eq!(labels[2], "C");
        // gap row, column 2 holds the gap fraction 0.1
        assert_eq!(matrix[0][1], 0.1);
        // A row is fully set in column 1
        assert_eq!(matrix[1][0], 1.0);
        assert_eq!(profile.positions(), vec![1, 2]);
        assert_eq!(profile.conservation_row().len(), 2);
    }
}
