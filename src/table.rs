use crate::{alphabet::AMINO_ACIDS, conservation::ConservationProfile};
use anyhow::Result;
use std::{fs::File, io::Write};

/// Writes one CSV row per alignment column: position, reference symbol,
/// conservation score, the 20 amino-acid frequencies and the gap fraction.
/// The header is `i,A_i,conservation,A,...,Y,-`.
pub fn write_csv<W: Write>(profile: &ConservationProfile, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = vec!["i".into(), "A_i".into(), "conservation".into()];
    header.extend(AMINO_ACIDS.iter().map(|aa| (*aa as char).to_string()));
    header.push("-".into());
    wtr.write_record(&header)?;

    for record in profile.records() {
        let mut row: Vec<String> = vec![
            record.position().to_string(),
            record.reference().to_string(),
            record.conservation().to_string(),
        ];
        row.extend(
            record
                .profile()
                .amino_acids()
                .iter()
                .map(|frequency| frequency.to_string()),
        );
        row.push(record.profile().gap().to_string());
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv_file(profile: &ConservationProfile, filename: &str) -> Result<()> {
    write_csv(profile, File::create(filename)?)
}
