use std::io::BufRead;

use log::warn;

use crate::dictionary::ReadingDictionary;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    pub skipped: usize,
}

/// Imports `surface<TAB>reading` lines into a dictionary. Blank lines and
/// `#` comments are skipped; duplicates keep the existing reading.
pub fn import_readings<R: BufRead>(
    reader: R,
    dictionary: &mut ReadingDictionary,
) -> anyhow::Result<ImportStats> {
    let mut stats = ImportStats::default();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split('\t');
        let surface = parts.next().map(str::trim).unwrap_or_default(); // split yields at least one part
        let reading = parts.next().map(str::trim).unwrap_or_default();

        if surface.is_empty() || reading.is_empty() {
            warn!("Skipping malformed readings line {}", line_number + 1);
            stats.skipped += 1;
            continue;
        }

        if dictionary.add_reading(surface, reading) {
            stats.imported += 1;
        } else {
            stats.skipped += 1;
        }
    }

    Ok(stats)
}
