use crate::error::Result;
use crate::history::{GameId, GameRecord};
use crate::item::GameKind;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One CSV line: a game record joined with one of its attempts.
#[derive(Debug, Serialize)]
struct ExportRow {
    kind: GameKind,
    game_id: GameId,
    game_start: String,
    attempt_date: String,
    items: String,
    provided: String,
    correct: usize,
    total: usize,
    percent: u8,
    item_count: usize,
    memorize_seconds: u32,
    memorize_elapsed_ms: u64,
    guess_elapsed_ms: u64,
}

fn rows(kind: GameKind, records: &[GameRecord]) -> impl Iterator<Item = ExportRow> + '_ {
    records.iter().flat_map(move |record| {
        record.attempts.iter().map(move |attempt| ExportRow {
            kind,
            game_id: record.id,
            game_start: record.start_date.to_rfc3339(),
            attempt_date: attempt.date.to_rfc3339(),
            items: record.items.join(" "),
            provided: attempt.provided.join(" "),
            correct: attempt.correct,
            total: attempt.total,
            percent: attempt.percent,
            item_count: record.item_count,
            memorize_seconds: record.memorize_seconds,
            memorize_elapsed_ms: attempt.memorize_elapsed_ms,
            guess_elapsed_ms: attempt.guess_elapsed_ms,
        })
    })
}

/// Write every attempt of every record as CSV, header first. Returns the number of data rows.
pub fn write_csv<W: Write>(writer: W, kind: GameKind, records: &[GameRecord]) -> Result<usize> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(HEADER)?;

    let mut count = 0;
    for row in rows(kind, records) {
        csv.serialize(row)?;
        count += 1;
    }
    csv.flush()?;

    Ok(count)
}

/// Same as [`write_csv`], creating or truncating `path`.
pub fn export_to_path<P: AsRef<Path>>(
    path: P,
    kind: GameKind,
    records: &[GameRecord],
) -> Result<usize> {
    let file = File::create(path.as_ref())?;
    let count = write_csv(file, kind, records)?;
    log::info!("exported {count} {kind} attempts to {}", path.as_ref().display());
    Ok(count)
}

pub const HEADER: [&str; 13] = [
    "kind",
    "game_id",
    "game_start",
    "attempt_date",
    "items",
    "provided",
    "correct",
    "total",
    "percent",
    "item_count",
    "memorize_seconds",
    "memorize_elapsed_ms",
    "guess_elapsed_ms",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Attempt;
    use chrono::{TimeZone, Utc};

    fn record() -> GameRecord {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let mut record = GameRecord::new(10, start, vec!["12".into(), "34".into()], 2, 8);
        for (id, provided, correct) in [(11, ["12", "00"], 1), (12, ["12", "34"], 2)] {
            record.push_attempt(Attempt {
                id,
                date: start,
                provided: provided.iter().map(|s| s.to_string()).collect(),
                correct,
                total: 2,
                percent: (correct * 50) as u8,
                memorize_elapsed_ms: 1200,
                guess_elapsed_ms: 3400,
            });
        }
        record
    }

    #[test]
    fn test_header_and_rows() {
        let mut out = Vec::new();
        let count = write_csv(&mut out, GameKind::Pairs, &[record()]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(count, 2);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(
            lines[1],
            "pairs,10,2024-03-01T08:00:00+00:00,2024-03-01T08:00:00+00:00,12 34,12 34,2,2,100,2,8,1200,3400"
        );
        assert!(lines[2].contains(",12 00,1,2,50,"));
    }

    #[test]
    fn test_records_without_attempts_produce_no_rows() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let empty = GameRecord::new(1, start, vec!["apple".into()], 1, 8);

        let mut out = Vec::new();
        let count = write_csv(&mut out, GameKind::Words, &[empty]).unwrap();

        assert_eq!(count, 0);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_export_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.csv");

        let count = export_to_path(&path, GameKind::Pairs, &[record()]).unwrap();

        assert_eq!(count, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("kind,game_id,"));
    }
}
