//! Flat-file sinks for the collected pairs. Two shapes, picked per
//! deployment: a sorted CSV with a header row, or record-per-line JSON.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::engine::dom::TermPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Csv,
    Jsonl,
}

impl Format {
    pub fn default_path(self) -> &'static str {
        match self {
            Format::Csv => "data/duolingo_words.csv",
            Format::Jsonl => "data/duolingo_words.jsonl",
        }
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    word: &'a str,
    translation: &'a str,
}

/// Write the accumulator to `path`. Rows come out in ascending
/// (term, translation) order because the set iterates that way.
pub fn write_pairs(pairs: &BTreeSet<TermPair>, path: &Path, format: Format) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);

    match format {
        Format::Csv => {
            writeln!(w, "target_language_term,english_term")?;
            for pair in pairs {
                writeln!(w, "{},{}", csv_field(&pair.term), csv_field(&pair.translation))?;
            }
        }
        Format::Jsonl => {
            for pair in pairs {
                let record = JsonRecord {
                    word: &pair.term,
                    translation: &pair.translation,
                };
                serde_json::to_writer(&mut w, &record)?;
                writeln!(w)?;
            }
        }
    }

    w.flush()?;
    info!("Wrote {} pairs to {}", pairs.len(), path.display());
    Ok(())
}

/// Quote a CSV field only when it needs it (separator, quote, newline).
fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ── Tests ──
