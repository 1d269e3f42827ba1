use std::collections::BTreeSet;

use anyhow::Result;
use rusqlite::Connection;

use crate::engine::dom::TermPair;

/// The course language the scraped pairs belong to.
pub const SOURCE_LANG_CODE: &str = "ar";
pub const SOURCE_LANG_NAME: &str = "Arabic";

const PROVENANCE_NOTE: &str = "Imported from Duolingo Practice Hub";

pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS languages (
            id         INTEGER PRIMARY KEY,
            code       TEXT UNIQUE NOT NULL,
            name       TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS terms (
            id                          INTEGER PRIMARY KEY,
            language_id                 INTEGER NOT NULL REFERENCES languages(id),
            english_term                TEXT NOT NULL,
            target_language_term        TEXT NOT NULL,
            transliteration             TEXT,
            example_sentence            TEXT,
            example_sentence_explained  TEXT,
            notes                       TEXT,
            learned                     BOOLEAN NOT NULL DEFAULT 0,
            correct_counter             INTEGER NOT NULL DEFAULT 0,
            created_at                  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(language_id, english_term, target_language_term)
        );
        CREATE INDEX IF NOT EXISTS idx_terms_language ON terms(language_id);
        ",
    )?;
    Ok(())
}

/// Look up or create the language row, returning its id.
pub fn ensure_language(conn: &Connection, code: &str, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO languages (code, name) VALUES (?1, ?2)",
        rusqlite::params![code, name],
    )?;
    let id = conn.query_row(
        "SELECT id FROM languages WHERE code = ?1",
        rusqlite::params![code],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub struct UpsertCounts {
    pub inserted: usize,
    pub skipped: usize,
}

/// Insert each pair as a term row, leaving existing
/// (language, english, target) matches untouched. New rows carry the
/// provenance note and zeroed learning progress.
pub fn upsert_terms(
    conn: &Connection,
    language_id: i64,
    pairs: &BTreeSet<TermPair>,
) -> Result<UpsertCounts> {
    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    let mut skipped = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO terms
             (language_id, english_term, target_language_term, notes, learned, correct_counter)
             VALUES (?1, ?2, ?3, ?4, 0, 0)",
        )?;
        for pair in pairs {
            let changed = stmt.execute(rusqlite::params![
                language_id,
                pair.translation,
                pair.term,
                PROVENANCE_NOTE,
            ])?;
            if changed > 0 {
                inserted += 1;
            } else {
                skipped += 1;
            }
        }
    }
    tx.commit()?;
    Ok(UpsertCounts { inserted, skipped })
}

/// All stored pairs for a language, in canonical (target, english) order.
pub fn fetch_terms(conn: &Connection, language_id: i64) -> Result<BTreeSet<TermPair>> {
    let mut stmt = conn.prepare(
        "SELECT target_language_term, english_term FROM terms
         WHERE language_id = ?1
         ORDER BY target_language_term, english_term",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![language_id], |row| {
            Ok(TermPair {
                term: row.get(0)?,
                translation: row.get(1)?,
            })
        })?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub languages: usize,
    pub terms: usize,
    pub learned: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let languages: usize = conn.query_row("SELECT COUNT(*) FROM languages", [], |r| r.get(0))?;
    let terms: usize = conn.query_row("SELECT COUNT(*) FROM terms", [], |r| r.get(0))?;
    let learned: usize =
        conn.query_row("SELECT COUNT(*) FROM terms WHERE learned = 1", [], |r| r.get(0))?;
    Ok(Stats {
        languages,
        terms,
        learned,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn pairs(entries: &[(&str, &str)]) -> BTreeSet<TermPair> {
        entries
            .iter()
            .map(|(t, tr)| TermPair::new(*t, *tr))
            .collect()
    }

    #[test]
    fn ensure_language_is_idempotent() {
        let conn = memory_db();
        let a = ensure_language(&conn, "ar", "Arabic").unwrap();
        let b = ensure_language(&conn, "ar", "Arabic").unwrap();
        assert_eq!(a, b);
        assert_eq!(get_stats(&conn).unwrap().languages, 1);
    }

    #[test]
    fn upsert_twice_skips_everything_second_time() {
        let conn = memory_db();
        let lang = ensure_language(&conn, "ar", "Arabic").unwrap();
        let set = pairs(&[("رَبيع", "spring"), ("خَريف", "autumn")]);

        let first = upsert_terms(&conn, lang, &set).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped, 0);

        let second = upsert_terms(&conn, lang, &set).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, set.len());
        assert_eq!(get_stats(&conn).unwrap().terms, 2);
    }

    #[test]
    fn existing_rows_left_untouched() {
        let conn = memory_db();
        let lang = ensure_language(&conn, "ar", "Arabic").unwrap();
        upsert_terms(&conn, lang, &pairs(&[("a", "one")])).unwrap();
        conn.execute("UPDATE terms SET learned = 1, correct_counter = 5", [])
            .unwrap();

        upsert_terms(&conn, lang, &pairs(&[("a", "one"), ("b", "two")])).unwrap();

        let learned: i64 = conn
            .query_row(
                "SELECT learned FROM terms WHERE target_language_term = 'a'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(learned, 1);
        assert_eq!(get_stats(&conn).unwrap().terms, 2);
    }

    #[test]
    fn fetch_terms_scoped_to_language() {
        let conn = memory_db();
        let ar = ensure_language(&conn, "ar", "Arabic").unwrap();
        let es = ensure_language(&conn, "es", "Spanish").unwrap();
        upsert_terms(&conn, ar, &pairs(&[("a", "one")])).unwrap();
        upsert_terms(&conn, es, &pairs(&[("b", "two")])).unwrap();

        let fetched = fetch_terms(&conn, ar).unwrap();
        assert_eq!(fetched, pairs(&[("a", "one")]));
    }
}
