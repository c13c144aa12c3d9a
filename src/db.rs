use anyhow::Result;
use rusqlite::Connection;

const DB_PATH: &str = "data/stories.sqlite";

/// Grade levels this pipeline operates on.
pub const GRADE_LEVELS: &[&str] = &["K-1", "2-3", "4-5"];

pub fn connect() -> Result<Connection> {
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS stories_raw (
            story_id    TEXT PRIMARY KEY,
            title       TEXT,
            text        TEXT,
            grade_level TEXT NOT NULL,
            region      TEXT,
            audio_url   TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_stories_grade ON stories_raw(grade_level);
        CREATE INDEX IF NOT EXISTS idx_stories_audio ON stories_raw(audio_url);
        ",
    )?;
    Ok(())
}

/// One story row. `text` is the only field the cleaning engine touches;
/// `audio_url` stays NULL until synthesis succeeds.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Story {
    pub story_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    pub grade_level: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub audio_url: Option<String>,
}

// ── Import ──

pub fn insert_stories(conn: &Connection, stories: &[Story]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO stories_raw (story_id, title, text, grade_level, region, audio_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for s in stories {
            count += stmt.execute(rusqlite::params![
                s.story_id, s.title, s.text, s.grade_level, s.region, s.audio_url,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Fetching ──

fn grade_list() -> String {
    GRADE_LEVELS
        .iter()
        .map(|g| format!("'{}'", g))
        .collect::<Vec<_>>()
        .join(", ")
}

fn story_from_row(row: &rusqlite::Row) -> rusqlite::Result<Story> {
    Ok(Story {
        story_id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        grade_level: row.get(3)?,
        region: row.get(4)?,
        audio_url: row.get(5)?,
    })
}

/// All stories in the grade allow-list, ordered by id.
pub fn fetch_grade_stories(conn: &Connection, limit: Option<usize>) -> Result<Vec<Story>> {
    let sql = format!(
        "SELECT story_id, COALESCE(title,''), COALESCE(text,''), grade_level,
                COALESCE(region,''), audio_url
         FROM stories_raw
         WHERE grade_level IN ({})
         ORDER BY story_id{}",
        grade_list(),
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], story_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Grade-filtered stories that still need audio.
pub fn fetch_without_audio(conn: &Connection, limit: Option<usize>) -> Result<Vec<Story>> {
    let sql = format!(
        "SELECT story_id, COALESCE(title,''), COALESCE(text,''), grade_level,
                COALESCE(region,''), audio_url
         FROM stories_raw
         WHERE grade_level IN ({}) AND audio_url IS NULL
         ORDER BY story_id{}",
        grade_list(),
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], story_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Write-back ──

/// Persist repaired bodies, matched by story id.
pub fn update_texts(conn: &Connection, updates: &[(String, String)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("UPDATE stories_raw SET text = ?2 WHERE story_id = ?1")?;
        for (id, text) in updates {
            count += stmt.execute(rusqlite::params![id, text])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn update_audio_url(conn: &Connection, story_id: &str, url: &str) -> Result<()> {
    conn.execute(
        "UPDATE stories_raw SET audio_url = ?2 WHERE story_id = ?1",
        rusqlite::params![story_id, url],
    )?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub in_grades: usize,
    pub with_audio: usize,
    pub by_grade: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM stories_raw", [], |r| r.get(0))?;
    let in_grades: usize = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM stories_raw WHERE grade_level IN ({})",
            grade_list()
        ),
        [],
        |r| r.get(0),
    )?;
    let with_audio: usize = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM stories_raw
             WHERE grade_level IN ({}) AND audio_url IS NOT NULL",
            grade_list()
        ),
        [],
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT grade_level, COUNT(*) FROM stories_raw GROUP BY grade_level ORDER BY grade_level",
    )?;
    let by_grade = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stats {
        total,
        in_grades,
        with_audio,
        by_grade,
    })
}

// ── Tests ──
