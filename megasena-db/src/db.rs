use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Params};
use std::path::Path;

use crate::models::{Contest, Draw, HistoricalDataset, PrizeTier};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS contests (
    contest_id  INTEGER PRIMARY KEY,
    date        TEXT,
    ball_1      INTEGER NOT NULL,
    ball_2      INTEGER NOT NULL,
    ball_3      INTEGER NOT NULL,
    ball_4      INTEGER NOT NULL,
    ball_5      INTEGER NOT NULL,
    ball_6      INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS prize_tiers (
    contest_id  INTEGER NOT NULL REFERENCES contests(contest_id) ON DELETE CASCADE,
    position    INTEGER NOT NULL,
    tier        TEXT NOT NULL,
    winners     INTEGER,
    prize       REAL,
    PRIMARY KEY (contest_id, position)
);
";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("megasena.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

/// Inserts or updates a contest. Returns true when the contest is new.
///
/// A missing date keeps the stored one, and an empty prize list keeps the stored tiers,
/// so re-importing plain draws never erases analytic data.
/// Run it inside a transaction when the row and its tiers must land together.
pub fn upsert_contest(conn: &Connection, contest: &Contest) -> Result<bool> {
    let existed: bool = conn
        .query_row(
            "SELECT 1 FROM contests WHERE contest_id = ?1",
            [contest.id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    let n = contest.draw.numbers();
    conn.execute(
        "INSERT INTO contests (contest_id, date, ball_1, ball_2, ball_3, ball_4, ball_5, ball_6)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(contest_id) DO UPDATE SET
             date = COALESCE(excluded.date, contests.date),
             ball_1 = excluded.ball_1,
             ball_2 = excluded.ball_2,
             ball_3 = excluded.ball_3,
             ball_4 = excluded.ball_4,
             ball_5 = excluded.ball_5,
             ball_6 = excluded.ball_6",
        params![contest.id, contest.date, n[0], n[1], n[2], n[3], n[4], n[5]],
    ).context("Échec de l'insertion")?;

    if contest.prizes.is_empty() {
        return Ok(!existed);
    }
    conn.execute("DELETE FROM prize_tiers WHERE contest_id = ?1", [contest.id])?;
    for (position, tier) in contest.prizes.iter().enumerate() {
        conn.execute(
            "INSERT INTO prize_tiers (contest_id, position, tier, winners, prize)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![contest.id, position as u32, tier.tier, tier.winners, tier.prize],
        )?;
    }
    Ok(!existed)
}

pub fn count_contests(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM contests", [], |row| row.get(0))?;
    Ok(count)
}

type ContestRow = (u32, Option<String>, [i64; 6]);

fn read_rows(conn: &Connection, sql: &str, params: impl Params) -> Result<Vec<ContestRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, u32>(0)?,
            row.get::<_, Option<String>>(1)?,
            [
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
            ],
        ))
    })?.collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn fetch_prizes(conn: &Connection, contest_id: u32) -> Result<Vec<PrizeTier>> {
    let mut stmt = conn.prepare(
        "SELECT tier, winners, prize FROM prize_tiers WHERE contest_id = ?1 ORDER BY position",
    )?;
    let tiers = stmt.query_map([contest_id], |row| {
        Ok(PrizeTier {
            tier: row.get(0)?,
            winners: row.get(1)?,
            prize: row.get(2)?,
        })
    })?.collect::<Result<Vec<_>, _>>()?;
    Ok(tiers)
}

/// Most recent contests first. Rows holding an invalid draw are skipped.
pub fn fetch_last_contests(conn: &Connection, limit: u32) -> Result<Vec<Contest>> {
    let rows = read_rows(
        conn,
        "SELECT contest_id, date, ball_1, ball_2, ball_3, ball_4, ball_5, ball_6
         FROM contests ORDER BY contest_id DESC LIMIT ?1",
        [limit],
    )?;
    let mut contests = Vec::with_capacity(rows.len());
    for (id, date, raw) in rows {
        let Some(draw) = Draw::from_raw(&raw) else {
            log::warn!("Concours {} ignoré : tirage invalide {:?}", id, raw);
            continue;
        };
        contests.push(Contest {
            id,
            date,
            draw,
            prizes: fetch_prizes(conn, id)?,
        });
    }
    Ok(contests)
}

/// Loads the whole history. Prize tiers are left out; use `fetch_last_contests` for those.
pub fn load_dataset(conn: &Connection) -> Result<HistoricalDataset> {
    let rows = read_rows(
        conn,
        "SELECT contest_id, date, ball_1, ball_2, ball_3, ball_4, ball_5, ball_6
         FROM contests ORDER BY contest_id",
        [],
    )?;
    let mut dataset = HistoricalDataset::new();
    for (id, date, raw) in rows {
        match Draw::from_raw(&raw) {
            Some(draw) => dataset.insert(Contest {
                id,
                date,
                draw,
                prizes: Vec::new(),
            }),
            None => {
                log::warn!("Concours {} ignoré : tirage invalide {:?}", id, raw);
                dataset.mark_rejected();
            }
        }
    }
    log::debug!("{} concours chargés ({} rejetés)", dataset.len(), dataset.rejected());
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_contest(id: u32, date: Option<&str>, numbers: [u8; 6]) -> Contest {
        Contest {
            id,
            date: date.map(str::to_string),
            draw: Draw::new(&numbers).unwrap(),
            prizes: Vec::new(),
        }
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_upsert_and_count() {
        let conn = memory_db();
        assert_eq!(count_contests(&conn).unwrap(), 0);

        let inserted = upsert_contest(&conn, &test_contest(1, None, [1, 2, 3, 4, 5, 6])).unwrap();
        assert!(inserted);
        assert_eq!(count_contests(&conn).unwrap(), 1);
    }

    #[test]
    fn test_upsert_replaces() {
        let conn = memory_db();
        upsert_contest(&conn, &test_contest(1, None, [1, 2, 3, 4, 5, 6])).unwrap();
        let inserted =
            upsert_contest(&conn, &test_contest(1, Some("1996-03-11"), [4, 5, 30, 33, 41, 52])).unwrap();
        assert!(!inserted);
        assert_eq!(count_contests(&conn).unwrap(), 1);

        let contests = fetch_last_contests(&conn, 10).unwrap();
        assert_eq!(contests[0].draw.numbers(), &[4, 5, 30, 33, 41, 52]);
        assert_eq!(contests[0].date.as_deref(), Some("1996-03-11"));
    }

    #[test]
    fn test_upsert_keeps_date_and_prizes() {
        let conn = memory_db();
        let mut contest = test_contest(2, Some("1996-03-18"), [9, 37, 39, 41, 43, 49]);
        contest.prizes = vec![PrizeTier {
            tier: "Sena".to_string(),
            winners: Some(1),
            prize: Some(2_307_162.23),
        }];
        upsert_contest(&conn, &contest).unwrap();

        let inserted = upsert_contest(&conn, &test_contest(2, None, [9, 37, 39, 41, 43, 49])).unwrap();
        assert!(!inserted);

        let fetched = fetch_last_contests(&conn, 1).unwrap();
        assert_eq!(fetched[0].date.as_deref(), Some("1996-03-18"));
        assert_eq!(fetched[0].prizes, contest.prizes);

        let mut replaced = test_contest(2, None, [9, 37, 39, 41, 43, 49]);
        replaced.prizes = vec![PrizeTier { tier: "Quina".to_string(), winners: Some(4), prize: None }];
        upsert_contest(&conn, &replaced).unwrap();
        let fetched = fetch_last_contests(&conn, 1).unwrap();
        assert_eq!(fetched[0].prizes, replaced.prizes);
        assert_eq!(fetched[0].date.as_deref(), Some("1996-03-18"));
    }

    #[test]
    fn test_fetch_order() {
        let conn = memory_db();
        upsert_contest(&conn, &test_contest(3, None, [1, 2, 3, 4, 5, 6])).unwrap();
        upsert_contest(&conn, &test_contest(1, None, [1, 2, 3, 4, 5, 6])).unwrap();
        upsert_contest(&conn, &test_contest(2, None, [1, 2, 3, 4, 5, 6])).unwrap();

        let contests = fetch_last_contests(&conn, 2).unwrap();
        assert_eq!(contests.len(), 2);
        assert_eq!(contests[0].id, 3);
        assert_eq!(contests[1].id, 2);
    }

    #[test]
    fn test_prize_tiers_roundtrip() {
        let conn = memory_db();
        let mut contest = test_contest(10, Some("2024-01-02"), [7, 8, 9, 10, 11, 12]);
        contest.prizes = vec![
            PrizeTier { tier: "Sena".to_string(), winners: Some(0), prize: None },
            PrizeTier { tier: "Quina".to_string(), winners: Some(52), prize: Some(43_245.1) },
        ];
        upsert_contest(&conn, &contest).unwrap();

        let fetched = fetch_last_contests(&conn, 1).unwrap();
        assert_eq!(fetched[0].prizes, contest.prizes);
    }

    #[test]
    fn test_load_dataset_skips_invalid_rows() {
        let conn = memory_db();
        upsert_contest(&conn, &test_contest(1, None, [1, 2, 3, 4, 5, 6])).unwrap();
        conn.execute(
            "INSERT INTO contests (contest_id, date, ball_1, ball_2, ball_3, ball_4, ball_5, ball_6)
             VALUES (2, NULL, 1, 1, 3, 4, 5, 99)",
            [],
        ).unwrap();

        upsert_contest(&conn, &test_contest(3, Some("1996-03-25"), [7, 8, 9, 10, 11, 12])).unwrap();

        let dataset = load_dataset(&conn).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rejected(), 1);
        assert_eq!(dataset.latest().map(|c| c.id), Some(3));
    }
}
