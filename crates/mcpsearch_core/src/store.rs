use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params_from_iter};
use tracing::debug;

use crate::gateway::{LookupError, LookupGateway};
use crate::model::{AppearanceRow, ComicTitle, Figure};

/// Tables read by [`SqliteGateway`]. Column names follow the exported
/// chronology data.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS mcp_figures (
    figid INTEGER NOT NULL,
    name TEXT NOT NULL,
    race TEXT,
    search_name TEXT,
    link TEXT NOT NULL,
    dimension TEXT NOT NULL DEFAULT 'standard',
    chronolist TEXT
);
CREATE INDEX IF NOT EXISTS idx_mcp_figures_figid ON mcp_figures(figid);
CREATE INDEX IF NOT EXISTS idx_mcp_figures_name ON mcp_figures(name, search_name);

CREATE TABLE IF NOT EXISTS mcp_comics (
    comicid INTEGER NOT NULL,
    abbreviation TEXT NOT NULL,
    appendix TEXT NOT NULL DEFAULT '',
    figid INTEGER NOT NULL,
    entry_index INTEGER NOT NULL,
    current_raw TEXT,
    current_comics TEXT,
    next_raw TEXT,
    next_comics TEXT,
    previous_raw TEXT,
    previous_comics TEXT
);
CREATE INDEX IF NOT EXISTS idx_mcp_comics_comicid ON mcp_comics(comicid);
CREATE INDEX IF NOT EXISTS idx_mcp_comics_abbreviation ON mcp_comics(abbreviation);
CREATE INDEX IF NOT EXISTS idx_mcp_comics_figure ON mcp_comics(figid, entry_index);

CREATE TABLE IF NOT EXISTS mcp_comics_fullname (
    comicid INTEGER NOT NULL,
    full_name TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_mcp_comics_fullname_comicid ON mcp_comics_fullname(comicid);
"#;

const APPEARANCE_COLUMNS: &str = "comicid, abbreviation, appendix, figid, entry_index,
     previous_raw, current_raw, next_raw, previous_comics, current_comics, next_comics";

/// SQL function lowercasing text with Unicode rules; `LIKE` only folds ASCII.
const FOLD_CASE_FUNCTION: &str = "mcp_fold_case";

/// Largest number of ids bound into one `IN (...)` clause.
const MAX_BATCH: usize = 500;

/// Create the chronology tables on an empty database.
pub fn initialize_schema(connection: &Connection) -> Result<(), LookupError> {
    connection
        .execute_batch(SCHEMA_SQL)
        .map_err(|error| LookupError::query("failed to initialize schema", error))
}

#[derive(Debug)]
pub struct SqliteGateway {
    connection: Connection,
}

impl SqliteGateway {
    /// Open an existing database read-only.
    pub fn open(db_path: &Path) -> Result<Self, LookupError> {
        if !db_path.exists() {
            return Err(LookupError::Connection(format!(
                "database not found at {}",
                db_path.display()
            )));
        }
        let connection = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|error| {
            LookupError::Connection(format!("failed to open {}: {error}", db_path.display()))
        })?;
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|error| {
                LookupError::Connection(format!("failed to set sqlite busy timeout: {error}"))
            })?;
        Self::from_connection(connection)
    }

    pub fn from_connection(connection: Connection) -> Result<Self, LookupError> {
        register_fold_case(&connection)?;
        Ok(Self { connection })
    }

    fn query_appearances(
        &self,
        filter: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<Vec<AppearanceRow>, LookupError> {
        let sql = format!(
            "SELECT {APPEARANCE_COLUMNS}
             FROM mcp_comics
             WHERE {filter} = ?1
             ORDER BY appendix, figid, entry_index"
        );
        let mut statement = self
            .connection
            .prepare(&sql)
            .map_err(|error| LookupError::query("failed to prepare appearance query", error))?;
        let rows = statement
            .query_map([value], appearance_from_row)
            .map_err(|error| LookupError::query("failed to run appearance query", error))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(
                row.map_err(|error| LookupError::query("failed to decode appearance row", error))?,
            );
        }
        debug!(filter, rows = out.len(), "fetched appearances");
        Ok(out)
    }
}

impl LookupGateway for SqliteGateway {
    fn appearances_by_abbreviation(
        &self,
        abbreviation: &str,
    ) -> Result<Vec<AppearanceRow>, LookupError> {
        self.query_appearances("abbreviation", &abbreviation)
    }

    fn appearances_by_comic_id(&self, comic_id: i64) -> Result<Vec<AppearanceRow>, LookupError> {
        self.query_appearances("comicid", &comic_id)
    }

    fn figures_by_name_substring(&self, text: &str) -> Result<Vec<Figure>, LookupError> {
        let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
        let mut statement = self
            .connection
            .prepare(
                "SELECT name, link, dimension
                 FROM mcp_figures
                 WHERE mcp_fold_case(search_name) LIKE ?1 ESCAPE '\\'
                    OR mcp_fold_case(name) LIKE ?1 ESCAPE '\\'
                 ORDER BY name ASC, figid ASC",
            )
            .map_err(|error| LookupError::query("failed to prepare figure search", error))?;
        let rows = statement
            .query_map([pattern], figure_from_row)
            .map_err(|error| LookupError::query("failed to run figure search", error))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|error| LookupError::query("failed to decode figure row", error))?);
        }
        Ok(out)
    }

    fn figure_by_id(&self, figure_id: i64) -> Result<Option<Figure>, LookupError> {
        self.connection
            .query_row(
                "SELECT name, link, dimension FROM mcp_figures WHERE figid = ?1 LIMIT 1",
                [figure_id],
                figure_from_row,
            )
            .optional()
            .map_err(|error| LookupError::query("failed to look up figure", error))
    }

    fn comic_title(&self, comic_id: i64) -> Result<Option<ComicTitle>, LookupError> {
        self.connection
            .query_row(
                "SELECT full_name FROM mcp_comics_fullname WHERE comicid = ?1 LIMIT 1",
                [comic_id],
                |row| {
                    Ok(ComicTitle {
                        full_name: row.get(0)?,
                    })
                },
            )
            .optional()
            .map_err(|error| LookupError::query("failed to look up comic title", error))
    }

    fn figure_chronology(&self, figure_id: i64) -> Result<Option<String>, LookupError> {
        let chronology: Option<Option<String>> = self
            .connection
            .query_row(
                "SELECT chronolist FROM mcp_figures WHERE figid = ?1 LIMIT 1",
                [figure_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|error| LookupError::query("failed to look up chronology", error))?;
        Ok(chronology.flatten())
    }

    fn comic_abbreviations(&self) -> Result<Vec<String>, LookupError> {
        let mut statement = self
            .connection
            .prepare("SELECT DISTINCT abbreviation FROM mcp_comics")
            .map_err(|error| LookupError::query("failed to prepare abbreviation query", error))?;
        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|error| LookupError::query("failed to run abbreviation query", error))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(
                row.map_err(|error| LookupError::query("failed to decode abbreviation", error))?,
            );
        }
        Ok(out)
    }

    fn figures_by_ids(&self, figure_ids: &[i64]) -> Result<HashMap<i64, Figure>, LookupError> {
        let mut out = HashMap::new();
        for chunk in figure_ids.chunks(MAX_BATCH) {
            let sql = format!(
                "SELECT figid, name, link, dimension FROM mcp_figures WHERE figid IN ({})",
                placeholders(chunk.len())
            );
            let mut statement = self
                .connection
                .prepare(&sql)
                .map_err(|error| LookupError::query("failed to prepare figure batch", error))?;
            let rows = statement
                .query_map(params_from_iter(chunk.iter()), |row| {
                    let figure_id: i64 = row.get(0)?;
                    Ok((
                        figure_id,
                        Figure {
                            name: row.get(1)?,
                            link: row.get(2)?,
                            dimension: row.get(3)?,
                        },
                    ))
                })
                .map_err(|error| LookupError::query("failed to run figure batch", error))?;
            for row in rows {
                let (figure_id, figure) = row
                    .map_err(|error| LookupError::query("failed to decode figure row", error))?;
                out.entry(figure_id).or_insert(figure);
            }
        }
        debug!(requested = figure_ids.len(), found = out.len(), "fetched figure batch");
        Ok(out)
    }

    fn comic_titles(&self, comic_ids: &[i64]) -> Result<HashMap<i64, ComicTitle>, LookupError> {
        let mut out = HashMap::new();
        for chunk in comic_ids.chunks(MAX_BATCH) {
            let sql = format!(
                "SELECT comicid, full_name FROM mcp_comics_fullname WHERE comicid IN ({})",
                placeholders(chunk.len())
            );
            let mut statement = self
                .connection
                .prepare(&sql)
                .map_err(|error| LookupError::query("failed to prepare title batch", error))?;
            let rows = statement
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|error| LookupError::query("failed to run title batch", error))?;
            for row in rows {
                let (comic_id, full_name) = row
                    .map_err(|error| LookupError::query("failed to decode title row", error))?;
                out.entry(comic_id).or_insert(ComicTitle { full_name });
            }
        }
        Ok(out)
    }
}

fn register_fold_case(connection: &Connection) -> Result<(), LookupError> {
    connection
        .create_scalar_function(
            FOLD_CASE_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |context| {
                let value: Option<String> = context.get(0)?;
                Ok(value.map(|value| value.to_lowercase()))
            },
        )
        .map_err(|error| {
            LookupError::Connection(format!("failed to register {FOLD_CASE_FUNCTION}: {error}"))
        })
}

fn appearance_from_row(row: &Row<'_>) -> rusqlite::Result<AppearanceRow> {
    let text = |index: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(index)?.unwrap_or_default())
    };
    Ok(AppearanceRow {
        comic_id: row.get(0)?,
        abbreviation: text(1)?,
        appendix: text(2)?,
        figure_id: row.get(3)?,
        entry_index: row.get(4)?,
        previous_raw: text(5)?,
        current_raw: text(6)?,
        next_raw: text(7)?,
        previous_refs: text(8)?,
        current_refs: text(9)?,
        next_refs: text(10)?,
    })
}

fn figure_from_row(row: &Row<'_>) -> rusqlite::Result<Figure> {
    Ok(Figure {
        name: row.get(0)?,
        link: row.get(1)?,
        dimension: row.get(2)?,
    })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Insert helpers for fixtures in tests across the workspace.
#[doc(hidden)]
pub mod fixtures {
    use rusqlite::{Connection, params};

    use crate::model::AppearanceRow;

    pub fn insert_appearance(connection: &Connection, row: &AppearanceRow) -> rusqlite::Result<()> {
        connection
            .execute(
                "INSERT INTO mcp_comics (
                    comicid, abbreviation, appendix, figid, entry_index,
                    current_raw, current_comics, next_raw, next_comics,
                    previous_raw, previous_comics
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    row.comic_id,
                    row.abbreviation,
                    row.appendix,
                    row.figure_id,
                    row.entry_index,
                    row.current_raw,
                    row.current_refs,
                    row.next_raw,
                    row.next_refs,
                    row.previous_raw,
                    row.previous_refs,
                ],
            )
            .map(|_| ())
    }

    pub fn insert_figure(
        connection: &Connection,
        figure_id: i64,
        name: &str,
        search_name: &str,
        link: &str,
        dimension: &str,
        chronology: Option<&str>,
    ) -> rusqlite::Result<()> {
        connection
            .execute(
                "INSERT INTO mcp_figures (figid, name, race, search_name, link, dimension, chronolist)
                 VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6)",
                params![figure_id, name, search_name, link, dimension, chronology],
            )
            .map(|_| ())
    }

    pub fn insert_title(connection: &Connection, comic_id: i64, full_name: &str) -> rusqlite::Result<()> {
        connection
            .execute(
                "INSERT INTO mcp_comics_fullname (comicid, full_name) VALUES (?1, ?2)",
                params![comic_id, full_name],
            )
            .map(|_| ())
    }
}
