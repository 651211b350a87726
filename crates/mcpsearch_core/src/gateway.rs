use std::collections::HashMap;
use std::fmt;

use crate::model::{AppearanceRow, ComicTitle, Figure};

/// Failure of a gateway read. Either kind aborts the request.
#[derive(Debug)]
pub enum LookupError {
    Connection(String),
    Query(String),
}

impl LookupError {
    pub fn query(context: &str, error: impl fmt::Display) -> Self {
        LookupError::Query(format!("{context}: {error}"))
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::Connection(message) => write!(f, "store connection failed: {message}"),
            LookupError::Query(message) => write!(f, "store query failed: {message}"),
        }
    }
}

impl std::error::Error for LookupError {}

/// Read access to the appearance, figure and comic-title stores.
///
/// Appearance queries must return rows ordered by appendix, figure id and
/// entry index.
pub trait LookupGateway {
    fn appearances_by_abbreviation(
        &self,
        abbreviation: &str,
    ) -> Result<Vec<AppearanceRow>, LookupError>;

    fn appearances_by_comic_id(&self, comic_id: i64) -> Result<Vec<AppearanceRow>, LookupError>;

    /// Case-insensitive substring match against the name and search name.
    fn figures_by_name_substring(&self, text: &str) -> Result<Vec<Figure>, LookupError>;

    fn figure_by_id(&self, figure_id: i64) -> Result<Option<Figure>, LookupError>;

    fn comic_title(&self, comic_id: i64) -> Result<Option<ComicTitle>, LookupError>;

    fn figure_chronology(&self, figure_id: i64) -> Result<Option<String>, LookupError>;

    /// Distinct comic abbreviations, in no particular order.
    fn comic_abbreviations(&self) -> Result<Vec<String>, LookupError>;

    fn figures_by_ids(&self, figure_ids: &[i64]) -> Result<HashMap<i64, Figure>, LookupError> {
        let mut out = HashMap::new();
        for &figure_id in figure_ids {
            if let Some(figure) = self.figure_by_id(figure_id)? {
                out.insert(figure_id, figure);
            }
        }
        Ok(out)
    }

    fn comic_titles(&self, comic_ids: &[i64]) -> Result<HashMap<i64, ComicTitle>, LookupError> {
        let mut out = HashMap::new();
        for &comic_id in comic_ids {
            if let Some(title) = self.comic_title(comic_id)? {
                out.insert(comic_id, title);
            }
        }
        Ok(out)
    }
}
