use std::fmt;

use serde::Serialize;
use tracing::warn;

pub const RECORD_DELIMITER: char = '#';
pub const FIELD_DELIMITER: char = '|';

/// A parsed `token|comicId|appendix` cross-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComicReference {
    pub token: String,
    pub target_comic_id: i64,
    pub target_appendix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    Malformed { entry: String, reason: &'static str },
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceError::Malformed { entry, reason } => {
                write!(f, "malformed reference `{entry}`: {reason}")
            }
        }
    }
}

impl std::error::Error for ReferenceError {}

/// Parse a `#`-joined reference list, failing on the first malformed entry.
pub fn parse_references(raw: &str) -> Result<Vec<ComicReference>, ReferenceError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(RECORD_DELIMITER).map(parse_entry).collect()
}

/// Parse a reference list entry by entry, dropping malformed entries.
pub fn parse_references_lenient(raw: &str) -> Vec<ComicReference> {
    if raw.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for entry in raw.split(RECORD_DELIMITER) {
        match parse_entry(entry) {
            Ok(reference) => out.push(reference),
            Err(error) => warn!(%error, "skipping reference entry"),
        }
    }
    out
}

pub fn parse_entry(entry: &str) -> Result<ComicReference, ReferenceError> {
    let malformed = |reason| ReferenceError::Malformed {
        entry: entry.to_string(),
        reason,
    };

    let fields: Vec<&str> = entry.split(FIELD_DELIMITER).collect();
    let [token, comic_id, appendix] = fields.as_slice() else {
        return Err(malformed("expected exactly three `|`-separated fields"));
    };
    if token.is_empty() {
        return Err(malformed("empty comic token"));
    }
    let target_comic_id = comic_id
        .trim()
        .parse::<i64>()
        .map_err(|_| malformed("comic id is not an integer"))?;

    Ok(ComicReference {
        token: (*token).to_string(),
        target_comic_id,
        target_appendix: (*appendix).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{ComicReference, ReferenceError, parse_entry, parse_references, parse_references_lenient};

    fn reference(token: &str, id: i64, appendix: &str) -> ComicReference {
        ComicReference {
            token: token.to_string(),
            target_comic_id: id,
            target_appendix: appendix.to_string(),
        }
    }

    #[test]
    fn empty_input_yields_no_references() {
        assert!(parse_references("").expect("parse").is_empty());
        assert!(parse_references_lenient("").is_empty());
    }

    #[test]
    fn entries_keep_source_order() {
        let parsed = parse_references("A|1|1#B|2|2").expect("parse");
        assert_eq!(parsed, vec![reference("A", 1, "1"), reference("B", 2, "2")]);

        let reversed = parse_references("B|2|2#A|1|1").expect("parse");
        assert_eq!(reversed, vec![reference("B", 2, "2"), reference("A", 1, "1")]);
    }

    #[test]
    fn empty_appendix_is_allowed() {
        let parsed = parse_references("IM 73|12|#IM 74|13|-FB").expect("parse");
        assert_eq!(
            parsed,
            vec![reference("IM 73", 12, ""), reference("IM 74", 13, "-FB")]
        );
    }

    #[test]
    fn sparse_entry_fails_fast() {
        let error = parse_references("A|1|1#B|2").expect_err("must fail");
        assert_eq!(
            error,
            ReferenceError::Malformed {
                entry: "B|2".to_string(),
                reason: "expected exactly three `|`-separated fields",
            }
        );
        assert!(error.to_string().contains("malformed reference `B|2`"));
    }

    #[test]
    fn extra_fields_and_bad_ids_are_malformed() {
        assert!(parse_entry("A|1|1|x").is_err());
        assert!(parse_entry("A|one|1").is_err());
        assert!(parse_entry("|1|1").is_err());
    }

    #[test]
    fn lenient_parse_drops_only_malformed_entries() {
        let parsed = parse_references_lenient("A|1|1#broken#C|3|");
        assert_eq!(parsed, vec![reference("A", 1, "1"), reference("C", 3, "")]);
    }
}
