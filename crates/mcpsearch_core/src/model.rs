use serde::Serialize;

/// Dimension value that is rendered without annotation.
pub const STANDARD_DIMENSION: &str = "standard";

/// One character's appearance in one comic at one chronological position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppearanceRow {
    pub comic_id: i64,
    pub abbreviation: String,
    pub appendix: String,
    pub figure_id: i64,
    /// Zero-based position in the character's chronology list.
    pub entry_index: i64,
    pub previous_raw: String,
    pub current_raw: String,
    pub next_raw: String,
    pub previous_refs: String,
    pub current_refs: String,
    pub next_refs: String,
}

impl AppearanceRow {
    /// Row identifier used for anchor navigation between comic pages.
    pub fn anchor_id(&self) -> String {
        format!("{}{}", self.appendix, self.figure_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Figure {
    pub name: String,
    pub link: String,
    pub dimension: String,
}

impl Figure {
    /// Display label: `name`, or `name (dimension)` outside the standard universe.
    pub fn label(&self) -> String {
        if self.dimension == STANDARD_DIMENSION {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.dimension)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComicTitle {
    pub full_name: String,
}

#[cfg(test)]
pub(crate) fn sample_row(comic_id: i64, appendix: &str, figure_id: i64, entry_index: i64) -> AppearanceRow {
    AppearanceRow {
        comic_id,
        abbreviation: "IM 73".to_string(),
        appendix: appendix.to_string(),
        figure_id,
        entry_index,
        previous_raw: String::new(),
        current_raw: String::new(),
        next_raw: String::new(),
        previous_refs: String::new(),
        current_refs: String::new(),
        next_refs: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Figure, sample_row};

    #[test]
    fn standard_dimension_is_not_annotated() {
        let figure = Figure {
            name: "IRON MAN".to_string(),
            link: "i.php#ironman".to_string(),
            dimension: "standard".to_string(),
        };
        assert_eq!(figure.label(), "IRON MAN");
    }

    #[test]
    fn other_dimensions_are_annotated() {
        let figure = Figure {
            name: "IRON MAN".to_string(),
            link: "u.php#ironman".to_string(),
            dimension: "Ultimate Universe".to_string(),
        };
        assert_eq!(figure.label(), "IRON MAN (Ultimate Universe)");
    }

    #[test]
    fn anchor_id_concatenates_appendix_and_figure() {
        assert_eq!(sample_row(1, "-FB", 42, 0).anchor_id(), "-FB42");
        assert_eq!(sample_row(1, "", 42, 0).anchor_id(), "42");
    }
}
