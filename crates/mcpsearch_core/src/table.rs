use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::gateway::{LookupError, LookupGateway};
use crate::grouping::{GroupEvent, RowGrouper};
use crate::links::{CurrentComic, resolve_links};
use crate::markup::{Markup, NBSP};
use crate::model::{AppearanceRow, Figure};
use crate::reference::parse_references_lenient;

pub const ROW_CLASS: &str = "figrow";
pub const STRIPED_ROW_CLASS: &str = "color_row figrow";
pub const GROUP_HEADER_CLASS: &str = "comic_title_row";

const TABLE_OPEN: &str = "<table class=\"comictable\" cellspacing=\"0\" cellpadding=\"4\">\
<tr><th></th><th>Previous</th><th colspan=\"2\">Current</th><th>Next</th></tr>";
const SPACER_ROW: &str = "<tr class=\"space_row\"><td colspan=\"5\">&nbsp;</td></tr>";
pub const COMIC_NOT_FOUND: &str = "<table><tr><td>Could not find the comic.</td></tr></table>";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Prefetch figures and comic titles with one query each instead of per row.
    pub batch_lookups: bool,
}

/// Render the appearance table for a stream sorted by appendix, figure id
/// and entry index. The fragment is returned only if every lookup succeeds.
pub fn render_comic_table<G>(
    gateway: &G,
    rows: &[AppearanceRow],
    options: RenderOptions,
) -> Result<String, LookupError>
where
    G: LookupGateway + ?Sized,
{
    debug!(
        rows = rows.len(),
        batched = options.batch_lookups,
        "rendering comic table"
    );
    if rows.is_empty() {
        return Ok(COMIC_NOT_FOUND.to_string());
    }

    let mut lookups = Lookups::new(gateway, rows, options)?;
    let mut grouper = RowGrouper::new();
    let mut markup = Markup::new();
    let mut first_comic_id = None;

    for row in rows {
        for event in grouper.push(&row.appendix) {
            match event {
                GroupEvent::OpenTable => {
                    first_comic_id = Some(row.comic_id);
                    if let Some(title) = lookups.title(row.comic_id)? {
                        markup.raw("<b>").text(&title).raw("</b>");
                    }
                    markup.raw(TABLE_OPEN);
                }
                GroupEvent::Separator => {
                    markup.raw(SPACER_ROW);
                }
                GroupEvent::GroupHeader => {
                    let title = if first_comic_id == Some(row.comic_id) {
                        None
                    } else {
                        lookups.title(row.comic_id)?
                    };
                    render_group_header(&mut markup, row, title.as_deref());
                }
                GroupEvent::DataRow { striped } => {
                    let figure = lookups.figure(row.figure_id)?;
                    render_data_row(&mut markup, row, figure.as_ref(), striped);
                }
                GroupEvent::NotFound | GroupEvent::CloseTable => {}
            }
        }
    }

    match grouper.finish() {
        Some(GroupEvent::NotFound) => Ok(COMIC_NOT_FOUND.to_string()),
        _ => {
            markup.raw("</table>");
            Ok(markup.finish())
        }
    }
}

/// `<a href=link>label</a>`, the label annotated with a non-standard dimension.
pub fn figure_link(figure: &Figure) -> String {
    let mut markup = Markup::new();
    markup.link(&figure.link, &figure.label());
    markup.finish()
}

fn render_group_header(markup: &mut Markup, row: &AppearanceRow, title: Option<&str>) {
    markup
        .open_row(&row.appendix, GROUP_HEADER_CLASS)
        .raw("<td><b>")
        .text(&row.abbreviation)
        .raw(" ")
        .text(&row.appendix)
        .raw("</b></td><td colspan=\"4\">");
    match title {
        Some(title) => markup.text(title),
        None => markup.raw(NBSP),
    };
    markup.raw("</td></tr>");
}

fn render_data_row(
    markup: &mut Markup,
    row: &AppearanceRow,
    figure: Option<&Figure>,
    striped: bool,
) {
    let class = if striped { STRIPED_ROW_CLASS } else { ROW_CLASS };
    let current = CurrentComic {
        abbreviation: &row.abbreviation,
        appendix: &row.appendix,
    };
    let column = |raw: &str, refs: &str, suppress_self_link: bool| {
        resolve_links(
            raw,
            &parse_references_lenient(refs),
            current,
            row.figure_id,
            suppress_self_link,
        )
    };

    markup.open_row(&row.anchor_id(), class);
    match figure {
        Some(figure) => markup.cell(&figure_link(figure)),
        None => markup.cell(NBSP),
    };
    markup
        .cell(&column(&row.previous_raw, &row.previous_refs, false))
        .raw("<td align=\"right\">")
        .raw(&row.entry_index.saturating_add(1).to_string())
        .raw("</td>")
        .cell(&column(&row.current_raw, &row.current_refs, true))
        .cell(&column(&row.next_raw, &row.next_refs, false))
        .raw("</tr>");
}

/// Figure and title lookups for one render pass.
struct Lookups<'g, G: ?Sized> {
    gateway: &'g G,
    prefetched_figures: Option<HashMap<i64, Figure>>,
    titles: HashMap<i64, Option<String>>,
}

impl<'g, G> Lookups<'g, G>
where
    G: LookupGateway + ?Sized,
{
    fn new(
        gateway: &'g G,
        rows: &[AppearanceRow],
        options: RenderOptions,
    ) -> Result<Self, LookupError> {
        if !options.batch_lookups {
            return Ok(Self {
                gateway,
                prefetched_figures: None,
                titles: HashMap::new(),
            });
        }

        let figure_ids: Vec<i64> = distinct(rows.iter().map(|row| row.figure_id));
        let comic_ids: Vec<i64> = distinct(rows.iter().map(|row| row.comic_id));
        let figures = gateway.figures_by_ids(&figure_ids)?;
        let mut found_titles = gateway.comic_titles(&comic_ids)?;
        let titles = comic_ids
            .iter()
            .map(|id| (*id, found_titles.remove(id).map(|title| title.full_name)))
            .collect();
        Ok(Self {
            gateway,
            prefetched_figures: Some(figures),
            titles,
        })
    }

    fn figure(&self, figure_id: i64) -> Result<Option<Figure>, LookupError> {
        match &self.prefetched_figures {
            Some(figures) => Ok(figures.get(&figure_id).cloned()),
            None => self.gateway.figure_by_id(figure_id),
        }
    }

    fn title(&mut self, comic_id: i64) -> Result<Option<String>, LookupError> {
        if let Some(cached) = self.titles.get(&comic_id) {
            return Ok(cached.clone());
        }
        let title = self
            .gateway
            .comic_title(comic_id)?
            .map(|title| title.full_name);
        self.titles.insert(comic_id, title.clone());
        Ok(title)
    }
}

fn distinct(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::{COMIC_NOT_FOUND, RenderOptions, render_comic_table};
    use crate::gateway::testing::RecordingGateway;
    use crate::model::{AppearanceRow, sample_row};

    const PER_ROW: RenderOptions = RenderOptions {
        batch_lookups: false,
    };
    const BATCHED: RenderOptions = RenderOptions {
        batch_lookups: true,
    };

    fn linked_row() -> AppearanceRow {
        AppearanceRow {
            previous_raw: "IM 72".to_string(),
            previous_refs: "IM 72|11|".to_string(),
            current_raw: "IM 73".to_string(),
            current_refs: "IM 73|12|".to_string(),
            next_raw: "IM 74-FB".to_string(),
            next_refs: "IM 74|13|-FB".to_string(),
            ..sample_row(12, "", 7, 4)
        }
    }

    #[test]
    fn zero_rows_render_not_found_without_lookups() {
        let gateway = RecordingGateway::default();
        let html = render_comic_table(&gateway, &[], PER_ROW).expect("render");
        assert_eq!(html, COMIC_NOT_FOUND);
        assert!(!html.contains("<th>"));
        assert!(gateway.calls.borrow().is_empty());

        let html = render_comic_table(&gateway, &[], BATCHED).expect("render");
        assert_eq!(html, COMIC_NOT_FOUND);
        assert!(gateway.calls.borrow().is_empty());
    }

    #[test]
    fn same_group_rows_look_up_title_once_and_figures_per_row() {
        let rows = vec![sample_row(12, "", 7, 0), sample_row(12, "", 8, 3)];
        let gateway = RecordingGateway::with_rows(rows.clone())
            .figure(7, "IRON MAN", "standard")
            .figure(8, "JARVIS", "standard")
            .title(12, "IRON MAN 73");

        let html = render_comic_table(&gateway, &rows, PER_ROW).expect("render");

        assert_eq!(gateway.count("comic_title"), 1);
        assert_eq!(gateway.count("figure_by_id"), 2);
        assert_eq!(html.matches("class=\"comic_title_row\"").count(), 1);
        assert_eq!(html.matches("class=\"space_row\"").count(), 0);
        assert_eq!(html.matches("<tr id=\"7\" class=\"figrow\">").count(), 1);
        assert_eq!(
            html.matches("<tr id=\"8\" class=\"color_row figrow\">").count(),
            1
        );
        assert!(html.starts_with("<b>IRON MAN 73</b><table class=\"comictable\""));
        assert!(html.ends_with("</table>"));
    }

    #[test]
    fn renders_full_row_markup() {
        let rows = vec![linked_row()];
        let gateway = RecordingGateway::with_rows(rows.clone())
            .figure(7, "IRON MAN", "Ultimate Universe")
            .title(12, "IRON MAN 73");

        let html = render_comic_table(&gateway, &rows, PER_ROW).expect("render");
        let expected = concat!(
            "<b>IRON MAN 73</b>",
            "<table class=\"comictable\" cellspacing=\"0\" cellpadding=\"4\">",
            "<tr><th></th><th>Previous</th><th colspan=\"2\">Current</th><th>Next</th></tr>",
            "<tr id=\"\" class=\"comic_title_row\"><td><b>IM 73 </b></td><td colspan=\"4\">&nbsp;</td></tr>",
            "<tr id=\"7\" class=\"figrow\">",
            "<td><a href=\"figs.php#7\">IRON MAN (Ultimate Universe)</a></td>",
            "<td><a href=\"?comic=11#7\">IM 72</a></td>",
            "<td align=\"right\">5</td>",
            "<td>IM 73</td>",
            "<td><a href=\"?comic=13#-FB7\">IM 74</a>-FB</td>",
            "</tr></table>",
        );
        assert_eq!(html, expected);
    }

    #[test]
    fn appendix_change_adds_separator_and_restarts_striping() {
        let rows = vec![
            sample_row(12, "", 1, 0),
            sample_row(12, "", 2, 0),
            sample_row(12, "-FB", 1, 1),
            sample_row(12, "-FB", 2, 1),
        ];
        let gateway = RecordingGateway::with_rows(rows.clone())
            .figure(1, "A", "standard")
            .figure(2, "B", "standard");

        let html = render_comic_table(&gateway, &rows, PER_ROW).expect("render");
        assert_eq!(html.matches("class=\"space_row\"").count(), 1);
        assert!(html.contains("<tr id=\"-FB\" class=\"comic_title_row\">"));
        assert!(html.contains("<tr id=\"-FB1\" class=\"figrow\">"));
        assert!(html.contains("<tr id=\"-FB2\" class=\"color_row figrow\">"));
        assert!(!html.starts_with("<b>"));
    }

    #[test]
    fn missing_figure_keeps_column_count() {
        let rows = vec![sample_row(12, "", 99, 0)];
        let gateway = RecordingGateway::with_rows(rows.clone());
        let html = render_comic_table(&gateway, &rows, PER_ROW).expect("render");
        assert!(html.contains("<tr id=\"99\" class=\"figrow\"><td>&nbsp;</td><td>&nbsp;</td>"));
    }

    #[test]
    fn entry_position_saturates_at_the_largest_index() {
        let rows = vec![sample_row(12, "", 7, i64::MAX)];
        let gateway = RecordingGateway::with_rows(rows.clone());
        let html = render_comic_table(&gateway, &rows, PER_ROW).expect("render");
        assert!(html.contains(&format!("<td align=\"right\">{}</td>", i64::MAX)));
    }

    #[test]
    fn other_comic_groups_show_their_own_title() {
        let rows = vec![sample_row(12, "", 1, 0), sample_row(30, "-FB", 1, 1)];
        let gateway = RecordingGateway::with_rows(rows.clone())
            .title(12, "IRON MAN 73")
            .title(30, "IRON MAN ANNUAL 3");
        let html = render_comic_table(&gateway, &rows, PER_ROW).expect("render");
        assert!(html.contains("<td colspan=\"4\">IRON MAN ANNUAL 3</td>"));
        assert_eq!(gateway.count("comic_title"), 2);
    }

    #[test]
    fn batched_lookups_render_identical_markup() {
        let rows = vec![
            linked_row(),
            sample_row(12, "", 8, 2),
            sample_row(12, "-BTS", 7, 5),
        ];
        let gateway = RecordingGateway::with_rows(rows.clone())
            .figure(7, "IRON MAN", "standard")
            .figure(8, "JARVIS", "standard")
            .title(12, "IRON MAN 73");

        let per_row = render_comic_table(&gateway, &rows, PER_ROW).expect("per row");
        gateway.calls.borrow_mut().clear();
        let batched = render_comic_table(&gateway, &rows, BATCHED).expect("batched");

        assert_eq!(per_row, batched);
        assert_eq!(gateway.count("figures_by_ids"), 1);
        assert_eq!(gateway.count("comic_titles"), 1);
        assert_eq!(gateway.count("figure_by_id"), 0);
        assert_eq!(gateway.count("comic_title"), 0);
    }

    #[test]
    fn malformed_reference_entry_only_drops_its_link() {
        let row = AppearanceRow {
            next_raw: "IM 74, IM 75".to_string(),
            next_refs: "IM 74|13#IM 75|14|".to_string(),
            ..sample_row(12, "", 7, 0)
        };
        let gateway = RecordingGateway::with_rows(vec![row.clone()]);
        let html = render_comic_table(&gateway, &[row], PER_ROW).expect("render");
        assert!(html.contains("<td>IM 74, <a href=\"?comic=14#7\">IM 75</a></td>"));
    }

    #[test]
    fn gateway_failure_returns_no_fragment() {
        let rows = vec![sample_row(12, "", 7, 0)];
        let mut gateway = RecordingGateway::with_rows(rows.clone());
        gateway.fail_queries = true;
        let error = render_comic_table(&gateway, &rows, PER_ROW).expect_err("must fail");
        assert!(error.to_string().contains("store query failed"));
    }
}
