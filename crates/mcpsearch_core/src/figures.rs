use crate::gateway::{LookupError, LookupGateway};
use crate::markup::Markup;
use crate::table::figure_link;

pub const FIGURE_NOT_FOUND: &str = "Could not find the figure.<br><p>";

/// Character search results: one figure link per line.
pub fn render_figure_search<G>(gateway: &G, text: &str) -> Result<String, LookupError>
where
    G: LookupGateway + ?Sized,
{
    let figures = gateway.figures_by_name_substring(text)?;
    let mut markup = Markup::new();
    markup.raw("<p>Results for '").text(text).raw("':</p>");
    for figure in &figures {
        markup.raw(&figure_link(figure)).raw("<br>");
    }
    Ok(markup.finish())
}

/// Figure heading followed by its chronology list, one entry per line.
pub fn render_figure_detail<G>(gateway: &G, figure_id: i64) -> Result<String, LookupError>
where
    G: LookupGateway + ?Sized,
{
    let Some(figure) = gateway.figure_by_id(figure_id)? else {
        return Ok(FIGURE_NOT_FOUND.to_string());
    };
    let chronology = gateway.figure_chronology(figure_id)?.unwrap_or_default();

    let mut markup = Markup::new();
    markup.raw("<b>").raw(&figure_link(&figure)).raw("</b><br>");
    for (index, line) in chronology
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .enumerate()
    {
        if index > 0 {
            markup.raw("<br>");
        }
        markup.text(line);
    }
    markup.raw("<p>");
    Ok(markup.finish())
}
