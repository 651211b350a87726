use crate::markup::{Markup, NBSP};
use crate::reference::ComicReference;

/// The comic whose table is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentComic<'a> {
    pub abbreviation: &'a str,
    pub appendix: &'a str,
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    order: usize,
    linked: bool,
}

/// Link every reference token found in `display` to its target row.
///
/// Matches are computed against the original string only. Overlapping
/// matches resolve leftmost first, then longest, then linked before
/// suppressed, then in reference order. With `suppress_self_link`, a
/// reference back to `current` stays plain text but still claims its span.
pub fn resolve_links(
    display: &str,
    refs: &[ComicReference],
    current: CurrentComic<'_>,
    figure_id: i64,
    suppress_self_link: bool,
) -> String {
    if display.is_empty() {
        return NBSP.to_string();
    }

    let mut spans = Vec::new();
    for (order, reference) in refs.iter().enumerate() {
        if reference.token.is_empty() {
            continue;
        }
        let is_self = reference.token == current.abbreviation
            && reference.target_appendix == current.appendix;
        let linked = !(suppress_self_link && is_self);
        for (start, matched) in display.match_indices(reference.token.as_str()) {
            spans.push(Span {
                start,
                end: start + matched.len(),
                order,
                linked,
            });
        }
    }
    spans.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.end.cmp(&a.end))
            .then(b.linked.cmp(&a.linked))
            .then(a.order.cmp(&b.order))
    });

    let mut markup = Markup::new();
    let mut cursor = 0usize;
    for span in spans {
        if span.start < cursor {
            continue;
        }
        markup.text(&display[cursor..span.start]);
        let reference = &refs[span.order];
        if span.linked {
            markup.link(&target_href(reference, figure_id), &reference.token);
        } else {
            markup.text(&reference.token);
        }
        cursor = span.end;
    }
    markup.text(&display[cursor..]);
    markup.finish()
}

/// `?comic=<id>#<appendix><figureId>`, matching the row ids of the target table.
pub fn target_href(reference: &ComicReference, figure_id: i64) -> String {
    format!(
        "?comic={}#{}{}",
        reference.target_comic_id, reference.target_appendix, figure_id
    )
}
