//! HTML fragment building.
//!
//! Interpolated display text always goes through [`Markup::text`] or
//! [`escape_html`]; only fixed markup is pushed raw.

/// Placeholder for empty cells.
pub const NBSP: &str = "&nbsp;";

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    escape_into(&mut out, value);
    out
}

pub fn escape_into(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

/// Buffered HTML fragment. Nothing is emitted until [`Markup::finish`].
#[derive(Debug, Default)]
pub struct Markup {
    buf: String,
}

impl Markup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&mut self, markup: &str) -> &mut Self {
        self.buf.push_str(markup);
        self
    }

    pub fn text(&mut self, value: &str) -> &mut Self {
        escape_into(&mut self.buf, value);
        self
    }

    /// `<a href="href">text</a>` with both parts escaped.
    pub fn link(&mut self, href: &str, text: &str) -> &mut Self {
        self.raw("<a href=\"").text(href).raw("\">").text(text).raw("</a>")
    }

    /// `<tr id=".." class="..">`; the id is escaped verbatim so anchors match.
    pub fn open_row(&mut self, id: &str, class: &str) -> &mut Self {
        self.raw("<tr id=\"")
            .text(id)
            .raw("\" class=\"")
            .raw(class)
            .raw("\">")
    }

    /// `<td>` wrapping already rendered cell markup.
    pub fn cell(&mut self, inner_markup: &str) -> &mut Self {
        self.raw("<td>").raw(inner_markup).raw("</td>")
    }

    pub fn finish(self) -> String {
        self.buf
    }
}
