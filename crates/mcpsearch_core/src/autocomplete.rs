//! Prefix dictionary for the comic autocomplete widget.
//!
//! Every prefix of every comic maps to the suffixes that complete it. Keys
//! with too many completions are left out, exact matches are left out, and a
//! key that completes to as many comics as a shorter kept key redirects to
//! that shorter key.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::gateway::{LookupError, LookupGateway};

pub const DEFAULT_LIMIT: usize = 44;

static ISSUE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<abbr>.+?) (?P<nr>['-]?[.\d]*[AB]?/?\d+[AB]?)$")
        .expect("issue number pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Completion {
    Matches(Vec<String>),
    Redirect(String),
}

pub type AutocompleteDictionary = BTreeMap<String, Completion>;

/// Split `IM 73` into `("IM", Some("73"))`; comics without a number keep `None`.
pub fn split_issue_number(comic: &str) -> (&str, Option<&str>) {
    match ISSUE_NUMBER.captures(comic) {
        Some(captures) => match (captures.name("abbr"), captures.name("nr")) {
            (Some(abbr), Some(nr)) => (abbr.as_str(), Some(nr.as_str())),
            _ => (comic, None),
        },
        None => (comic, None),
    }
}

/// Sort key with the leading issue digits zero-padded to four places.
pub fn comic_sort_key(comic: &str) -> String {
    match split_issue_number(comic) {
        (abbr, Some(nr)) => {
            let base_digits = nr.chars().take_while(char::is_ascii_digit).count();
            format!("{abbr} {}{nr}", "0".repeat(4usize.saturating_sub(base_digits)))
        }
        (_, None) => comic.to_string(),
    }
}

pub fn sort_comics(comics: &mut [String]) {
    comics.sort_by_cached_key(|comic| comic_sort_key(comic));
}

pub fn build_autocomplete(comics: &[String], limit: usize) -> AutocompleteDictionary {
    let mut completions: HashMap<&str, Vec<&str>> = HashMap::new();
    for comic in comics {
        let comic = comic.trim();
        for (index, ch) in comic.char_indices() {
            let end = index + ch.len_utf8();
            completions
                .entry(&comic[..end])
                .or_default()
                .push(&comic[end..]);
        }
    }

    let mut keys: Vec<&str> = completions.keys().copied().collect();
    keys.sort_by(|a, b| {
        a.chars()
            .count()
            .cmp(&b.chars().count())
            .then_with(|| a.cmp(b))
    });

    let mut out = AutocompleteDictionary::new();
    for key in keys {
        let suffixes = &completions[key];
        if suffixes.len() > limit {
            continue;
        }
        if suffixes.len() == 1 && suffixes[0].is_empty() {
            continue;
        }
        let redirect = key
            .char_indices()
            .skip(1)
            .map(|(index, _)| &key[..index])
            .find(|prefix| {
                matches!(
                    out.get(*prefix),
                    Some(Completion::Matches(kept)) if kept.len() == suffixes.len()
                )
            });
        let completion = match redirect {
            Some(prefix) => Completion::Redirect(prefix.to_string()),
            None => Completion::Matches(suffixes.iter().map(|suffix| suffix.to_string()).collect()),
        };
        out.insert(key.to_string(), completion);
    }
    out
}

/// Dictionary over every comic abbreviation in the store.
pub fn autocomplete_from_gateway<G>(
    gateway: &G,
    limit: usize,
) -> Result<AutocompleteDictionary, LookupError>
where
    G: LookupGateway + ?Sized,
{
    let mut comics = gateway.comic_abbreviations()?;
    sort_comics(&mut comics);
    let dictionary = build_autocomplete(&comics, limit);
    debug!(comics = comics.len(), keys = dictionary.len(), "built autocomplete dictionary");
    Ok(dictionary)
}

/// `var comics = {...};` as loaded by the autocomplete widget.
pub fn render_autocomplete_script(
    dictionary: &AutocompleteDictionary,
) -> Result<String, serde_json::Error> {
    Ok(format!("var comics = {};", serde_json::to_string(dictionary)?))
}
