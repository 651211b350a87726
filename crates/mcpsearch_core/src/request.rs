use std::fmt;

use serde::Deserialize;
use tracing::debug;

use crate::figures::{render_figure_detail, render_figure_search};
use crate::gateway::{LookupError, LookupGateway};
use crate::table::{RenderOptions, render_comic_table};

/// Raw query parameters of a search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LookupParams {
    pub figure: Option<String>,
    #[serde(rename = "searchForCharacters")]
    pub search_for_characters: Option<String>,
    #[serde(rename = "searchForComic")]
    pub search_for_comic: Option<String>,
    pub comic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupRequest {
    Figure(i64),
    SearchCharacters(String),
    SearchComic(String),
    Comic(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    InvalidIdentifier {
        parameter: &'static str,
        value: String,
    },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidIdentifier { parameter, value } => {
                write!(f, "`{parameter}` must be an integer identifier, got `{value}`")
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl LookupRequest {
    /// Pick one operation: `figure`, then `searchForCharacters`, then
    /// `searchForComic`, then `comic`. Blank values count as unset.
    pub fn from_params(params: &LookupParams) -> Result<Option<Self>, RequestError> {
        if let Some(value) = non_blank(&params.figure) {
            return parse_identifier("figure", value).map(|id| Some(Self::Figure(id)));
        }
        if let Some(value) = non_blank(&params.search_for_characters) {
            return Ok(Some(Self::SearchCharacters(value.to_string())));
        }
        if let Some(value) = non_blank(&params.search_for_comic) {
            return Ok(Some(Self::SearchComic(value.to_string())));
        }
        if let Some(value) = non_blank(&params.comic) {
            return parse_identifier("comic", value).map(|id| Some(Self::Comic(id)));
        }
        Ok(None)
    }
}

/// Run one lookup and return its complete fragment.
pub fn render_lookup<G>(
    gateway: &G,
    request: &LookupRequest,
    options: RenderOptions,
) -> Result<String, LookupError>
where
    G: LookupGateway + ?Sized,
{
    debug!(?request, "dispatching lookup");
    match request {
        LookupRequest::Figure(figure_id) => render_figure_detail(gateway, *figure_id),
        LookupRequest::SearchCharacters(text) => render_figure_search(gateway, text),
        LookupRequest::SearchComic(abbreviation) => {
            let rows = gateway.appearances_by_abbreviation(abbreviation)?;
            render_comic_table(gateway, &rows, options)
        }
        LookupRequest::Comic(comic_id) => {
            let rows = gateway.appearances_by_comic_id(*comic_id)?;
            render_comic_table(gateway, &rows, options)
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_identifier(parameter: &'static str, value: &str) -> Result<i64, RequestError> {
    value
        .parse::<i64>()
        .map_err(|_| RequestError::InvalidIdentifier {
            parameter,
            value: value.to_string(),
        })
}
