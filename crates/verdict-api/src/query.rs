//! Shared list-window query parameters. Pagination proper is out of scope;
//! these are simple windows with a capped page size.

use serde::Deserialize;

pub(crate) const MAX_LIMIT: u32 = 200;

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

/// Page window plus a case-insensitive name/username substring search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}
