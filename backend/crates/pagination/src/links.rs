//! JSON:API pagination links.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::PageInfo;

/// Query parameter carrying the 1-based page number.
pub const PAGE_NUMBER_PARAM: &str = "page[number]";
/// Query parameter carrying the page size.
pub const PAGE_SIZE_PARAM: &str = "page[size]";

/// Return whether a query parameter name belongs to the pagination family.
#[must_use]
pub fn is_page_param(name: &str) -> bool {
    name == PAGE_NUMBER_PARAM || name == PAGE_SIZE_PARAM
}

/// The `links` member of a paginated collection document.
///
/// `prev` and `next` serialize as `null` at the respective boundary so
/// clients can rely on the keys being present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    /// Link to page one.
    pub first: String,
    /// Link to the final page.
    pub last: String,
    /// Link to the preceding page, if any.
    pub prev: Option<String>,
    /// Link to the following page, if any.
    pub next: Option<String>,
}

impl PageLinks {
    /// Build links for `info`, rooted at `base`.
    ///
    /// Every non-pagination parameter in `params` is preserved in its
    /// original order; `page[size]` and `page[number]` are appended last.
    /// Past the final page, `prev` points at the final page.
    /// Any query string already present on `base` is discarded.
    #[must_use]
    pub fn build<'a, I>(base: &Url, params: I, info: &PageInfo) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let preserved: Vec<(&str, &str)> = params
            .into_iter()
            .filter(|(name, _)| !is_page_param(name))
            .collect();
        let size = info.request().size();
        let number = info.request().number();
        let last = info.last_page();
        let link = |page: u32| page_link(base, &preserved, size, page);

        Self {
            first: link(1),
            last: link(last),
            prev: info
                .has_previous()
                .then(|| link(number.saturating_sub(1).min(last))),
            next: info.has_next().then(|| link(number.saturating_add(1))),
        }
    }
}

fn page_link(base: &Url, preserved: &[(&str, &str)], size: u32, number: u32) -> String {
    let mut url = base.clone();
    url.set_query(None);
    url.query_pairs_mut()
        .extend_pairs(preserved.iter().copied())
        .append_pair(PAGE_SIZE_PARAM, &size.to_string())
        .append_pair(PAGE_NUMBER_PARAM, &number.to_string());
    url.into()
}
