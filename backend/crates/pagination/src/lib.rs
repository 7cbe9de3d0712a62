//! Page-number pagination primitives for JSON:API collection endpoints.
//!
//! Collection endpoints accept `page[number]` (1-based) and `page[size]`
//! query parameters. This crate turns those raw values into a validated
//! [`PageRequest`], describes a fetched page with [`PageInfo`], and renders
//! the `first`/`last`/`prev`/`next` links of a JSON:API collection document
//! with [`PageLinks`].
//!
//! The crate is transport agnostic: it never inspects HTTP requests and only
//! depends on `url` for link construction.
//!
//! # Example
//!
//! ```
//! use pagination::{PageInfo, PageLinks, PageRequest, PageSettings};
//! use url::Url;
//!
//! let settings = PageSettings::default();
//! let request = PageRequest::parse(Some("1"), Some("5"), &settings).expect("valid page");
//! let info = PageInfo::new(request, 10);
//! let base = Url::parse("http://localhost:8080/api/v1/books").expect("valid url");
//! let links = PageLinks::build(&base, [("sort", "title")], &info);
//!
//! assert!(links.prev.is_none());
//! assert_eq!(
//!     links.next.as_deref(),
//!     Some("http://localhost:8080/api/v1/books?sort=title&page%5Bsize%5D=5&page%5Bnumber%5D=2")
//! );
//! ```

mod links;
mod page;

pub use links::{PAGE_NUMBER_PARAM, PAGE_SIZE_PARAM, PageLinks, is_page_param};
pub use page::{PageInfo, PageRequest, PageSettings, PaginationError};
