//! Page requests, page settings, and fetched page descriptions.

use thiserror::Error;

const DEFAULT_PAGE_SIZE: u32 = 30;
const MAX_PAGE_SIZE: u32 = 100;

/// Errors raised while interpreting pagination input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    /// `page[number]` was not a positive integer.
    #[error("page[number] must be a positive integer, got `{value}`")]
    InvalidNumber {
        /// Raw value supplied by the client.
        value: String,
    },
    /// `page[size]` was not a positive integer.
    #[error("page[size] must be a positive integer, got `{value}`")]
    InvalidSize {
        /// Raw value supplied by the client.
        value: String,
    },
    /// Page settings were zero or had a default above the maximum.
    #[error("page sizes must be positive and the default must not exceed the maximum")]
    InvalidSettings,
}

/// Server-side page size policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSettings {
    default_size: u32,
    max_size: u32,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

impl PageSettings {
    /// Build settings from a default and a maximum page size.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError::InvalidSettings`] when either size is zero
    /// or the default exceeds the maximum.
    pub const fn new(default_size: u32, max_size: u32) -> Result<Self, PaginationError> {
        if default_size == 0 || max_size == 0 || default_size > max_size {
            return Err(PaginationError::InvalidSettings);
        }
        Ok(Self {
            default_size,
            max_size,
        })
    }

    /// Page size used when the client omits `page[size]`.
    #[must_use]
    pub const fn default_size(&self) -> u32 {
        self.default_size
    }

    /// Largest page size the server will return.
    #[must_use]
    pub const fn max_size(&self) -> u32 {
        self.max_size
    }
}

/// A validated, 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    number: u32,
    size: u32,
}

impl PageRequest {
    /// Build a page request from already-validated parts.
    ///
    /// # Errors
    ///
    /// Returns an error when `number` or `size` is zero.
    pub fn new(number: u32, size: u32) -> Result<Self, PaginationError> {
        if number == 0 {
            return Err(PaginationError::InvalidNumber {
                value: number.to_string(),
            });
        }
        if size == 0 {
            return Err(PaginationError::InvalidSize {
                value: size.to_string(),
            });
        }
        Ok(Self { number, size })
    }

    /// Interpret raw `page[number]` and `page[size]` query values.
    ///
    /// Missing values fall back to page one and the configured default size.
    /// Sizes above the configured maximum are clamped rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns an error when a supplied value is not a positive integer.
    pub fn parse(
        number: Option<&str>,
        size: Option<&str>,
        settings: &PageSettings,
    ) -> Result<Self, PaginationError> {
        let number = match number {
            None => 1,
            Some(raw) => parse_positive(raw).ok_or_else(|| PaginationError::InvalidNumber {
                value: raw.to_owned(),
            })?,
        };
        let size = match size {
            None => settings.default_size,
            Some(raw) => parse_positive(raw)
                .ok_or_else(|| PaginationError::InvalidSize {
                    value: raw.to_owned(),
                })?
                .min(settings.max_size),
        };
        Ok(Self { number, size })
    }

    /// 1-based page number.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Maximum number of items on the page.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Number of items preceding this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.number.saturating_sub(1)).saturating_mul(u64::from(self.size))
    }
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|value| *value > 0)
}

/// A fetched page: the request that produced it plus the collection total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    request: PageRequest,
    total: u64,
}

impl PageInfo {
    /// Describe a page of a collection holding `total` items.
    #[must_use]
    pub const fn new(request: PageRequest, total: u64) -> Self {
        Self { request, total }
    }

    /// The request this page answers.
    #[must_use]
    pub const fn request(&self) -> PageRequest {
        self.request
    }

    /// Total number of items across all pages.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Number of the final page. An empty collection still has one page.
    #[must_use]
    pub fn last_page(&self) -> u32 {
        let pages = self.total.div_ceil(u64::from(self.request.size)).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Whether a page precedes this one.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.request.number > 1
    }

    /// Whether a page follows this one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.request.number < self.last_page()
    }
}
