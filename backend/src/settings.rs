//! Server settings loaded via OrthoConfig.
//!
//! Values layer from CLI flags, `BOOKSHELF_*` environment variables and an
//! optional config file. Unset values fall back to the defaults below.

use ortho_config::OrthoConfig;
use pagination::{PageSettings, PaginationError};
use serde::Deserialize;
use url::Url;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080/api/v1";
const DEFAULT_POOL_MAX_SIZE: u32 = 10;
const DEFAULT_PAGE_SIZE: u32 = 30;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Raised when a configured value cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("public_url `{value}` is not an absolute URL: {message}")]
    PublicUrl { value: String, message: String },
    #[error("invalid page sizes: {0}")]
    PageSizes(#[from] PaginationError),
}

/// Settings for the bookshelf server and the `dev-setup` binary.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "BOOKSHELF")]
pub struct AppSettings {
    /// Bind host.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
    /// Absolute prefix for generated links and `Location` headers.
    pub public_url: Option<String>,
    /// PostgreSQL URL; in-memory adapters are used when unset.
    pub database_url: Option<String>,
    /// Connection pool size.
    pub pool_max_size: Option<u32>,
    /// Page size used when `page[size]` is absent.
    pub default_page_size: Option<u32>,
    /// Upper bound for `page[size]`.
    pub max_page_size: Option<u32>,
    /// Seed the development data set at startup.
    #[ortho_config(default = false)]
    pub seed_dev_data: bool,
}

impl AppSettings {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn pool_max_size(&self) -> u32 {
        self.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE)
    }

    /// Absolute link base, trailing slash removed.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::PublicUrl`] for relative or malformed URLs.
    pub fn public_url(&self) -> Result<Url, SettingsError> {
        let raw = self.public_url.as_deref().unwrap_or(DEFAULT_PUBLIC_URL);
        let parsed = Url::parse(raw.trim_end_matches('/')).map_err(|err| {
            SettingsError::PublicUrl {
                value: raw.to_owned(),
                message: err.to_string(),
            }
        })?;
        if parsed.cannot_be_a_base() {
            return Err(SettingsError::PublicUrl {
                value: raw.to_owned(),
                message: "URL cannot be a base".to_owned(),
            });
        }
        Ok(parsed)
    }

    /// # Errors
    ///
    /// Returns [`SettingsError::PageSizes`] when the default exceeds the
    /// maximum or either is zero.
    pub fn page_settings(&self) -> Result<PageSettings, SettingsError> {
        Ok(PageSettings::new(
            self.default_page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            self.max_page_size.unwrap_or(DEFAULT_MAX_PAGE_SIZE),
        )?)
    }
}
