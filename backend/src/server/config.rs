//! HTTP server configuration object and helpers.

use std::net::SocketAddr;

use bookshelf::outbound::persistence::DbPool;
use pagination::PageSettings;
use url::Url;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) public_url: Url,
    pub(crate) page_settings: PageSettings,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) seed_dev_data: bool,
}

impl ServerConfig {
    /// Construct a configuration backed by the in-memory adapters.
    #[must_use]
    pub fn new(bind_addr: SocketAddr, public_url: Url, page_settings: PageSettings) -> Self {
        Self {
            bind_addr,
            public_url,
            page_settings,
            db_pool: None,
            seed_dev_data: false,
        }
    }

    /// Attach a database connection pool; the Diesel adapters replace the
    /// in-memory ones.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Seed the development data set before serving.
    #[must_use]
    pub fn with_dev_seed(mut self, seed: bool) -> Self {
        self.seed_dev_data = seed;
        self
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
