//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod access_gate;
mod access_token_repository;
mod resource_repository;

#[cfg(test)]
pub use access_gate::MockAccessGate;
pub use access_gate::AccessGate;
#[cfg(test)]
pub use access_token_repository::MockAccessTokenRepository;
pub use access_token_repository::{
    AccessTokenRepository, AccessTokenRepositoryError, FixtureAccessTokenRepository,
};
#[cfg(test)]
pub use resource_repository::MockResourceRepository;
pub use resource_repository::{
    LinkageChange, ListQuery, Listing, RepositoryError, ResourceRepository,
};
