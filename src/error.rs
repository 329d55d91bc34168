use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::gc::GcError;
use crate::storage::StorageError;

/// Crate-level convenience error.
///
/// Not a "god error": a thin wrapper over the canonical capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Gc(#[from] GcError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
