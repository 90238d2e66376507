use thiserror::Error;

use crate::{habit::HabitId, storage::StorageError};

/// Rejected caller input. Raised before any state is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("habit title must not be empty")]
    EmptyTitle,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The snapshot could not be saved. In-memory state already reflects the
    /// operation and is kept; the next successful save brings storage back in line.
    #[error("failed to persist habits: {0}")]
    Storage(#[from] StorageError),

    #[error("habit {id} was created but could not be saved: {source}")]
    CreatedUnsaved {
        id: HabitId,
        #[source]
        source: StorageError,
    },

    #[error("no unused habit id after {attempts} attempts")]
    IdsExhausted { attempts: usize },
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
