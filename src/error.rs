use thiserror::Error;

use crate::Crs;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot estimate a reference frame for an empty collection")]
    EmptyInput,

    #[error("Collection has no reference frame to reproject from")]
    MissingCrs,

    #[error("Cannot reproject from {from} to {to}: {reason}")]
    Reproject { from: Crs, to: Crs, reason: String },

    #[error(
        "Cannot split a LineString by a geometry which intersects a continuous portion of it"
    )]
    InvalidSplit,

    /// Only produced per alpha-shape part; `alpha_shape` logs and skips these.
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

impl Error {
    pub(crate) fn reproject(from: Crs, to: Crs, reason: impl std::fmt::Display) -> Self {
        Self::Reproject {
            from,
            to,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
