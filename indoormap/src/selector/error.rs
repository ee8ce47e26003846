//! Selection errors.

use thiserror::Error;

use crate::level::LevelRange;

/// Errors returned by level changes on the selector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    /// A level was requested while no map is on stage.
    #[error("No indoor map is selected")]
    NoMapSelected,

    /// The requested level is not served by the active map.
    #[error("Level {level} is outside the active map's levels {range}")]
    LevelOutOfRange { level: f64, range: LevelRange },
}
