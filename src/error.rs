use thiserror::Error;

/// Errors raised while building or growing the scene.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
  /// A galaxy needs at least one spiral arm.
  #[error("galaxy shape needs at least one branch")]
  ZeroBranches,

  #[error("invalid shape parameters: {0}")]
  InvalidShape(String),

  #[error("invalid colour {0:?}, expected #rrggbb")]
  InvalidColor(String),

  #[error("spawn probability {0} is outside [0, 1]")]
  InvalidProbability(f64),

  /// The active field list is already at capacity.
  #[error("field limit of {max} reached")]
  FieldLimit { max: usize },
}
