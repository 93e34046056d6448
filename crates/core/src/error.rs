use thiserror::Error;

use crate::gate::CertificateError;
use crate::grading::GradingError;
use crate::model::ParseIdError;

/// Umbrella error for callers that do not care which core component failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
