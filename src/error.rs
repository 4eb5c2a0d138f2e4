/// The five error kinds the pipeline can raise, plus the fields each needs
/// to be actionable. Parser-level issues that do not abort a layer are
/// accumulated as `warnings` on the relevant report instead of raised here.
#[derive(Debug, thiserror::Error)]
pub enum PcbCamError {
    #[error("malformed gerber input: {0}")]
    ParseError(String),

    #[error("degenerate geometry: {0}")]
    GeometryError(String),

    #[error("boolean engine rejected inputs: {0}")]
    BooleanFailure(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PcbCamError>;
