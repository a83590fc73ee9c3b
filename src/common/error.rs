use std::fmt::{Display, Error, Formatter};

// Error
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum QRError {
    // Builder
    EmptyData,
    DataTooLong,
    InvalidVersion,
    InvalidMatrixShape,

    // Reader
    NoFinders,
    NoCornerPasses,
    FormatInfoUnreadable,
    VersionInfoUnreadable,
    FixedModulesCorrupt,
    SingularMatrix,
    PointAtInfinity,

    // Codec
    Uncorrectable,
    PrematureEndOfBits,
    UnsupportedMode,
}

impl Display for QRError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let msg = match *self {
            // Builder
            Self::EmptyData => "Empty data",
            Self::DataTooLong => "Data too long for any version at this level",
            Self::InvalidVersion => "Invalid version",
            Self::InvalidMatrixShape => "Matrix shape or render parameters out of range",

            // Reader
            Self::NoFinders => "No finder patterns located",
            Self::NoCornerPasses => "No finder triple passes corner checks",
            Self::FormatInfoUnreadable => "Format info unreadable in both copies",
            Self::VersionInfoUnreadable => "Version info unreadable in both copies",
            Self::FixedModulesCorrupt => "Function pattern mismatch exceeds tolerance",
            Self::SingularMatrix => "Cannot solve transform",
            Self::PointAtInfinity => "Projected point is at infinity",

            // Codec
            Self::Uncorrectable => "Too many errors to correct",
            Self::PrematureEndOfBits => "Premature end of bit stream",
            Self::UnsupportedMode => "Unsupported mode indicator",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for QRError {}

pub type QRResult<T> = Result<T, QRError>;
