use std::{
    fmt,
    io,
    path::PathBuf,
};


/// An error encountered while parsing command line arguments or
/// validating a configuration.
#[derive(Debug)]
pub enum ConfigError {
    InvalidRatio(String),
    InvalidClusterCount(String),
    InvalidTrainingCap(String),
    MissingFileNames,
    ExtraFileName(String),
    UnknownOption(String),
}
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidRatio(r) => {
                write!(f, "{} is not a valid compression ratio (expected a number in (0, 1]).", r)
            }
            ConfigError::InvalidClusterCount(c) => {
                write!(f, "{} is not a valid cluster count (expected 1..=255).", c)
            }
            ConfigError::InvalidTrainingCap(t) => {
                write!(f, "{} is not a valid training line cap (expected a number, 0 for all).", t)
            }
            ConfigError::MissingFileNames => {
                write!(f, "Missing required file names.")
            }
            ConfigError::ExtraFileName(name) => {
                write!(f, "Garbage argument \"{}\" detected.", name)
            }
            ConfigError::UnknownOption(opt) => {
                write!(f, "Unrecognized option {}.", opt)
            }
        }
    }
}

/// An error encountered while encoding or decoding a quality value
/// file. Construction errors are fatal; there is no partial recovery.
#[derive(Debug)]
pub enum QvError {
    /// The input file could not be opened.
    InputNotFound(PathBuf),
    /// A line in the input exceeds the allowed number of columns, or
    /// does not match the width established by the first line.
    LineTooLong(usize),
    /// An input byte is outside the Phred+33 symbol range.
    InvalidSymbol(u8),
    /// Allocation of a line block failed.
    OutOfMemory,
    /// The codebook payload could not be parsed.
    CodebookMalformed(String),
    /// Attempted to mix PMFs defined over different alphabets.
    AlphabetMismatch,
    /// A quantizer was requested with a state count outside [1, A].
    InvalidStates(usize),
    /// The arithmetic coder interval invariant l <= u was violated,
    /// indicating a bug or stream corruption.
    CoderInvariant { low: u32, high: u32 },
    Io(io::Error),
}
impl fmt::Display for QvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QvError::InputNotFound(path) => {
                write!(f, "Couldn't open file {}: Not Found", path.display())
            }
            QvError::LineTooLong(columns) => {
                write!(f, "Input line of {} columns exceeds the allowed width.", columns)
            }
            QvError::InvalidSymbol(byte) => {
                write!(f, "Input byte {:#04x} is outside the quality value range.", byte)
            }
            QvError::OutOfMemory => {
                write!(f, "Out of memory while allocating line blocks.")
            }
            QvError::CodebookMalformed(what) => {
                write!(f, "Malformed codebook payload: {}", what)
            }
            QvError::AlphabetMismatch => {
                write!(f, "PMF operation on mismatched alphabets.")
            }
            QvError::InvalidStates(states) => {
                write!(f, "{} is not a valid quantizer state count.", states)
            }
            QvError::CoderInvariant { low, high } => {
                write!(f, "Arithmetic coder invariant violated: l = {}, u = {}.", low, high)
            }
            QvError::Io(err) => {
                write!(f, "{}", err)
            }
        }
    }
}
impl From<io::Error> for QvError {
    fn from(err: io::Error) -> QvError {
        QvError::Io(err)
    }
}
