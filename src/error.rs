use std::{error, fmt, io};

use crate::{DocId, Pos, WordId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// An append would have made `di`/`pi` go backwards for the posting
    /// vector it targets. `term` is the word-id or label-id of the stream,
    /// when known to the caller.
    MonotonicityViolated {
        term: Option<WordId>,
        di: DocId,
        pi: Pos,
    },
    /// Magic mismatch, truncated header, an impossible segment offset, or a
    /// decode that ran past the data it was given.
    FormatError(String),
    /// A single occurrence carried more labels than `MAX_WORD_LABELS`.
    CapacityExceeded { len: usize, max: usize },
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::Io(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Error::*;
        match self {
            Io(e) => write!(f, "{}", e),
            MonotonicityViolated { term: Some(t), di, pi } => {
                write!(f, "monotonicity violated for term {}: di={} pi={}", t, di, pi)
            }
            MonotonicityViolated { term: None, di, pi } => {
                write!(f, "monotonicity violated: di={} pi={}", di, pi)
            }
            FormatError(msg) => write!(f, "format error: {}", msg),
            CapacityExceeded { len, max } => {
                write!(f, "label set of length {} exceeds MAX_WORD_LABELS ({})", len, max)
            }
        }
    }
}

impl error::Error for Error {}
