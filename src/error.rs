use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fields of an IPS record, named in truncation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Offset,
    Length,
    RunCount,
    FillByte,
    Payload,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Offset => "offset",
            Field::Length => "size",
            Field::RunCount => "rle_size",
            Field::FillByte => "rle_value",
            Field::Payload => "data",
        })
    }
}

#[derive(Error, Debug)]
pub enum IpsError {
    #[error("Missing PATCH header, found {found:02x?}")]
    MalformedHeader { found: Vec<u8> },

    #[error(
        "Expecting record '{field}' field at byte {position}, got {actual} of {expected} bytes \
         before reaching end of file"
    )]
    TruncatedStream {
        field: Field,
        position: u64,
        expected: usize,
        actual: usize,
    },

    #[error("RLE record at offset {offset:#x} has a run count of zero")]
    EmptyRun { offset: u32 },

    #[error("Could not seek target to offset {offset:#x}")]
    SeekFailure {
        offset: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Bad IO")]
    Io(#[from] std::io::Error),

    #[error("{} is not an IPS file (proper extension is .ips)", .0.display())]
    NotIpsFile(PathBuf),

    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("No backup found for {}", .0.display())]
    NoBackup(PathBuf),
}

pub type Result<T> = std::result::Result<T, IpsError>;
