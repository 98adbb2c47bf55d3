use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Passthrough for IO errors (open/read/seek/write).
    #[error(transparent)]
    Io(#[from] io::Error),

    /// EOF hit inside a box header or payload during parsing.
    #[error("truncated mp4: unexpected end of input in {context}")]
    Truncated { context: &'static str },

    /// `ftyp` major brand outside the supported set (isom/iso2/avc1/mp41).
    #[error("unsupported mp4 brand: {brand}")]
    UnsupportedBrand { brand: String },

    /// A required box is absent from the tree.
    #[error("mp4 missing required box: {kind}")]
    MissingBox { kind: &'static str },

    /// Track handler is neither `vide` nor `soun`.
    #[error("invalid mp4 sample handler: {handler}")]
    InvalidHandler { handler: String },

    /// A sample-table lookup exceeded the table's declared bounds.
    #[error("{table} index out of range: {index} (entries={entries})")]
    IndexOutOfRange {
        table: &'static str,
        index: u32,
        entries: u32,
    },

    /// Assembled sample count disagrees with `stsz.sample_count`.
    #[error("mp4 sample count mismatch: expected {expected}, assembled {actual}")]
    SampleCountMismatch { expected: u32, actual: u32 },

    /// Normal termination sentinel from `read_next_sample`; never fatal.
    #[error("end of sample stream")]
    EndOfStream,
}
