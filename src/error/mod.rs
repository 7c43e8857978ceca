//! Error type for ELF container handling and serialisation

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
/// Errors raised while loading, validating or rewriting an ELF image. The
/// interpreter never raises: illegal instructions are signalled in-band by a
/// zero program-counter delta.
pub enum Error {
    #[error("{}: i/o error: {source}", path.display())]
    /// An underlying file operation failed
    Io {
        /// File the operation was addressing
        path: PathBuf,
        /// The originating I/O error
        #[source]
        source: std::io::Error,
    },
    #[error("{}: invalid ELF magic", path.display())]
    /// The file is shorter than `e_ident` or does not start with the ELF magic
    InvalidMagic {
        /// File being probed
        path: PathBuf,
    },
    #[error("{}: invalid ELF class {value}", path.display())]
    /// `e_ident[EI_CLASS]` is neither `ELFCLASS32` nor `ELFCLASS64`
    BadClass {
        /// File being probed
        path: PathBuf,
        /// The class byte found
        value: u8,
    },
    #[error("{}: invalid ELF data encoding {value}", path.display())]
    /// `e_ident[EI_DATA]` is neither LSB nor MSB
    BadEndian {
        /// File being probed
        path: PathBuf,
        /// The data-encoding byte found
        value: u8,
    },
    #[error("{}: invalid ELF version {value}", path.display())]
    /// `e_version` is not `EV_CURRENT`
    BadVersion {
        /// File being probed
        path: PathBuf,
        /// The version found
        value: u32,
    },
    #[error("{}: header table ends at {end} beyond file size {size}", path.display())]
    /// The program- or section-header table extends past the end of the file
    TruncatedHeaders {
        /// File being loaded
        path: PathBuf,
        /// End of the offending header table
        end: u64,
        /// Size of the file
        size: u64,
    },
    #[error("{}: program and section header tables overlap", path.display())]
    /// The program- and section-header table regions intersect
    HeaderOverlap {
        /// File being loaded
        path: PathBuf,
    },
    #[error("{}: section {section} overlaps another file region", path.display())]
    /// A section's file extent intersects a header table or another section
    SectionOverlap {
        /// File being loaded
        path: PathBuf,
        /// Index of the offending section
        section: usize,
    },
    #[error("{}: section {section} ends at {end} beyond file size {size}", path.display())]
    /// A section's file extent runs past the end of the file
    SectionTruncated {
        /// File being loaded
        path: PathBuf,
        /// Index of the offending section
        section: usize,
        /// End of the section's extent
        end: u64,
        /// Size of the file
        size: u64,
    },
    #[error("{}: symbol table entry size {found}, expected {expected}", path.display())]
    /// The symbol table's `sh_entsize` does not match the class record size
    BadSymbolEntSize {
        /// File being loaded
        path: PathBuf,
        /// Record size required by the file's class
        expected: u64,
        /// `sh_entsize` found in the section header
        found: u64,
    },
    #[error("no PT_LOAD segment maps section {section}")]
    /// No loadable segment covers a relocatable section's address
    NoLoadSegment {
        /// Index of the unmapped section
        section: usize,
    },
    #[error("{field} value {value:#x} does not fit the 32-bit record")]
    /// A normalised 64-bit field does not fit its ELF32 on-disk form
    NarrowOverflow {
        /// Name of the field being narrowed
        field: &'static str,
        /// The value that did not fit
        value: u64,
    },
}

/// Result alias for ELF container operations
pub type Result<T> = std::result::Result<T, Error>;
