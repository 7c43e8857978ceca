//! ELF identification: magic bytes, class and data encoding

use num_derive::FromPrimitive;

/// The four magic bytes opening every ELF file
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Number of identification bytes at the start of an ELF file
pub const EI_NIDENT: usize = 16;

/// Offset of the class byte within `e_ident`
pub const EI_CLASS: usize = 4;

/// Offset of the data-encoding byte within `e_ident`
pub const EI_DATA: usize = 5;

/// The only defined ELF version
pub const EV_CURRENT: u32 = 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
/// The register-width class of an ELF file. Records are normalised to the
/// 64-bit form in memory regardless of class; the class only selects the
/// on-disk record layout.
pub enum ElfClass {
    /// 32-bit object file
    Elf32 = 1,
    /// 64-bit object file
    Elf64 = 2,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
/// The byte order of an ELF file's multi-byte fields
pub enum ElfData {
    /// Least-significant byte first (two's complement little-endian)
    Lsb = 1,
    /// Most-significant byte first (two's complement big-endian)
    Msb = 2,
}
