//! Normalised 64-bit ELF records and typed views of their raw fields
//!
//! All records are held in the 64-bit form no matter which class the backing
//! file uses; the raw `*_type` and `*_flags` words stay raw so that values
//! outside the defined sets survive a load/save round trip. Typed accessors
//! (`kind`, `flags`) are provided for the defined values.

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

use super::ident::ElfClass;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// The type of an ELF section
pub enum SectionType {
    /// Marks the section header as inactive; it does not have an associated
    /// section
    NullUndefined = 0,
    /// Holds information defined by the program, whose format and meaning
    /// are determined solely by the program
    ProgramBits = 1,
    /// Holds a full symbol table, typically for link editing
    SymbolTable = 2,
    /// Holds a string table
    StringTable = 3,
    /// Holds relocation entries with explicit addends
    RelocationExplicit = 4,
    /// Holds a symbol hash table
    Hash = 5,
    /// Holds information for dynamic linking
    Dynamic = 6,
    /// Holds information that marks the file in some way
    Note = 7,
    /// Occupies no space in the file but otherwise resembles `ProgramBits`;
    /// `sh_offset` holds the conceptual file offset
    NoBits = 8,
    /// Holds relocation entries without explicit addends
    RelocationImplicit = 9,
    /// Reserved with unspecified semantics
    SectionHeaderLibrary = 10,
    /// Holds the minimal set of dynamic linking symbols
    DynamicSymbol = 11,
    /// Array of pointers to initialization functions
    InitializerArray = 14,
    /// Array of pointers to termination functions
    FinalizerArray = 15,
    /// Array of pointers to pre-initialization functions
    PreInitializerArray = 16,
    /// Defines a section group
    Group = 17,
    /// Extended section indices for a symbol table
    SymbolTableSectionHeaderIndex = 18,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[non_exhaustive]
/// The type of an ELF program segment
pub enum SegmentType {
    /// Unused entry; other members are undefined
    NullUnused = 0,
    /// Loadable segment described by `p_filesz` and `p_memsz`
    Load = 1,
    /// Dynamic linking information
    Dynamic = 2,
    /// Path of the program interpreter
    Interpreter = 3,
    /// Auxiliary information
    Note = 4,
    /// Reserved with unspecified semantics
    Shlib = 5,
    /// The program header table itself
    ProgramHeaderTable = 6,
    /// Thread-local storage template
    ThreadLocalStorage = 7,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Attribute flags of an ELF section (`sh_flags`)
    pub struct SectionFlags: u64 {
        /// Contains data that is writable during execution
        const WRITE = 0x1;
        /// Occupies memory during execution
        const ALLOC = 0x2;
        /// Contains executable machine instructions
        const EXECINSTR = 0x4;
        /// May be merged to eliminate duplication
        const MERGE = 0x10;
        /// Contains null-terminated character strings
        const STRINGS = 0x20;
        /// `sh_info` holds a section header table index
        const INFO_LINK = 0x40;
        /// Special link-order requirements
        const LINK_ORDER = 0x80;
        /// Requires OS-specific processing
        const OS_NONCONFORMING = 0x100;
        /// Member of a section group
        const GROUP = 0x200;
        /// Holds thread-local storage
        const TLS = 0x400;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Permission flags of an ELF program segment (`p_flags`)
    pub struct SegmentFlags: u32 {
        /// Execute permission
        const X = 0x1;
        /// Write permission
        const W = 0x2;
        /// Read permission
        const R = 0x4;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Normalised ELF file header. The 16 identification bytes are carried
/// separately by the container and are not part of this record.
pub struct Ehdr {
    /// Object file type
    pub e_type: u16,
    /// Target machine architecture
    pub e_machine: u16,
    /// Object file version
    pub e_version: u32,
    /// Entry point virtual address
    pub e_entry: u64,
    /// Program header table file offset
    pub e_phoff: u64,
    /// Section header table file offset
    pub e_shoff: u64,
    /// Processor-specific flags
    pub e_flags: u32,
    /// Size of the on-disk ELF header in bytes
    pub e_ehsize: u16,
    /// Size of one on-disk program header entry
    pub e_phentsize: u16,
    /// Number of program header entries
    pub e_phnum: u16,
    /// Size of one on-disk section header entry
    pub e_shentsize: u16,
    /// Number of section header entries
    pub e_shnum: u16,
    /// Section table index of the section name string table
    pub e_shstrndx: u16,
}

impl Ehdr {
    /// On-disk header size for `class`, identification bytes included
    pub const fn size(class: ElfClass) -> u64 {
        match class {
            ElfClass::Elf32 => 52,
            ElfClass::Elf64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Normalised ELF program header
pub struct Phdr {
    /// Segment type
    pub p_type: u32,
    /// Segment permission flags
    pub p_flags: u32,
    /// File offset of the segment's first byte
    pub p_offset: u64,
    /// Virtual address of the segment's first byte
    pub p_vaddr: u64,
    /// Physical address, where relevant
    pub p_paddr: u64,
    /// Number of bytes in the file image of the segment
    pub p_filesz: u64,
    /// Number of bytes in the memory image of the segment
    pub p_memsz: u64,
    /// Alignment of the segment in file and memory
    pub p_align: u64,
}

impl Phdr {
    /// On-disk program header size for `class`
    pub const fn size(class: ElfClass) -> u64 {
        match class {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 56,
        }
    }

    /// The defined segment type, if `p_type` holds one
    pub fn kind(&self) -> Option<SegmentType> {
        SegmentType::from_u32(self.p_type)
    }

    /// Permission flags view of `p_flags`; undefined bits are retained
    pub fn flags(&self) -> SegmentFlags {
        SegmentFlags::from_bits_retain(self.p_flags)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Normalised ELF section header
pub struct Shdr {
    /// Index of the section's name in the section name string table
    pub sh_name: u32,
    /// Section type
    pub sh_type: u32,
    /// Attribute flags
    pub sh_flags: u64,
    /// Virtual address of the section's first byte, or 0
    pub sh_addr: u64,
    /// File offset of the section's first byte
    pub sh_offset: u64,
    /// Section size in bytes (file bytes unless `NoBits`)
    pub sh_size: u64,
    /// Section header table index link; meaning depends on the type
    pub sh_link: u32,
    /// Extra information; meaning depends on the type
    pub sh_info: u32,
    /// Address alignment constraint, or 0
    pub sh_addralign: u64,
    /// Size of each entry for sections holding fixed-size records
    pub sh_entsize: u64,
}

impl Shdr {
    /// On-disk section header size for `class`
    pub const fn size(class: ElfClass) -> u64 {
        match class {
            ElfClass::Elf32 => 40,
            ElfClass::Elf64 => 64,
        }
    }

    /// The defined section type, if `sh_type` holds one
    pub fn kind(&self) -> Option<SectionType> {
        SectionType::from_u32(self.sh_type)
    }

    /// Attribute flags view of `sh_flags`; undefined bits are retained
    pub fn flags(&self) -> SectionFlags {
        SectionFlags::from_bits_retain(self.sh_flags)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Normalised ELF symbol
pub struct Sym {
    /// Index of the symbol's name in the associated string table
    pub st_name: u32,
    /// Packed binding and type
    pub st_info: u8,
    /// Packed visibility
    pub st_other: u8,
    /// Index of the section the symbol is defined relative to
    pub st_shndx: u16,
    /// Value of the symbol: usually an address
    pub st_value: u64,
    /// Size associated with the symbol, or 0
    pub st_size: u64,
}

impl Sym {
    /// On-disk symbol record size for `class`
    pub const fn size(class: ElfClass) -> u64 {
        match class {
            ElfClass::Elf32 => 16,
            ElfClass::Elf64 => 24,
        }
    }
}
