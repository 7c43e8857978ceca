//! Bit layouts of the Sv32, Sv39 and Sv48 virtual-memory schemes
//!
//! Pure data definitions: virtual-address, physical-address and page-table-
//! entry decompositions plus per-scheme level/size metadata. No translation
//! policy lives here; an MMU layers page walks on top of these types.

use bitflags::bitflags;
use paste::paste;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Permission and status bits of a page-table entry (bits 0-9 in every
    /// scheme)
    pub struct PteFlags: u64 {
        /// Entry is valid
        const V = 1 << 0;
        /// Page is readable
        const R = 1 << 1;
        /// Page is writable
        const W = 1 << 2;
        /// Page is executable
        const X = 1 << 3;
        /// Page is accessible in user mode
        const U = 1 << 4;
        /// Mapping is global
        const G = 1 << 5;
        /// Page has been accessed
        const A = 1 << 6;
        /// Page has been written
        const D = 1 << 7;
        /// Reserved for software use
        const RSV1 = 1 << 8;
        /// Reserved for software use
        const RSV2 = 1 << 9;
    }
}

/// Shape of one virtual-memory translation scheme
pub trait Translation {
    /// Page-table tree depth
    const LEVELS: u32;
    /// Virtual-page-number bits resolved per level
    const VPN_BITS: u32;
    /// Bytes per page-table entry
    const PTE_SIZE: usize;
    /// Physical-page-number width in bits
    const PPN_BITS: u32;
    /// log2 of the page size
    const PAGE_SHIFT: u32 = 12;
    /// Virtual-address decomposition
    type Va;
    /// Physical-address decomposition
    type Pa;
    /// Page-table-entry decomposition
    type Pte;
}

macro_rules! translation_scheme {
    (
        $(#[$attr:meta])*
        $name:ident {
            raw_va: $va:ty,
            raw_pte: $pte:ty,
            levels: $levels:expr,
            vpn_bits: $vpn:expr,
            pte_size: $size:expr,
            ppn_bits: $ppn:expr $(,)?
        }
    ) => {
        paste! {
            $(#[$attr])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct $name;

            impl Translation for $name {
                const LEVELS: u32 = $levels;
                const VPN_BITS: u32 = $vpn;
                const PTE_SIZE: usize = $size;
                const PPN_BITS: u32 = $ppn;
                type Va = [<$name Va>];
                type Pa = [<$name Pa>];
                type Pte = [<$name Pte>];
            }

            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            #[doc = concat!("Virtual-address decomposition under `", stringify!($name), "`")]
            pub struct [<$name Va>](pub(crate) $va);

            impl [<$name Va>] {
                /// Wrap a raw virtual address
                pub const fn new(raw: $va) -> Self {
                    Self(raw)
                }

                /// The raw address bits
                pub const fn bits(self) -> $va {
                    self.0
                }

                /// Offset within the 4 KiB page
                pub const fn page_offset(self) -> $va {
                    self.0 & 0xfff
                }

                /// Virtual page number resolved at `level`, with level 0 the
                /// least significant; `level` must be below the scheme's
                /// level count
                pub const fn vpn(self, level: u32) -> $va {
                    (self.0 >> (12 + $vpn * level)) & ((1 << $vpn) - 1)
                }

                /// All virtual-page-number bits as a single field
                pub const fn vpn_field(self) -> $va {
                    (self.0 >> 12) & ((1 << ($vpn * $levels)) - 1)
                }
            }

            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            #[doc = concat!("Physical-address decomposition under `", stringify!($name), "`")]
            pub struct [<$name Pa>](pub(crate) u64);

            impl [<$name Pa>] {
                /// Wrap a raw physical address
                pub const fn new(raw: u64) -> Self {
                    Self(raw)
                }

                /// The raw address bits
                pub const fn bits(self) -> u64 {
                    self.0
                }

                /// Offset within the 4 KiB page
                pub const fn page_offset(self) -> u64 {
                    self.0 & 0xfff
                }

                /// The physical page number field
                pub const fn ppn(self) -> u64 {
                    (self.0 >> 12) & ((1u64 << $ppn) - 1)
                }
            }

            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            #[doc = concat!("Page-table-entry decomposition under `", stringify!($name), "`")]
            pub struct [<$name Pte>](pub(crate) $pte);

            impl [<$name Pte>] {
                /// Wrap a raw page-table entry
                pub const fn new(raw: $pte) -> Self {
                    Self(raw)
                }

                /// The raw entry bits
                pub const fn bits(self) -> $pte {
                    self.0
                }

                /// Assemble an entry from a physical page number and flags
                pub const fn from_parts(ppn: u64, flags: PteFlags) -> Self {
                    Self((((ppn & ((1u64 << $ppn) - 1)) << 10) | flags.bits()) as $pte)
                }

                /// Permission and status bits (bits 0-9)
                pub const fn flags(self) -> PteFlags {
                    PteFlags::from_bits_truncate((self.0 & 0x3ff) as u64)
                }

                /// The physical page number field
                pub const fn ppn(self) -> u64 {
                    ((self.0 >> 10) as u64) & ((1u64 << $ppn) - 1)
                }
            }
        }
    };
}

translation_scheme!(
    /// Two-level translation over a 32-bit virtual space with a 34-bit
    /// physical space
    Sv32 {
        raw_va: u32,
        raw_pte: u32,
        levels: 2,
        vpn_bits: 10,
        pte_size: 4,
        ppn_bits: 22,
    }
);

translation_scheme!(
    /// Three-level translation over a 39-bit virtual space
    Sv39 {
        raw_va: u64,
        raw_pte: u64,
        levels: 3,
        vpn_bits: 9,
        pte_size: 8,
        ppn_bits: 38,
    }
);

translation_scheme!(
    /// Four-level translation over a 48-bit virtual space
    Sv48 {
        raw_va: u64,
        raw_pte: u64,
        levels: 4,
        vpn_bits: 9,
        pte_size: 8,
        ppn_bits: 38,
    }
);
