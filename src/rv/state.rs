//! Architectural state of a single hart

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use typed_builder::TypedBuilder;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Accrued floating-point exception flags (`fcsr` bits 0-4)
    pub struct FcsrFlags: u8 {
        /// Inexact
        const NX = 1 << 0;
        /// Underflow
        const UF = 1 << 1;
        /// Overflow
        const OF = 1 << 2;
        /// Divide by zero
        const DZ = 1 << 3;
        /// Invalid operation
        const NV = 1 << 4;
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
/// IEEE rounding modes encodable in `fcsr` bits 5-7
pub enum RoundingMode {
    /// Round to nearest, ties to even
    Rne = 0,
    /// Round towards zero
    Rtz = 1,
    /// Round down, towards negative infinity
    Rdn = 2,
    /// Round up, towards positive infinity
    Rup = 3,
    /// Round to nearest, ties to maximum magnitude
    Rmm = 4,
}

impl RoundingMode {
    /// The dynamic rounding mode held in `fcsr` bits 5-7; reserved encodings
    /// fall back to nearest-even
    pub fn from_fcsr(fcsr: u8) -> Self {
        Self::from_u8((fcsr >> 5) & 0b111).unwrap_or(Self::Rne)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// One floating-point register: 64 bits addressable as single or double
/// precision and as the corresponding integer bit patterns. Single-precision
/// writes only touch the low half, matching a register-file union on a
/// little-endian host.
pub struct FReg(u64);

impl FReg {
    /// A register holding the raw pattern `bits`
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The single-precision value in the low half
    pub fn s(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    /// Store a single-precision value into the low half
    pub fn set_s(&mut self, value: f32) {
        self.0 = (self.0 & !0xffff_ffff) | u64::from(value.to_bits());
    }

    /// The double-precision value
    pub fn d(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Store a double-precision value
    pub fn set_d(&mut self, value: f64) {
        self.0 = value.to_bits();
    }

    /// The low half as a signed bit pattern
    pub const fn w(self) -> i32 {
        self.0 as u32 as i32
    }

    /// The low half as an unsigned bit pattern
    pub const fn wu(self) -> u32 {
        self.0 as u32
    }

    /// Store a raw 32-bit pattern into the low half
    pub fn set_wu(&mut self, bits: u32) {
        self.0 = (self.0 & !0xffff_ffff) | u64::from(bits);
    }

    /// The full width as a signed bit pattern
    pub const fn l(self) -> i64 {
        self.0 as i64
    }

    /// The full width as an unsigned bit pattern
    pub const fn lu(self) -> u64 {
        self.0
    }

    /// Store a raw 64-bit pattern
    pub fn set_lu(&mut self, bits: u64) {
        self.0 = bits;
    }
}

#[derive(Debug, Clone, PartialEq, TypedBuilder)]
/// Architectural state of one hart. `U` is the integer register width:
/// `u32` for RV32, `u64` for RV64.
///
/// Index 0 of the integer file is hardwired to zero by convention: the
/// interpreter suppresses writes to it rather than the state type.
pub struct Hart<U: Copy + Default> {
    /// Integer register file
    #[builder(default = [U::default(); 32])]
    pub ireg: [U; 32],
    /// Floating-point register file
    #[builder(default = [FReg::default(); 32])]
    pub freg: [FReg; 32],
    /// Program counter
    #[builder(default)]
    pub pc: U,
    /// Floating-point control and status: bits 0-4 accrued exception flags,
    /// bits 5-7 the dynamic rounding mode
    #[builder(default)]
    pub fcsr: u8,
    /// Reservation address of the last load-reserved
    #[builder(default)]
    pub lr: U,
}

/// Hart state for the RV32 base
pub type Hart32 = Hart<u32>;

/// Hart state for the RV64 base
pub type Hart64 = Hart<u64>;
