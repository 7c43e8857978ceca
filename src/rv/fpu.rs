//! Floating-point environment control and conversion helpers
//!
//! The host rounding mode is process-wide state; arithmetic runs under a
//! scoped guard that restores the prior mode on every exit path.
//! Float-to-integer conversions do not rely on the host mode at all: they
//! round in software from the `fcsr` mode, saturate, and accrue the NV/NX
//! flags, which keeps their results deterministic.

use super::state::{FcsrFlags, RoundingMode};

/// `fenv.h` bindings absent from the `libc` crate; values match the glibc
/// x86/x86_64 ABI (the only platform this crate targets).
mod fenv {
    #![allow(non_upper_case_globals)]

    pub const FE_TONEAREST: libc::c_int = 0x0000;
    pub const FE_DOWNWARD: libc::c_int = 0x0400;
    pub const FE_UPWARD: libc::c_int = 0x0800;
    pub const FE_TOWARDZERO: libc::c_int = 0x0c00;

    extern "C" {
        pub fn fegetround() -> libc::c_int;
        pub fn fesetround(round: libc::c_int) -> libc::c_int;
    }
}

/// The 10-bit class masks produced by `FCLASS`
pub mod class {
    /// Negative infinity
    pub const NEG_INF: u32 = 1 << 0;
    /// Negative normal number
    pub const NEG_NORMAL: u32 = 1 << 1;
    /// Negative subnormal number
    pub const NEG_SUBNORMAL: u32 = 1 << 2;
    /// Negative zero
    pub const NEG_ZERO: u32 = 1 << 3;
    /// Positive zero
    pub const POS_ZERO: u32 = 1 << 4;
    /// Positive subnormal number
    pub const POS_SUBNORMAL: u32 = 1 << 5;
    /// Positive normal number
    pub const POS_NORMAL: u32 = 1 << 6;
    /// Positive infinity
    pub const POS_INF: u32 = 1 << 7;
    /// Signalling NaN
    pub const SIGNALLING_NAN: u32 = 1 << 8;
    /// Quiet NaN
    pub const QUIET_NAN: u32 = 1 << 9;
}

/// The canonical single-precision quiet-NaN pattern
pub const F32_CANONICAL_NAN: u32 = 0x7fc0_0000;

/// The canonical double-precision quiet-NaN pattern
pub const F64_CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;

/// Whether `bits` holds a single-precision quiet NaN (any payload)
pub const fn f32_is_quiet_nan(bits: u32) -> bool {
    bits & F32_CANONICAL_NAN == F32_CANONICAL_NAN
}

/// Whether `bits` holds a double-precision quiet NaN (any payload)
pub const fn f64_is_quiet_nan(bits: u64) -> bool {
    bits & F64_CANONICAL_NAN == F64_CANONICAL_NAN
}

/// Scoped override of the host rounding mode; the prior mode is restored on
/// drop. RMM has no host equivalent and maps to nearest-even.
pub struct RoundGuard {
    saved: libc::c_int,
}

impl RoundGuard {
    /// Install the dynamic rounding mode held in `fcsr` bits 5-7
    pub fn set(fcsr: u8) -> Self {
        let mode = match RoundingMode::from_fcsr(fcsr) {
            RoundingMode::Rne | RoundingMode::Rmm => fenv::FE_TONEAREST,
            RoundingMode::Rtz => fenv::FE_TOWARDZERO,
            RoundingMode::Rdn => fenv::FE_DOWNWARD,
            RoundingMode::Rup => fenv::FE_UPWARD,
        };
        // SAFETY: fegetround/fesetround only touch this thread's FP
        // environment.
        let saved = unsafe { fenv::fegetround() };
        unsafe {
            fenv::fesetround(mode);
        }
        Self { saved }
    }
}

impl Drop for RoundGuard {
    fn drop(&mut self) {
        // SAFETY: restores the mode captured in `set`.
        unsafe {
            fenv::fesetround(self.saved);
        }
    }
}

fn accrue(fcsr: &mut u8, flag: FcsrFlags) {
    *fcsr |= flag.bits();
}

fn round_by_mode(value: f64, mode: RoundingMode) -> f64 {
    match mode {
        RoundingMode::Rne => value.round_ties_even(),
        RoundingMode::Rtz => value.trunc(),
        RoundingMode::Rdn => value.floor(),
        RoundingMode::Rup => value.ceil(),
        RoundingMode::Rmm => value.round(),
    }
}

macro_rules! float_to_int {
    ($($name:ident -> $int:ty, $lo:expr, $hi:expr);* $(;)?) => {
        $(
            #[doc = concat!(
                "Convert to `", stringify!($int), "` under the `fcsr` ",
                "rounding mode, saturating and accruing the NV/NX flags"
            )]
            pub fn $name(fcsr: &mut u8, value: f64) -> $int {
                if value.is_nan() {
                    accrue(fcsr, FcsrFlags::NV);
                    return <$int>::MAX;
                }
                let rounded = round_by_mode(value, RoundingMode::from_fcsr(*fcsr));
                if rounded < $lo {
                    accrue(fcsr, FcsrFlags::NV);
                    return <$int>::MIN;
                }
                if rounded >= $hi {
                    accrue(fcsr, FcsrFlags::NV);
                    return <$int>::MAX;
                }
                if rounded != value {
                    accrue(fcsr, FcsrFlags::NX);
                }
                rounded as $int
            }
        )*
    };
}

float_to_int!(
    fcvt_w -> i32, -2_147_483_648.0, 2_147_483_648.0;
    fcvt_wu -> u32, 0.0, 4_294_967_296.0;
    fcvt_l -> i64, -9_223_372_036_854_775_808.0, 9_223_372_036_854_775_808.0;
    fcvt_lu -> u64, 0.0, 18_446_744_073_709_551_616.0;
);

macro_rules! classify {
    ($($name:ident($float:ty) quiet_bit: $quiet:expr);* $(;)?) => {
        $(
            #[doc = concat!(
                "The 10-bit `FCLASS` mask of a `", stringify!($float), "`"
            )]
            pub fn $name(value: $float) -> u32 {
                use std::num::FpCategory;

                let negative = value.is_sign_negative();
                match value.classify() {
                    FpCategory::Infinite if negative => class::NEG_INF,
                    FpCategory::Infinite => class::POS_INF,
                    FpCategory::Normal if negative => class::NEG_NORMAL,
                    FpCategory::Normal => class::POS_NORMAL,
                    FpCategory::Subnormal if negative => class::NEG_SUBNORMAL,
                    FpCategory::Subnormal => class::POS_SUBNORMAL,
                    FpCategory::Zero if negative => class::NEG_ZERO,
                    FpCategory::Zero => class::POS_ZERO,
                    FpCategory::Nan if value.to_bits() & $quiet != 0 => class::QUIET_NAN,
                    FpCategory::Nan => class::SIGNALLING_NAN,
                }
            }
        )*
    };
}

classify!(
    f32_classify(f32) quiet_bit: 1u32 << 22;
    f64_classify(f64) quiet_bit: 1u64 << 51;
);
