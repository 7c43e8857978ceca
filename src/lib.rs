//! Core of a RISC-V user-mode simulator: an ELF object loader/rewriter, the
//! Sv32/Sv39/Sv48 page-table layouts, and an instruction interpreter for the
//! RV32/RV64 base integer ISAs with the M, A, F and D extensions.
//!
//! The ELF side ([`elf`]) normalises 32- and 64-bit images of either byte
//! order into a single 64-bit in-memory container, indexes the symbol table,
//! and can reserialise a modified image back to its original class and
//! endianness. The simulator side ([`rv`]) executes pre-decoded instructions
//! against a [`rv::state::Hart`] backed by any [`rv::mem::Memory`]
//! implementation and reports the program-counter delta to apply. Instruction
//! decoding itself is out of scope: callers hand the interpreter a
//! [`rv::interp::Decoded`] record.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, missing_docs)]

pub mod elf;
pub mod error;
pub mod pte;
pub mod rv;
