//! # Relocation Errors
//!
//! The closed set of fatal conditions the relocator can hit. There is no
//! recoverable category: every variant ends with a diagnostic on the debug
//! channel and a permanent halt, performed by the entry shim.

use core::ffi::CStr;
use core::fmt;

/// Relocation result type
pub type RelocResult<T> = Result<T, RelocError>;

/// Fatal relocation failures.
///
/// All four are detected locally at the point of computation and never
/// retried; from the loaded system's point of view they are
/// indistinguishable from the device not booting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocError {
    /// The relocated sections do not fit below the RAM bound
    InsufficientRam,
    /// An offset failed every section range test in the cascade
    OffsetOutOfBounds,
    /// A patch slot offset resolved into the non-writable code section
    PatchSlotInRom,
    /// A patch slot offset resolved into the offset table
    PatchSlotInGot,
}

impl RelocError {
    /// Fixed diagnostic emitted on the debug channel, newline-terminated.
    ///
    /// Returned as a C string so the reporter can hand the pointer straight
    /// to the host write call with no formatting machinery in between.
    pub const fn diagnostic(self) -> &'static CStr {
        match self {
            Self::InsufficientRam => c"not enough ram\n",
            Self::OffsetOutOfBounds => c"out-of-bounds offset\n",
            Self::PatchSlotInRom => c"cannot relocate offsets in .rom\n",
            Self::PatchSlotInGot => c"cannot relocate offsets in .got\n",
        }
    }
}

impl fmt::Display for RelocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientRam => write!(f, "not enough ram"),
            Self::OffsetOutOfBounds => write!(f, "out-of-bounds offset"),
            Self::PatchSlotInRom => write!(f, "cannot relocate offsets in .rom"),
            Self::PatchSlotInGot => write!(f, "cannot relocate offsets in .got"),
        }
    }
}
