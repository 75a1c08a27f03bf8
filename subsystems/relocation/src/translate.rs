//! # Offset Translation
//!
//! The four-way cascading range test at the heart of relocation: an offset
//! expressed relative to the logical section concatenation (`.rom`, `.got`,
//! `.rom.ram`, `.ram`, in that fixed order) is turned into an absolute
//! address by testing it against each section's size and subtracting the
//! size of every section it passes. An offset exactly equal to a section's
//! size belongs to the *next* section.
//!
//! The same cascade serves two callers with different legality rules, so it
//! is parameterized by a [`ResolvePolicy`] instead of being duplicated: the
//! GOT rewriter accepts every section, while the pointer patcher rejects
//! slots and values that land in sections it must not touch.

use crate::error::{RelocError, RelocResult};
use crate::layout::SectionLayout;

// ============================================================================
// POLICY
// ============================================================================

/// What the resolver does with an offset landing in a given section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionRule {
    /// The section is a legal destination; resolve to an address inside it
    Resolve,
    /// The section is an illegal destination; fail with this error
    Reject(RelocError),
}

/// Legality rules for the cascade. `.rom.ram` and `.ram` are always legal;
/// only `.rom` and `.got` vary between callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvePolicy {
    /// Rule for offsets landing in `.rom`
    pub rom: SectionRule,
    /// Rule for offsets landing in `.got`
    pub got: SectionRule,
}

/// Offsets stored in `.got` slots: every section is a legal target.
pub const GOT_ENTRY: ResolvePolicy = ResolvePolicy {
    rom: SectionRule::Resolve,
    got: SectionRule::Resolve,
};

/// Patch slot locations: slots live only in the writable data sections.
pub const PATCH_SLOT: ResolvePolicy = ResolvePolicy {
    rom: SectionRule::Reject(RelocError::PatchSlotInRom),
    got: SectionRule::Reject(RelocError::PatchSlotInGot),
};

/// Values stored in patch slots: code is addressable, but the offset table
/// is owned by the GOT rewriter and may not be referenced through a patch.
pub const PATCH_VALUE: ResolvePolicy = ResolvePolicy {
    rom: SectionRule::Resolve,
    got: SectionRule::Reject(RelocError::PatchSlotInGot),
};

// ============================================================================
// RESOLVER
// ============================================================================

/// Translate `offset` into the absolute address it refers to.
///
/// `.rom` resolves to its source address (that section is never moved); the
/// other three resolve to their relocated addresses. An offset beyond all
/// four cumulative sizes fails with [`RelocError::OffsetOutOfBounds`] under
/// every policy.
pub fn resolve(
    layout: &SectionLayout,
    offset: usize,
    policy: ResolvePolicy,
) -> RelocResult<usize> {
    let mut off = offset;

    if off < layout.rom.size {
        return match policy.rom {
            SectionRule::Resolve => Ok(layout.rom.source + off),
            SectionRule::Reject(err) => Err(err),
        };
    }
    off -= layout.rom.size;

    if off < layout.got.size {
        // Offsets landing here are expected to be zero: the slot carrying
        // the rom-size marker. Any in-range value still resolves.
        return match policy.got {
            SectionRule::Resolve => Ok(layout.got.dest + off),
            SectionRule::Reject(err) => Err(err),
        };
    }
    off -= layout.got.size;

    if off < layout.rom_ram.size {
        return Ok(layout.rom_ram.dest + off);
    }
    off -= layout.rom_ram.size;

    if off < layout.ram.size {
        return Ok(layout.ram.dest + off);
    }

    Err(RelocError::OffsetOutOfBounds)
}
