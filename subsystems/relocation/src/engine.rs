//! # Relocation Engine
//!
//! The one-shot sequence that takes a freshly loaded image to a runnable
//! one: resolve layout, prove it fits, update the boot interface, copy and
//! zero the data sections, rewrite the offset table, patch the pointer
//! slots, and hand the relocated GOT and entry addresses back to the entry
//! shim. The whole sequence executes once per boot and never runs again.
//!
//! Failure is terminal: the first error aborts the walk that hit it and
//! propagates out, where the entry shim reports it and halts. Nothing is
//! retained for rollback; there is no valid state to roll back to.

use crate::copy;
use crate::error::RelocResult;
use crate::image::{BootInterface, ImageMetadata, METADATA_HEADER_SIZE};
use crate::layout::{round_up, SectionLayout};
use crate::translate::{self, GOT_ENTRY, PATCH_SLOT, PATCH_VALUE};
use crate::{Word, ROM_RETENTION_ALIGN, WORD_SIZE};

#[cfg(feature = "debug-log")]
macro_rules! reloc_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}
#[cfg(not(feature = "debug-log"))]
macro_rules! reloc_debug {
    ($($arg:tt)*) => {};
}

// ============================================================================
// STAGES
// ============================================================================

/// Progress of the relocation sequence.
///
/// Strictly increasing; the terminal outcomes (control transferred, halted)
/// live outside this crate, in the entry shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Metadata read, section placement resolved
    LayoutResolved,
    /// Relocated footprint proven to fit below the RAM bound
    CapacityChecked,
    /// `.rom.ram` copied to its relocated location
    DataCopied,
    /// `.ram` zero-filled
    BssCleared,
    /// Every offset-table slot holds an absolute address
    GotRewritten,
    /// Every patch-table slot holds an absolute address
    PointersPatched,
}

// ============================================================================
// HANDOFF
// ============================================================================

/// Addresses the entry shim needs to transfer control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    /// Relocated offset-table address, to be loaded into the static-base
    /// registers before the jump
    pub got_dest: usize,
    /// Entry address before instruction-set mode tagging
    pub entry: usize,
}

// ============================================================================
// RELOCATOR
// ============================================================================

/// One-shot relocator for a loaded image.
#[derive(Debug)]
pub struct Relocator<'a> {
    meta: ImageMetadata<'a>,
    layout: SectionLayout,
    metadata_offset: usize,
    stage: Stage,
}

impl Relocator<'_> {
    /// Read the image metadata and resolve section placement.
    ///
    /// # Safety
    ///
    /// A well-formed metadata block must live at
    /// `image_start + metadata_offset` (see
    /// [`ImageMetadata::from_image`]).
    pub unsafe fn new(image_start: usize, metadata_offset: usize, ram_start: usize) -> Self {
        let meta = unsafe { ImageMetadata::from_image(image_start, metadata_offset) };
        let layout = SectionLayout::resolve(meta.symbols(), meta.rom_start(), ram_start);
        Self {
            meta,
            layout,
            metadata_offset,
            stage: Stage::LayoutResolved,
        }
    }

    /// The resolved section placement.
    pub fn layout(&self) -> &SectionLayout {
        &self.layout
    }

    /// Current progress.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Execute the full sequence and produce the handoff addresses.
    ///
    /// The capacity check completes before the boot interface is touched or
    /// any byte of RAM is written. On error the caller must report and
    /// halt, never retry.
    ///
    /// # Safety
    ///
    /// The image metadata must describe the memory it is embedded in, and
    /// the RAM window named by `boot` must be exclusively owned by the
    /// relocator for the duration of the call.
    pub unsafe fn run(mut self, boot: &mut BootInterface) -> RelocResult<Handoff> {
        self.layout.check_capacity(boot.ram_end)?;
        self.stage = Stage::CapacityChecked;

        reloc_debug!(
            "layout: got {:#x} rom.ram {:#x} ram {:#x} end {:#x}",
            self.layout.got.dest,
            self.layout.rom_ram.dest,
            self.layout.ram.dest,
            self.layout.ram_high_water()
        );

        // Both bookkeeping fields are final before the first copy; the
        // capacity check has already proven the regions fit.
        boot.unused_ram_start = self.layout.ram_high_water();
        boot.unused_rom_start = round_up(
            boot.unused_rom_start
                + self.metadata_offset
                + METADATA_HEADER_SIZE
                + self.meta.symbols().rom_ram_end,
            ROM_RETENTION_ALIGN,
        );

        unsafe {
            copy::copy_forward(
                self.layout.rom_ram.dest as *mut u8,
                self.layout.rom_ram.source as *const u8,
                self.layout.rom_ram.size,
            );
        }
        self.stage = Stage::DataCopied;

        unsafe { copy::zero_fill(self.layout.ram.dest as *mut u8, self.layout.ram.size) };
        self.stage = Stage::BssCleared;

        unsafe { self.rewrite_got()? };
        self.stage = Stage::GotRewritten;

        unsafe { self.patch_pointers()? };
        self.stage = Stage::PointersPatched;

        reloc_debug!("relocated, entry {:#x}", self.layout.entry);

        Ok(Handoff {
            got_dest: self.layout.got.dest,
            entry: self.layout.entry,
        })
    }

    /// Rewrite every offset-table slot into an absolute address.
    ///
    /// Reads from the source GOT and writes to the relocated GOT; the two
    /// never alias. Slot values are offsets into the logical section
    /// concatenation and every section is a legal target.
    unsafe fn rewrite_got(&self) -> RelocResult<()> {
        let entries = self.layout.got.size / WORD_SIZE;
        let src = self.layout.got.source as *const Word;
        let dst = self.layout.got.dest as *mut Word;

        for i in 0..entries {
            let offset = unsafe { src.add(i).read() };
            let addr = translate::resolve(&self.layout, offset, GOT_ENTRY)?;
            unsafe { dst.add(i).write(addr) };
        }
        Ok(())
    }

    /// Rewrite every patch-table slot into an absolute address.
    ///
    /// Two-stage resolution per entry: the slot offset names where the slot
    /// lives after relocation, while the offset stored *in* the slot (read
    /// from its pre-relocation location) names what it must point at. The
    /// first failing entry aborts the walk.
    unsafe fn patch_pointers(&self) -> RelocResult<()> {
        for entry in self.meta.patch_entries() {
            let slot_dest = translate::resolve(&self.layout, entry.slot_offset, PATCH_SLOT)?;

            let slot_source = self.layout.rom.source + entry.slot_offset;
            let stored_offset = unsafe { (slot_source as *const Word).read() };

            let value = translate::resolve(&self.layout, stored_offset, PATCH_VALUE)?;
            unsafe { (slot_dest as *mut Word).write(value) };
        }
        Ok(())
    }
}

/// Relocate the image described by `boot` and return the handoff addresses.
///
/// This is the whole portable sequence in one call; the entry shim maps
/// `Ok` to control transfer and `Err` to the fatal reporter.
///
/// # Safety
///
/// See [`Relocator::new`] and [`Relocator::run`].
pub unsafe fn relocate(
    boot: &mut BootInterface,
    metadata_offset: usize,
) -> RelocResult<Handoff> {
    let relocator =
        unsafe { Relocator::new(boot.image_start, metadata_offset, boot.unused_ram_start) };
    unsafe { relocator.run(boot) }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;
    use crate::error::RelocError;

    // Section sizes in words for the synthetic image.
    const ROM_W: usize = 4;
    const GOT_W: usize = 4;
    const ROM_RAM_W: usize = 3;
    const RAM_W: usize = 2;

    const ROM: usize = ROM_W * WORD_SIZE;
    const GOT: usize = GOT_W * WORD_SIZE;
    const ROM_RAM: usize = ROM_RAM_W * WORD_SIZE;
    const RAM: usize = RAM_W * WORD_SIZE;

    const SENTINEL: u8 = 0xA5;

    /// A synthetic image plus a sentinel-filled RAM window sized to hold
    /// `got + rom.ram + ram` exactly, with `slack` extra words.
    struct Fixture {
        image: Vec<Word>,
        ram: Vec<u8>,
    }

    impl Fixture {
        /// Image layout: symbol table, patch count, patch entries,
        /// then .rom, .got, .rom.ram words.
        fn new(patches: &[Word], got_entries: [Word; GOT_W], slack: usize) -> Self {
            let mut image = Vec::new();
            image.extend([
                2 * WORD_SIZE,             // entry_point: third .rom word
                ROM,
                GOT,
                ROM_RAM,
                RAM,
                ROM + GOT + ROM_RAM,       // rom_ram_end
            ]);
            image.push(patches.len());
            image.extend(patches);
            // .rom: recognizable constants; word 3 is patch-slot source data
            // for tests that point a slot offset into .rom.ram or .ram.
            image.extend([0xC0DE_0000, 0xC0DE_0001, 0xC0DE_0002, 0xC0DE_0003]);
            image.extend(got_entries);
            // .rom.ram: initialized data, including stored offsets that
            // patch entries may reference through their source location.
            image.extend([0xDA7A_0000, ROM + GOT + ROM_RAM + WORD_SIZE, 0xDA7A_0002]);

            let ram = vec![SENTINEL; GOT + ROM_RAM + RAM + slack * WORD_SIZE];
            Fixture { image, ram }
        }

        fn boot(&mut self) -> BootInterface {
            let ram_base = self.ram.as_mut_ptr() as usize;
            BootInterface {
                image_start: self.image.as_ptr() as usize,
                unused_ram_start: ram_base,
                ram_end: ram_base + self.ram.len(),
                unused_rom_start: 0x0801_0000,
            }
        }

        fn ram_words(&self) -> Vec<Word> {
            self.ram
                .chunks_exact(WORD_SIZE)
                .map(|c| Word::from_ne_bytes(c.try_into().expect("word chunk")))
                .collect()
        }
    }

    /// Offsets every section accepts: one per section, in-range.
    fn benign_got_entries() -> [Word; GOT_W] {
        [0, ROM, ROM + GOT + WORD_SIZE, ROM + GOT + ROM_RAM]
    }

    #[test]
    fn full_sequence_relocates_and_reports_handoff() {
        let mut fx = Fixture::new(&[], benign_got_entries(), 0);
        let mut boot = fx.boot();
        let ram_base = boot.unused_ram_start;

        let handoff = unsafe { relocate(&mut boot, 0) }.expect("relocation");

        assert_eq!(handoff.got_dest, ram_base);
        // entry = rom source + entry offset; .rom starts after the six
        // symbol words and the (empty) patch table's count word
        let rom_source = fx.image.as_ptr() as usize + 7 * WORD_SIZE;
        assert_eq!(handoff.entry, rom_source + 2 * WORD_SIZE);

        // RAM bookkeeping lands exactly at the end of .ram
        assert_eq!(boot.unused_ram_start, ram_base + GOT + ROM_RAM + RAM);
        // ROM bookkeeping is rounded to the retention granularity
        assert_eq!(
            boot.unused_rom_start,
            round_up(
                0x0801_0000 + METADATA_HEADER_SIZE + ROM + GOT + ROM_RAM,
                ROM_RETENTION_ALIGN
            )
        );
        assert_eq!(boot.unused_rom_start % ROM_RETENTION_ALIGN, 0);

        // .rom.ram bytes arrived intact, .ram is zero
        let words = fx.ram_words();
        assert_eq!(words[GOT_W], 0xDA7A_0000);
        assert_eq!(words[GOT_W + 2], 0xDA7A_0002);
        assert_eq!(&words[GOT_W + ROM_RAM_W..][..RAM_W], &[0, 0]);
    }

    #[test]
    fn got_rewrite_matches_independent_translation() {
        let entries = benign_got_entries();
        let mut fx = Fixture::new(&[], entries, 0);
        let mut boot = fx.boot();

        let relocator = unsafe { Relocator::new(boot.image_start, 0, boot.unused_ram_start) };
        assert_eq!(relocator.stage(), Stage::LayoutResolved);
        let layout = *relocator.layout();

        unsafe { relocator.run(&mut boot) }.expect("relocation");

        let words = fx.ram_words();
        for (i, &offset) in entries.iter().enumerate() {
            let expected =
                translate::resolve(&layout, offset, GOT_ENTRY).expect("benign offset");
            assert_eq!(words[i], expected, "got slot {i}");
        }
        // The .rom entry resolved into the image, the rest into the window
        assert_eq!(words[0], layout.rom.source);
        assert_eq!(words[1], layout.got.dest);
    }

    #[test]
    fn patch_entry_rewrites_slot_through_double_resolution() {
        // Slot lives in .rom.ram (second word); its source location stores
        // an offset naming the second .ram word.
        let slot_offset = ROM + GOT + WORD_SIZE;
        let mut fx = Fixture::new(&[slot_offset], benign_got_entries(), 0);
        let mut boot = fx.boot();
        let ram_base = boot.unused_ram_start;

        unsafe { relocate(&mut boot, 0) }.expect("relocation");

        let words = fx.ram_words();
        let slot_index = GOT_W + 1;
        let expected_target = ram_base + GOT + ROM_RAM + WORD_SIZE;
        assert_eq!(words[slot_index], expected_target);
    }

    #[test]
    fn capacity_failure_precedes_any_ram_write() {
        let mut fx = Fixture::new(&[], benign_got_entries(), 0);
        let mut boot = fx.boot();
        boot.ram_end -= 1; // one byte short of the minimum footprint
        let rom_book = boot.unused_rom_start;

        let err = unsafe { relocate(&mut boot, 0) };
        assert_eq!(err, Err(RelocError::InsufficientRam));

        // Not a single byte of the window was touched, and the
        // bookkeeping fields were left alone.
        assert!(fx.ram.iter().all(|&b| b == SENTINEL));
        assert_eq!(boot.unused_rom_start, rom_book);
    }

    #[test]
    fn out_of_bounds_got_entry_fails() {
        let mut bad = benign_got_entries();
        bad[3] = ROM + GOT + ROM_RAM + RAM; // first offset past the end
        let mut fx = Fixture::new(&[], bad, 0);
        let mut boot = fx.boot();

        let err = unsafe { relocate(&mut boot, 0) };
        assert_eq!(err, Err(RelocError::OffsetOutOfBounds));
    }

    #[test]
    fn patch_slot_in_rom_aborts_before_later_entries() {
        let good_slot = ROM + GOT + WORD_SIZE;
        let mut fx = Fixture::new(&[0, good_slot], benign_got_entries(), 0);
        let mut boot = fx.boot();

        let err = unsafe { relocate(&mut boot, 0) };
        assert_eq!(err, Err(RelocError::PatchSlotInRom));

        // The good entry behind the bad one was never patched: its
        // relocated slot still holds the copied source word.
        let words = fx.ram_words();
        assert_eq!(words[GOT_W + 1], ROM + GOT + ROM_RAM + WORD_SIZE);
    }

    #[test]
    fn patch_slot_in_got_is_its_own_failure() {
        let mut fx = Fixture::new(&[ROM], benign_got_entries(), 0);
        let mut boot = fx.boot();

        let err = unsafe { relocate(&mut boot, 0) };
        assert_eq!(err, Err(RelocError::PatchSlotInGot));
    }

    #[test]
    fn slack_in_the_window_is_left_untouched() {
        let mut fx = Fixture::new(&[], benign_got_entries(), 3);
        let mut boot = fx.boot();
        let used = GOT + ROM_RAM + RAM;

        unsafe { relocate(&mut boot, 0) }.expect("relocation");

        assert!(fx.ram[used..].iter().all(|&b| b == SENTINEL));
        assert_eq!(boot.unused_ram_start, fx.ram.as_ptr() as usize + used);
    }
}
