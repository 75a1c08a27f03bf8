//! # Armv7-M Primitives
//!
//! Semihosting output, Thumb entry tagging, and the final register-priming
//! jump. The semihosting calls trap to an attached debugger or emulator
//! via `bkpt` with the Angel SWI immediate; without a host attached the
//! core simply stops on the breakpoint, which is an acceptable end state
//! for a fatal path.

use core::arch::asm;
use core::ffi::{c_void, CStr};

use keel_relocation::BootInterface;

/// Semihosting operation: write a NUL-terminated string to the host console.
const SYS_WRITE0: usize = 0x04;

/// Set the low address bit so a `bx` to this address stays in Thumb state.
pub const fn thumb_entry(addr: usize) -> usize {
    (addr & !1) | 1
}

/// Write a NUL-terminated string to the host debug console.
pub fn write0(s: &CStr) {
    unsafe {
        asm!(
            "bkpt #0xab",
            inout("r0") SYS_WRITE0 => _,
            inout("r1") s.as_ptr() => _,
            options(nostack),
        );
    }
}

/// Stop the processor permanently.
///
/// Signals the debugger, then spins; there is no handler to unwind to and
/// no state worth preserving at this point.
pub fn halt() -> ! {
    loop {
        unsafe { asm!("bkpt #0", options(nomem, nostack)) };
    }
}

/// Prime the static-base registers and jump to the relocated entry point.
///
/// `r9` and `r10` both receive the relocated offset-table address - the
/// calling convention reads the static base from either, depending on how
/// the kernel was compiled. `boot` and `arg` travel in `r0`/`r1` as the
/// first two arguments of the relocated entry. The trailing spin models
/// the unreachable tail of the jump.
///
/// # Safety
///
/// `entry` must be the Thumb-tagged address of the relocated entry point,
/// and the relocation sequence must have completed, including the offset
/// table rewrite `got_dest` points at.
pub unsafe fn transfer(
    boot: *mut BootInterface,
    arg: *mut c_void,
    got_dest: usize,
    entry: usize,
) -> ! {
    unsafe {
        asm!(
            "mov r9, r2",
            "mov r10, r2",
            "bx r3",
            in("r0") boot,
            in("r1") arg,
            in("r2") got_dest,
            in("r3") entry,
            options(noreturn),
        )
    }
}
