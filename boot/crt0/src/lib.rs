//! # keel crt0
//!
//! The Armv7-M entry shim: the very first code executed after the boot
//! environment places the kernel image in memory. It drives the portable
//! relocation core in `keel-relocation` and owns the two pieces that need
//! target primitives - the fatal reporter and the final control transfer.
//!
//! ## Boot Flow
//!
//! ```text
//! boot environment
//!       │  _start(boot, arg)
//!       ▼
//! ┌─────────────┐   Ok(handoff)   ┌─────────────────────────────┐
//! │ relocate()  │────────────────▶│ prime static base, bx entry │──▶ kernel
//! └─────────────┘                 └─────────────────────────────┘
//!       │  Err(err)
//!       ▼
//! ┌──────────────────────────────┐
//! │ "crt0: <diagnostic>", halt   │
//! └──────────────────────────────┘
//! ```
//!
//! Everything runs before stacks, globals, or fault handlers can be
//! trusted: no global state is declared or touched anywhere in this crate,
//! and the error path uses only pc-addressable constants and the
//! semihosting channel.

#![no_std]

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        pub mod arch;
        pub mod fatal;

        use core::ffi::c_void;

        use keel_relocation::BootInterface;

        extern "C" {
            /// Emitted by the linker script: the *address* of this symbol
            /// encodes the byte offset of the metadata block from the start
            /// of the image.
            static __metadata_off: u8;
        }

        /// Entry point of the image.
        ///
        /// Called exactly once by the boot environment with the current
        /// memory layout and an opaque argument to forward to the relocated
        /// kernel. Never returns: control either transfers to the relocated
        /// entry point or the processor halts behind a diagnostic.
        ///
        /// # Safety
        ///
        /// `boot` must point to a live [`BootInterface`] describing the
        /// loaded image and a RAM window this code may claim exclusively.
        #[no_mangle]
        pub unsafe extern "C" fn _start(boot: *mut BootInterface, arg: *mut c_void) -> ! {
            let metadata_off = unsafe { core::ptr::addr_of!(__metadata_off) } as usize;
            let boot = unsafe { &mut *boot };

            match unsafe { keel_relocation::relocate(boot, metadata_off) } {
                Ok(handoff) => unsafe {
                    arch::transfer(
                        boot,
                        arg,
                        handoff.got_dest,
                        arch::thumb_entry(handoff.entry),
                    )
                },
                Err(err) => fatal::fail(err),
            }
        }

        #[cfg(target_os = "none")]
        #[panic_handler]
        fn panic(_: &core::panic::PanicInfo) -> ! {
            arch::halt()
        }
    }
    // On other architectures the crate compiles to an empty library so the
    // workspace builds and tests on a development host.
}
