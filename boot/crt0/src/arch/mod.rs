//! # Architecture Support
//!
//! Target-specific primitives behind a flat module face: instruction-set
//! mode tagging, the semihosting debug channel, the register-priming jump
//! into the relocated image, and the permanent halt. Everything portable
//! stays in `keel-relocation`; only what genuinely needs inline assembly
//! lives here.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "arm")] {
        mod armv7m;
        pub use armv7m::{halt, thumb_entry, transfer, write0};
    }
}
