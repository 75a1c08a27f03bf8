//! # Bulk Copy Primitives
//!
//! Block moves for the boot-critical path. The copy descends through
//! granularity tiers - 48-byte blocks, then 8, 4, and single bytes - so the
//! widest naturally-aligned transfers the target supports carry most of the
//! traffic. On Armv7-M the 48-byte tier compiles to a load/store-multiple
//! pair over twelve registers.
//!
//! These are latency primitives, not correctness ones: whichever tier path
//! is taken, the result is bit-identical to a byte-at-a-time copy.

use crate::{Word, WORD_SIZE};

/// Bytes moved per widest-tier block.
const BLOCK: usize = 48;

/// Copy `len` bytes from `src` to `dst`, front to back.
///
/// # Safety
///
/// `src` must be readable and `dst` writable for `len` bytes, and the two
/// regions must not overlap.
pub unsafe fn copy_forward(dst: *mut u8, src: *const u8, len: usize) {
    let mut dst = dst;
    let mut src = src;
    let mut len = len;

    while len >= BLOCK {
        unsafe {
            let block = src.cast::<[u32; 12]>().read_unaligned();
            dst.cast::<[u32; 12]>().write_unaligned(block);
            src = src.add(BLOCK);
            dst = dst.add(BLOCK);
        }
        len -= BLOCK;
    }

    while len >= 8 {
        unsafe {
            let pair = src.cast::<[u32; 2]>().read_unaligned();
            dst.cast::<[u32; 2]>().write_unaligned(pair);
            src = src.add(8);
            dst = dst.add(8);
        }
        len -= 8;
    }

    if len >= 4 {
        unsafe {
            let word = src.cast::<u32>().read_unaligned();
            dst.cast::<u32>().write_unaligned(word);
            src = src.add(4);
            dst = dst.add(4);
        }
        len -= 4;
    }

    while len >= 1 {
        unsafe {
            dst.write(src.read());
            src = src.add(1);
            dst = dst.add(1);
        }
        len -= 1;
    }
}

/// Zero `len` bytes at `dst`, word-stepped with a byte tail.
///
/// Section sizes are whole words by builder contract; the tail only matters
/// for callers handing in odd lengths.
///
/// # Safety
///
/// `dst` must be writable and word-aligned for `len` bytes.
pub unsafe fn zero_fill(dst: *mut u8, len: usize) {
    let words = len / WORD_SIZE;
    let word_ptr = dst.cast::<Word>();
    for i in 0..words {
        unsafe { word_ptr.add(i).write(0) };
    }
    for i in (words * WORD_SIZE)..len {
        unsafe { dst.add(i).write(0) };
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    fn check_copy(len: usize) {
        let src: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let mut dst = vec![0x5A_u8; len + 8];

        unsafe { copy_forward(dst.as_mut_ptr(), src.as_ptr(), len) };

        assert_eq!(&dst[..len], &src[..], "length {len}");
        // Nothing past the requested length is touched
        assert!(dst[len..].iter().all(|&b| b == 0x5A), "length {len}");
    }

    #[test]
    fn copies_match_naive_byte_copy() {
        for len in [0, 1, 3, 7, 47, 48, 49, 96, 100, 255] {
            check_copy(len);
        }
    }

    #[test]
    fn zero_fill_exact_and_tail() {
        let mut buf = vec![0xA5_u8; 64];
        unsafe { zero_fill(buf.as_mut_ptr(), 37) };
        assert!(buf[..37].iter().all(|&b| b == 0));
        assert!(buf[37..].iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn zero_fill_empty_is_a_no_op() {
        let mut buf = [0xA5_u8; 8];
        unsafe { zero_fill(buf.as_mut_ptr(), 0) };
        assert_eq!(buf, [0xA5; 8]);
    }
}
