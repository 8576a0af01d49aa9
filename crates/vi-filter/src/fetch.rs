//! Framebuffer sample fetch, dispatched on pixel format and AA mode.

use crate::cache::Ccvg;
use crate::registers::{AaMode, ViControl};
use crate::traits::VideoMemory;

/// Fetch one source sample at `index` (in the pixel format's natural
/// addressing unit: halfwords for 16-bit, words for 32-bit), applying the
/// AA/replicate distinction and the fetch-bug row compensation.
///
/// `fetch_bug` is the pipeline's `fetchbugstate` value for this call: when
/// nonzero, the two most recently requested output rows mapped to the same
/// source row, and the hardware still advances to the physical next row for
/// this fetch rather than re-reading the one just fetched.
pub fn fetch_filter<M: VideoMemory>(
    mem: &M,
    frame_buffer: u32,
    index: i32,
    ctrl: ViControl,
    width: i32,
    fetch_bug: u8,
) -> Ccvg {
    let index = if fetch_bug != 0 { index + width } else { index };
    let index = index.max(0) as u32;

    if ctrl.pixel_type.is_32bit() {
        fetch_32(mem, frame_buffer, index)
    } else {
        fetch_16(mem, frame_buffer, index, ctrl.aa_mode)
    }
}

fn fetch_16<M: VideoMemory>(mem: &M, frame_buffer: u32, index: u32, aa_mode: AaMode) -> Ccvg {
    let base = frame_buffer >> 1;
    match aa_mode {
        // Replicate has no coverage plane to read; resample-only treats
        // every sample as fully covered without consulting it either.
        AaMode::ResampleOnly | AaMode::Replicate => {
            let pix = mem.read16(base + index);
            expand_5551(pix, 7)
        }
        AaMode::ResampleAaAlways | AaMode::ResampleAaIfNeeded => {
            let (pix, hval) = mem.read_pair16(base + index);
            expand_5551(pix, hval & 0x7)
        }
    }
}

fn fetch_32<M: VideoMemory>(mem: &M, frame_buffer: u32, index: u32) -> Ccvg {
    let base = frame_buffer >> 2;
    let pix = mem.read32(base + index);
    Ccvg {
        r: ((pix >> 24) & 0xff) as u8,
        g: ((pix >> 16) & 0xff) as u8,
        b: ((pix >> 8) & 0xff) as u8,
        cvg: 7,
    }
}

fn expand_5551(pix: u16, cvg: u8) -> Ccvg {
    Ccvg {
        r: (((pix >> 11) & 0x1f) << 3) as u8,
        g: (((pix >> 6) & 0x1f) << 3) as u8,
        b: (((pix >> 1) & 0x1f) << 3) as u8,
        cvg,
    }
}
