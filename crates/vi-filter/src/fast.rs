//! The fast path: direct per-pixel decode with no AA, divot, or bilerp.
//! Gamma correction still applies — the original calls the same
//! `gamma_filters` from both the normal and fast middle stages.

use crate::gamma::{DitherRng, GammaTables};
use crate::geometry::FastGeometry;
use crate::prescale::Prescale;
use crate::registers::PixelType;
use crate::traits::VideoMemory;

/// Which source the fast path reads from. `Normal` mode bypasses this
/// module entirely and uses `pipeline::run_normal_scanlines` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastMode {
    /// Framebuffer color, matching the pixel format in `ctrl.type`.
    Color,
    /// Top 8 bits of the Z-buffer, replicated across R/G/B.
    Depth,
    /// The hidden coverage byte, replicated across R/G/B.
    Coverage,
}

/// Decode every scanline `y` in `[y_start, vres_raw)` stepping by `y_add`,
/// writing flat `hres_raw`-wide rows into `prescale`. Unlike the normal
/// path there is no scanline cache and no lowerfield offset: fast mode
/// always writes progressive, full-width rows starting at `prescale[0]`.
pub fn run_fast_scanlines<M: VideoMemory>(
    geom: &FastGeometry,
    mode: FastMode,
    mem: &M,
    zbuf_addr: u32,
    gamma: &GammaTables,
    rng: &mut DitherRng,
    prescale: &mut Prescale,
    y_start: i32,
    y_add: i32,
) {
    let mut y = y_start;
    while y < geom.vres_raw {
        let line = y * geom.vi_width_low;
        let row_base = y * geom.hres_raw;

        for x in 0..geom.hres_raw {
            let (r, g, b) = fetch_fast(geom, mode, mem, zbuf_addr, line + x);
            let (r, g, b) = gamma.apply(rng, r, g, b, &geom.ctrl);
            let packed = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
            prescale.set((row_base + x) as usize, packed);
        }

        y += y_add;
    }
}

fn fetch_fast<M: VideoMemory>(
    geom: &FastGeometry,
    mode: FastMode,
    mem: &M,
    zbuf_addr: u32,
    index: i32,
) -> (u8, u8, u8) {
    let index = index as u32;
    match mode {
        FastMode::Color => match geom.ctrl.pixel_type {
            PixelType::Rgba5551 => {
                let pix = mem.read16((geom.frame_buffer >> 1) + index);
                (
                    (((pix >> 11) & 0x1f) << 3) as u8,
                    (((pix >> 6) & 0x1f) << 3) as u8,
                    (((pix >> 1) & 0x1f) << 3) as u8,
                )
            }
            _ => {
                let pix = mem.read32((geom.frame_buffer >> 2) + index);
                (
                    ((pix >> 24) & 0xff) as u8,
                    ((pix >> 16) & 0xff) as u8,
                    ((pix >> 8) & 0xff) as u8,
                )
            }
        },
        FastMode::Depth => {
            let v = (mem.read16((zbuf_addr >> 1) + index) >> 8) as u8;
            (v, v, v)
        }
        FastMode::Coverage => {
            let (pix, hval) = mem.read_pair16((geom.frame_buffer >> 1) + index);
            let v = ((u16::from(pix & 1) << 2) | u16::from(hval)) << 5;
            let v = v as u8;
            (v, v, v)
        }
    }
}

/// `vi_process_end_fast`'s output height formula: rescale the decoded
/// height to the sync-derived display height, then squash for 16:9 if
/// requested.
#[must_use]
pub fn fast_output_height(geom: &FastGeometry, v_sync_nominal: i32, widescreen: bool) -> i32 {
    let filtered_height = (geom.vres << 1) * v_sync_nominal / geom.v_sync;
    let mut output_height = geom.hres_raw * filtered_height / geom.hres;
    if widescreen {
        output_height = output_height * 9 / 16;
    }
    output_height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prescale::{PRESCALE_WIDTH, V_SYNC_NTSC};
    use crate::registers::{PixelType, ViControl};

    struct FakeMem;

    impl VideoMemory for FakeMem {
        fn read16(&self, idx: u32) -> u16 {
            if idx == 0 {
                0xFFFF
            } else {
                0x00FF
            }
        }
        fn read32(&self, idx: u32) -> u32 {
            if idx == 0 {
                0xFFFF_FFFF
            } else {
                0
            }
        }
        fn read_pair16(&self, idx: u32) -> (u16, u8) {
            (self.read16(idx), 5)
        }
    }

    fn geom(pixel_type: PixelType) -> FastGeometry {
        let mut ctrl = ViControl::decode(0x0000_3002);
        ctrl.pixel_type = pixel_type;
        FastGeometry {
            hres_raw: 4,
            vres_raw: 2,
            hres: 4,
            vres: 2,
            v_sync: V_SYNC_NTSC,
            vi_width_low: 4,
            frame_buffer: 0,
            ctrl,
        }
    }

    #[test]
    fn color_mode_top_left_sample_is_white() {
        let geom = geom(PixelType::Rgba5551);
        let mem = FakeMem;
        let gamma = GammaTables::init();
        let mut rng = DitherRng::new(1);
        let mut prescale = Prescale::new();
        run_fast_scanlines(&geom, FastMode::Color, &mem, 0, &gamma, &mut rng, &mut prescale, 0, 1);
        assert_eq!(prescale.get(0), 0x00F8_F8F8);
    }

    #[test]
    fn depth_mode_reads_top_byte_of_zbuffer() {
        let geom = geom(PixelType::Rgba5551);
        let mem = FakeMem;
        let gamma = GammaTables::init();
        let mut rng = DitherRng::new(1);
        let mut prescale = Prescale::new();
        run_fast_scanlines(&geom, FastMode::Depth, &mem, 0x2000, &gamma, &mut rng, &mut prescale, 0, 1);
        assert_eq!(prescale.get(0), 0x00FF_FFFF);
    }

    #[test]
    fn coverage_mode_packs_low_bit_and_hidden_byte() {
        let geom = geom(PixelType::Rgba5551);
        let mem = FakeMem;
        let gamma = GammaTables::init();
        let mut rng = DitherRng::new(1);
        let mut prescale = Prescale::new();
        run_fast_scanlines(&geom, FastMode::Coverage, &mem, 0, &gamma, &mut rng, &mut prescale, 0, 1);
        // pix=0xFFFF -> bit0=1; hval=5 -> ((1<<2)|5)<<5 = 0x1C0 truncated to u8 = 0x80
        let expected = ((1u16 << 2 | 5) << 5) as u8;
        let expected_packed =
            (u32::from(expected) << 16) | (u32::from(expected) << 8) | u32::from(expected);
        assert_eq!(prescale.get(0), expected_packed);
    }

    #[test]
    fn output_addressing_is_flat_not_linecount_strided() {
        let geom = geom(PixelType::Rgba5551);
        let mem = FakeMem;
        let gamma = GammaTables::init();
        let mut rng = DitherRng::new(1);
        let mut prescale = Prescale::new();
        run_fast_scanlines(&geom, FastMode::Color, &mem, 0, &gamma, &mut rng, &mut prescale, 0, 1);
        assert!(geom.hres_raw < PRESCALE_WIDTH);
        assert_eq!(prescale.get(geom.hres_raw as usize), prescale.get(4));
    }

    #[test]
    fn worker_striding_covers_every_row_exactly_once() {
        let geom = geom(PixelType::Rgba5551);
        let mem = FakeMem;
        let gamma = GammaTables::init();

        let mut single = Prescale::new();
        let mut rng1 = DitherRng::new(3);
        run_fast_scanlines(&geom, FastMode::Color, &mem, 0, &gamma, &mut rng1, &mut single, 0, 1);

        let mut parallel = Prescale::new();
        let mut rng2 = DitherRng::new(3);
        run_fast_scanlines(&geom, FastMode::Color, &mem, 0, &gamma, &mut rng2, &mut parallel, 0, 2);
        run_fast_scanlines(&geom, FastMode::Color, &mem, 0, &gamma, &mut rng2, &mut parallel, 1, 2);

        let n = (geom.hres_raw * geom.vres_raw) as usize;
        assert_eq!(single.as_slice()[..n], parallel.as_slice()[..n]);
    }

    #[test]
    fn end_height_matches_ntsc_progressive_passthrough() {
        let geom = geom(PixelType::Rgba5551);
        let height = fast_output_height(&geom, V_SYNC_NTSC, false);
        assert_eq!(height, geom.vres << 1);
    }

    #[test]
    fn widescreen_squashes_by_nine_sixteenths() {
        let geom = geom(PixelType::Rgba5551);
        let normal = fast_output_height(&geom, V_SYNC_NTSC, false);
        let wide = fast_output_height(&geom, V_SYNC_NTSC, true);
        assert_eq!(wide, normal * 9 / 16);
    }
}
