//! The normal-path per-scanline filter pipeline: fetch, AA, divot,
//! vertical lerp, horizontal lerp, gamma.

use crate::cache::ScanlineCache;
use crate::divot::divot_filter;
use crate::fetch::fetch_filter;
use crate::gamma::{DitherRng, GammaTables};
use crate::geometry::FrameGeometry;
use crate::lerp::vl_lerp;
use crate::prescale::Prescale;
use crate::registers::AaMode;
use crate::traits::VideoMemory;

/// Process every scanline `j` in `[j_start, vres)` stepping by `j_add`,
/// writing into `prescale`. Allocates its own scanline cache, so it is
/// safe to call once per worker with disjoint `(j_start, j_add)` pairs.
pub fn run_normal_scanlines<M: VideoMemory>(
    geom: &FrameGeometry,
    mem: &M,
    gamma: &GammaTables,
    rng: &mut DitherRng,
    prescale: &mut Prescale,
    j_start: i32,
    j_add: i32,
) {
    let mut cache = ScanlineCache::new();
    let marker_init = (geom.x_start_init >> 10) - 1;
    let mut fetchbugstate: u8 = 0;
    let mut cache_init = false;

    let mut j = j_start;
    while j < geom.vres {
        let curry = geom.y_start + j * geom.y_add;
        let nexty = geom.y_start + (j + 1) * geom.y_add;
        let prevy = curry >> 10;

        cache.reset_markers(marker_init, geom.ctrl.divot_enable);

        let yfrac = (curry >> 5) & 0x1f;
        let pixels = geom.vi_width_low * prevy;
        let nextpixels = pixels + geom.vi_width_low;

        fetchbugstate = if prevy == (nexty >> 10) {
            2
        } else {
            fetchbugstate >> 1
        };

        let row_base = geom.prescale_ptr + geom.linecount * j;

        let mut x_start = geom.x_start_init;
        for i in 0..geom.hres {
            let line_x = x_start >> 10;
            let prev_line_x = line_x - 1;
            let next_line_x = line_x + 1;
            let far_line_x = line_x + 2;

            let cur_src = pixels + line_x;
            let prev_src = pixels + prev_line_x;
            let next_src = pixels + next_line_x;
            let far_src = pixels + far_line_x;

            let scan_src = nextpixels + line_x;
            let prev_scan_src = nextpixels + prev_line_x;
            let next_scan_src = nextpixels + next_line_x;
            let far_scan_src = nextpixels + far_line_x;

            let line_slot = line_x + 1;
            let prev_slot = prev_line_x + 1;
            let next_slot = next_line_x + 1;
            let far_slot = far_line_x + 1;

            let xfrac = (x_start >> 5) & 0x1f;
            let lerping =
                !matches!(geom.ctrl.aa_mode, AaMode::Replicate) && (xfrac != 0 || yfrac != 0);

            if prev_slot > cache.marker() {
                cache.set(prev_slot, fetch_filter(mem, geom.frame_buffer, prev_src, geom.ctrl, geom.vi_width_low, 0));
                cache.set(line_slot, fetch_filter(mem, geom.frame_buffer, cur_src, geom.ctrl, geom.vi_width_low, 0));
                cache.set(next_slot, fetch_filter(mem, geom.frame_buffer, next_src, geom.ctrl, geom.vi_width_low, 0));
                cache.advance_marker(next_slot);
            } else if line_slot > cache.marker() {
                cache.set(line_slot, fetch_filter(mem, geom.frame_buffer, cur_src, geom.ctrl, geom.vi_width_low, 0));
                cache.set(next_slot, fetch_filter(mem, geom.frame_buffer, next_src, geom.ctrl, geom.vi_width_low, 0));
                cache.advance_marker(next_slot);
            } else if next_slot > cache.marker() {
                cache.set(next_slot, fetch_filter(mem, geom.frame_buffer, next_src, geom.ctrl, geom.vi_width_low, 0));
                cache.advance_marker(next_slot);
            }

            if prev_slot > cache.next_marker() {
                cache.set_next(prev_slot, fetch_filter(mem, geom.frame_buffer, prev_scan_src, geom.ctrl, geom.vi_width_low, fetchbugstate));
                cache.set_next(line_slot, fetch_filter(mem, geom.frame_buffer, scan_src, geom.ctrl, geom.vi_width_low, fetchbugstate));
                cache.set_next(next_slot, fetch_filter(mem, geom.frame_buffer, next_scan_src, geom.ctrl, geom.vi_width_low, fetchbugstate));
                cache.advance_next_marker(next_slot);
            } else if line_slot > cache.next_marker() {
                cache.set_next(line_slot, fetch_filter(mem, geom.frame_buffer, scan_src, geom.ctrl, geom.vi_width_low, fetchbugstate));
                cache.set_next(next_slot, fetch_filter(mem, geom.frame_buffer, next_scan_src, geom.ctrl, geom.vi_width_low, fetchbugstate));
                cache.advance_next_marker(next_slot);
            } else if next_slot > cache.next_marker() {
                cache.set_next(next_slot, fetch_filter(mem, geom.frame_buffer, next_scan_src, geom.ctrl, geom.vi_width_low, fetchbugstate));
                cache.advance_next_marker(next_slot);
            }

            if geom.ctrl.divot_enable {
                if far_slot > cache.marker() {
                    cache.set(far_slot, fetch_filter(mem, geom.frame_buffer, far_src, geom.ctrl, geom.vi_width_low, 0));
                    cache.advance_marker(far_slot);
                }
                if far_slot > cache.next_marker() {
                    cache.set_next(far_slot, fetch_filter(mem, geom.frame_buffer, far_scan_src, geom.ctrl, geom.vi_width_low, fetchbugstate));
                    cache.advance_next_marker(far_slot);
                }

                if line_slot > cache.divot_marker() {
                    cache.set_divot(line_slot, divot_filter(cache.get(line_slot), cache.get(prev_slot), cache.get(next_slot)));
                    cache.set_divot(next_slot, divot_filter(cache.get(next_slot), cache.get(line_slot), cache.get(far_slot)));
                    cache.advance_divot_marker(next_slot);
                } else if next_slot > cache.divot_marker() {
                    cache.set_divot(next_slot, divot_filter(cache.get(next_slot), cache.get(line_slot), cache.get(far_slot)));
                    cache.advance_divot_marker(next_slot);
                }

                if line_slot > cache.divot_next_marker() {
                    cache.set_divot_next(line_slot, divot_filter(cache.get_next(line_slot), cache.get_next(prev_slot), cache.get_next(next_slot)));
                    cache.set_divot_next(next_slot, divot_filter(cache.get_next(next_slot), cache.get_next(line_slot), cache.get_next(far_slot)));
                    cache.advance_divot_next_marker(next_slot);
                } else if next_slot > cache.divot_next_marker() {
                    cache.set_divot_next(next_slot, divot_filter(cache.get_next(next_slot), cache.get_next(line_slot), cache.get_next(far_slot)));
                    cache.advance_divot_next_marker(next_slot);
                }
            }

            let mut color = if geom.ctrl.divot_enable {
                cache.get_divot(line_slot)
            } else {
                cache.get(line_slot)
            };

            if lerping {
                let (next_color, scan_color, scan_next_color) = if geom.ctrl.divot_enable {
                    (
                        cache.get_divot(next_slot),
                        cache.get_divot_next(line_slot),
                        cache.get_divot_next(next_slot),
                    )
                } else {
                    (
                        cache.get(next_slot),
                        cache.get_next(line_slot),
                        cache.get_next(next_slot),
                    )
                };
                let next_color = vl_lerp(next_color, scan_next_color, yfrac);
                color = vl_lerp(color, scan_color, yfrac);
                color = vl_lerp(color, next_color, xfrac);
            }

            let (r, g, b) = gamma.apply(rng, color.r, color.g, color.b, &geom.ctrl);

            let packed = if i >= geom.minhpass && i < geom.maxhpass {
                (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
            } else {
                0
            };
            prescale.set((row_base + i) as usize, packed);

            x_start += geom.x_add;
        }

        if !cache_init && geom.y_add == 0x400 {
            cache.swap_rows(marker_init);
            if geom.ctrl.divot_enable {
                cache.swap_divot_rows(marker_init);
            }
            cache_init = true;
        }

        j += j_add;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prescale::PRESCALE_WIDTH;
    use crate::registers::ViControl;

    struct StripedMem;

    impl VideoMemory for StripedMem {
        fn read16(&self, idx: u32) -> u16 {
            if idx % 2 == 0 {
                0xFFFF
            } else {
                0x0000
            }
        }
        fn read32(&self, idx: u32) -> u32 {
            if idx % 2 == 0 {
                0xFFFF_FFFF
            } else {
                0
            }
        }
        fn read_pair16(&self, idx: u32) -> (u16, u8) {
            (self.read16(idx), 7)
        }
    }

    fn geom(aa_mode: AaMode, divot_enable: bool) -> FrameGeometry {
        let mut ctrl = ViControl::decode(0x0000_3002);
        ctrl.aa_mode = aa_mode;
        ctrl.divot_enable = divot_enable;
        FrameGeometry {
            hres: 16,
            vres: 4,
            h_start: 0,
            v_start: 0,
            x_add: 1024,
            y_add: 1024,
            x_start_init: 0,
            y_start: 0,
            minhpass: 0,
            maxhpass: 16,
            v_sync: 525,
            ispal: false,
            linecount: PRESCALE_WIDTH,
            prescale_ptr: 0,
            lowerfield: false,
            vi_width_low: 16,
            frame_buffer: 0x1000,
            validh: true,
            ctrl,
        }
    }

    #[test]
    fn replicate_with_no_fraction_matches_fetch_exactly() {
        let geom = geom(AaMode::Replicate, false);
        let mem = StripedMem;
        let gamma = GammaTables::init();
        let mut rng = DitherRng::new(1);
        let mut prescale = Prescale::new();

        run_normal_scanlines(&geom, &mem, &gamma, &mut rng, &mut prescale, 0, 1);

        let packed = prescale.get(0);
        let expected = fetch_filter(&mem, geom.frame_buffer, 0, geom.ctrl, geom.vi_width_low, 0);
        let expected_packed =
            (u32::from(expected.r) << 16) | (u32::from(expected.g) << 8) | u32::from(expected.b);
        assert_eq!(packed, expected_packed);
    }

    #[test]
    fn worker_count_is_observationally_transparent() {
        let geom = geom(AaMode::ResampleAaAlways, true);
        let mem = StripedMem;
        let gamma = GammaTables::init();

        let mut single = Prescale::new();
        let mut rng1 = DitherRng::new(7);
        run_normal_scanlines(&geom, &mem, &gamma, &mut rng1, &mut single, 0, 1);

        let mut parallel = Prescale::new();
        for worker in 0..3 {
            let mut rng = DitherRng::new(7);
            run_normal_scanlines(&geom, &mem, &gamma, &mut rng, &mut parallel, worker, 3);
        }

        assert_eq!(single.as_slice(), parallel.as_slice());
    }

    #[test]
    fn blanked_columns_are_forced_black() {
        let mut geom = geom(AaMode::Replicate, false);
        geom.minhpass = 2;
        geom.maxhpass = 14;
        let mem = StripedMem;
        let gamma = GammaTables::init();
        let mut rng = DitherRng::new(1);
        let mut prescale = Prescale::new();

        run_normal_scanlines(&geom, &mem, &gamma, &mut rng, &mut prescale, 0, 1);

        assert_eq!(prescale.get(0), 0);
        assert_eq!(prescale.get(15), 0);
    }
}
