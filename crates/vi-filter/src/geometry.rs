//! Register-derived per-frame geometry: active region, scale factors,
//! interlace field tracking, blanking band.

use crate::prescale::{PRESCALE_HEIGHT, PRESCALE_WIDTH};
use crate::registers::{AaMode, PixelType, RegIndex, ViControl};
use crate::traits::{MessageSink, RegisterFile};

/// Latched one-shot diagnostics. Each flag fires its warning exactly once
/// per process lifetime, then stays silent.
#[derive(Debug, Default)]
pub struct OneTimeWarnings {
    pub vbus_clock: bool,
    pub nolerp_glitch: bool,
}

/// Interlace-field bookkeeping carried across frames. `vi_init`'s
/// `oldvstart = 1337` sentinel guarantees the first frame never matches it.
#[derive(Debug, Clone, Copy)]
pub struct InterlaceHistory {
    pub prevvicurrent: bool,
    pub emucontrolsvicurrent: Option<bool>,
    pub prevserrate: bool,
    pub oldlowerfield: bool,
    pub oldvstart: i32,
    pub prevwasblank: bool,
}

impl Default for InterlaceHistory {
    fn default() -> Self {
        Self {
            prevvicurrent: false,
            emucontrolsvicurrent: None,
            prevserrate: false,
            oldlowerfield: false,
            oldvstart: 1337,
            prevwasblank: false,
        }
    }
}

/// A fatal, invariant-violation-class register decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    VactiveLinesOverflow { vactivelines: i32 },
}

/// The result of attempting to decode one frame's normal-path geometry.
pub enum GeometryOutcome {
    /// Nothing to do this frame (blank repeat, zero origin, negative
    /// active line count).
    Skip,
    /// A programmer/invariant-violation-class error.
    Error(GeometryError),
    /// A complete geometry record ready for the filter pipeline.
    Ready(FrameGeometry),
}

/// Per-frame rasterization plan for the normal (AA/divot/bilerp) path.
#[derive(Debug, Clone, Copy)]
pub struct FrameGeometry {
    pub hres: i32,
    pub vres: i32,
    pub h_start: i32,
    pub v_start: i32,
    pub x_add: i32,
    pub y_add: i32,
    pub x_start_init: i32,
    pub y_start: i32,
    pub minhpass: i32,
    pub maxhpass: i32,
    pub v_sync: i32,
    pub ispal: bool,
    pub linecount: i32,
    pub prescale_ptr: i32,
    pub lowerfield: bool,
    pub vi_width_low: i32,
    pub frame_buffer: u32,
    pub validh: bool,
    pub ctrl: ViControl,
}

/// Per-frame plan for the fast (direct decode, no AA/bilerp) path.
#[derive(Debug, Clone, Copy)]
pub struct FastGeometry {
    pub hres_raw: i32,
    pub vres_raw: i32,
    pub hres: i32,
    pub vres: i32,
    pub v_sync: i32,
    pub vi_width_low: i32,
    pub frame_buffer: u32,
    pub ctrl: ViControl,
}

/// Decode one frame's geometry for the normal path, per §4.1 of the
/// original `vi_process_start`.
pub fn compute_normal<R: RegisterFile, G: MessageSink>(
    regs: &R,
    history: &mut InterlaceHistory,
    warnings: &mut OneTimeWarnings,
    msg: &G,
) -> GeometryOutcome {
    let h_reg = regs.read(RegIndex::HStart);
    let mut h_start = ((h_reg >> 16) & 0x3ff) as i32;
    let h_end = (h_reg & 0x3ff) as i32;

    let v_reg = regs.read(RegIndex::VStart);
    let mut v_start = ((v_reg >> 16) & 0x3ff) as i32;
    let v_end = (v_reg & 0x3ff) as i32;

    let mut hres = h_end - h_start;
    let mut vres = (v_end - v_start) / 2;

    let ctrl = ViControl::decode(regs.read(RegIndex::Status));

    if ctrl.vbus_clock_enable && !warnings.vbus_clock {
        warnings.vbus_clock = true;
        msg.warning(
            "vbus_clock_enable bit set in VI_STATUS; this should never happen on real hardware",
        );
    }

    let v_sync = (regs.read(RegIndex::VSync) & 0x3ff) as i32;
    let x_add = (regs.read(RegIndex::XScale) & 0xfff) as i32;

    if matches!(ctrl.aa_mode, AaMode::Replicate)
        && ctrl.pixel_type == PixelType::Rgba5551
        && !warnings.nolerp_glitch
        && h_start < 0x80
        && x_add <= 0x200
    {
        warnings.nolerp_glitch = true;
        msg.warning(
            "disabling VI interpolation in 16-bit color modes glitches on hardware when \
             h_start < 128 and x_scale <= 0x200",
        );
    }

    let ispal = v_sync > 525 + 25;
    h_start -= if ispal { 128 } else { 108 };

    let mut x_start_init = ((regs.read(RegIndex::XScale) >> 16) & 0xfff) as i32;

    let mut h_start_clamped = false;
    if h_start < 0 {
        x_start_init += x_add * (-h_start);
        hres += h_start;
        h_start = 0;
        h_start_clamped = true;
    }

    let validinterlace = ctrl.pixel_type.has_image() && ctrl.serrate;
    if validinterlace && history.prevserrate && history.emucontrolsvicurrent.is_none() {
        let vcurrent_parity = (regs.read(RegIndex::VCurrentLine) & 1) != 0;
        history.emucontrolsvicurrent = Some(vcurrent_parity != history.prevvicurrent);
    }

    let mut lowerfield = false;
    if validinterlace {
        match history.emucontrolsvicurrent {
            Some(true) => {
                let vcurrent_parity = (regs.read(RegIndex::VCurrentLine) & 1) != 0;
                lowerfield = !vcurrent_parity;
            }
            Some(false) => {
                lowerfield = if v_start == history.oldvstart {
                    !history.oldlowerfield
                } else {
                    v_start < history.oldvstart
                };
            }
            // Undetermined (the first interlaced frame, before two
            // consecutive serrated frames let the decision be made):
            // stays false, matching the original's untouched `lowerfield = 0`.
            None => {}
        }
    }
    history.oldlowerfield = lowerfield;

    if validinterlace {
        history.prevserrate = true;
        history.prevvicurrent = (regs.read(RegIndex::VCurrentLine) & 1) != 0;
        history.oldvstart = v_start;
    } else {
        history.prevserrate = false;
    }

    let lineshifter = !ctrl.serrate;

    let vstartoffset = if ispal { 44 } else { 34 };
    v_start = (v_start - vstartoffset) / 2;

    let y_scale = regs.read(RegIndex::YScale);
    let mut y_start = ((y_scale >> 16) & 0xfff) as i32;
    let y_add = (y_scale & 0xfff) as i32;

    if v_start < 0 {
        y_start += y_add * (-v_start);
        v_start = 0;
    }

    let mut hres_clamped = false;
    if hres + h_start > PRESCALE_WIDTH {
        hres = PRESCALE_WIDTH - h_start;
        hres_clamped = true;
    }
    if vres + v_start > PRESCALE_HEIGHT {
        vres = PRESCALE_HEIGHT - v_start;
    }

    let vactivelines = v_sync - vstartoffset;
    if vactivelines > PRESCALE_HEIGHT {
        return GeometryOutcome::Error(GeometryError::VactiveLinesOverflow { vactivelines });
    }
    if vactivelines < 0 {
        return GeometryOutcome::Skip;
    }
    let _vactivelines = vactivelines >> i32::from(lineshifter);

    let validh = hres > 0 && h_start < PRESCALE_WIDTH;

    let minhpass = if h_start_clamped { 0 } else { 8 };
    let maxhpass = if hres_clamped { hres } else { hres - 7 };

    let is_blank = !ctrl.pixel_type.has_image();
    if is_blank && history.prevwasblank {
        return GeometryOutcome::Skip;
    }
    history.prevwasblank = is_blank;

    let linecount = if ctrl.serrate {
        2 * PRESCALE_WIDTH
    } else {
        PRESCALE_WIDTH
    };
    let prescale_ptr =
        v_start * linecount + h_start + if lowerfield { PRESCALE_WIDTH } else { 0 };

    let vi_width_low = (regs.read(RegIndex::Width) & 0xfff) as i32;
    let frame_buffer = regs.read(RegIndex::Origin) & 0xff_ffff;
    if frame_buffer == 0 {
        return GeometryOutcome::Skip;
    }

    GeometryOutcome::Ready(FrameGeometry {
        hres,
        vres,
        h_start,
        v_start,
        x_add,
        y_add,
        x_start_init,
        y_start,
        minhpass,
        maxhpass,
        v_sync,
        ispal,
        linecount,
        prescale_ptr,
        lowerfield,
        vi_width_low,
        frame_buffer,
        validh,
        ctrl,
    })
}

/// Decode one frame's geometry for the fast path, per §4.1's fast-start
/// variant (`vi_process_start_fast`). Returns `None` for every transient
/// skip condition (degenerate size, odd field, blank mode, zero origin).
pub fn compute_fast<R: RegisterFile>(regs: &R) -> Option<FastGeometry> {
    let h_reg = regs.read(RegIndex::HStart);
    let h_start = ((h_reg >> 16) & 0x3ff) as i32;
    let h_end = (h_reg & 0x3ff) as i32;

    let v_reg = regs.read(RegIndex::VStart);
    let v_start = ((v_reg >> 16) & 0x3ff) as i32;
    let v_end = (v_reg & 0x3ff) as i32;

    let hres = h_end - h_start;
    let vres = (v_end - v_start) / 2;
    if hres <= 0 || vres <= 0 {
        return None;
    }

    let x_add = (regs.read(RegIndex::XScale) & 0xfff) as i32;
    let y_add = (regs.read(RegIndex::YScale) & 0xfff) as i32;

    let hres_raw = x_add * hres / 1024;
    let vres_raw = y_add * vres / 1024;
    if hres_raw <= 0 || vres_raw <= 0 {
        return None;
    }

    if regs.read(RegIndex::VCurrentLine) & 1 != 0 {
        return None;
    }

    let vi_width_low = (regs.read(RegIndex::Width) & 0xfff) as i32;
    let frame_buffer = regs.read(RegIndex::Origin) & 0xff_ffff;
    if frame_buffer == 0 {
        return None;
    }

    let ctrl = ViControl::decode(regs.read(RegIndex::Status));
    if !ctrl.pixel_type.has_image() {
        return None;
    }

    let v_sync = (regs.read(RegIndex::VSync) & 0x3ff) as i32;

    Some(FastGeometry {
        hres_raw,
        vres_raw,
        hres,
        vres,
        v_sync,
        vi_width_low,
        frame_buffer,
        ctrl,
    })
}
