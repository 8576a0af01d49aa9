//! Crop, aspect-correct, and upload the prescale buffer (normal path).
//!
//! Which row of the interlaced frame pair `oldlowerfield` vs `lowerfield`
//! should use here is an open question in the original: it reads
//! `oldlowerfield`, the value latched *before* this frame's interlace
//! decision, rather than the `lowerfield` just computed for it. Carried
//! here unchanged; see DESIGN.md.

use crate::geometry::FrameGeometry;
use crate::prescale::{Prescale, PRESCALE_WIDTH, V_SYNC_NTSC};
use crate::traits::DisplaySink;

/// The cropped, aspect-corrected view of the prescale buffer ready to
/// hand to the display.
#[derive(Debug, Clone, Copy)]
pub struct EndStageParams {
    pub width: i32,
    pub height: i32,
    pub output_height: i32,
    pub x: i32,
    pub y: i32,
    pub pitch: i32,
}

/// Compute the crop/aspect parameters for one frame, per §4.4's normal
/// half. `oldlowerfield` is the interlace history's latched value, not
/// this frame's freshly computed `lowerfield`.
#[must_use]
pub fn normal_end(geom: &FrameGeometry, oldlowerfield: bool, widescreen: bool) -> EndStageParams {
    let pitch = PRESCALE_WIDTH;
    let width = geom.maxhpass - geom.minhpass;
    let height = geom.vres << i32::from(geom.ctrl.serrate);
    let mut output_height = (geom.vres << 1) * V_SYNC_NTSC / geom.v_sync;
    if widescreen {
        output_height = output_height * 9 / 16;
    }
    let x = geom.h_start + geom.minhpass;
    let y = (geom.v_start + i32::from(oldlowerfield)) << i32::from(geom.ctrl.serrate);

    EndStageParams {
        width,
        height,
        output_height,
        x,
        y,
        pitch,
    }
}

/// Slice the cropped region out of `prescale` and hand it to the sink.
pub fn upload(params: &EndStageParams, prescale: &Prescale, sink: &mut impl DisplaySink) {
    let mut rows = Vec::with_capacity((params.width * params.height) as usize);
    for row in 0..params.height {
        let slice = prescale.row(params.x, params.y + row, params.width, params.pitch);
        rows.extend_from_slice(slice);
    }
    sink.screen_upload(&rows, params.width, params.height, params.width, params.output_height);
}
