//! `ViCore`: owns all per-process VI state and dispatches one frame per
//! `update` call, mirroring `vi_init`/`vi_update`/`vi_screenshot`/
//! `vi_close`.

use std::path::PathBuf;

use crate::config::{VideoConfig, VideoMode};
use crate::endstage::{normal_end, upload};
use crate::fast::{run_fast_scanlines, FastMode};
use crate::gamma::{DitherRng, GammaTables};
use crate::geometry::{compute_fast, compute_normal, GeometryError, GeometryOutcome, InterlaceHistory, OneTimeWarnings};
use crate::pipeline::run_normal_scanlines;
use crate::prescale::Prescale;
use crate::registers::RegIndex;
use crate::screenshot::write_bmp;
use crate::traits::{DisplaySink, MessageSink, RegisterFile, VideoMemory};
use crate::workers::{PoolInitError, WorkerPool};

fn video_mode_to_fast_mode(mode: VideoMode) -> Option<FastMode> {
    match mode {
        VideoMode::Normal => None,
        VideoMode::Color => Some(FastMode::Color),
        VideoMode::Depth => Some(FastMode::Depth),
        VideoMode::Coverage => Some(FastMode::Coverage),
    }
}

/// All per-process VI state.
///
/// Field order matters: Rust drops fields top-to-bottom, and `pool` must
/// finish joining its threads before `prescale` is freed, since a
/// worker closure borrows `prescale` for the duration of `run`. Declaring
/// `pool` first guarantees that ordering without an explicit `Drop` impl.
pub struct ViCore {
    pool: WorkerPool,
    prescale: Prescale,
    gamma: GammaTables,
    rng: DitherRng,
    history: InterlaceHistory,
    warnings: OneTimeWarnings,
    config: VideoConfig,
    active_mode: VideoMode,
    screenshot_path: Option<PathBuf>,
    zbuf_addr: u32,
}

impl ViCore {
    /// Build a worker pool and a zeroed prescale buffer, mirroring
    /// `vi_init`.
    pub fn init(config: VideoConfig) -> Result<Self, PoolInitError> {
        let pool = WorkerPool::new(config.num_workers)?;
        Ok(Self {
            pool,
            prescale: Prescale::new(),
            gamma: GammaTables::init(),
            rng: DitherRng::default(),
            history: InterlaceHistory::default(),
            warnings: OneTimeWarnings::default(),
            active_mode: config.mode,
            config,
            screenshot_path: None,
            zbuf_addr: 0,
        })
    }

    /// The embedder's answer to `rdp_get_zb_address()`, used by depth
    /// mode. Read once per frame by `update`.
    pub fn set_zbuf_addr(&mut self, addr: u32) {
        self.zbuf_addr = addr;
    }

    /// Decode, filter, and upload one frame. Mirrors `vi_update`'s
    /// clear-on-mode-change, start/process/end dispatch, and final
    /// `screen_swap`.
    pub fn update<M: VideoMemory + Sync, R: RegisterFile, S: DisplaySink, G: MessageSink>(
        &mut self,
        regs: &R,
        mem: &M,
        sink: &mut S,
        msg: &G,
    ) {
        if self.config.mode != self.active_mode {
            self.prescale.clear();
            self.active_mode = self.config.mode;
        }

        let processed = match self.config.mode {
            VideoMode::Normal => self.update_normal(regs, mem, sink, msg),
            fast_mode => self.update_fast(regs, mem, sink, video_mode_to_fast_mode(fast_mode)),
        };

        if processed {
            sink.screen_swap();
        }
    }

    /// Returns whether a frame was actually decoded and uploaded. A
    /// transient skip (blank repeat, degenerate geometry) must not reach
    /// `screen_swap` at all, matching `vi_update`'s early `return` before
    /// it ever calls `screen_swap()`.
    fn update_normal<M: VideoMemory + Sync, R: RegisterFile, S: DisplaySink, G: MessageSink>(
        &mut self,
        regs: &R,
        mem: &M,
        sink: &mut S,
        msg: &G,
    ) -> bool {
        let outcome = compute_normal(regs, &mut self.history, &mut self.warnings, msg);
        let geom = match outcome {
            GeometryOutcome::Skip => return false,
            GeometryOutcome::Error(GeometryError::VactiveLinesOverflow { vactivelines }) => {
                msg.error(&format!("VI_V_SYNC too big (vactivelines = {vactivelines})"));
                return false;
            }
            GeometryOutcome::Ready(geom) => geom,
        };

        let worker_num = self.pool.worker_num() as i32;
        if worker_num <= 1 {
            run_normal_scanlines(&geom, mem, &self.gamma, &mut self.rng, &mut self.prescale, 0, 1);
        } else {
            let gamma = &self.gamma;
            let prescale_slot = std::sync::Mutex::new(&mut self.prescale);
            let seed = self.rng.state();
            self.pool
                .run(|worker_id| {
                    let mut local_rng = DitherRng::new(seed);
                    let mut prescale = prescale_slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    run_normal_scanlines(&geom, mem, gamma, &mut local_rng, &mut prescale, worker_id as i32, worker_num);
                })
                .expect("pool is still open for the lifetime of ViCore");
        }

        let params = normal_end(&geom, self.history.oldlowerfield, self.config.widescreen);
        upload(&params, &self.prescale, sink);
        self.write_screenshot_if_requested(&params);
        true
    }

    fn update_fast<M: VideoMemory + Sync, R: RegisterFile, S: DisplaySink>(
        &mut self,
        regs: &R,
        mem: &M,
        sink: &mut S,
        mode: Option<FastMode>,
    ) -> bool {
        let Some(mode) = mode else { return false };
        let Some(geom) = compute_fast(regs) else {
            return false;
        };

        let worker_num = self.pool.worker_num() as i32;
        let gamma = &self.gamma;
        let zbuf_addr = self.zbuf_addr;
        if worker_num <= 1 {
            run_fast_scanlines(&geom, mode, mem, zbuf_addr, gamma, &mut self.rng, &mut self.prescale, 0, 1);
        } else {
            let prescale_slot = std::sync::Mutex::new(&mut self.prescale);
            let seed = self.rng.state();
            self.pool
                .run(|worker_id| {
                    let mut local_rng = DitherRng::new(seed);
                    let mut prescale = prescale_slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    run_fast_scanlines(&geom, mode, mem, zbuf_addr, gamma, &mut local_rng, &mut prescale, worker_id as i32, worker_num);
                })
                .expect("pool is still open for the lifetime of ViCore");
        }

        let v_sync = (regs.read(RegIndex::VSync) & 0x3ff) as i32;
        let output_height = crate::fast::fast_output_height(&geom, v_sync, self.config.widescreen);
        sink.screen_upload(self.prescale.as_slice(), geom.hres_raw, geom.vres_raw, geom.hres_raw, output_height);

        if let Some(path) = self.screenshot_path.take() {
            write_fast_screenshot(&path, &self.prescale, geom.hres_raw, geom.vres_raw, output_height);
        }
        true
    }

    fn write_screenshot_if_requested(&mut self, params: &crate::endstage::EndStageParams) {
        let Some(path) = self.screenshot_path.take() else {
            return;
        };
        let rows_start = params.y * params.pitch + params.x;
        let region: Vec<u32> = (0..params.height)
            .flat_map(|row| {
                let start = rows_start + row * params.pitch;
                (start..start + params.width)
                    .map(|i| self.prescale.get(i as usize))
                    .collect::<Vec<_>>()
            })
            .collect();

        if let Ok(mut file) = std::fs::File::create(&path) {
            let _ = write_bmp(&mut file, &region, params.width, params.height, params.width, params.output_height);
        }
    }

    /// Queue a screenshot to be written after the next frame's end stage.
    pub fn screenshot(&mut self, path: impl Into<PathBuf>) {
        self.screenshot_path = Some(path.into());
    }

    /// Consume `self`, joining the worker pool's threads.
    pub fn close(self) {
        self.pool.close();
    }
}

fn write_fast_screenshot(
    path: &std::path::Path,
    prescale: &Prescale,
    width: i32,
    height: i32,
    output_height: i32,
) {
    if let Ok(mut file) = std::fs::File::create(path) {
        let _ = write_bmp(&mut file, prescale.as_slice(), width, height, width, output_height);
    }
}
