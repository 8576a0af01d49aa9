//! Video Interface (VI) filter pipeline: register-driven resample, AA,
//! divot, bilerp, and gamma output stage for a 1990s home-console
//! emulator core.
//!
//! The crate never touches real RAM, a real register window, or a real
//! display — it only knows the four collaborator traits in [`traits`].
//! Wire it up by implementing [`traits::VideoMemory`],
//! [`traits::RegisterFile`], [`traits::DisplaySink`], and
//! [`traits::MessageSink`], then drive one frame at a time through
//! [`core::ViCore::update`].

pub mod cache;
pub mod config;
pub mod core;
pub mod divot;
pub mod endstage;
pub mod fast;
pub mod fetch;
pub mod gamma;
pub mod geometry;
pub mod lerp;
pub mod pipeline;
pub mod prescale;
pub mod registers;
pub mod screenshot;
pub mod traits;
pub mod workers;

pub use config::{VideoConfig, VideoMode};
pub use core::ViCore;
pub use traits::{DisplaySink, MessageSink, RegisterFile, VideoMemory};
pub use workers::{PoolInitError, PoolShutdown, WorkerPool};
