//! Demo binary: exercises the library end-to-end against a synthetic,
//! in-memory framebuffer and register set (an NTSC 320x240 test pattern),
//! not a real ROM or real hardware. `vi-filter` itself has no CLI
//! surface; this binary is just a runnable example of wiring the traits
//! together.

use std::collections::HashMap;

use vi_filter::registers::RegIndex;
use vi_filter::traits::{DisplaySink, MessageSink, RegisterFile, VideoMemory};
use vi_filter::{ViCore, VideoConfig};

struct TestPatternMemory {
    halfwords: Vec<u16>,
}

impl TestPatternMemory {
    fn ntsc_320x240() -> Self {
        let width = 320usize;
        let height = 240usize;
        let mut halfwords = vec![0u16; width * height];
        for y in 0..height {
            for x in 0..width {
                let r = ((x * 31) / width) as u16 & 0x1f;
                let g = ((y * 31) / height) as u16 & 0x1f;
                let b = 0x10u16;
                halfwords[y * width + x] = (r << 11) | (g << 6) | (b << 1) | 1;
            }
        }
        Self { halfwords }
    }
}

impl VideoMemory for TestPatternMemory {
    fn read16(&self, idx: u32) -> u16 {
        self.halfwords.get(idx as usize).copied().unwrap_or(0)
    }
    fn read32(&self, idx: u32) -> u32 {
        let pix = self.read16(idx * 2);
        u32::from(pix) << 16
    }
    fn read_pair16(&self, idx: u32) -> (u16, u8) {
        (self.read16(idx), 7)
    }
}

struct FixedRegisters(HashMap<RegIndex, u32>);

impl FixedRegisters {
    fn ntsc_320x240() -> Self {
        Self(
            [
                (RegIndex::Status, 0x0000_3002),
                (RegIndex::HStart, 0x006C_0254),
                (RegIndex::VStart, 0x0025_0205),
                (RegIndex::VSync, 525),
                (RegIndex::XScale, 0x0000_0200),
                (RegIndex::YScale, 0x0000_0400),
                (RegIndex::Width, 320),
                (RegIndex::Origin, 0x0010_0000),
            ]
            .into_iter()
            .collect(),
        )
    }
}

impl RegisterFile for FixedRegisters {
    fn read(&self, index: RegIndex) -> u32 {
        *self.0.get(&index).unwrap_or(&0)
    }
}

struct ConsoleSink {
    frame: u32,
}

impl DisplaySink for ConsoleSink {
    fn screen_upload(&mut self, buf: &[u32], width: i32, height: i32, pitch: i32, output_height: i32) {
        println!(
            "frame {}: uploaded {width}x{height} (pitch {pitch}, output_height {output_height}, {} pixels)",
            self.frame,
            buf.len()
        );
    }
    fn screen_swap(&mut self) {
        self.frame += 1;
    }
}

struct EprintlnSink;

impl MessageSink for EprintlnSink {
    fn warning(&self, msg: &str) {
        eprintln!("warning: {msg}");
    }
    fn error(&self, msg: &str) {
        eprintln!("error: {msg}");
    }
}

fn main() {
    let mut frames = 2u32;
    let mut screenshot: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => {
                let value = args.next().unwrap_or_else(|| {
                    eprintln!("--frames requires a value");
                    std::process::exit(1);
                });
                frames = value.parse().unwrap_or_else(|_| {
                    eprintln!("--frames value must be a number, got '{value}'");
                    std::process::exit(1);
                });
            }
            "--screenshot" => {
                screenshot = Some(args.next().unwrap_or_else(|| {
                    eprintln!("--screenshot requires a path");
                    std::process::exit(1);
                }));
            }
            other => {
                eprintln!("Unknown argument: {other}");
                eprintln!("Usage: vi-filter-demo [--frames <n>] [--screenshot <path>]");
                std::process::exit(1);
            }
        }
    }

    let mut core = ViCore::init(VideoConfig::default()).unwrap_or_else(|err| {
        eprintln!("failed to initialize VI core: {err}");
        std::process::exit(1);
    });

    if let Some(path) = &screenshot {
        core.screenshot(path.clone());
    }

    let regs = FixedRegisters::ntsc_320x240();
    let mem = TestPatternMemory::ntsc_320x240();
    let msg = EprintlnSink;
    let mut sink = ConsoleSink { frame: 0 };

    for _ in 0..frames {
        core.update(&regs, &mem, &mut sink, &msg);
    }

    core.close();
}
