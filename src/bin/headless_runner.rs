use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cyclenes::nes::NesDebugCounters;
use cyclenes::nes::cartridge::Cartridge;
use cyclenes::{Nes, NesConfig};
use serde::Serialize;
use sha1::{Digest, Sha1};

#[derive(Debug, Clone, Default)]
struct Args {
    rom: Option<PathBuf>,
    frames: u32,
    config: Option<PathBuf>,
    sram: Option<PathBuf>,
    save_sram: Option<PathBuf>,
    buttons: u8,
}

#[derive(Debug, Serialize)]
struct Report {
    rom: String,
    mapper: String,
    frames: u32,
    frame_sha1: String,
    audio_samples: usize,
    elapsed_ms: u128,
    fault: Option<String>,
    counters: NesDebugCounters,
    sram_base64: Option<String>,
    recent_events: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        frames: 60,
        ..Args::default()
    };
    let mut it = std::env::args().skip(1);

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--rom" => {
                let value = it.next().context("--rom requires a path, e.g. --rom game.nes")?;
                args.rom = Some(PathBuf::from(value));
            }
            "--frames" => {
                let value = it
                    .next()
                    .context("--frames requires an integer, e.g. --frames 600")?;
                args.frames = value
                    .parse::<u32>()
                    .with_context(|| format!("invalid --frames value: {value}"))?;
            }
            "--config" => {
                let value = it.next().context("--config requires a JSON file path")?;
                args.config = Some(PathBuf::from(value));
            }
            "--sram" => {
                let value = it.next().context("--sram requires a file path")?;
                args.sram = Some(PathBuf::from(value));
            }
            "--save-sram" => {
                let value = it.next().context("--save-sram requires a file path")?;
                args.save_sram = Some(PathBuf::from(value));
            }
            "--buttons" => {
                let value = it
                    .next()
                    .context("--buttons requires a hex mask, e.g. --buttons 0x10")?;
                let digits = value.trim_start_matches("0x");
                args.buttons = u8::from_str_radix(digits, 16)
                    .with_context(|| format!("invalid --buttons value: {value}"))?;
            }
            "--help" | "-h" => {
                println!(
                    "cyclenes_run\n\n\
Usage:\n\
  cyclenes_run --rom <path> [options]\n\n\
Options:\n\
  --rom <path>          iNES image to run\n\
  --frames <n>          Frames to emulate (default 60)\n\
  --config <path>       JSON emulator config\n\
  --sram <path>         Battery RAM to load\n\
  --save-sram <path>    Write battery RAM here when done\n\
  --buttons <hex>       Pad 1 mask held for the whole run (A=0x80 .. Right=0x01)\n\
  -h, --help            Show this help\n"
                );
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    Ok(args)
}

fn sha1_hex(bytes: &[u8]) -> String {
    Sha1::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let rom_path = args.rom.clone().context("missing --rom <path>")?;

    let config = match &args.config {
        Some(path) => NesConfig::load(path)?,
        None => NesConfig::default(),
    };
    let sram = match &args.sram {
        Some(path) => Some(
            fs::read(path).with_context(|| format!("failed to read SRAM: {}", path.display()))?,
        ),
        None => None,
    };

    let cart = Cartridge::from_file(&rom_path, sram.as_deref())?;
    let mut nes = Nes::from_cartridge(cart, config)
        .with_context(|| format!("failed to start {}", rom_path.display()))?;
    nes.set_buttons(0, args.buttons);

    let start = Instant::now();
    let mut audio_samples = 0usize;
    let mut fault = None;
    for _ in 0..args.frames {
        if let Err(err) = nes.run_frame() {
            fault = Some(err.to_string());
            break;
        }
        audio_samples += nes.take_audio_samples().len();
    }

    if let Some(path) = &args.save_sram {
        fs::write(path, nes.sram())
            .with_context(|| format!("failed to write SRAM: {}", path.display()))?;
    }

    let report = Report {
        rom: rom_path.display().to_string(),
        mapper: nes.mapper_name().to_string(),
        frames: args.frames,
        frame_sha1: sha1_hex(&nes.frame_rgba()),
        audio_samples,
        elapsed_ms: start.elapsed().as_millis(),
        fault,
        counters: nes.debug_counters(),
        sram_base64: nes.has_battery().then(|| STANDARD.encode(nes.sram())),
        recent_events: nes.debug_recent_events(16),
    };
    let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
    println!("{json}");

    if let Some(reason) = &report.fault {
        anyhow::bail!("emulation stopped early: {reason}");
    }
    Ok(())
}
