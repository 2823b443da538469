use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use emberboy_core::{
    SCREEN_HEIGHT, SCREEN_WIDTH,
    cartridge::{Cartridge, RtcSnapshot},
    gameboy::GameBoy,
    hardware::Model,
};

/// Headless Game Boy / Game Boy Color emulator runner.
///
/// Loads a ROM (plus optional boot ROM and battery/RTC sidecar files), runs
/// a bounded number of frames or cycles, and can dump the final framebuffer
/// as a PNG. Presentation, audio playback and input devices are out of the
/// core's scope; this frontend simply discards audio and applies no input.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the ROM image
    rom: PathBuf,

    /// Force DMG (monochrome) mode
    #[arg(long, conflicts_with = "cgb")]
    dmg: bool,

    /// Force CGB (color) mode
    #[arg(long, conflicts_with = "dmg")]
    cgb: bool,

    /// Boot ROM image to execute instead of skipping boot
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Stop after this many CPU cycles instead of a frame count
    #[arg(long)]
    cycles: Option<u64>,

    /// Write the final framebuffer to this PNG path
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Do not read or write .sav/.rtc sidecar files
    #[arg(long)]
    no_save: bool,
}

fn sidecar(rom: &PathBuf, ext: &str) -> PathBuf {
    let mut path = rom.clone();
    path.set_extension(ext);
    path
}

// The RTC sidecar is 10 little-endian bytes:
// seconds, minutes, hours, days lo/hi, flags (bit0 halt, bit1 carry),
// subsecond millis (u32).
fn encode_rtc(snap: &RtcSnapshot) -> [u8; 10] {
    let mut out = [0u8; 10];
    out[0] = snap.seconds;
    out[1] = snap.minutes;
    out[2] = snap.hours;
    out[3..5].copy_from_slice(&snap.days.to_le_bytes());
    out[5] = (snap.halted as u8) | ((snap.day_carry as u8) << 1);
    out[6..10].copy_from_slice(&snap.subsecond_millis.to_le_bytes());
    out
}

fn decode_rtc(bytes: &[u8]) -> Option<RtcSnapshot> {
    if bytes.len() < 10 {
        return None;
    }
    Some(RtcSnapshot {
        seconds: bytes[0],
        minutes: bytes[1],
        hours: bytes[2],
        days: u16::from_le_bytes([bytes[3], bytes[4]]),
        halted: bytes[5] & 0x01 != 0,
        day_carry: bytes[5] & 0x02 != 0,
        subsecond_millis: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
    })
}

fn write_screenshot(path: &PathBuf, framebuffer: &[u32]) -> Result<()> {
    let mut img = image::RgbImage::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    for (i, pixel) in framebuffer.iter().enumerate() {
        let x = (i % SCREEN_WIDTH) as u32;
        let y = (i / SCREEN_WIDTH) as u32;
        img.put_pixel(
            x,
            y,
            image::Rgb([(pixel >> 16) as u8, (pixel >> 8) as u8, *pixel as u8]),
        );
    }
    img.save(path)
        .with_context(|| format!("writing screenshot to {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = fs::read(&args.rom)
        .with_context(|| format!("reading ROM from {}", args.rom.display()))?;
    let cart = Cartridge::load(rom).context("ROM image rejected")?;

    let model = if args.dmg {
        Model::Dmg
    } else if args.cgb || cart.cgb {
        Model::Cgb
    } else {
        Model::Dmg
    };
    info!("running \"{}\" as {:?}", cart.title, model);

    let mut gb = match &args.bootrom {
        Some(path) => {
            let boot = fs::read(path)
                .with_context(|| format!("reading boot ROM from {}", path.display()))?;
            let mut gb = GameBoy::new_power_on(model);
            gb.load_boot_rom(boot);
            gb
        }
        None => GameBoy::new(model),
    };
    gb.load_cart(cart);

    if !args.no_save {
        if let Ok(bytes) = fs::read(sidecar(&args.rom, "sav")) {
            gb.load_battery_ram(&bytes);
            info!("seeded battery RAM ({} bytes)", bytes.len());
        }
        if let Ok(bytes) = fs::read(sidecar(&args.rom, "rtc")) {
            match decode_rtc(&bytes) {
                Some(snap) => gb.load_rtc_snapshot(&snap),
                None => warn!("ignoring malformed RTC sidecar"),
            }
        }
    }

    let mut last_tick = Instant::now();
    let mut frames_run = 0u64;
    loop {
        match args.cycles {
            Some(limit) if gb.cpu.cycles >= limit => break,
            None if frames_run >= args.frames => break,
            _ => {}
        }
        gb.run_frame();
        frames_run += 1;

        // Wall clock feeds the cartridge RTC; audio is produced but this
        // frontend has no device to play it on.
        let now = Instant::now();
        gb.advance_rtc(now.duration_since(last_tick).as_millis() as u64);
        last_tick = now;
        let _ = gb.mmu.apu.drain_samples(usize::MAX);

        if let Some(fault) = gb.cpu.fault {
            warn!("emulation stopped: {fault}");
            break;
        }
    }
    info!(
        "ran {} frames / {} cycles; cpu state {}",
        frames_run,
        gb.cpu.cycles,
        gb.cpu.debug_state()
    );

    if let Some(path) = &args.screenshot {
        write_screenshot(path, gb.framebuffer())?;
        info!("wrote screenshot to {}", path.display());
    }

    if !args.no_save {
        if let Some(ram) = gb.battery_ram() {
            fs::write(sidecar(&args.rom, "sav"), ram)
                .context("persisting battery RAM sidecar")?;
        }
        if let Some(snap) = gb.rtc_snapshot() {
            fs::write(sidecar(&args.rom, "rtc"), encode_rtc(&snap))
                .context("persisting RTC sidecar")?;
        }
    }

    Ok(())
}
