/*!
# Scan Engine Application

Galvo laser projector playback: decodes interchange files and streams the
transformed points to the 8-channel output DAC at up to 22,000 points per
second.

## Usage

### Scan a file to the configured output device
```bash
scanengine run show.ild
```

### Live output mode (raw DAC packets on stdout)
```bash
scanengine run show.ild --live
```

### Live decoded output (one JSON record per point)
```bash
scanengine run show.ild --live --decode
```

### Inspect a file without scanning it
```bash
scanengine info show.ild
```

### Generate a synthetic test pattern
```bash
scanengine synth --pattern circle --points 500 --frames 36 -o circle.ild
```
*/

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::point::{Frame, FrameTable, Point};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod config;
mod engine;
mod output;
mod runner;

use config::AppConfig;
use engine::ScanEngine;
use output::{DacBus, DmaSerialBus, PacketEncoding};
use runner::ScanRunner;

#[derive(Parser)]
#[command(name = "scanengine")]
#[command(about = "Galvo laser projector scan engine and interchange playback")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "scanengine.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an interchange file to the output DAC
    Run {
        /// Interchange file to scan (the placeholder frame when omitted)
        file: Option<PathBuf>,

        /// Scan rate override in points per second
        #[arg(short, long)]
        rate: Option<u32>,

        /// Write DAC packets to stdout instead of the output device
        #[arg(long)]
        live: bool,

        /// With --live, emit decoded JSON point records instead of raw packets
        #[arg(long)]
        decode: bool,

        /// Output device path override
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Print the frame table of an interchange file
    Info {
        /// Interchange file to inspect
        file: PathBuf,
    },

    /// Generate a synthetic test-pattern interchange file
    Synth {
        /// Output path
        #[arg(short, long, default_value = "pattern.ild")]
        output: PathBuf,

        /// Pattern: circle, square, beams or sweep
        #[arg(short, long, default_value = "circle")]
        pattern: String,

        /// Points per frame
        #[arg(long, default_value = "500")]
        points: usize,

        /// Frames in the animation
        #[arg(long, default_value = "1")]
        frames: usize,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "scanengine.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log to stderr to keep stdout clean for live binary output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let config = if cli.config.exists() {
        AppConfig::load_from_file(&cli.config)?
    } else {
        AppConfig::new()
    };

    match cli.command {
        Commands::Run {
            file,
            rate,
            live,
            decode,
            device,
        } => cmd_run(config, file, rate, live, decode, device),
        Commands::Info { file } => cmd_info(&file),
        Commands::Synth {
            output,
            pattern,
            points,
            frames,
        } => cmd_synth(&output, &pattern, points, frames),
        Commands::Config { output } => {
            let config = AppConfig::new();
            config.save_to_file(&output)?;
            println!("Configuration written to {}", output.display());
            Ok(())
        }
    }
}

/// Load, enable and scan until interrupted
fn cmd_run(
    config: AppConfig,
    file: Option<PathBuf>,
    rate: Option<u32>,
    live: bool,
    decode: bool,
    device: Option<String>,
) -> Result<()> {
    let table = file.and_then(|path| match ilda_decoder::decode_file(&path) {
        Ok(table) => {
            info!(
                "📂 loaded {}: \"{}\" by \"{}\", {} frames, {} points",
                path.display(),
                table.name(),
                table.company(),
                table.frame_count(),
                table.points_used()
            );
            Some(table)
        }
        Err(e) => {
            warn!(
                "failed to decode {}: {}, scanning the placeholder frame",
                path.display(),
                e
            );
            None
        }
    });

    let sink: Box<dyn Write + Send> = if live {
        Box::new(std::io::stdout())
    } else {
        let path = device.unwrap_or_else(|| config.output.device_path.clone());
        let file = std::fs::File::create(&path)
            .with_context(|| format!("failed to open output device {}", path))?;
        info!("🔌 output device: {}", path);
        Box::new(file)
    };

    let encoding = if decode {
        PacketEncoding::Json
    } else {
        PacketEncoding::Raw
    };
    let (bus, writer_handle) = DmaSerialBus::spawn(sink, config.output.queue_depth, encoding);
    let mut bus: Box<dyn DacBus> = Box::new(bus);

    let mut engine = ScanEngine::new();
    engine.set_scan_rate(rate.unwrap_or(config.engine.scan_rate_pps));
    engine.update_transform(&config.engine.transform)?;

    let first_frame = table
        .as_ref()
        .and_then(|t| t.frame(0))
        .unwrap_or_else(|| Arc::new(Frame::placeholder()));
    engine.set_current_frame(first_frame)?;
    engine.enable(bus.as_mut());

    let runner = ScanRunner::new(engine);
    let running = runner.running_flag();
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("failed to install the interrupt handler")?;

    let tick_handle = runner.spawn_tick_thread(
        bus,
        Duration::from_secs(config.output.stats_interval_seconds),
    );

    runner.run_animation(
        table.as_ref(),
        Duration::from_millis(config.engine.frame_interval_ms.max(1)),
    );

    // Shutdown: stop ticking, let the transmit queue drain
    runner
        .control()
        .lock()
        .expect("engine mutex poisoned")
        .disable();

    if tick_handle.join().is_err() {
        warn!("tick thread panicked");
    }
    match writer_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("bus writer failed: {}", e),
        Err(_) => warn!("bus writer panicked"),
    }

    let stats = runner
        .control()
        .lock()
        .expect("engine mutex poisoned")
        .stats();
    info!("📈 final stats:");
    info!("   Ticks: {}", stats.ticks);
    info!("   Frames scanned: {}", stats.frames_scanned);
    info!("   Points clipped: {}", stats.points_clipped);
    info!("   Frame swaps: {}", stats.frame_swaps);
    info!("   Transform commits: {}", stats.transform_commits);

    Ok(())
}

/// Decode a file and print its frame table
fn cmd_info(file: &PathBuf) -> Result<()> {
    let table = ilda_decoder::decode_file(file)
        .with_context(|| format!("failed to decode {}", file.display()))?;

    println!("File:    {}", file.display());
    println!("Name:    {}", table.name());
    println!("Company: {}", table.company());
    println!("Frames:  {}", table.frame_count());
    println!("Points:  {}", table.points_used());

    for (index, frame) in table.frames().iter().enumerate() {
        let blanked = frame.points().iter().filter(|p| p.is_blanked()).count();
        println!(
            "  frame {:3}: {:5} points ({} blanked)",
            index,
            frame.len(),
            blanked
        );
    }

    Ok(())
}

/// Generate a synthetic test-pattern file
fn cmd_synth(output: &PathBuf, pattern: &str, points: usize, frames: usize) -> Result<()> {
    let frame_count = frames.max(1);
    let mut table = FrameTable::new();

    let name: String = pattern.to_uppercase().chars().take(8).collect();
    table.set_names(&name, "SCANENG");

    for index in 0..frame_count {
        let frame = match pattern {
            "circle" => circle_frame(points, index, frame_count),
            "square" => square_frame(points),
            "beams" => beams_frame(points),
            "sweep" => sweep_frame(points, index, frame_count),
            other => bail!("unknown pattern: {} (expected circle, square, beams or sweep)", other),
        }?;
        table.push_frame(frame)?;
    }

    let data = ilda_decoder::writer::write_frame_table(&table);
    std::fs::write(output, &data)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        "💾 wrote {}: {} frames, {} points, {} bytes",
        output.display(),
        table.frame_count(),
        table.points_used(),
        data.len()
    );
    Ok(())
}

/// A rainbow circle; the color phase advances across animation frames
fn circle_frame(points: usize, index: usize, total: usize) -> shared::Result<Frame> {
    let count = points.max(8);
    let phase = index as f32 / total as f32;

    let mut pts = Vec::with_capacity(count);
    for i in 0..count {
        let theta = (i as f32 / count as f32) * std::f32::consts::TAU;
        let x = (20_000.0 * theta.cos()) as i16;
        let y = (20_000.0 * theta.sin()) as i16;
        let (r, g, b) = color_wheel(i as f32 / count as f32 + phase);
        pts.push(Point::lit(x, y, 0, r, g, b));
    }
    Frame::new(pts)
}

/// A white square outline
fn square_frame(points: usize) -> shared::Result<Frame> {
    let per_edge = (points / 4).max(2);
    let corners = [
        (-20_000i32, -20_000i32),
        (20_000, -20_000),
        (20_000, 20_000),
        (-20_000, 20_000),
    ];

    let mut pts = Vec::with_capacity(per_edge * 4);
    for edge in 0..4 {
        let (x0, y0) = corners[edge];
        let (x1, y1) = corners[(edge + 1) % 4];
        for i in 0..per_edge {
            let t = i as f32 / per_edge as f32;
            let x = (x0 as f32 + (x1 - x0) as f32 * t) as i16;
            let y = (y0 as f32 + (y1 - y0) as f32 * t) as i16;
            pts.push(Point::lit(x, y, 0, 255, 255, 255));
        }
    }
    Frame::new(pts)
}

/// Static beams with blanked traversals between them
fn beams_frame(points: usize) -> shared::Result<Frame> {
    let beams = 8usize;
    let dwell = (points / beams).max(4);

    let mut pts = Vec::with_capacity(beams * (dwell + 1));
    for beam in 0..beams {
        let theta = beam as f32 / beams as f32 * std::f32::consts::TAU;
        let x = (25_000.0 * theta.cos()) as i16;
        let y = (25_000.0 * theta.sin()) as i16;
        let (r, g, b) = color_wheel(beam as f32 / beams as f32);

        // Settle blanked on the target before unblanking
        pts.push(Point::blanked(x, y, 0));
        for _ in 0..dwell {
            pts.push(Point::lit(x, y, 0, r, g, b));
        }
    }
    Frame::new(pts)
}

/// A vertical line sweeping across the field over the animation
fn sweep_frame(points: usize, index: usize, total: usize) -> shared::Result<Frame> {
    let count = points.max(2);
    let t = index as f32 / total as f32;
    let x = (-30_000.0 + 60_000.0 * t) as i16;

    let mut pts = Vec::with_capacity(count);
    for i in 0..count {
        let s = i as f32 / (count - 1) as f32;
        let y = (-25_000.0 + 50_000.0 * s) as i16;
        pts.push(Point::lit(x, y, 0, 0, 255, 128));
    }
    Frame::new(pts)
}

/// Map [0, 1) around the red-green-blue wheel
fn color_wheel(t: f32) -> (u8, u8, u8) {
    let sector = (t * 3.0).rem_euclid(3.0);
    let fade = (sector.fract() * 255.0) as u8;
    match sector as u32 {
        0 => (255 - fade, fade, 0),
        1 => (0, 255 - fade, fade),
        _ => (fade, 0, 255 - fade),
    }
}
