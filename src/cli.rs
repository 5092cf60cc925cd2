use anyhow::{Result, anyhow};
use log::{info, warn};
use pico_args::Arguments;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::{
    env,
    io::{self, BufWriter, Write},
    path::PathBuf,
    sync::{Arc, atomic::AtomicBool},
};

use crate::config::{Profile, ProfileStore};
use crate::input::{JsonLinesSource, open_feed};
use crate::pipeline;
use crate::trainer::LogSink;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("count") => {
            let opts = FeedOpts::parse(&mut pargs)?;
            let profile = opts.profile()?;
            let mut source = opts.source(&profile)?;
            let stop = stop_flag();
            let mut out = BufWriter::new(io::stdout().lock());
            pipeline::run_counter(&mut source, &mut out, &stop)?;
            out.flush()?;
            Ok(())
        }

        Some("paint") => {
            let opts = FeedOpts::parse(&mut pargs)?;
            let canvas_out: Option<PathBuf> = pargs.opt_value_from_str("--out")?;
            let background: Option<PathBuf> = pargs.opt_value_from_str("--background")?;
            if background.is_some() && canvas_out.is_none() {
                return Err(anyhow!("--background needs --out"));
            }
            let profile = opts.profile()?;
            let mut source = opts.source(&profile)?;
            let stop = stop_flag();
            let mut out = BufWriter::new(io::stdout().lock());
            let acc = pipeline::run_painter(&mut source, &profile, &mut out, &stop)?;
            out.flush()?;
            if let Some(path) = canvas_out {
                let acc = acc.ok_or_else(|| anyhow!("no frames received; nothing to save"))?;
                let frame = match background {
                    Some(bg) => Some(
                        image::open(&bg)
                            .map_err(|e| anyhow!("failed to open {}: {e}", bg.display()))?
                            .to_rgb8(),
                    ),
                    None => None,
                };
                pipeline::render_canvas(&acc, frame, &profile)?
                    .save(&path)
                    .map_err(|e| anyhow!("failed to save canvas to {}: {e}", path.display()))?;
                info!("saved canvas to {}", path.display());
            }
            Ok(())
        }

        Some("train") => {
            let opts = FeedOpts::parse(&mut pargs)?;
            let profile = opts.profile()?;
            let mut source = opts.source(&profile)?;
            let stop = stop_flag();
            let mut out = BufWriter::new(io::stdout().lock());
            let state =
                pipeline::run_trainer(&mut source, &profile, &mut LogSink, &mut out, &stop)?;
            out.flush()?;
            eprintln!("Curls: {}", state.count as u32);
            Ok(())
        }

        Some("list") => {
            let store = ProfileStore::load_or_install_default()?;
            for name in store.list_profiles() {
                let mark = if name == store.active_name { "*" } else { " " };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: fingerctl use <profile_name>"))?;
            let mut store = ProfileStore::load_or_install_default()?;
            store.set_active(&name)?;
            println!("ok: active profile is now {}", store.active_name);
            Ok(())
        }

        Some("profile") => {
            let store = ProfileStore::load_or_install_default()?;
            let p = &store.profile;
            println!("profile:   {}", store.active_name);
            println!("file:      {}", store.profile_path(&store.active_name).display());
            println!("frame:     {}x{}", p.frame.width, p.frame.height);
            println!(
                "curl:      down > {}°, up < {}°",
                p.thresholds.curl_down_deg, p.thresholds.curl_up_deg
            );
            println!(
                "joints:    shoulder={} elbow={} wrist={}",
                p.trainer.shoulder, p.trainer.elbow, p.trainer.wrist
            );
            println!(
                "painter:   header={}px brush={} eraser={}",
                p.painter.header_height, p.painter.brush_width, p.painter.eraser_width
            );
            for (i, tool) in p.painter.palette.iter().enumerate() {
                let [r, g, b] = tool.color;
                let kind = if tool.eraser { " (eraser)" } else { "" };
                println!("  [{i}] {} #{r:02x}{g:02x}{b:02x}{kind}", tool.name);
            }
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

/// Options shared by the frame-processing subcommands.
struct FeedOpts {
    input: Option<PathBuf>,
    profile: Option<String>,
}

impl FeedOpts {
    fn parse(pargs: &mut Arguments) -> Result<Self> {
        Ok(Self {
            input: pargs.opt_value_from_str("--input")?,
            profile: pargs.opt_value_from_str("--profile")?,
        })
    }

    fn profile(&self) -> Result<Profile> {
        let store = ProfileStore::load_or_install_default()?;
        match &self.profile {
            Some(name) => store.load(name),
            None => Ok(store.profile),
        }
    }

    fn source(&self, profile: &Profile) -> Result<JsonLinesSource<Box<dyn io::BufRead>>> {
        let reader = open_feed(self.input.as_deref()).map_err(|e| {
            anyhow!(
                "failed to open {}: {e}",
                self.input
                    .as_deref()
                    .map_or("stdin".into(), |p| p.display().to_string())
            )
        })?;
        Ok(JsonLinesSource::new(
            reader,
            profile.frame.width,
            profile.frame.height,
        ))
    }
}

/// Raised on SIGINT/SIGTERM; pipelines finish the current frame and stop.
fn stop_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(sig, Arc::clone(&flag)) {
            warn!("could not install handler for signal {sig}: {e}");
        }
    }
    flag
}

fn print_help() {
    println!(
        r#"fingerctl: hand and pose gesture demos over a landmark feed

USAGE:
  fingerctl help [command]          Show general or command-specific help
  fingerctl count [OPTIONS]         Finger counter: fingers up per hand
  fingerctl paint [OPTIONS]         Virtual painter: draw with the index finger
  fingerctl train [OPTIONS]         Curl trainer: count arm repetitions
  fingerctl list                    List profiles
  fingerctl use <name>              Switch active profile
  fingerctl profile                 Show the active profile

OPTIONS:
  --input <file>                    Landmark feed (JSON lines); default stdin
  --profile <name>                  Use a profile without switching to it
  --out <file.png>                  (paint) save the final canvas
  --background <file.png>           (paint) composite the canvas over this image

TIPS:
  - Profiles: ~/.config/fingerctl/profiles
  - Active profile pointer: ~/.config/fingerctl/active
  - Logging: RUST_LOG=debug fingerctl ...
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "count" => println!(
            "usage: fingerctl count [--input FILE] [--profile NAME]\nPrints the finger vector, total and bounding box of every hand, one JSON line per frame."
        ),
        "paint" => println!(
            "usage: fingerctl paint [--input FILE] [--profile NAME] [--out canvas.png] [--background frame.png]\nIndex finger draws; index+middle moves the cursor and picks a tool from the header.\nWith --background the canvas is composited over that image before saving."
        ),
        "train" => println!(
            "usage: fingerctl train [--input FILE] [--profile NAME]\nTracks the configured arm angle and counts curls (half a rep per curl)."
        ),
        "list" => println!("usage: fingerctl list\nLists available profiles; marks active with '*'."),
        "use" => {
            println!("usage: fingerctl use <name>\nSwitches the active profile to <name>.")
        }
        "profile" => println!("usage: fingerctl profile\nPrints the active profile's settings."),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}
