//! air_piano — interactive entry point.

use air_piano::app::{run, AppConfig, AppError};
use key_layout::{KeyboardLayout, LayoutAnchor};
use std::io::{self, Write};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║            Air Piano — play keys with your hands             ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "leap")]
    println!("  Mode: LeapMotion hand tracking");
    #[cfg(not(feature = "leap"))]
    println!("  Mode: Mouse simulation  (use --features leap for hardware)");
    println!();

    let cfg = match build_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!();
    println!("  Opening window…");
    println!();

    if let Err(e) = run(cfg) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build_config() -> Result<AppConfig, AppError> {
    let args: Vec<String> = std::env::args().collect();

    let mut layout = match args.iter().position(|a| a == "--layout") {
        Some(i) => {
            let path = args.get(i + 1).map(String::as_str).unwrap_or("");
            println!("  Loading keyboard layout from {}", path);
            KeyboardLayout::load(path)?
        }
        None => KeyboardLayout::default_octave(),
    };
    if args.iter().any(|a| a == "--top") {
        layout.anchor = LayoutAnchor::near_top();
    }

    if args.iter().any(|a| a == "--quick") {
        println!("  Quick-start: C4..C5, grand piano, velocity 100");
        return Ok(AppConfig { layout, ..AppConfig::default() });
    }

    let cfg = configure_interactively(layout);
    Ok(cfg)
}

fn configure_interactively(layout: KeyboardLayout) -> AppConfig {
    let program = pick_instrument();
    let velocity: u8 = read_line("  Velocity 0–127 (default 100): ")
        .trim()
        .parse()
        .unwrap_or(100)
        .min(127);
    let artistic = !read_line("  Artistic brush trails? (Y/n): ")
        .trim()
        .eq_ignore_ascii_case("n");

    AppConfig {
        layout,
        program,
        channel: 0,
        velocity,
        show_skeleton: true,
        artistic,
    }
}

fn pick_instrument() -> u8 {
    println!("  Instrument (GM program 0–127):");
    println!("    0=Grand Piano  11=Vibraphone  40=Violin  42=Cello");
    println!("    56=Trumpet  73=Flute  80=Lead Square  88=Pad New Age");
    read_line("  Program (default 0): ")
        .trim()
        .parse::<u8>()
        .unwrap_or(0)
        .min(127)
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
