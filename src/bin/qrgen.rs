use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use qrcodec::{ECLevel, QRBuilder};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Level {
    L,
    M,
    Q,
    H,
}

impl From<Level> for ECLevel {
    fn from(l: Level) -> Self {
        match l {
            Level::L => ECLevel::L,
            Level::M => ECLevel::M,
            Level::Q => ECLevel::Q,
            Level::H => ECLevel::H,
        }
    }
}

/// Encode a file or a text string into a QR code image.
#[derive(Debug, Parser)]
#[command(name = "qrgen", version)]
struct Args {
    /// Input file, or the literal text with --text
    input: String,

    /// Output image path; format follows the extension
    output: PathBuf,

    /// Error correction level
    #[arg(short, long, value_enum, default_value = "m")]
    error: Level,

    /// Pixels per module
    #[arg(short, long, default_value_t = 2)]
    module: u32,

    /// Quiet zone width in pixels
    #[arg(short, long, default_value_t = 8)]
    quiet: u32,

    /// ECI assignment number announcing the payload encoding
    #[arg(short, long)]
    value: Option<u32>,

    /// Treat the input argument as text instead of a file path
    #[arg(short, long)]
    text: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("qrgen: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let data = if args.text {
        args.input.clone().into_bytes()
    } else {
        fs::read(&args.input)?
    };

    let mut builder = QRBuilder::new(&data);
    builder.ec_level(args.error.into());
    if let Some(assignment) = args.value {
        builder.eci(assignment);
    }

    let qr = builder.build()?;
    let img = qr.to_image(args.module, args.quiet)?;
    img.save(&args.output)?;
    Ok(())
}
