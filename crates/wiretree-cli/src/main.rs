//! wiretree - Decode, edit and re-encode Protocol Buffer payloads without a schema
//!
//! `decode` turns a binary payload into a JSON document whose keys record each
//! field's number, position and inferred kind. After editing the document,
//! `encode` writes it back out as wire format with fresh length prefixes.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, Level};
use tracing_subscriber::EnvFilter;
use wiretree_core::{
    encode, from_json_str, to_json_string_pretty, Decoder, DecoderConfig, FloatPolicy,
    DEFAULT_MAX_DEPTH,
};

/// Decode, edit and re-encode Protocol Buffer payloads without a schema
#[derive(Parser, Debug)]
#[command(name = "wiretree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    decoder: DecoderArgs,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a binary payload into an editable JSON document
    Decode {
        /// Binary payload to decode
        input: PathBuf,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Encode an (edited) JSON document back into a binary payload
    Encode {
        /// JSON document produced by `decode`
        input: PathBuf,

        /// Where to write the binary payload
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite an existing output file
        #[arg(long)]
        force: bool,
    },

    /// Print the field trace of a binary payload
    Dump {
        /// Binary payload to decode
        input: PathBuf,
    },

    /// Decode and re-encode a payload, checking the bytes come back unchanged
    Roundtrip {
        /// Binary payload to check
        input: PathBuf,
    },
}

#[derive(Args, Debug)]
struct DecoderArgs {
    /// Maximum nesting depth tried for embedded messages
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH, global = true)]
    max_depth: usize,

    /// Integer/float classification of fixed32 and fixed64 fields
    #[arg(long, value_enum, default_value = "finite", global = true)]
    float_policy: FloatPolicyArg,
}

/// Classification of fixed-width fields
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FloatPolicyArg {
    /// Float when the bits form a finite number
    Finite,
    /// Always float, including NaN and infinities
    Always,
    /// Float unless the sign bit is set
    SignBitClear,
    /// Always the raw integer
    Never,
}

impl From<FloatPolicyArg> for FloatPolicy {
    fn from(arg: FloatPolicyArg) -> Self {
        match arg {
            FloatPolicyArg::Finite => FloatPolicy::Finite,
            FloatPolicyArg::Always => FloatPolicy::Always,
            FloatPolicyArg::SignBitClear => FloatPolicy::SignBitClear,
            FloatPolicyArg::Never => FloatPolicy::Never,
        }
    }
}

impl DecoderArgs {
    fn decoder(&self, trace: bool) -> Decoder {
        Decoder::with_config(
            DecoderConfig::new()
                .max_depth(self.max_depth)
                .float_policy(self.float_policy.into())
                .trace(trace),
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Decode {
            input,
            output,
            force,
        } => decode_file(&cli.decoder, input, output.as_deref(), *force),
        Command::Encode {
            input,
            output,
            force,
        } => encode_file(input, output, *force),
        Command::Dump { input } => dump_file(&cli.decoder, input),
        Command::Roundtrip { input } => roundtrip_file(&cli.decoder, input),
    }
}

/// Decode a payload into the JSON document
fn decode_file(args: &DecoderArgs, input: &Path, output: Option<&Path>, force: bool) -> Result<()> {
    let data = read_input(input)?;
    let message = args
        .decoder(false)
        .decode(&data)
        .with_context(|| format!("Unparseable input: {}", input.display()))?;

    info!("Decoded {} top-level fields from {}", message.len(), input.display());

    let document = to_json_string_pretty(&message)
        .with_context(|| format!("Failed to render {} as JSON", input.display()))?;

    match output {
        Some(path) => {
            write_output(path, document.as_bytes(), force)?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", document),
    }

    Ok(())
}

/// Encode a JSON document back into a payload
fn encode_file(input: &Path, output: &Path, force: bool) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    let message = from_json_str(&text)
        .with_context(|| format!("Invalid document: {}", input.display()))?;

    let data = encode(&message);
    debug!("Encoded {} bytes", data.len());

    write_output(output, &data, force)?;
    println!("Wrote {} ({} bytes)", output.display(), data.len());
    Ok(())
}

/// Print the trace of a payload
fn dump_file(args: &DecoderArgs, input: &Path) -> Result<()> {
    let data = read_input(input)?;
    let decoded = args
        .decoder(true)
        .decode_with_trace(&data)
        .with_context(|| format!("Unparseable input: {}", input.display()))?;

    print!("{}", decoded.trace);
    Ok(())
}

/// Decode, pass through the JSON document, encode, and compare
fn roundtrip_file(args: &DecoderArgs, input: &Path) -> Result<()> {
    let data = read_input(input)?;
    let message = args
        .decoder(false)
        .decode(&data)
        .with_context(|| format!("Unparseable input: {}", input.display()))?;

    let document = to_json_string_pretty(&message)?;
    let reencoded = encode(&from_json_str(&document)?);

    match first_difference(&data, &reencoded) {
        None => {
            println!("{}: identical ({} bytes)", input.display(), data.len());
            Ok(())
        }
        Some(offset) => bail!(
            "{}: re-encoded bytes differ at offset {} ({} bytes in, {} bytes out)",
            input.display(),
            offset,
            data.len(),
            reencoded.len()
        ),
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        bail!("Input file does not exist: {}", path.display());
    }

    trace!("Reading {}", path.display());
    let data = fs::read(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    trace!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

/// Offset of the first byte where `a` and `b` disagree
fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .or_else(|| (a.len() != b.len()).then(|| a.len().min(b.len())))
}

/// Write an output file, refusing to clobber unless forced
fn write_output(output_path: &Path, content: &[u8], force: bool) -> Result<()> {
    // Create parent directories
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    // Check if file exists
    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    let mut file = fs::File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;

    file.write_all(content)
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}
