//! CAST command-line front end. Thin argument parsing and delegation only:
//! all structural and container logic lives in `cast-container` and below.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use cast_bytes::CastError;
use cast_codec::CoderKind;
use cast_container::{CancellationToken, CastConfig};

/// Which coder back-end to use. `Auto` resolves to `7zip` when
/// `SEVEN_ZIP_PATH` is set, `native` otherwise (§9: the environment
/// variable is read only here, never inside `cast-codec`'s public API).
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Auto,
    Native,
    #[value(name = "7zip")]
    Zip7,
}

impl ModeArg {
    fn resolve(self) -> CoderKind {
        match self {
            ModeArg::Native => CoderKind::Native,
            ModeArg::Zip7 => CoderKind::External7z,
            ModeArg::Auto => {
                if std::env::var_os("SEVEN_ZIP_PATH").is_some() {
                    CoderKind::External7z
                } else {
                    CoderKind::Native
                }
            }
        }
    }
}

fn parse_row_range(s: &str) -> std::result::Result<(u64, u64), String> {
    let (lo, hi) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LO:HI, got {s:?}"))?;
    let lo: u64 = lo.parse().map_err(|e| format!("bad row range start: {e}"))?;
    let hi: u64 = hi.parse().map_err(|e| format!("bad row range end: {e}"))?;
    Ok((lo, hi))
}

#[derive(Parser, Debug)]
#[command(name = "cast", version, about = "Columnar structural pre-processor for row-oriented text")]
struct Args {
    /// Optional configuration file path (overrides discovery of `cast.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Structurally transform and entropy-code an input file.
    Compress {
        input_path: PathBuf,
        output_path: PathBuf,
        #[arg(long, value_enum, default_value = "auto")]
        mode: ModeArg,
        /// Target block size in bytes, overriding the configured default.
        #[arg(long)]
        chunk_size: Option<usize>,
        /// LZMA2 dictionary size in bytes, overriding the configured default.
        #[arg(long)]
        dict_size: Option<u32>,
        /// Emit a footer index enabling row-range queries on decompress.
        #[arg(long)]
        indexed: bool,
        /// Re-read and CRC-verify the written container before exiting.
        #[arg(long)]
        verify: bool,
        /// Use more than one worker thread for block encoding.
        #[arg(long)]
        multithread: bool,
        /// Explicit worker thread count; implies --multithread.
        #[arg(long)]
        threads: Option<u32>,
    },
    /// Restore the exact original byte stream from a container.
    Decompress {
        input_path: PathBuf,
        output_path: PathBuf,
        #[arg(long, value_enum, default_value = "auto")]
        mode: ModeArg,
        /// 1-based inclusive row range `LO:HI`; requires an INDEXED container.
        #[arg(long, value_parser = parse_row_range)]
        rows: Option<(u64, u64)>,
    },
    /// Stream the full reverse path and check every block's CRC32 without
    /// writing any output.
    Verify {
        input_path: PathBuf,
        #[arg(long, value_enum, default_value = "auto")]
        mode: ModeArg,
    },
}

/// Default worker count when `--multithread` is passed without an explicit
/// `--threads`. Matches the teacher's habit of a small, fixed default
/// rather than probing `std::thread::available_parallelism` (block
/// encoding is CPU-bound per thread; oversubscribing buys nothing past a
/// handful of lanes for typical block sizes).
const DEFAULT_MULTITHREAD_WORKERS: u32 = 4;

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) {
        let log_path = Path::new("cast.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(log_path);
        }
        let file_appender = tracing_appender::rolling::never(".", "cast.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => self.log_guard = Some(guard),
            Err(_) => {
                // A global subscriber is already installed (e.g. under a test
                // harness); nothing more to do.
            }
        }
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn main() {
    let mut startup = AppStartup::new();
    startup.configure_logging();
    AppStartup::install_panic_hook();

    let args = Args::parse();
    info!(target: "runtime", command = ?args.command, "startup");

    let config = cast_container::load_from(args.config.as_deref());
    let exit_code = match run(args.command, config) {
        Ok(()) => 0,
        Err(err) => {
            // `.with_context()` wraps the real error behind an opaque anyhow
            // context type, so the `CastError` (if any) must be found by
            // walking the chain rather than downcasting `err` itself.
            match err.chain().find_map(|cause| cause.downcast_ref::<CastError>()) {
                Some(cast_err) => {
                    eprintln!("cast: {cast_err}");
                    cast_err.exit_code()
                }
                None => {
                    eprintln!("cast: {err:#}");
                    2
                }
            }
        }
    };

    drop(startup.log_guard.take());
    std::process::exit(exit_code);
}

fn run(command: Command, mut config: CastConfig) -> Result<()> {
    match command {
        Command::Compress { input_path, output_path, mode, chunk_size, dict_size, indexed, verify, multithread, threads } => {
            if let Some(v) = chunk_size {
                config.target_block_bytes = v;
            }
            if let Some(v) = dict_size {
                config.dict_size = v;
            }
            if indexed {
                config.indexed = true;
            }
            config.coder = mode.resolve();
            config.threads = threads.unwrap_or(if multithread { DEFAULT_MULTITHREAD_WORKERS } else { 1 });

            let input = File::open(&input_path).with_context(|| format!("opening {}", input_path.display()))?;
            let output = File::create(&output_path).with_context(|| format!("creating {}", output_path.display()))?;
            let writer = BufWriter::new(output);

            cast_container::compress(input, writer, &config, CancellationToken::new())
                .with_context(|| "compressing input")?;
            info!(target: "runtime", path = %output_path.display(), "compress_complete");

            if verify {
                let verify_input = File::open(&output_path).with_context(|| format!("reopening {}", output_path.display()))?;
                let stats = cast_container::decompress_with(verify_input, std::io::sink(), config.coder)
                    .with_context(|| "verifying written container")?;
                info!(target: "runtime", blocks = stats.blocks, bytes = stats.bytes, "verify_complete");
            }
            Ok(())
        }

        Command::Decompress { input_path, output_path, mode, rows } => {
            let coder_kind = mode.resolve();
            let input = File::open(&input_path).with_context(|| format!("opening {}", input_path.display()))?;
            let output = File::create(&output_path).with_context(|| format!("creating {}", output_path.display()))?;
            let mut writer = BufWriter::new(output);

            match rows {
                Some((lo, hi)) => {
                    cast_container::decompress_range_with(input, &mut writer, lo, hi, coder_kind)
                        .with_context(|| "serving row range")?;
                }
                None => {
                    let stats = cast_container::decompress_with(input, &mut writer, coder_kind)
                        .with_context(|| "decompressing input")?;
                    info!(target: "runtime", blocks = stats.blocks, bytes = stats.bytes, "decompress_complete");
                }
            }
            Ok(())
        }

        Command::Verify { input_path, mode } => {
            let coder_kind = mode.resolve();
            let input = File::open(&input_path).with_context(|| format!("opening {}", input_path.display()))?;
            let stats = cast_container::decompress_with(input, std::io::sink(), coder_kind)
                .with_context(|| "verifying container")?;
            info!(target: "runtime", blocks = stats.blocks, bytes = stats.bytes, "verify_complete");
            println!("OK: {} blocks, {} bytes", stats.blocks, stats.bytes);
            Ok(())
        }
    }
}

#[allow(dead_code)]
fn assert_exit_code_mapping_is_exhaustive(err: &CastError) -> i32 {
    // Kept only to fail a future compile if a new CastError variant is added
    // without updating the exit-code table in `error.rs`; `main` never
    // calls this, it calls `CastError::exit_code` directly.
    match err {
        CastError::InputMalformed
        | CastError::TemplateOverflow
        | CastError::CodecEncodeFail { .. }
        | CastError::CodecDecodeFail { .. }
        | CastError::IntegrityFail { .. }
        | CastError::ContainerMalformed { .. }
        | CastError::RangeOutOfBounds { .. }
        | CastError::Cancelled
        | CastError::Io(_) => err.exit_code(),
    }
}
