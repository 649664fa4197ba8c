mod loader;
mod logging;

use std::{fs, path::Path, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sdreader::{CardReader, MemoryCard, RecordingHost, SessionConfig};
use serde::Deserialize;

type Replay = CardReader<MemoryCard, RecordingHost>;

#[derive(Debug, Parser)]
#[command(name = "card_replay")]
#[command(about = "Replay SD-card sessions against a host directory")]
struct Cli {
    /// Host directory mirrored as the card root.
    #[arg(long)]
    card: PathBuf,
    /// TOML file with a `[session]` table.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "warn")]
    log_level: log::LevelFilter,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print every runnable file below a directory.
    Ls(DirArgs),
    /// Print a directory in display order.
    Sorted(DirArgs),
    /// Render an 8.3 path with long names.
    LongPath(LongPathArgs),
    /// Stream an instruction file, following `M32 <path>` calls.
    Run(RunArgs),
    /// Run `auto0.g`, `auto1.g`, ... from the card root.
    Autostart,
}

#[derive(Debug, Args)]
struct DirArgs {
    /// Working directory, entered one segment at a time.
    #[arg(long, default_value = "/")]
    dir: String,
}

#[derive(Debug, Args)]
struct LongPathArgs {
    path: String,
}

#[derive(Debug, Args)]
struct RunArgs {
    path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplayConfig {
    session: SessionConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level)?;

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ReplayConfig::default(),
    };
    let card = loader::load_dir(&cli.card)?;
    let mut reader = CardReader::new(card, RecordingHost::new(), config.session);
    let mounted = reader.init_card();
    echo_protocol(&mut reader);
    mounted?;

    match &cli.command {
        Commands::Ls(args) => {
            enter(&mut reader, &args.dir)?;
            reader.ls()?;
            print!("{}", reader.host_mut().take_output());
        }
        Commands::Sorted(args) => {
            enter(&mut reader, &args.dir)?;
            for position in 0..reader.file_count() {
                let Some(entry) = reader.get_filename_sorted(position) else {
                    continue;
                };
                let suffix = if entry.is_dir { "/" } else { "" };
                println!("{}{}", entry.longest_name(), suffix);
            }
        }
        Commands::LongPath(args) => {
            reader.print_long_path(&args.path)?;
            print!("{}", reader.host_mut().take_output());
        }
        Commands::Run(args) => run_file(&mut reader, &args.path)?,
        Commands::Autostart => {
            while let Some(name) = reader.check_autostart(true, 0) {
                reader.host_mut().commands.clear();
                run_file(&mut reader, &name)?;
            }
            echo_protocol(&mut reader);
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<ReplayConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_config(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn parse_config(text: &str) -> Result<ReplayConfig> {
    Ok(toml::from_str(text)?)
}

fn enter(reader: &mut Replay, dir: &str) -> Result<()> {
    for segment in dir.split('/').filter(|s| !s.is_empty()) {
        let entered = reader.chdir(segment);
        echo_protocol(reader);
        entered?;
    }
    Ok(())
}

fn run_file(reader: &mut Replay, path: &str) -> Result<()> {
    let opened = reader.open_file(path, true, false);
    echo_protocol(reader);
    opened?;
    reader.start_print();

    while reader.is_printing() {
        if reader.eof() {
            let finished = reader.finish();
            echo_protocol(reader);
            finished?;
            continue;
        }
        let before = reader.position();
        let Some(line) = reader.read_line() else {
            continue;
        };
        if reader.position() == before {
            bail!("read stalled at byte {before} of {path}");
        }
        let line = line.trim();
        if let Some(target) = line.strip_prefix("M32 ") {
            let called = reader.open_file(target.trim(), true, true);
            echo_protocol(reader);
            called?;
            reader.start_print();
            continue;
        }
        if !line.is_empty() {
            println!("{line}");
        }
    }

    for command in reader.host_mut().commands.drain(..) {
        eprintln!("queued: {command}");
    }
    Ok(())
}

fn echo_protocol(reader: &mut Replay) {
    for line in reader.host_mut().take_output().lines() {
        eprintln!("< {line}");
    }
}
