//! pcmconv - PCM sample spec converter CLI

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use pcmconv::audio::{ChannelProvider, ConversionPlan, SampleSpec};
use pcmconv::config::{Args, Command, Settings};
use pcmconv::error::ConvError;
use pcmconv::stream::{buffer_size, InputStream, OutputStream, WriterSink};

/// Chunks queued between the reader thread and the converter in pull mode
const PULL_QUEUE_DEPTH: usize = 8;

fn main() -> Result<()> {
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_default()?,
    };

    // Initialize logging
    init_logging(&args, &settings)?;
    debug!("pcmconv {}", pcmconv::VERSION);

    match args.command {
        Command::Plan { from, to } => cmd_plan(&from, &to),
        Command::Convert {
            from,
            to,
            input,
            output,
            engine,
            chunk_frames,
            pull,
        } => {
            let mut settings = settings;
            if let Some(engine) = engine {
                settings.engine = engine;
            }
            let frames = chunk_frames.unwrap_or(settings.period_frames).max(1);
            let job = ConvertJob {
                from,
                to,
                input,
                output,
                frames,
            };
            if pull {
                cmd_convert_pull(&settings, &job)
            } else {
                cmd_convert_push(&settings, &job)
            }
        }
        Command::Config { write } => cmd_config(&settings, write),
    }
}

fn init_logging(args: &Args, settings: &Settings) -> Result<()> {
    let default_level = settings
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);
    let level = args.log_level(default_level);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if let Some(log_file) = &args.log {
        let file = File::create(log_file)?;
        subscriber.with_writer(file).init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Show the converter steps between two specs
fn cmd_plan(from: &SampleSpec, to: &SampleSpec) -> Result<()> {
    let plan = ConversionPlan::new(from, to);

    println!("{} -> {}\n", from, to);
    if plan.is_empty() {
        println!("  no conversion required");
    }
    for (i, step) in plan.steps().iter().enumerate() {
        println!("  {}. {:<8} {} -> {}", i + 1, step.item, step.src, step.dst);
    }
    println!();
    Ok(())
}

struct ConvertJob {
    from: SampleSpec,
    to: SampleSpec,
    input: PathBuf,
    output: PathBuf,
    frames: usize,
}

impl ConvertJob {
    fn open_input(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.input)
            .with_context(|| format!("Failed to open input '{}'", self.input.display()))?;
        Ok(BufReader::with_capacity(
            buffer_size(&self.from, self.frames * 4).max(4096),
            file,
        ))
    }

    fn create_output(&self) -> Result<BufWriter<File>> {
        let file = File::create(&self.output)
            .with_context(|| format!("Failed to create output '{}'", self.output.display()))?;
        Ok(BufWriter::with_capacity(
            buffer_size(&self.to, self.frames * 4).max(4096),
            file,
        ))
    }
}

/// Read until `buf` is full or the reader is exhausted
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Push the input file through an output stream
fn cmd_convert_push(settings: &Settings, job: &ConvertJob) -> Result<()> {
    let mut reader = job.open_input()?;
    let sink = WriterSink::new(job.create_output()?, &job.to);
    let stream = OutputStream::new(job.from, job.to, settings.build_chain(), sink)?;

    info!(
        "Converting {} -> {} with {:?} engine, {} frames per write",
        job.from, job.to, settings.engine, job.frames
    );

    let mut block = vec![0u8; job.from.frames_to_bytes(job.frames)];
    let mut frames_in = 0u64;
    loop {
        let n = read_block(&mut reader, &mut block)?;
        if n == 0 {
            break;
        }
        if n % job.from.bytes_per_frame() != 0 {
            warn!(
                "Input ends with a partial frame, ignoring {} bytes",
                n % job.from.bytes_per_frame()
            );
        }
        stream.write(&block[..n])?;
        frames_in += job.from.bytes_to_frames(n) as u64;
    }
    stream.flush()?;

    let sink = stream.into_sink();
    let frames_out = sink.frames_written();
    sink.into_inner().flush()?;

    println!("Converted {} frames into {} frames", frames_in, frames_out);
    Ok(())
}

/// Pull fixed-size blocks through an input stream fed by a reader thread
fn cmd_convert_pull(settings: &Settings, job: &ConvertJob) -> Result<()> {
    let mut reader = job.open_input()?;
    let mut writer = job.create_output()?;

    let (tx, rx) = bounded::<Vec<u8>>(PULL_QUEUE_DEPTH);
    let chunk_bytes = job.from.frames_to_bytes(job.frames);
    let feeder = std::thread::Builder::new()
        .name("pcmconv-reader".into())
        .spawn(move || -> std::io::Result<u64> {
            let mut total = 0u64;
            loop {
                let mut chunk = vec![0u8; chunk_bytes];
                let n = read_block(&mut reader, &mut chunk)?;
                if n == 0 {
                    break;
                }
                chunk.truncate(n);
                total += n as u64;
                if tx.send(chunk).is_err() {
                    debug!("Converter stopped, reader exiting");
                    break;
                }
            }
            Ok(total)
        })?;

    let provider = ChannelProvider::new(&job.from, rx);
    let mut stream = InputStream::new(job.from, job.to, settings.build_chain(), provider)?;

    info!(
        "Pulling {} -> {} with {:?} engine, {} frames per read",
        job.from, job.to, settings.engine, job.frames
    );

    let mut block = vec![0u8; job.to.frames_to_bytes(job.frames)];
    let mut frames_out = 0u64;
    let result = loop {
        match stream.read(&mut block) {
            Ok(n) => {
                writer.write_all(&block[..n])?;
                frames_out += job.to.bytes_to_frames(n) as u64;
            }
            Err(ConvError::EndOfStream) => {
                debug!("Source exhausted, dropping the last partial block");
                break Ok(());
            }
            Err(e) => break Err(e),
        }
    };
    drop(stream);

    let bytes_in = feeder
        .join()
        .map_err(|_| anyhow!("reader thread panicked"))??;
    result?;
    writer.flush()?;

    println!(
        "Read {} frames, wrote {} frames",
        bytes_in / job.from.bytes_per_frame() as u64,
        frames_out
    );
    Ok(())
}

/// Show effective settings or write a sample settings file
fn cmd_config(settings: &Settings, write: Option<PathBuf>) -> Result<()> {
    match write {
        Some(path) => write_sample_config(&path),
        None => {
            println!("Settings search order:");
            for path in Settings::search_paths() {
                let found = if path.exists() { " (found)" } else { "" };
                println!("  {}{}", path.display(), found);
            }
            println!("\n{}", toml::to_string_pretty(settings)?);
            Ok(())
        }
    }
}

fn write_sample_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Settings::sample_config())
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    println!("Sample settings written to {}", path.display());
    Ok(())
}
