//! CLI argument parsing using clap

use crate::audio::{EngineKind, SampleSpec};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pcmconv - PCM sample spec converter
///
/// Converts raw interleaved PCM between sample rates, sample formats and
/// channel counts. Specs are written RATE/FORMAT/CHANNELS, e.g. 44100/s16/2.
#[derive(Parser, Debug)]
#[command(name = "pcmconv")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode - only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output to file
    #[arg(long, global = true)]
    pub log: Option<String>,

    /// Settings file (default: ./pcmconv.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the converter steps needed between two specs
    Plan {
        /// Source spec
        #[arg(long)]
        from: SampleSpec,

        /// Destination spec
        #[arg(long)]
        to: SampleSpec,
    },

    /// Convert a raw PCM file
    Convert {
        /// Spec of the input data
        #[arg(long)]
        from: SampleSpec,

        /// Spec of the output data
        #[arg(long)]
        to: SampleSpec,

        /// Raw PCM input file
        #[arg(short, long)]
        input: PathBuf,

        /// Raw PCM output file
        #[arg(short, long)]
        output: PathBuf,

        /// Resampling engine (overrides the settings file)
        #[arg(long, value_enum)]
        engine: Option<EngineKind>,

        /// Frames per block (push: written per call, pull: read per call)
        #[arg(long)]
        chunk_frames: Option<usize>,

        /// Pull output frames through the input path instead of pushing
        #[arg(long)]
        pull: bool,
    },

    /// Show effective settings or write a sample settings file
    Config {
        /// Write a sample settings file to this path
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

impl Args {
    /// Get the log level based on verbose/quiet flags
    ///
    /// Without flags, `default` (from the settings file) applies.
    pub fn log_level(&self, default: tracing::Level) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else {
            match self.verbose {
                0 => default,
                1 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert() {
        let args = Args::try_parse_from([
            "pcmconv", "-vv", "convert", "--from", "44100/s16/2", "--to", "8000/u8/1",
            "-i", "in.raw", "-o", "out.raw", "--engine", "fft", "--pull",
        ])
        .unwrap();

        assert_eq!(args.log_level(tracing::Level::INFO), tracing::Level::TRACE);
        match args.command {
            Command::Convert { from, to, engine, pull, chunk_frames, .. } => {
                assert_eq!(from, "44100/s16/2".parse().unwrap());
                assert_eq!(to.rate(), 8_000);
                assert_eq!(engine, Some(EngineKind::Fft));
                assert!(pull);
                assert_eq!(chunk_frames, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bad_spec_is_rejected() {
        let parsed = Args::try_parse_from([
            "pcmconv", "plan", "--from", "44100/f32/2", "--to", "8000/u8/1",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_quiet_wins() {
        let args = Args::try_parse_from(["pcmconv", "-q", "-v", "config"]).unwrap();
        assert_eq!(args.log_level(tracing::Level::INFO), tracing::Level::ERROR);
    }

    #[test]
    fn test_settings_level_is_default() {
        let args = Args::try_parse_from(["pcmconv", "config"]).unwrap();
        assert_eq!(args.log_level(tracing::Level::WARN), tracing::Level::WARN);
    }
}
