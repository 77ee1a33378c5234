use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "jvm-sampler")]
#[command(version)]
#[command(about = "Sampling profiler for running JVMs", long_about = None)]
pub struct Cli {
    #[arg(
        short = 'c',
        long,
        global = true,
        help = "Path to configuration file",
        env = "JVM_SAMPLER_CONFIG"
    )]
    pub config: Option<String>,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Log level (trace, debug, info, warn, error); RUST_LOG overrides"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List local JVMs that can be sampled
    List,

    /// Sample a running JVM and print the analysis
    Record {
        #[arg(short, long, help = "Process ID of the JVM")]
        pid: u32,

        #[arg(
            short,
            long,
            default_value = "30s",
            help = "How long to sample (e.g. 500ms, 30s, 2m)",
            value_parser = parse_duration
        )]
        duration: Duration,

        #[arg(short, long, help = "Write the recorded session to this JSON file")]
        save: Option<String>,

        #[arg(long, help = "Skip the heap histograms taken at the start and end of the run")]
        no_heap: bool,

        #[arg(long, help = "Write collapsed stacks for flamegraph tools to this file")]
        folded: Option<PathBuf>,

        #[arg(long, help = "Print the analysis as JSON")]
        json: bool,

        #[arg(short, long, default_value_t = 20, help = "Rows per table")]
        top: usize,
    },

    /// Analyse a previously saved session
    Report {
        #[arg(help = "Session file written by `record --save`")]
        file: PathBuf,

        #[arg(long, help = "Write collapsed stacks for flamegraph tools to this file")]
        folded: Option<PathBuf>,

        #[arg(long, help = "Print the analysis as JSON")]
        json: bool,

        #[arg(short, long, default_value_t = 20, help = "Rows per table")]
        top: usize,
    },
}

fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}
