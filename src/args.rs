// Commandline argument parser using clap for the locabench harness

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which passes to run for each (task, recording, array) unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProcessMode {
    /// Run the algorithm and persist its estimates, skip scoring.
    Forward,
    /// Score previously persisted estimates, skip the algorithm.
    Eval,
    /// Run the algorithm, then score its output.
    ForwardAndEval,
}

impl std::fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ProcessMode::Forward => "forward",
            ProcessMode::Eval => "eval",
            ProcessMode::ForwardAndEval => "forward-and-eval",
        };
        write!(f, "{}", name)
    }
}

impl ProcessMode {
    /// Whether the algorithm is invoked.
    pub fn includes_forward(&self) -> bool {
        matches!(self, ProcessMode::Forward | ProcessMode::ForwardAndEval)
    }

    /// Whether the metrics engine is invoked.
    pub fn includes_eval(&self) -> bool {
        matches!(self, ProcessMode::Eval | ProcessMode::ForwardAndEval)
    }
}

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct BenchArgs {
    /// Root of the benchmark dataset (dev or eval split)
    #[arg(short = 'd', long = "data")]
    pub data_dir: PathBuf,

    /// Directory to write estimates and metrics summaries into
    #[arg(short = 'r', long = "results")]
    pub results_dir: PathBuf,

    /// Treat the dataset as the evaluation split (ground truth withheld)
    #[arg(long = "eval-split")]
    pub eval_split: bool,

    /// Array names to process; defaults to every recognized array
    #[arg(long = "arrays")]
    #[clap(num_args = 1..)]
    pub arrays: Vec<String>,

    /// Task numbers to process (1-6); defaults to all six
    #[arg(short = 't', long = "tasks")]
    #[clap(num_args = 1..)]
    pub tasks: Vec<u32>,

    /// Name of the registered localization algorithm to run
    #[arg(short = 'a', long = "algorithm", default_value = "null")]
    pub algorithm: String,

    /// Number of tasks to process in parallel
    #[arg(short = 'p', long = "processes", default_value_t = 1)]
    pub processes: usize,

    /// Which passes to run per unit
    #[arg(long = "mode", value_enum, default_value_t = ProcessMode::ForwardAndEval)]
    pub mode: ProcessMode,

    /// Skip writing estimate tables and metrics summaries to disk
    #[arg(long = "no-save")]
    pub no_save: bool,
}

impl BenchArgs {
    /// True for development datasets, where ground truth is present.
    pub fn is_dev(&self) -> bool {
        !self.eval_split
    }
}
