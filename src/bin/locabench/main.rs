//! The locabench commandline entry point: validates the configuration,
//! resolves the requested algorithm, then hands off to the orchestrator.
//!
//! All configuration errors are caught here, before any recording is
//! touched, and exit the process with a non-zero status.

use clap::Parser;
use locabench::{
    algorithm::Registry,
    args::BenchArgs,
    metrics::summarize,
    process::{validate, TaskProcessor},
};

use log::{error, info, warn};
use std::{fs, process::exit};

// Example:
// cargo run --bin locabench --
//                           --data      ./data/dev
//                           --results   ./results
//                           --tasks     1 3
//                           --arrays    dicit eigenmike
//                           --algorithm null
//                           --mode      forward-and-eval

fn main() {
    env_logger::init();
    let args = BenchArgs::parse();

    let registry = Registry::with_builtins();
    let plan = match validate(&args, &registry) {
        Ok(plan) => plan,
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    };

    if !args.results_dir.exists() {
        warn!("Directory for results not found. New directory created.");
        if let Err(e) = fs::create_dir_all(&args.results_dir) {
            error!(
                "Cannot create results directory {}: {}",
                args.results_dir.display(),
                e
            );
            exit(1);
        }
    }

    info!(
        "Evaluating tasks {:?} in {}",
        plan.tasks.iter().map(|t| t.number()).collect::<Vec<_>>(),
        args.data_dir.display()
    );

    let processor = TaskProcessor::new(&args, plan.algorithm.clone());
    let results = processor.run(&plan.tasks, args.processes);

    if args.mode.includes_eval() {
        for task in &plan.tasks {
            let summary = summarize(*task, &results);
            info!(
                "task {}: {} units, {} sources, mean azimuth error {:.4} rad, \
                 mean detection rate {:.2}, mean false-alarm rate {:.2}",
                summary.task.number(),
                summary.units,
                summary.total_sources,
                summary.mean_azimuth_error,
                summary.mean_detection_rate,
                summary.mean_false_alarm_rate
            );
        }
    }
    info!("Processing finished!");
}
