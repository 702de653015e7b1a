//! The task orchestrator: walks tasks, recordings, and arrays under the
//! dataset root, runs the configured passes on each unit, and collects the
//! per-unit metrics.
//!
//! Per unit the flow is load, extract truth, forward (or reuse saved
//! estimates), evaluate, persist. A failing unit is logged with its
//! (task, recording, array) context and skipped; the remaining units keep
//! going, so one corrupt recording cannot sink a whole batch run.
//!
//! Tasks share no mutable state, so task-level parallelism is a plain
//! scoped-thread fan-out with no coordination beyond collecting results.

use crate::algorithm::{AlgorithmError, AlgorithmInput, AlgorithmOutput, Localizer, Registry};
use crate::args::{BenchArgs, ProcessMode};
use crate::dataset::{self, DatasetError, RecordingData, VALID_ARRAYS, VALID_TASKS};
use crate::metrics::{evaluate, MetricsResult, TaskKind};
use crate::persist::{self, PersistError};
use crate::truth::{extract_truth, GroundTruth};

use log::{error, info};
use std::{borrow::Cow, fmt, path::PathBuf, sync::Arc, thread};

/// A configuration problem caught before any recording is touched. All of
/// these are fatal to the binary: logged, then exit non-zero.
#[derive(Debug)]
pub enum ConfigError {
    /// The dataset root does not exist.
    MissingDataDir(PathBuf),
    /// A requested task number is outside 1..=6.
    InvalidTask(u32),
    /// A requested array name is not one the benchmark recognizes.
    InvalidArray(String),
    /// No algorithm is registered under the requested name. Carries the
    /// registered names for the error message.
    UnknownAlgorithm(String, Vec<String>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ConfigError::MissingDataDir(path) => {
                Cow::from(format!("Incorrect data path: {}", path.display()))
            }
            ConfigError::InvalidTask(n) => {
                Cow::from(format!("Invalid input for task number(s): {}", n))
            }
            ConfigError::InvalidArray(name) => {
                Cow::from(format!("Invalid input for array(s): {}", name))
            }
            ConfigError::UnknownAlgorithm(name, registered) => Cow::from(format!(
                "Algorithm {:?} not found; registered algorithms: {:?}",
                name, registered
            )),
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

/// The validated outcome of [validate]: which tasks to run and with what
/// algorithm.
pub struct RunPlan {
    /// Requested tasks, in request order; all six when none were given.
    pub tasks: Vec<TaskKind>,
    /// The resolved algorithm.
    pub algorithm: Arc<dyn Localizer>,
}

/// Eagerly checks the configuration against the dataset root and the
/// registry. Called before any task processing begins, so every failure
/// here happens with zero recordings touched.
pub fn validate(args: &BenchArgs, registry: &Registry) -> Result<RunPlan, ConfigError> {
    if !args.data_dir.exists() {
        return Err(ConfigError::MissingDataDir(args.data_dir.clone()));
    }

    let numbers: Vec<u32> = if args.tasks.is_empty() {
        VALID_TASKS.collect()
    } else {
        args.tasks.clone()
    };
    let mut tasks = Vec::with_capacity(numbers.len());
    for n in numbers {
        tasks.push(TaskKind::from_number(n).ok_or(ConfigError::InvalidTask(n))?);
    }

    for array in &args.arrays {
        if !VALID_ARRAYS.contains(&array.as_str()) {
            return Err(ConfigError::InvalidArray(array.clone()));
        }
    }

    let algorithm = registry
        .resolve(&args.algorithm)
        .ok_or_else(|| ConfigError::UnknownAlgorithm(args.algorithm.clone(), registry.names()))?;

    Ok(RunPlan { tasks, algorithm })
}

/// A failure confined to one (task, recording, array) unit.
#[derive(Debug)]
pub enum UnitError {
    /// Loading the unit's inputs failed.
    Dataset(DatasetError),
    /// The algorithm refused or failed on the unit.
    Algorithm(AlgorithmError),
    /// Persisting or reloading results failed.
    Persist(PersistError),
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            UnitError::Dataset(e) => Cow::from(format!("dataset: {}", e)),
            UnitError::Algorithm(e) => Cow::from(format!("algorithm: {}", e)),
            UnitError::Persist(e) => Cow::from(format!("persist: {}", e)),
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for UnitError {}

impl From<DatasetError> for UnitError {
    fn from(e: DatasetError) -> Self {
        UnitError::Dataset(e)
    }
}

impl From<AlgorithmError> for UnitError {
    fn from(e: AlgorithmError) -> Self {
        UnitError::Algorithm(e)
    }
}

impl From<PersistError> for UnitError {
    fn from(e: PersistError) -> Self {
        UnitError::Persist(e)
    }
}

/// Drives one benchmark run. Built once from the parsed arguments and a
/// resolved algorithm, then shared read-only across task workers.
pub struct TaskProcessor {
    data_dir: PathBuf,
    results_dir: PathBuf,
    is_dev: bool,
    arrays: Vec<String>,
    mode: ProcessMode,
    save_results: bool,
    algorithm: Arc<dyn Localizer>,
}

impl TaskProcessor {
    /// Builds a processor from parsed arguments. An empty array selection
    /// means every recognized array.
    pub fn new(args: &BenchArgs, algorithm: Arc<dyn Localizer>) -> Self {
        let arrays = if args.arrays.is_empty() {
            VALID_ARRAYS.iter().map(|a| a.to_string()).collect()
        } else {
            args.arrays.clone()
        };
        TaskProcessor {
            data_dir: args.data_dir.clone(),
            results_dir: args.results_dir.clone(),
            is_dev: args.is_dev(),
            arrays,
            mode: args.mode,
            save_results: !args.no_save,
            algorithm,
        }
    }

    /// Processes every recording and selected array of one task. Unit
    /// failures are logged and skipped; enumeration failures (a missing
    /// task directory, say) end the task early with whatever was scored.
    pub fn process_task(&self, task: TaskKind) -> Vec<MetricsResult> {
        let mut results = Vec::new();
        let recordings = match dataset::list_recordings(&self.data_dir, task.number()) {
            Ok(recordings) => recordings,
            Err(e) => {
                error!("task {}: cannot list recordings: {}", task.number(), e);
                return results;
            }
        };

        for recording in &recordings {
            let recording_id = match dataset::recording_id(recording) {
                Ok(id) => id,
                Err(e) => {
                    error!("task {}: {}", task.number(), e);
                    continue;
                }
            };
            let array_dirs = match dataset::list_sorted(recording) {
                Ok(dirs) => dirs,
                Err(e) => {
                    error!(
                        "task {}, recording {}: cannot list arrays: {}",
                        task.number(),
                        recording_id,
                        e
                    );
                    continue;
                }
            };
            for array_dir in array_dirs {
                let array = match array_dir.file_name().and_then(|n| n.to_str()) {
                    Some(name) if array_dir.is_dir() => name.to_string(),
                    _ => continue,
                };
                if !self.arrays.contains(&array) {
                    continue;
                }
                info!(
                    "Processing task {}, recording {}, array {}.",
                    task.number(),
                    recording_id,
                    array
                );
                match self.process_unit(task, &array_dir, recording_id, &array) {
                    Ok(Some(result)) => results.push(result),
                    Ok(None) => {}
                    Err(e) => {
                        error!(
                            "task {}, recording {}, array {}: {}",
                            task.number(),
                            recording_id,
                            array,
                            e
                        );
                    }
                }
            }
        }
        results
    }

    /// One unit end to end. Returns the metrics when evaluation ran, and
    /// `None` for forward-only runs.
    fn process_unit(
        &self,
        task: TaskKind,
        array_dir: &std::path::Path,
        recording_id: u32,
        array: &str,
    ) -> Result<Option<MetricsResult>, UnitError> {
        let data = dataset::load_array_dir(array_dir, self.is_dev)?;
        let truth = extract_truth(&data, self.is_dev);
        let result_dir = persist::result_dir(&self.results_dir, task.number(), recording_id, array);

        let output = if self.mode.includes_forward() {
            let output = self.forward(&data, array)?;
            info!("Localization complete ({} sources).", output.sources.len());
            if self.save_results {
                persist::write_estimates(&result_dir, &output)?;
            }
            output
        } else {
            persist::read_estimates(&result_dir)?
        };

        if !self.mode.includes_eval() {
            return Ok(None);
        }

        let result = self.eval(task, &truth, &output);
        if self.save_results {
            persist::write_metrics(&result_dir, &result)?;
        }
        Ok(Some(result))
    }

    /// The forward pass: builds the algorithm input for one unit and
    /// invokes the algorithm exactly once.
    fn forward(&self, data: &RecordingData, array: &str) -> Result<AlgorithmOutput, UnitError> {
        let input = AlgorithmInput {
            signal: &data.audio.channels,
            sample_rate: data.audio.sample_rate,
            timestamps: data.required.valid_elapsed(),
            num_mics: data.geometry.num_mics(),
            mic_geometry: &data.geometry.mics,
            array_name: array,
        };
        let output = self.algorithm.locate(&input)?;
        output.validate()?;
        Ok(output)
    }

    /// The eval pass. Logs the per-source outcome so a run is readable
    /// from the console alone.
    fn eval(&self, task: TaskKind, truth: &GroundTruth, output: &AlgorithmOutput) -> MetricsResult {
        let result = evaluate(task, truth, output);
        if !result.scored {
            info!("Ground truth withheld, unit not scored.");
            return result;
        }
        for source in &result.sources {
            info!(
                "source {}: azimuth error {:.4} rad, detection rate {:.2}",
                source.source_id, source.azimuth_mean_error, source.detection_rate
            );
        }
        result
    }

    /// Runs the given tasks, fanning out over at most `processes` worker
    /// threads when more than one is requested. Task order within the
    /// returned results follows the input order.
    pub fn run(&self, tasks: &[TaskKind], processes: usize) -> Vec<MetricsResult> {
        if processes <= 1 || tasks.len() <= 1 {
            return tasks.iter().flat_map(|t| self.process_task(*t)).collect();
        }

        let chunk_size = tasks.len().div_ceil(processes);
        thread::scope(|scope| {
            let handles: Vec<_> = tasks
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .flat_map(|t| self.process_task(*t))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().expect("task worker panicked"))
                .collect()
        })
    }
}
