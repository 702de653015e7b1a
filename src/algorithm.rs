//! The pluggable-algorithm contract and the registry that resolves
//! algorithm names to implementations.
//!
//! The harness never implements localization itself. Callers register a
//! [Localizer] under a name, select it on the command line, and the
//! orchestrator invokes it exactly once per (task, recording, array)
//! triple with a freshly built [AlgorithmInput]. A built-in `null`
//! implementation that detects nothing is registered by default so the
//! harness can be smoke-tested end to end without any real algorithm.

use std::{borrow::Cow, collections::HashMap, fmt, sync::Arc};

/// Everything an algorithm gets for one (recording, array) unit. Borrowed
/// from the loaded recording; read-only from the algorithm's perspective.
#[derive(Debug, Clone)]
pub struct AlgorithmInput<'a> {
    /// De-interleaved signal, one inner slice per microphone channel.
    pub signal: &'a [Vec<f32>],
    /// Samples per second of `signal`.
    pub sample_rate: u32,
    /// Elapsed timestamps (seconds from recording start) the algorithm
    /// must produce estimates at. Only valid required times appear here.
    pub timestamps: Vec<f64>,
    /// Microphone count, derived from the geometry.
    pub num_mics: usize,
    /// Microphone positions in the array frame, metres.
    pub mic_geometry: &'a [[f64; 3]],
    /// Which array this capture came from.
    pub array_name: &'a str,
}

/// One estimated source trajectory. `time`, `azimuth`, and `elevation`
/// always have the same length; `range` is either empty (not estimated)
/// or that same length.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEstimate {
    /// Identifier chosen by the algorithm, unique within one output.
    pub id: String,
    /// Estimate timestamps, seconds.
    pub time: Vec<f64>,
    /// Azimuth estimates, radians.
    pub azimuth: Vec<f64>,
    /// Elevation estimates, radians.
    pub elevation: Vec<f64>,
    /// Range estimates, metres. May be empty.
    pub range: Vec<f64>,
}

/// An algorithm's full answer for one unit: zero or more estimated source
/// trajectories. The count need not match the ground truth; mismatches are
/// a scored condition, not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlgorithmOutput {
    /// Estimated trajectories, in the algorithm's chosen order.
    pub sources: Vec<SourceEstimate>,
}

impl AlgorithmOutput {
    /// Checks the equal-length column contract on every trajectory. The
    /// orchestrator rejects a violating output as a unit failure instead
    /// of letting the scorer index out of bounds.
    pub fn validate(&self) -> Result<(), AlgorithmError> {
        for source in &self.sources {
            let n = source.time.len();
            let range_ok = source.range.is_empty() || source.range.len() == n;
            if source.azimuth.len() != n || source.elevation.len() != n || !range_ok {
                return Err(AlgorithmError::BadOutput(format!(
                    "estimate {:?} columns disagree: {} timestamps, {} azimuth, {} elevation, {} range",
                    source.id,
                    n,
                    source.azimuth.len(),
                    source.elevation.len(),
                    source.range.len()
                )));
            }
        }
        Ok(())
    }
}

/// Raised by [Localizer] implementations. The orchestrator logs these with
/// unit context and moves on to the next unit.
#[derive(Debug)]
pub enum AlgorithmError {
    /// The input violates the algorithm's own preconditions.
    BadInput(String),
    /// The algorithm failed internally.
    Failed(String),
    /// The returned trajectories violate the column contract.
    BadOutput(String),
}

impl fmt::Display for AlgorithmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            AlgorithmError::BadInput(why) => Cow::from(format!("bad algorithm input: {}", why)),
            AlgorithmError::Failed(why) => Cow::from(format!("algorithm failed: {}", why)),
            AlgorithmError::BadOutput(why) => Cow::from(format!("bad algorithm output: {}", why)),
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for AlgorithmError {}

/// A sound-source localization algorithm. Implementations must be safe to
/// call from worker threads when tasks run in parallel.
pub trait Localizer: Send + Sync {
    /// Produces estimated trajectories for one unit. Called exactly once
    /// per (task, recording, array) triple.
    fn locate(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError>;
}

/// The placeholder algorithm: detects no sources at all. Useful for
/// exercising the harness wiring, and as the worst-possible baseline
/// (detection rate 0 everywhere).
pub struct NullLocalizer;

impl Localizer for NullLocalizer {
    fn locate(&self, _input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
        Ok(AlgorithmOutput::default())
    }
}

/// An explicit mapping from algorithm names to implementations. This
/// replaces resolve-by-string dynamic loading: the set of selectable
/// algorithms is exactly what was registered before the run started.
pub struct Registry {
    algorithms: HashMap<String, Arc<dyn Localizer>>,
}

impl Registry {
    /// A registry containing only the built-in `null` algorithm.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            algorithms: HashMap::new(),
        };
        registry.register("null", Arc::new(NullLocalizer));
        registry
    }

    /// Registers an algorithm under a name, replacing any previous entry
    /// with that name.
    pub fn register(&mut self, name: &str, algorithm: Arc<dyn Localizer>) {
        self.algorithms.insert(name.to_string(), algorithm);
    }

    /// Looks up an algorithm by name. `None` is fatal to the caller: the
    /// binary logs it and exits non-zero before touching any recording.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Localizer>> {
        self.algorithms.get(name).cloned()
    }

    /// Registered names, sorted, for error messages.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.algorithms.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Test algorithm that reports one source at a fixed direction for
    /// every requested timestamp.
    pub(crate) struct ConstantLocalizer {
        pub azimuth: f64,
        pub elevation: f64,
    }

    impl Localizer for ConstantLocalizer {
        fn locate(&self, input: &AlgorithmInput) -> Result<AlgorithmOutput, AlgorithmError> {
            let n = input.timestamps.len();
            Ok(AlgorithmOutput {
                sources: vec![SourceEstimate {
                    id: "est1".to_string(),
                    time: input.timestamps.clone(),
                    azimuth: vec![self.azimuth; n],
                    elevation: vec![self.elevation; n],
                    range: Vec::new(),
                }],
            })
        }
    }

    #[test]
    fn registry_resolves_builtin_null() {
        let registry = Registry::with_builtins();
        assert!(registry.resolve("null").is_some());
        assert!(registry.resolve("music").is_none());
        assert_eq!(registry.names(), vec!["null".to_string()]);
    }

    #[test]
    fn registry_accepts_custom_algorithms() {
        let mut registry = Registry::with_builtins();
        registry.register(
            "constant",
            Arc::new(ConstantLocalizer {
                azimuth: 0.0,
                elevation: 0.0,
            }),
        );
        assert!(registry.resolve("constant").is_some());
        assert_eq!(registry.names().len(), 2);
    }

    #[test]
    fn validate_accepts_well_formed_output() {
        let output = AlgorithmOutput {
            sources: vec![SourceEstimate {
                id: "a".to_string(),
                time: vec![0.0, 0.1],
                azimuth: vec![0.0, 0.1],
                elevation: vec![0.0, 0.0],
                range: Vec::new(),
            }],
        };
        assert!(output.validate().is_ok());
        assert!(AlgorithmOutput::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_mismatched_columns() {
        let output = AlgorithmOutput {
            sources: vec![SourceEstimate {
                id: "a".to_string(),
                time: vec![0.0, 0.1],
                azimuth: vec![0.0],
                elevation: vec![0.0, 0.0],
                range: Vec::new(),
            }],
        };
        assert!(matches!(
            output.validate(),
            Err(AlgorithmError::BadOutput(_))
        ));
    }

    #[test]
    fn null_localizer_detects_nothing() {
        let signal = vec![vec![0.0f32; 8]];
        let mics = [[0.0, 0.0, 0.0]];
        let input = AlgorithmInput {
            signal: &signal,
            sample_rate: 8000,
            timestamps: vec![0.0, 0.1],
            num_mics: 1,
            mic_geometry: &mics,
            array_name: "dummy",
        };
        let out = NullLocalizer.locate(&input).unwrap();
        assert!(out.sources.is_empty());
    }
}
