//! locabench is a batch harness for scoring sound-source localization
//! algorithms against a benchmark dataset of multi-array recordings with
//! ground-truth source trajectories.
//!
//! The orchestrator in [process] walks `task{n}/recording{id}/{array}`
//! directories under the dataset root, loads each unit's audio and pose
//! records ([dataset]), derives per-source ground truth at the valid
//! required timestamps ([truth]), invokes whichever [algorithm::Localizer]
//! was selected from the registry, and scores the output with the circular
//! error statistics in [metrics]. Estimated trajectories and metrics
//! summaries are persisted under a mirrored results tree ([persist]) so an
//! eval-only rerun can rescore without recomputing.
//!
//! The harness deliberately contains no localization algorithm of its own;
//! the built-in `null` entry exists only to exercise the wiring.

#![warn(missing_docs)]
pub mod algorithm;
pub mod angles;
pub mod args;
pub mod dataset;
pub mod metrics;
pub mod persist;
pub mod pose_decoder;
pub mod process;
pub mod truth;
