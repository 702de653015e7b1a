//! The benchmark's on-disk data model and the loader that walks it.
//!
//! A dataset root contains `task{n}/recording{id}/{array}/` directories.
//! Each array directory holds:
//!
//! - `audio.wav` — the multichannel capture for this array
//! - `required_time.txt` — rows `t flag`; the timestamps estimates are
//!   scored at, tagged valid (`1`) or not (`0`)
//! - `array_pose.txt` — rows `t x y z yaw pitch roll`; the array's
//!   trajectory at its native sampling rate
//! - `mics.txt` — rows `x y z`; microphone positions in the array frame
//! - `source_{id}.txt` — one per ground-truth source, same row format as
//!   the array pose. Present only in development datasets; evaluation
//!   datasets withhold them.
//!
//! Rows are whitespace-delimited; lines starting with `#` are comments.

use crate::pose_decoder::{MicRow, PoseRecord, RequiredTimeRow};

use hound::WavReader;
use log::debug;
use std::{
    borrow::Cow,
    fmt,
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Array names the benchmark recognizes. Configured array sets are
/// validated against this list before any processing starts.
pub const VALID_ARRAYS: [&str; 4] = ["benchmark2", "eigenmike", "dicit", "dummy"];

/// Task numbers the benchmark recognizes.
pub const VALID_TASKS: std::ops::RangeInclusive<u32> = 1..=6;

/// Everything that can go wrong while reading one array directory.
#[derive(Debug)]
pub enum DatasetError {
    /// A required record file is missing or unreadable.
    IoError(PathBuf, std::io::Error),

    /// A record file contains a line the decoder rejects.
    BadRecord(PathBuf, usize, String),

    /// The WAV file could not be opened or decoded.
    WavError(PathBuf, hound::Error),

    /// The required-time index is empty or its timestamps are not
    /// strictly increasing.
    BadRequiredTime(PathBuf),

    /// A record file that must carry at least one row has none.
    EmptyRecordFile(PathBuf),

    /// A directory name did not follow the `task{n}`/`recording{id}`
    /// convention.
    BadDirectoryName(PathBuf),
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use DatasetError as DE;
        let msg = match self {
            DE::IoError(path, error) => {
                Cow::from(format!("io error reading {}: {}", path.display(), error))
            }
            DE::BadRecord(path, line, text) => Cow::from(format!(
                "bad record at {}:{}: {:?}",
                path.display(),
                line,
                text
            )),
            DE::WavError(path, error) => {
                Cow::from(format!("wav error reading {}: {}", path.display(), error))
            }
            DE::BadRequiredTime(path) => Cow::from(format!(
                "required-time index {} is empty or not strictly increasing",
                path.display()
            )),
            DE::EmptyRecordFile(path) => {
                Cow::from(format!("record file {} has no rows", path.display()))
            }
            DE::BadDirectoryName(path) => {
                Cow::from(format!("unrecognized directory name {}", path.display()))
            }
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for DatasetError {}

/// The ordered timestamps at which an algorithm's output is evaluated,
/// with a validity flag per entry. Only valid entries are scored.
#[derive(Debug, Clone, PartialEq)]
pub struct RequiredTime {
    /// Timestamps in seconds, strictly increasing.
    pub time: Vec<f64>,
    /// One flag per timestamp.
    pub valid: Vec<bool>,
}

impl RequiredTime {
    /// The timestamps the benchmark scores, in order.
    pub fn valid_times(&self) -> Vec<f64> {
        self.time
            .iter()
            .zip(&self.valid)
            .filter(|(_, v)| **v)
            .map(|(t, _)| *t)
            .collect()
    }

    /// Timestamps rebased to the first entry, as cumulative deltas. This is
    /// what algorithms see, so a recording's absolute clock never leaks
    /// into the plugin contract.
    pub fn elapsed(&self) -> Vec<f64> {
        let mut elapsed = Vec::with_capacity(self.time.len());
        let mut acc = 0.0;
        elapsed.push(0.0);
        for pair in self.time.windows(2) {
            acc += pair[1] - pair[0];
            elapsed.push(acc);
        }
        elapsed
    }

    /// [RequiredTime::elapsed], restricted to valid entries.
    pub fn valid_elapsed(&self) -> Vec<f64> {
        self.elapsed()
            .into_iter()
            .zip(&self.valid)
            .filter(|(_, v)| **v)
            .map(|(t, _)| t)
            .collect()
    }
}

/// Microphone positions in the array's reference frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayGeometry {
    /// One position per microphone, metres.
    pub mics: Vec<[f64; 3]>,
}

impl ArrayGeometry {
    /// The microphone count, derived from the geometry's shape.
    pub fn num_mics(&self) -> usize {
        self.mics.len()
    }
}

/// A decoded multichannel audio capture.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    /// De-interleaved samples, one inner vector per channel.
    pub channels: Vec<Vec<f32>>,
    /// Samples per second.
    pub sample_rate: u32,
}

/// A named ground-truth trajectory as stored on disk, at the dataset's
/// native sampling rate. The extractor turns these into scored
/// trajectories at the valid required timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecords {
    /// Stable source identifier, taken from the file name.
    pub id: String,
    /// Pose samples, in file order.
    pub samples: Vec<PoseRecord>,
}

/// Everything loaded from one array directory. Owned by the loader,
/// read-only afterward; dropped when the unit of work completes.
#[derive(Debug, Clone)]
pub struct RecordingData {
    /// The array's multichannel capture.
    pub audio: AudioTrack,
    /// The array's own trajectory at its native rate.
    pub array_pose: Vec<PoseRecord>,
    /// Microphone layout in the array frame.
    pub geometry: ArrayGeometry,
    /// Ground-truth sources; empty for evaluation datasets.
    pub sources: Vec<SourceRecords>,
    /// The evaluation timestamp index.
    pub required: RequiredTime,
}

/// Reads one record file into typed rows, skipping comments and blank
/// lines. Line numbers in errors are 1-based.
fn load_rows<T>(path: &Path) -> Result<Vec<T>, DatasetError>
where
    T: FromStr,
{
    let file = File::open(path).map_err(|e| DatasetError::IoError(path.to_path_buf(), e))?;
    let mut rows = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| DatasetError::IoError(path.to_path_buf(), e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let row = trimmed.parse::<T>().map_err(|_| {
            DatasetError::BadRecord(path.to_path_buf(), idx + 1, trimmed.to_string())
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn load_audio(path: &Path) -> Result<AudioTrack, DatasetError> {
    let mut reader =
        WavReader::open(path).map_err(|e| DatasetError::WavError(path.to_path_buf(), e))?;
    let spec = reader.spec();
    let n_channels = spec.channels as usize;

    // collect wav file data into interleaved f32 samples first
    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatasetError::WavError(path.to_path_buf(), e))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| DatasetError::WavError(path.to_path_buf(), e))?
        }
    };

    let channels = (0..n_channels)
        .map(|i| {
            interleaved
                .iter()
                .skip(i)
                .step_by(n_channels)
                .copied()
                .collect()
        })
        .collect();

    Ok(AudioTrack {
        channels,
        sample_rate: spec.sample_rate,
    })
}

fn load_required_time(path: &Path) -> Result<RequiredTime, DatasetError> {
    let rows: Vec<RequiredTimeRow> = load_rows(path)?;
    let time: Vec<f64> = rows.iter().map(|r| r.time).collect();
    let valid: Vec<bool> = rows.iter().map(|r| r.valid).collect();
    let increasing = time.windows(2).all(|w| w[0] < w[1]);
    if time.is_empty() || !increasing {
        return Err(DatasetError::BadRequiredTime(path.to_path_buf()));
    }
    Ok(RequiredTime { time, valid })
}

/// Loads everything for one array directory. Ground-truth source files are
/// only read for development datasets; for evaluation datasets `sources`
/// comes back empty and downstream scoring is skipped.
pub fn load_array_dir(dir: &Path, is_dev: bool) -> Result<RecordingData, DatasetError> {
    let audio = load_audio(&dir.join("audio.wav"))?;
    let required = load_required_time(&dir.join("required_time.txt"))?;
    let pose_path = dir.join("array_pose.txt");
    let array_pose: Vec<PoseRecord> = load_rows(&pose_path)?;
    if array_pose.is_empty() {
        return Err(DatasetError::EmptyRecordFile(pose_path));
    }
    let mic_rows: Vec<MicRow> = load_rows(&dir.join("mics.txt"))?;
    let geometry = ArrayGeometry {
        mics: mic_rows.into_iter().map(|m| m.0).collect(),
    };

    let mut sources = Vec::new();
    if is_dev {
        for entry in list_sorted(dir)? {
            let name = entry
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string();
            if let Some(id) = name
                .strip_prefix("source_")
                .and_then(|rest| rest.strip_suffix(".txt"))
            {
                debug!("loading ground-truth source {} from {}", id, dir.display());
                let samples: Vec<PoseRecord> = load_rows(&entry)?;
                if samples.is_empty() {
                    return Err(DatasetError::EmptyRecordFile(entry));
                }
                sources.push(SourceRecords {
                    id: id.to_string(),
                    samples,
                });
            }
        }
    }

    Ok(RecordingData {
        audio,
        array_pose,
        geometry,
        sources,
        required,
    })
}

/// Lists a directory's entries in name order, so enumeration is
/// deterministic across filesystems.
pub fn list_sorted(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let entries = fs::read_dir(dir).map_err(|e| DatasetError::IoError(dir.to_path_buf(), e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Recording directories for one task, in id order.
pub fn list_recordings(data_dir: &Path, task: u32) -> Result<Vec<PathBuf>, DatasetError> {
    let task_dir = data_dir.join(format!("task{}", task));
    let mut recordings: Vec<PathBuf> = list_sorted(&task_dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect();
    // sort numerically on the recording id, not lexically
    recordings.sort_by_key(|p| recording_id(p).unwrap_or(u32::MAX));
    Ok(recordings)
}

/// Extracts the numeric id from a `recording{id}` directory name.
pub fn recording_id(dir: &Path) -> Result<u32, DatasetError> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("recording"))
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| DatasetError::BadDirectoryName(dir.to_path_buf()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::io::Write;

    /// Writes a minimal dev-mode array directory fixture: a short 2-channel
    /// wav, four required timestamps (third invalid), a static array pose,
    /// a two-mic geometry, and one source that circles the array.
    pub(crate) fn write_fixture_array_dir(dir: &Path) {
        fs::create_dir_all(dir).unwrap();

        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(dir.join("audio.wav"), spec).unwrap();
        for i in 0..64 {
            writer.write_sample((i * 100) as i16).unwrap();
            writer.write_sample(-(i * 100) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let mut req = File::create(dir.join("required_time.txt")).unwrap();
        writeln!(req, "# time valid").unwrap();
        writeln!(req, "0.0 1").unwrap();
        writeln!(req, "0.1 1").unwrap();
        writeln!(req, "0.2 0").unwrap();
        writeln!(req, "0.3 1").unwrap();

        let mut pose = File::create(dir.join("array_pose.txt")).unwrap();
        for t in [0.0, 0.1, 0.2, 0.3] {
            writeln!(pose, "{} 0.0 0.0 1.0 0.0 0.0 0.0", t).unwrap();
        }

        let mut mics = File::create(dir.join("mics.txt")).unwrap();
        writeln!(mics, "0.042 0.0 0.0").unwrap();
        writeln!(mics, "-0.042 0.0 0.0").unwrap();

        let mut src = File::create(dir.join("source_talker1.txt")).unwrap();
        writeln!(src, "0.0 1.0 0.0 1.0 0.0 0.0 0.0").unwrap();
        writeln!(src, "0.1 0.0 1.0 1.0 0.0 0.0 0.0").unwrap();
        writeln!(src, "0.2 -1.0 0.0 1.0 0.0 0.0 0.0").unwrap();
        writeln!(src, "0.3 0.0 -1.0 1.0 0.0 0.0 0.0").unwrap();
    }

    #[test]
    fn loads_fixture_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture_array_dir(tmp.path());

        let data = load_array_dir(tmp.path(), true).unwrap();
        assert_eq!(data.audio.channels.len(), 2);
        assert_eq!(data.audio.channels[0].len(), 64);
        assert_eq!(data.audio.sample_rate, 8000);
        assert_eq!(data.geometry.num_mics(), 2);
        assert_eq!(data.required.time.len(), 4);
        assert_eq!(data.required.valid_times(), vec![0.0, 0.1, 0.3]);
        assert_eq!(data.sources.len(), 1);
        assert_eq!(data.sources[0].id, "talker1");
        assert_eq!(data.sources[0].samples.len(), 4);
    }

    #[test]
    fn eval_mode_skips_sources() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture_array_dir(tmp.path());

        let data = load_array_dir(tmp.path(), false).unwrap();
        assert!(data.sources.is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_array_dir(&tmp.path().join("nope"), true).is_err());
    }

    #[test]
    fn non_increasing_required_time_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture_array_dir(tmp.path());
        let mut req = File::create(tmp.path().join("required_time.txt")).unwrap();
        writeln!(req, "0.2 1").unwrap();
        writeln!(req, "0.1 1").unwrap();

        assert!(matches!(
            load_array_dir(tmp.path(), true),
            Err(DatasetError::BadRequiredTime(_))
        ));
    }

    #[test]
    fn elapsed_rebases_to_first_timestamp() {
        let required = RequiredTime {
            time: vec![10.0, 10.5, 11.5],
            valid: vec![true, false, true],
        };
        assert_eq!(required.elapsed(), vec![0.0, 0.5, 1.5]);
        assert_eq!(required.valid_elapsed(), vec![0.0, 1.5]);
    }

    #[test]
    fn recording_ids_sort_numerically() {
        let tmp = tempfile::tempdir().unwrap();
        for id in [2, 10, 1] {
            fs::create_dir_all(tmp.path().join(format!("task1/recording{}", id))).unwrap();
        }
        let recordings = list_recordings(tmp.path(), 1).unwrap();
        let ids: Vec<u32> = recordings.iter().map(|p| recording_id(p).unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 10]);
    }
}
