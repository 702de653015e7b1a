//! Derives the canonical ground truth for one recording: per-source
//! trajectories restricted to the valid required timestamps, expressed both
//! in room Cartesian coordinates and in polar coordinates relative to the
//! array's reference frame.

use crate::angles::wrap_to_pi;
use crate::dataset::RecordingData;
use crate::pose_decoder::PoseRecord;

/// One ground-truth trajectory, sampled at exactly the valid required
/// timestamps. All vectors have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTruth {
    /// Stable source identifier from the dataset.
    pub id: String,
    /// Valid required timestamps, seconds, rebased to the start of the
    /// recording. This is the same elapsed frame algorithms receive in
    /// their input, so estimates and truth align directly.
    pub time: Vec<f64>,
    /// Cartesian position in the room frame, metres.
    pub position: Vec<[f64; 3]>,
    /// Polar position relative to the array frame:
    /// `[azimuth, elevation, range]`, angles in radians. Azimuth is in
    /// [-π, π], elevation in [-π/2, π/2].
    pub polar: Vec<[f64; 3]>,
}

/// Ground truth for one (recording, array) pair. For evaluation datasets
/// `sources` is empty, which downstream scoring treats as "not scored"
/// rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    /// The array's pose at each valid required timestamp.
    pub array_pose: Vec<PoseRecord>,
    /// One trajectory per ground-truth source, in dataset order.
    pub sources: Vec<SourceTruth>,
}

impl GroundTruth {
    /// True when there is nothing to score against.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Extracts ground truth from one loaded recording.
///
/// Pose files are sampled at the dataset's native rate, which need not line
/// up with the required-time index, so each valid required timestamp picks
/// the nearest pose row. Trajectory lengths always equal the number of
/// valid required timestamps.
pub fn extract_truth(data: &RecordingData, is_dev: bool) -> GroundTruth {
    // absolute dataset timestamps select pose rows; the elapsed frame is
    // what gets stored, matching the algorithm input contract
    let valid_times = data.required.valid_times();
    let valid_elapsed = data.required.valid_elapsed();
    let array_pose: Vec<PoseRecord> = valid_times
        .iter()
        .map(|t| nearest_record(&data.array_pose, *t).clone())
        .collect();

    if !is_dev {
        return GroundTruth {
            array_pose,
            sources: Vec::new(),
        };
    }

    let sources = data
        .sources
        .iter()
        .map(|source| {
            let mut position = Vec::with_capacity(valid_times.len());
            let mut polar = Vec::with_capacity(valid_times.len());
            for (t, array) in valid_times.iter().zip(&array_pose) {
                let sample = nearest_record(&source.samples, *t);
                position.push(sample.position);
                polar.push(to_array_polar(sample.position, array));
            }
            SourceTruth {
                id: source.id.clone(),
                time: valid_elapsed.clone(),
                position,
                polar,
            }
        })
        .collect();

    GroundTruth {
        array_pose,
        sources,
    }
}

/// The pose row whose timestamp is closest to `t`. Ties resolve to the
/// earlier row. Pose files are never empty for a loadable recording, so a
/// missing row is a programming error, not a data condition.
fn nearest_record(records: &[PoseRecord], t: f64) -> &PoseRecord {
    records
        .iter()
        .min_by(|a, b| {
            let da = (a.time - t).abs();
            let db = (b.time - t).abs();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("pose records are non-empty")
}

/// Converts a room-frame position into `[azimuth, elevation, range]`
/// relative to the given array pose: translate to the array origin, rotate
/// into the array frame by the inverse of its yaw/pitch/roll rotation, then
/// read off spherical coordinates.
pub fn to_array_polar(position: [f64; 3], array: &PoseRecord) -> [f64; 3] {
    let rel = [
        position[0] - array.position[0],
        position[1] - array.position[1],
        position[2] - array.position[2],
    ];
    let rot = rotation_matrix(array.orientation);
    // transpose of a rotation matrix is its inverse
    let local = [
        rot[0][0] * rel[0] + rot[1][0] * rel[1] + rot[2][0] * rel[2],
        rot[0][1] * rel[0] + rot[1][1] * rel[1] + rot[2][1] * rel[2],
        rot[0][2] * rel[0] + rot[1][2] * rel[1] + rot[2][2] * rel[2],
    ];
    let range = (local[0] * local[0] + local[1] * local[1] + local[2] * local[2]).sqrt();
    let azimuth = wrap_to_pi(local[1].atan2(local[0]));
    let elevation = local[2].atan2(local[0].hypot(local[1]));
    [azimuth, elevation, range]
}

/// Row-major rotation matrix from yaw (about z), pitch (about y), roll
/// (about x), applied in that order: R = Rz(yaw) * Ry(pitch) * Rx(roll).
fn rotation_matrix([yaw, pitch, roll]: [f64; 3]) -> [[f64; 3]; 3] {
    let (sy, cy) = yaw.sin_cos();
    let (sp, cp) = pitch.sin_cos();
    let (sr, cr) = roll.sin_cos();
    [
        [
            cy * cp,
            cy * sp * sr - sy * cr,
            cy * sp * cr + sy * sr,
        ],
        [
            sy * cp,
            sy * sp * sr + cy * cr,
            sy * sp * cr - cy * sr,
        ],
        [-sp, cp * sr, cp * cr],
    ]
}
