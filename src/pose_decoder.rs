//! Line parsers for the benchmark's text record files. Each array directory
//! stores whitespace-delimited rows: pose files carry a timestamp, a
//! Cartesian position, and a yaw/pitch/roll orientation; the required-time
//! index carries a timestamp and a validity flag; the mic-geometry file
//! carries one position per microphone. Lines starting with `#` are
//! comments and are skipped by the loader, not by these parsers.

use nom::{
    character::complete::{char, space1},
    combinator::map,
    error::Error,
    number::complete::double,
    sequence::{preceded, tuple},
    Finish, IResult,
};

use std::str::FromStr;

/// One sample of a rigid-body trajectory: where something was and which way
/// it was facing at a given time. Used for both microphone arrays and
/// ground-truth sources.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseRecord {
    /// Timestamp in seconds.
    pub time: f64,
    /// Cartesian position, metres, in the room frame.
    pub position: [f64; 3],
    /// Orientation as yaw, pitch, roll in radians.
    pub orientation: [f64; 3],
}

/// One row of the required-time index: a timestamp and whether the
/// benchmark scores estimates at it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequiredTimeRow {
    /// Timestamp in seconds.
    pub time: f64,
    /// True when estimates at this timestamp are evaluated.
    pub valid: bool,
}

/// One microphone position in the array's reference frame, metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MicRow(pub [f64; 3]);

fn parse_pose_row(s: &str) -> IResult<&str, PoseRecord> {
    map(
        tuple((
            double,
            preceded(space1, double),
            preceded(space1, double),
            preceded(space1, double),
            preceded(space1, double),
            preceded(space1, double),
            preceded(space1, double),
        )),
        |(time, x, y, z, yaw, pitch, roll)| PoseRecord {
            time,
            position: [x, y, z],
            orientation: [yaw, pitch, roll],
        },
    )(s)
}

fn parse_required_time_row(s: &str) -> IResult<&str, RequiredTimeRow> {
    map(
        tuple((double, preceded(space1, parse_flag))),
        |(time, valid)| RequiredTimeRow { time, valid },
    )(s)
}

fn parse_flag(s: &str) -> IResult<&str, bool> {
    nom::branch::alt((map(char('1'), |_| true), map(char('0'), |_| false)))(s)
}

fn parse_mic_row(s: &str) -> IResult<&str, MicRow> {
    map(
        tuple((double, preceded(space1, double), preceded(space1, double))),
        |(x, y, z)| MicRow([x, y, z]),
    )(s)
}

fn finish_row<T>(result: IResult<&str, T>) -> Result<T, Error<String>> {
    match result.finish() {
        Ok((_remaining, row)) => Ok(row),
        Err(Error { input, code }) => Err(Error {
            input: input.to_string(),
            code,
        }),
    }
}

impl FromStr for PoseRecord {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        finish_row(parse_pose_row(s.trim()))
    }
}

impl FromStr for RequiredTimeRow {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        finish_row(parse_required_time_row(s.trim()))
    }
}

impl FromStr for MicRow {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        finish_row(parse_mic_row(s.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_row_full() {
        let s = "0.125 1.0 -2.5 0.9 3.14 0.0 -0.1";
        let (leftover, res) = parse_pose_row(s).unwrap();

        assert_eq!(leftover, "");
        assert_eq!(
            res,
            PoseRecord {
                time: 0.125,
                position: [1.0, -2.5, 0.9],
                orientation: [3.14, 0.0, -0.1],
            }
        );
    }

    #[test]
    fn pose_row_scientific_notation() {
        let s = "1e-3 0.0 0.0 1.2e1 0.0 0.0 0.0";
        let res: PoseRecord = s.parse().unwrap();
        assert_eq!(res.time, 0.001);
        assert_eq!(res.position[2], 12.0);
    }

    #[test]
    fn required_time_rows() {
        let valid: RequiredTimeRow = "0.5 1".parse().unwrap();
        let invalid: RequiredTimeRow = "0.6 0".parse().unwrap();
        assert!(valid.valid);
        assert!(!invalid.valid);
        assert_eq!(valid.time, 0.5);
    }

    #[test]
    fn required_time_rejects_bad_flag() {
        assert!("0.5 2".parse::<RequiredTimeRow>().is_err());
        assert!("0.5".parse::<RequiredTimeRow>().is_err());
    }

    #[test]
    fn mic_row() {
        let res: MicRow = "0.042 -0.042 0.0".parse().unwrap();
        assert_eq!(res, MicRow([0.042, -0.042, 0.0]));
    }

    #[test]
    fn pose_row_rejects_short_line() {
        assert!("0.1 1.0 2.0".parse::<PoseRecord>().is_err());
    }

    #[test]
    fn rows_tolerate_surrounding_whitespace() {
        let res: MicRow = "  0.0 0.0 1.0\n".parse().unwrap();
        assert_eq!(res, MicRow([0.0, 0.0, 1.0]));
    }
}
