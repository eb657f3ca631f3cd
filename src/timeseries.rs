//! Piecewise-linear time series (TMS) and load curves.
//!
//! This is the minimal runtime contract every other module composes
//! through: gravity, damping, prescribed motion, obstacle velocity, spring
//! stroke offsets/unloading curves and UNSPRING fade-out multipliers are all
//! "time- or argument-indexed R -> R" lookups. Authoring tools (reading
//! series from files, integrating/differentiating a series) are external
//! and out of scope; only the lookup itself lives here.

use crate::error::DemError;

/// A restartable 1-D piecewise-linear lookup, or a constant.
///
/// Mirrors `TMS` in the reference implementation: a `marker` remembers the
/// last interval found so that repeated nearby queries (the common case
/// when called once per step with monotonically increasing time) are O(1)
/// instead of a binary search from scratch.
#[derive(Clone, Debug)]
pub struct TimeSeries {
    points: Vec<(f64, f64)>,
    marker: usize,
}

impl TimeSeries {
    /// Create a piecewise-linear series. `times` must be strictly increasing.
    pub fn new(times: &[f64], values: &[f64]) -> Result<Self, DemError> {
        if times.len() != values.len() || times.is_empty() {
            return Err(DemError::NonMonotoneTable { table: "TimeSeries" });
        }
        if !is_strictly_increasing(times) {
            return Err(DemError::NonMonotoneTable { table: "TimeSeries" });
        }
        Ok(Self {
            points: times.iter().copied().zip(values.iter().copied()).collect(),
            marker: 0,
        })
    }

    /// A series that always returns the same value.
    pub fn constant(value: f64) -> Self {
        Self {
            points: vec![(0.0, value)],
            marker: 0,
        }
    }

    /// Look up the value at `time`, extrapolating with the boundary value
    /// outside the table's range (constant extrapolation, per spec.md §9's
    /// canonical reading of held-at-last-value behavior).
    pub fn value(&mut self, time: f64) -> f64 {
        if self.points.len() == 1 {
            return self.points[0].1;
        }

        // Re-home the marker if time moved backwards past it (restart).
        if self.marker > 0 && time < self.points[self.marker].0 {
            self.marker = 0;
        }

        while self.marker + 1 < self.points.len() - 1 && time >= self.points[self.marker + 1].0 {
            self.marker += 1;
        }

        let (t0, v0) = self.points[self.marker];
        if time <= t0 {
            return self.points[0].1;
        }
        let (t1, v1) = self.points[self.marker + 1];
        if time >= t1 {
            if self.marker + 1 == self.points.len() - 1 {
                return v1;
            }
            self.marker += 1;
            return self.value(time);
        }

        let t = (time - t0) / (t1 - t0);
        v0 + t * (v1 - v0)
    }

    /// Slope of the last table segment, for callers that extrapolate past
    /// the table's domain with the segment's own slope rather than holding
    /// its boundary value (e.g. a stiff restoring law keyed to a table's
    /// terminal stiffness).
    pub fn last_segment_slope(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let (t0, v0) = self.points[self.points.len() - 2];
        let (t1, v1) = self.points[self.points.len() - 1];
        (v1 - v0) / (t1 - t0)
    }
}

/// A piecewise-linear (x, y) load curve with strictly increasing x, used for
/// both spring offset/unloading lookups and UNSPRING fade-out multipliers.
#[derive(Clone, Debug)]
pub struct LoadCurve {
    series: TimeSeries,
}

impl LoadCurve {
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self, DemError> {
        Ok(Self {
            series: TimeSeries::new(xs, ys).map_err(|_| DemError::NonMonotoneTable {
                table: "LoadCurve",
            })?,
        })
    }

    pub fn eval(&mut self, x: f64) -> f64 {
        self.series.value(x)
    }

    /// See `TimeSeries::last_segment_slope`.
    pub fn last_segment_slope(&self) -> f64 {
        self.series.last_segment_slope()
    }
}

fn is_strictly_increasing(xs: &[f64]) -> bool {
    xs.windows(2).all(|w| w[1] > w[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_linearly() {
        let mut ts = TimeSeries::new(&[0.0, 1.0, 2.0], &[0.0, 10.0, 0.0]).unwrap();
        assert!((ts.value(0.5) - 5.0).abs() < 1e-12);
        assert!((ts.value(1.5) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn extrapolates_constant_past_bounds() {
        let mut ts = TimeSeries::new(&[0.0, 1.0], &[1.0, 2.0]).unwrap();
        assert_eq!(ts.value(-1.0), 1.0);
        assert_eq!(ts.value(5.0), 2.0);
    }

    #[test]
    fn rejects_non_monotone_times() {
        assert!(TimeSeries::new(&[0.0, 1.0, 0.5], &[0.0, 1.0, 2.0]).is_err());
    }

    #[test]
    fn constant_series_ignores_time() {
        let mut ts = TimeSeries::constant(3.0);
        assert_eq!(ts.value(0.0), 3.0);
        assert_eq!(ts.value(1000.0), 3.0);
    }
}
