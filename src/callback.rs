//! Time-indexed callback seams used by gravity, damping, prescribed motion
//! and obstacle velocity (spec.md §9: "a re-implementation may replace
//! [callbacks] with compiled closures... identity of the abstraction is
//! 'time-indexed R -> R^3 function'"). The scripting front-end that would
//! produce these closures from a model-definition script is out of scope
//! (spec.md §1); callers hand us the closures (or a `TimeSeries`) directly.

use std::sync::Arc;

use glam::DVec3;

use crate::timeseries::TimeSeries;

/// A scalar function of simulation time.
#[derive(Clone)]
pub enum ScalarFn {
    Constant(f64),
    Series(Arc<std::sync::Mutex<TimeSeries>>),
    Callback(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}

impl std::fmt::Debug for ScalarFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarFn::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            ScalarFn::Series(_) => f.debug_tuple("Series").finish(),
            ScalarFn::Callback(_) => f.debug_tuple("Callback").finish(),
        }
    }
}

impl ScalarFn {
    pub fn from_series(series: TimeSeries) -> Self {
        Self::Series(Arc::new(std::sync::Mutex::new(series)))
    }

    pub fn eval(&self, time: f64) -> f64 {
        match self {
            ScalarFn::Constant(v) => *v,
            ScalarFn::Series(ts) => ts.lock().expect("time series lock poisoned").value(time),
            ScalarFn::Callback(f) => f(time),
        }
    }
}

/// A vector-valued function of simulation time (gravity, obstacle linear or
/// angular velocity).
#[derive(Clone)]
pub enum VectorFn {
    Constant(DVec3),
    Callback(Arc<dyn Fn(f64) -> DVec3 + Send + Sync>),
}

impl VectorFn {
    pub fn eval(&self, time: f64) -> DVec3 {
        match self {
            VectorFn::Constant(v) => *v,
            VectorFn::Callback(f) => f(time),
        }
    }
}

impl Default for VectorFn {
    fn default() -> Self {
        VectorFn::Constant(DVec3::ZERO)
    }
}
