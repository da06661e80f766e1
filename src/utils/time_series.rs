//! One-dimensional functions of time (or altitude) used for thrust, mass and
//! atmosphere curves. A [`TimeSeries`] is a 1-D [`GridFunction`] with a few
//! calculus helpers on top of the piecewise-linear interpolant.

use nalgebra::Vector3;

use crate::errors::SimulationError;

use super::grid_function::{Extrapolation, GridData, GridFunction};

#[derive(Debug, Clone)]
pub struct TimeSeries {
    grid: GridFunction,
}

impl TimeSeries {
    pub fn from_arrays(x: Vec<f64>, y: Vec<f64>) -> Result<Self, SimulationError> {
        let grid = GridFunction::from_grid(GridData::from_vec(y), vec![x])?;
        Ok(TimeSeries { grid })
    }

    pub fn from_points(points: &[(f64, f64)]) -> Result<Self, SimulationError> {
        let (x, y) = points.iter().copied().unzip();
        Self::from_arrays(x, y)
    }

    pub fn constant(value: f64) -> Self {
        TimeSeries {
            grid: GridFunction::constant(value),
        }
    }

    /// Tabulates `f` at `samples` evenly spaced points of `[t0, t1]`.
    pub fn sample<F>(f: F, t0: f64, t1: f64, samples: usize) -> Result<Self, SimulationError>
    where
        F: Fn(f64) -> f64,
    {
        if samples < 2 || !(t1 > t0) {
            return Err(SimulationError::InitializationError(format!(
                "cannot sample over [{}, {}] with {} samples",
                t0, t1, samples
            )));
        }
        let step = (t1 - t0) / (samples - 1) as f64;
        let x: Vec<f64> = (0..samples)
            .map(|i| if i == samples - 1 { t1 } else { t0 + step * i as f64 })
            .collect();
        let y = x.iter().map(|&t| f(t)).collect();
        Self::from_arrays(x, y)
    }

    pub fn from_grid_function(grid: GridFunction) -> Result<Self, SimulationError> {
        if grid.input_count() != 1 {
            return Err(SimulationError::DimensionMismatch {
                expected: 1,
                found: grid.input_count(),
            });
        }
        Ok(TimeSeries { grid })
    }

    pub fn with_extrapolation(self, name: &str) -> Result<Self, SimulationError> {
        Ok(TimeSeries {
            grid: self.grid.with_extrapolation(name)?,
        })
    }

    pub fn with_extrapolation_policy(self, policy: Extrapolation) -> Self {
        TimeSeries {
            grid: self.grid.with_extrapolation_policy(policy),
        }
    }

    pub fn with_names(self, input: &str, output: &str) -> Self {
        TimeSeries {
            grid: self.grid.with_input_name(0, input).with_output(output),
        }
    }

    pub fn evaluate(&self, t: f64) -> Result<f64, SimulationError> {
        self.grid.evaluate(&[t])
    }

    pub fn x_array(&self) -> &[f64] {
        &self.grid.axes()[0]
    }

    pub fn y_array(&self) -> &[f64] {
        self.grid.data().values()
    }

    pub fn grid(&self) -> &GridFunction {
        &self.grid
    }

    pub fn domain(&self) -> (f64, f64) {
        let x = self.x_array();
        (x[0], x[x.len() - 1])
    }

    /// Exact integral of the interpolant over `[a, b]`.
    pub fn integral(&self, a: f64, b: f64) -> Result<f64, SimulationError> {
        if b < a {
            return Ok(-self.integral(b, a)?);
        }
        if a == b {
            return Ok(0.0);
        }

        let mut breakpoints = vec![a];
        breakpoints.extend(self.x_array().iter().copied().filter(|&x| x > a && x < b));
        breakpoints.push(b);

        let mut total = 0.0;
        let mut previous = (a, self.evaluate(a)?);
        for &x in &breakpoints[1..] {
            let y = self.evaluate(x)?;
            total += 0.5 * (previous.1 + y) * (x - previous.0);
            previous = (x, y);
        }
        Ok(total)
    }

    /// Mean value over `[a, b]`.
    pub fn average(&self, a: f64, b: f64) -> Result<f64, SimulationError> {
        if a == b {
            return self.evaluate(a);
        }
        Ok(self.integral(a, b)? / (b - a))
    }

    pub fn derivative(&self, t: f64) -> Result<f64, SimulationError> {
        let dt = 1e-6 * t.abs().max(1.0);
        Ok((self.evaluate(t + dt)? - self.evaluate(t - dt)?) / (2.0 * dt))
    }

    /// Running integral on the same nodes, starting at `initial`.
    pub fn cumulative_integral(&self, initial: f64) -> Result<TimeSeries, SimulationError> {
        let x = self.x_array().to_vec();
        let y = self.y_array();
        let mut acc = initial;
        let mut out = Vec::with_capacity(x.len());
        out.push(acc);
        for i in 1..x.len() {
            acc += 0.5 * (y[i - 1] + y[i]) * (x[i] - x[i - 1]);
            out.push(acc);
        }
        Ok(TimeSeries::from_arrays(x, out)?.with_extrapolation_policy(Extrapolation::Constant))
    }

    pub fn discretize(&self, t0: f64, t1: f64, samples: usize) -> Result<TimeSeries, SimulationError> {
        self.grid.discretize(t0, t1, samples)
    }
}

/// Three scalar series evaluated together, e.g. wind velocity vs altitude.
#[derive(Debug, Clone)]
pub struct VectorTimeSeries {
    components: [TimeSeries; 3],
}

impl VectorTimeSeries {
    pub fn new(x: TimeSeries, y: TimeSeries, z: TimeSeries) -> Self {
        VectorTimeSeries {
            components: [x, y, z],
        }
    }

    pub fn constant(value: Vector3<f64>) -> Self {
        Self::new(
            TimeSeries::constant(value.x),
            TimeSeries::constant(value.y),
            TimeSeries::constant(value.z),
        )
    }

    pub fn zero() -> Self {
        Self::constant(Vector3::zeros())
    }

    pub fn evaluate(&self, t: f64) -> Result<Vector3<f64>, SimulationError> {
        Ok(Vector3::new(
            self.components[0].evaluate(t)?,
            self.components[1].evaluate(t)?,
            self.components[2].evaluate(t)?,
        ))
    }

    pub fn component(&self, index: usize) -> Option<&TimeSeries> {
        self.components.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> TimeSeries {
        TimeSeries::from_points(&[(0.0, 0.0), (1.0, 2.0), (3.0, 2.0)]).unwrap()
    }

    #[test]
    fn test_point_evaluation() {
        let f = ramp();
        assert_relative_eq!(f.evaluate(0.5).unwrap(), 1.0);
        assert_relative_eq!(f.evaluate(2.0).unwrap(), 2.0);
        assert_relative_eq!(f.evaluate(10.0).unwrap(), 2.0);
    }

    #[test]
    fn test_integral_and_average() {
        let f = ramp();
        assert_relative_eq!(f.integral(0.0, 3.0).unwrap(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(f.integral(3.0, 0.0).unwrap(), -5.0, epsilon = 1e-12);
        assert_relative_eq!(f.integral(0.5, 1.5).unwrap(), 1.75, epsilon = 1e-12);
        assert_relative_eq!(f.average(0.0, 3.0).unwrap(), 5.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(f.average(2.0, 2.0).unwrap(), 2.0);
    }

    #[test]
    fn test_derivative() {
        let f = ramp();
        assert_relative_eq!(f.derivative(0.5).unwrap(), 2.0, epsilon = 1e-6);
        assert_relative_eq!(f.derivative(2.0).unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cumulative_integral() {
        let cumulative = ramp().cumulative_integral(1.0).unwrap();
        assert_eq!(cumulative.y_array(), &[1.0, 2.0, 6.0]);
    }

    #[test]
    fn test_constant_series() {
        let f = TimeSeries::constant(9.81);
        assert_eq!(f.evaluate(-5.0).unwrap(), 9.81);
        assert_eq!(f.evaluate(1e6).unwrap(), 9.81);
    }

    #[test]
    fn test_sampled_closure_with_zero_extrapolation() {
        let thrust = TimeSeries::sample(|t| if t < 3.0 { 2000.0 } else { 0.0 }, 0.0, 3.0, 31)
            .unwrap()
            .with_extrapolation("zero")
            .unwrap();
        assert_relative_eq!(thrust.evaluate(1.05).unwrap(), 2000.0, epsilon = 1e-9);
        assert_eq!(thrust.evaluate(4.0).unwrap(), 0.0);
        assert_eq!(thrust.domain(), (0.0, 3.0));
    }

    #[test]
    fn test_mismatched_arrays() {
        assert!(TimeSeries::from_arrays(vec![0.0, 1.0], vec![1.0]).is_err());
    }

    #[test]
    fn test_vector_series() {
        let wind = VectorTimeSeries::new(
            TimeSeries::from_points(&[(0.0, 0.0), (1000.0, 10.0)]).unwrap(),
            TimeSeries::constant(2.0),
            TimeSeries::constant(0.0),
        );
        let w = wind.evaluate(500.0).unwrap();
        assert_relative_eq!(w.x, 5.0);
        assert_relative_eq!(w.y, 2.0);
        assert_eq!(VectorTimeSeries::zero().evaluate(3.0).unwrap(), Vector3::zeros());
    }

    #[test]
    fn test_names_do_not_change_values() {
        let f = ramp().with_names("Time (s)", "Thrust (N)");
        assert_eq!(f.grid().inputs(), &["Time (s)".to_string()]);
        assert_eq!(f.grid().output(), "Thrust (N)");
        assert_relative_eq!(f.evaluate(0.5).unwrap(), 1.0);

        let renamed = f.with_names("Altitude", "Density");
        assert_eq!(renamed.grid().inputs(), &["Altitude".to_string()]);
        assert_eq!(renamed.grid().input_count(), 1);
    }
}
