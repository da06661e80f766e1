//! Scalar fields tabulated on a rectilinear N-dimensional grid.
//!
//! Inside the grid the field is evaluated by multilinear interpolation of the
//! 2^N corners of the enclosing cell. Outside it an [`Extrapolation`] policy
//! decides what happens. Axes of length one are degenerate: the field is
//! constant along them.

use std::fmt;
use std::str::FromStr;

use crate::errors::SimulationError;

use super::time_series::TimeSeries;

/// Largest number of axes a grid may carry.
pub const MAX_GRID_DIMENSIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extrapolation {
    /// Clamp to the nearest edge value.
    #[default]
    Constant,
    /// Continue the boundary cell linearly.
    Natural,
    /// Return zero anywhere outside the grid.
    Zero,
    /// Refuse to evaluate outside the grid.
    Error,
}

impl FromStr for Extrapolation {
    type Err = SimulationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "constant" => Ok(Extrapolation::Constant),
            "natural" => Ok(Extrapolation::Natural),
            "zero" => Ok(Extrapolation::Zero),
            "error" => Ok(Extrapolation::Error),
            other => Err(SimulationError::UnsupportedExtrapolation(other.to_string())),
        }
    }
}

impl fmt::Display for Extrapolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Extrapolation::Constant => "constant",
            Extrapolation::Natural => "natural",
            Extrapolation::Zero => "zero",
            Extrapolation::Error => "error",
        };
        f.write_str(name)
    }
}

/// An N-dimensional array stored row-major (last axis varies fastest).
#[derive(Debug, Clone, PartialEq)]
pub struct GridData {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl GridData {
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Result<Self, SimulationError> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(SimulationError::DimensionMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(GridData { shape, values })
    }

    pub fn from_vec(values: Vec<f64>) -> Self {
        GridData {
            shape: vec![values.len()],
            values,
        }
    }

    /// Samples `f` at every node of the meshgrid spanned by `axes`
    /// (matrix indexing, first axis slowest).
    pub fn tabulate<F>(axes: &[Vec<f64>], f: F) -> Self
    where
        F: Fn(&[f64]) -> f64,
    {
        let shape: Vec<usize> = axes.iter().map(Vec::len).collect();
        let total: usize = shape.iter().product();
        let mut values = Vec::with_capacity(total);
        let mut point = vec![0.0; axes.len()];

        for flat in 0..total {
            let mut rem = flat;
            for k in (0..axes.len()).rev() {
                point[k] = axes[k][rem % shape[k]];
                rem /= shape[k];
            }
            values.push(f(&point));
        }

        GridData { shape, values }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        GridData {
            shape: self.shape.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Averages the samples along `axis`, dropping that dimension.
    pub fn mean_along_axis(&self, axis: usize) -> Result<Self, SimulationError> {
        if axis >= self.shape.len() {
            return Err(SimulationError::DimensionMismatch {
                expected: self.shape.len(),
                found: axis + 1,
            });
        }
        let strides = row_major_strides(&self.shape);
        let mut out_shape = self.shape.clone();
        let count = out_shape.remove(axis);
        let total: usize = out_shape.iter().product();
        let mut values = Vec::with_capacity(total);

        for flat in 0..total {
            let mut rem = flat;
            let mut base = 0;
            for k in (0..out_shape.len()).rev() {
                let index = rem % out_shape[k];
                rem /= out_shape[k];
                let source_axis = if k < axis { k } else { k + 1 };
                base += index * strides[source_axis];
            }
            let sum: f64 = (0..count)
                .map(|j| self.values[base + j * strides[axis]])
                .sum();
            values.push(sum / count as f64);
        }

        Ok(GridData {
            shape: out_shape,
            values,
        })
    }
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for k in (0..shape.len().saturating_sub(1)).rev() {
        strides[k] = strides[k + 1] * shape[k + 1];
    }
    strides
}

#[derive(Debug, Clone)]
pub struct GridFunction {
    axes: Vec<Vec<f64>>,
    data: GridData,
    strides: Vec<usize>,
    inputs: Vec<String>,
    output: String,
    extrapolation: Extrapolation,
}

impl GridFunction {
    /// Builds a grid function from tabulated `data` and one axis per data
    /// dimension. Inputs default to `x0, x1, ...` and extrapolation to
    /// [`Extrapolation::Constant`].
    pub fn from_grid(data: GridData, axes: Vec<Vec<f64>>) -> Result<Self, SimulationError> {
        if axes.is_empty() || axes.len() > MAX_GRID_DIMENSIONS {
            return Err(SimulationError::InitializationError(format!(
                "grid functions need between 1 and {} axes, got {}",
                MAX_GRID_DIMENSIONS,
                axes.len()
            )));
        }
        if axes.len() != data.shape.len() {
            return Err(SimulationError::AxisCountMismatch {
                axes: axes.len(),
                dimensions: data.shape.len(),
            });
        }
        for (k, (axis, &len)) in axes.iter().zip(data.shape.iter()).enumerate() {
            if axis.len() != len {
                return Err(SimulationError::AxisLengthMismatch {
                    axis: k,
                    axis_len: axis.len(),
                    data_len: len,
                });
            }
            if axis.is_empty() {
                return Err(SimulationError::InvalidAxis {
                    axis: k,
                    reason: "axis has no points".to_string(),
                });
            }
            if axis.iter().any(|v| !v.is_finite()) {
                return Err(SimulationError::InvalidAxis {
                    axis: k,
                    reason: "axis contains non-finite values".to_string(),
                });
            }
            if axis.windows(2).any(|w| w[1] <= w[0]) {
                return Err(SimulationError::InvalidAxis {
                    axis: k,
                    reason: "axis must be strictly increasing".to_string(),
                });
            }
        }

        let inputs = (0..axes.len()).map(|k| format!("x{}", k)).collect();
        let strides = row_major_strides(&data.shape);

        Ok(GridFunction {
            axes,
            data,
            strides,
            inputs,
            output: "y".to_string(),
            extrapolation: Extrapolation::default(),
        })
    }

    /// A function that returns `value` everywhere.
    pub fn constant(value: f64) -> Self {
        GridFunction {
            axes: vec![vec![0.0]],
            data: GridData::from_vec(vec![value]),
            strides: vec![1],
            inputs: vec!["x0".to_string()],
            output: "y".to_string(),
            extrapolation: Extrapolation::Constant,
        }
    }

    pub fn with_inputs<S: AsRef<str>>(mut self, inputs: &[S]) -> Result<Self, SimulationError> {
        if inputs.len() != self.axes.len() {
            return Err(SimulationError::InputCountMismatch {
                inputs: inputs.len(),
                axes: self.axes.len(),
            });
        }
        self.inputs = inputs.iter().map(|s| s.as_ref().to_string()).collect();
        Ok(self)
    }

    /// Renames a single input. Axes past the last one are ignored.
    pub fn with_input_name(mut self, axis: usize, name: &str) -> Self {
        if let Some(slot) = self.inputs.get_mut(axis) {
            *slot = name.to_string();
        }
        self
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.output = output.to_string();
        self
    }

    pub fn with_extrapolation(self, name: &str) -> Result<Self, SimulationError> {
        let policy = name.parse::<Extrapolation>()?;
        Ok(self.with_extrapolation_policy(policy))
    }

    pub fn with_extrapolation_policy(mut self, policy: Extrapolation) -> Self {
        self.extrapolation = policy;
        self
    }

    pub fn evaluate(&self, coords: &[f64]) -> Result<f64, SimulationError> {
        let n = self.axes.len();
        if coords.len() != n {
            return Err(SimulationError::DimensionMismatch {
                expected: n,
                found: coords.len(),
            });
        }

        let mut lower = [0usize; MAX_GRID_DIMENSIONS];
        let mut frac = [0.0f64; MAX_GRID_DIMENSIONS];
        let mut degenerate = [false; MAX_GRID_DIMENSIONS];

        for k in 0..n {
            let axis = &self.axes[k];
            let (min, max) = (axis[0], axis[axis.len() - 1]);
            let mut x = coords[k];

            if x < min || x > max {
                match self.extrapolation {
                    Extrapolation::Zero => return Ok(0.0),
                    Extrapolation::Error => {
                        return Err(SimulationError::OutOfDomain {
                            axis: k,
                            value: x,
                            min,
                            max,
                        })
                    }
                    Extrapolation::Constant => x = x.clamp(min, max),
                    Extrapolation::Natural => {}
                }
            }

            if axis.len() == 1 {
                degenerate[k] = true;
                continue;
            }

            let i = axis
                .partition_point(|&a| a <= x)
                .saturating_sub(1)
                .min(axis.len() - 2);
            lower[k] = i;
            frac[k] = (x - axis[i]) / (axis[i + 1] - axis[i]);
        }

        let mut result = 0.0;
        'corners: for mask in 0..(1usize << n) {
            let mut weight = 1.0;
            let mut offset = 0;
            for k in 0..n {
                let upper = (mask >> k) & 1 == 1;
                if upper && degenerate[k] {
                    continue 'corners;
                }
                let (index, w) = if upper {
                    (lower[k] + 1, frac[k])
                } else {
                    (lower[k], 1.0 - frac[k])
                };
                weight *= w;
                offset += index * self.strides[k];
            }
            if weight != 0.0 {
                result += weight * self.data.values[offset];
            }
        }

        Ok(result)
    }

    /// Resamples a one-dimensional function over `[t0, t1]`.
    pub fn discretize(&self, t0: f64, t1: f64, samples: usize) -> Result<TimeSeries, SimulationError> {
        if self.axes.len() != 1 {
            return Err(SimulationError::DimensionMismatch {
                expected: 1,
                found: self.axes.len(),
            });
        }
        if samples < 2 || !(t1 > t0) {
            return Err(SimulationError::InitializationError(format!(
                "cannot discretize over [{}, {}] with {} samples",
                t0, t1, samples
            )));
        }

        let step = (t1 - t0) / (samples - 1) as f64;
        let mut x = Vec::with_capacity(samples);
        let mut y = Vec::with_capacity(samples);
        for i in 0..samples {
            let t = if i == samples - 1 { t1 } else { t0 + step * i as f64 };
            x.push(t);
            y.push(self.evaluate(&[t])?);
        }

        Ok(TimeSeries::from_arrays(x, y)?
            .with_extrapolation_policy(self.extrapolation)
            .with_names(&self.inputs[0], &self.output))
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_multidimensional(&self) -> bool {
        self.inputs.len() > 1
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn axes(&self) -> &[Vec<f64>] {
        &self.axes
    }

    pub fn data(&self) -> &GridData {
        &self.data
    }

    pub fn extrapolation(&self) -> Extrapolation {
        self.extrapolation
    }
}
