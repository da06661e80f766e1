//! Dormand–Prince 5(4) embedded Runge–Kutta pair with first-same-as-last
//! stage reuse and cubic Hermite dense output.

use crate::errors::SimulationError;

const STAGES: usize = 7;

const C: [f64; STAGES] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

const A: [[f64; 6]; STAGES] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];

/// Fifth-order weights; identical to the last row of `A`.
#[cfg(test)]
const B: [f64; STAGES] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];

/// Difference between the fifth- and fourth-order weights.
const B_ERR: [f64; STAGES] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

/// System of ordinary differential equations `dy/dt = f(t, y)`.
pub trait OdeSystem<const N: usize> {
    fn rhs(&self, t: f64, y: &[f64; N]) -> Result<[f64; N], SimulationError>;
}

#[derive(Debug, Clone)]
pub struct StepResult<const N: usize> {
    pub t: f64,
    pub y: [f64; N],
    /// Derivative at `(t, y)`, reused as the first stage of the next step.
    pub f: [f64; N],
    pub error: f64,
    pub h_next: f64,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub fn_evals: u64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
}

/// `h_new = safety * h * error^(-1/5)`, clamped to `[min_factor, max_factor]`.
#[derive(Debug, Clone, Copy)]
pub struct StepController {
    pub safety: f64,
    pub max_factor: f64,
    pub min_factor: f64,
    exponent: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: 1.0 / 5.0,
        }
    }
}

impl StepController {
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }
        if !error.is_finite() {
            return self.min_factor;
        }
        (self.safety * error.powf(-self.exponent)).clamp(self.min_factor, self.max_factor)
    }
}

/// Scaled error is `|err_i| / (atol_i + rtol_i * max(|y_i|, |y_new_i|))`.
#[derive(Debug, Clone)]
pub struct Tolerances<const N: usize> {
    pub atol: [f64; N],
    pub rtol: [f64; N],
}

impl<const N: usize> Tolerances<N> {
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self {
            atol: [atol; N],
            rtol: [rtol; N],
        }
    }

    pub fn with_components(atol: [f64; N], rtol: [f64; N]) -> Self {
        Self { atol, rtol }
    }
}

/// One accepted step with its end-point derivatives; interpolates the
/// solution anywhere inside the step with a cubic Hermite polynomial.
#[derive(Debug, Clone)]
pub struct DenseSegment<const N: usize> {
    pub t0: f64,
    pub y0: [f64; N],
    pub f0: [f64; N],
    pub t1: f64,
    pub y1: [f64; N],
    pub f1: [f64; N],
}

impl<const N: usize> DenseSegment<N> {
    pub fn interpolate(&self, t: f64) -> [f64; N] {
        let dt = self.t1 - self.t0;
        if dt == 0.0 {
            return self.y1;
        }
        let s = (t - self.t0) / dt;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 1.0 - 3.0 * s2 + 2.0 * s3;
        let h10 = s - 2.0 * s2 + s3;
        let h01 = 3.0 * s2 - 2.0 * s3;
        let h11 = s3 - s2;

        let mut y = [0.0; N];
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = h00 * self.y0[i]
                + h10 * dt * self.f0[i]
                + h01 * self.y1[i]
                + h11 * dt * self.f1[i];
        }
        y
    }
}

pub struct DormandPrince<const N: usize> {
    tol: Tolerances<N>,
    pub controller: StepController,
    pub h_min: f64,
    pub h_max: f64,
    pub max_steps: u64,
    pub stats: Stats,
}

impl<const N: usize> DormandPrince<N> {
    pub fn new(tol: Tolerances<N>) -> Self {
        Self {
            tol,
            controller: StepController::default(),
            h_min: 1e-12,
            h_max: f64::INFINITY,
            max_steps: 1_000_000,
            stats: Stats::default(),
        }
    }

    pub fn set_step_limits(&mut self, h_min: f64, h_max: f64) {
        self.h_min = h_min;
        self.h_max = h_max;
    }

    /// Attempts one step of size `h` from `(t, y)`, where `f0 = f(t, y)`.
    /// The step is clamped to `[h_min, h_max]`.
    pub fn step<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        f0: &[f64; N],
        h: f64,
    ) -> Result<StepResult<N>, SimulationError> {
        let h = h.clamp(self.h_min, self.h_max);

        let mut k = [[0.0; N]; STAGES];
        k[0] = *f0;
        let mut y_stage = [0.0; N];
        for stage in 1..STAGES {
            for (n, value) in y_stage.iter_mut().enumerate() {
                let increment: f64 = (0..stage).map(|j| A[stage][j] * k[j][n]).sum();
                *value = y[n] + h * increment;
            }
            k[stage] = sys.rhs(t + C[stage] * h, &y_stage)?;
        }
        self.stats.fn_evals += (STAGES - 1) as u64;

        // The last stage is evaluated at the fifth-order solution itself.
        let y_new = y_stage;
        let f_new = k[STAGES - 1];

        let mut error: f64 = 0.0;
        for n in 0..N {
            let err_n: f64 = h * (0..STAGES).map(|j| B_ERR[j] * k[j][n]).sum::<f64>();
            let scale = self.tol.atol[n] + self.tol.rtol[n] * y[n].abs().max(y_new[n].abs());
            let scaled = err_n.abs() / scale;
            error = if scaled.is_nan() { f64::NAN } else { error.max(scaled) };
            if error.is_nan() {
                break;
            }
        }

        let accepted = error <= 1.0;
        if accepted {
            self.stats.accepted_steps += 1;
        } else {
            self.stats.rejected_steps += 1;
        }
        let h_next = (h * self.controller.compute_factor(error)).clamp(self.h_min, self.h_max);

        Ok(StepResult {
            t: t + h,
            y: y_new,
            f: f_new,
            error,
            h_next,
            accepted,
        })
    }

    /// Integrates from `t0` to `tf` without events.
    pub fn integrate<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(f64, [f64; N]), SimulationError> {
        let mut t = t0;
        let mut y = *y0;
        let mut f = sys.rhs(t, &y)?;
        self.stats.fn_evals += 1;
        let mut h = h0;
        let mut steps = 0u64;

        while tf - t > self.h_min {
            let result = self.step(sys, t, &y, &f, h.min(tf - t))?;
            if result.accepted {
                if !result.y.iter().all(|v| v.is_finite()) {
                    return Err(SimulationError::NonFiniteState { t: result.t });
                }
                t = result.t;
                y = result.y;
                f = result.f;
            } else if result.h_next <= self.h_min {
                return Err(SimulationError::StepSizeTooSmall { t, h: result.h_next });
            }
            h = result.h_next;

            steps += 1;
            if steps > self.max_steps {
                return Err(SimulationError::PhysicsError(format!(
                    "integration exceeded {} steps",
                    self.max_steps
                )));
            }
        }
        Ok((t, y))
    }
}
