//! Adaptive Simpson quadrature over a finite interval
//!
//! Self-contained numerical integration used by the rating update. The
//! interval is split into fixed panels, each refined recursively until the
//! Richardson error estimate drops under its share of the tolerance. Work is
//! bounded by a recursion depth and an evaluation budget; running out of either
//! is reported instead of returning a half-converged value.

use std::f64::consts::{PI, SQRT_2};

/// Why an integral could not be computed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuadratureError {
    #[error("no convergence on [{lower}, {upper}] within the depth budget")]
    DepthExhausted { lower: f64, upper: f64 },

    #[error("evaluation budget of {budget} exhausted")]
    BudgetExhausted { budget: usize },

    #[error("integrand is not finite at {at}")]
    NonFinite { at: f64 },

    #[error("invalid interval [{lower}, {upper}]")]
    InvalidInterval { lower: f64, upper: f64 },
}

/// Adaptive Simpson integrator with a fixed work budget
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveSimpson {
    pub max_depth: u32,
    pub max_evaluations: usize,
    /// Panels the interval is split into before adaptive refinement
    pub panels: usize,
}

impl Default for AdaptiveSimpson {
    fn default() -> Self {
        Self {
            max_depth: 48,
            max_evaluations: 200_000,
            panels: 16,
        }
    }
}

struct Integration<'f, F> {
    integrand: &'f F,
    evaluations: usize,
    budget: usize,
}

impl<F: Fn(f64) -> f64> Integration<'_, F> {
    fn eval(&mut self, x: f64) -> Result<f64, QuadratureError> {
        self.evaluations += 1;
        if self.evaluations > self.budget {
            return Err(QuadratureError::BudgetExhausted {
                budget: self.budget,
            });
        }
        let y = (self.integrand)(x);
        if !y.is_finite() {
            return Err(QuadratureError::NonFinite { at: x });
        }
        Ok(y)
    }

    /// Simpson estimate on [a, b], returning the midpoint and its value as well
    fn simpson(&mut self, a: f64, fa: f64, b: f64, fb: f64) -> Result<(f64, f64, f64), QuadratureError> {
        let m = 0.5 * (a + b);
        let fm = self.eval(m)?;
        Ok((m, fm, (b - a) / 6.0 * (fa + 4.0 * fm + fb)))
    }

    #[allow(clippy::too_many_arguments)]
    fn refine(
        &mut self,
        a: f64,
        fa: f64,
        m: f64,
        fm: f64,
        b: f64,
        fb: f64,
        whole: f64,
        tolerance: f64,
        depth: u32,
    ) -> Result<f64, QuadratureError> {
        let (lm, flm, left) = self.simpson(a, fa, m, fm)?;
        let (rm, frm, right) = self.simpson(m, fm, b, fb)?;
        let delta = left + right - whole;
        // Rounding noise in the sums sets a floor under the achievable tolerance
        let tolerance = tolerance.max(f64::EPSILON * (left.abs() + right.abs()));
        if delta.abs() <= 15.0 * tolerance {
            return Ok(left + right + delta / 15.0);
        }
        // Quarter points that collapse onto their neighbours cannot be refined further
        if lm <= a || m <= lm || rm <= m || b <= rm {
            return Ok(left + right);
        }
        if depth == 0 {
            return Err(QuadratureError::DepthExhausted { lower: a, upper: b });
        }
        let left = self.refine(a, fa, lm, flm, m, fm, left, tolerance / 2.0, depth - 1)?;
        let right = self.refine(m, fm, rm, frm, b, fb, right, tolerance / 2.0, depth - 1)?;
        Ok(left + right)
    }
}

impl AdaptiveSimpson {
    /// Integrate `integrand` over [lower, upper] to within `tolerance` (absolute)
    pub fn integrate<F>(
        &self,
        integrand: F,
        lower: f64,
        upper: f64,
        tolerance: f64,
    ) -> Result<f64, QuadratureError>
    where
        F: Fn(f64) -> f64,
    {
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            return Err(QuadratureError::InvalidInterval { lower, upper });
        }

        let mut run = Integration {
            integrand: &integrand,
            evaluations: 0,
            budget: self.max_evaluations,
        };
        let panels = self.panels.max(1);
        let width = (upper - lower) / panels as f64;
        let panel_tolerance = tolerance / panels as f64;

        let mut total = 0.0;
        let mut a = lower;
        let mut fa = run.eval(a)?;
        for panel in 0..panels {
            let b = if panel + 1 == panels {
                upper
            } else {
                lower + width * (panel + 1) as f64
            };
            let fb = run.eval(b)?;
            let (m, fm, whole) = run.simpson(a, fa, b, fb)?;
            total += run.refine(a, fa, m, fm, b, fb, whole, panel_tolerance, self.max_depth)?;
            a = b;
            fa = fb;
        }
        Ok(total)
    }
}

/// Standard normal density
pub fn standard_normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Standard normal cumulative distribution
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Below this the series for erf is used, above it the continued fraction for erfc
const SERIES_LIMIT: f64 = 3.0;
const FRACTION_TERMS: u32 = 120;
const SERIES_TERMS: u32 = 200;

/// erf(x) = 2/sqrt(pi) exp(-x^2) sum 2^n x^(2n+1) / (2n+1)!!, all terms share one sign
fn erf_series(x: f64) -> f64 {
    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    for n in 1..SERIES_TERMS {
        term *= 2.0 * x2 / f64::from(2 * n + 1);
        sum += term;
        if term.abs() <= sum.abs() * f64::EPSILON {
            break;
        }
    }
    2.0 / PI.sqrt() * (-x2).exp() * sum
}

/// erfc(x) for x >= SERIES_LIMIT: exp(-x^2)/sqrt(pi) / (x + (1/2)/(x + 1/(x + (3/2)/(x + ...))))
fn erfc_fraction(x: f64) -> f64 {
    let mut denominator = x;
    for n in (1..=FRACTION_TERMS).rev() {
        denominator = x + 0.5 * f64::from(n) / denominator;
    }
    (-x * x).exp() / (PI.sqrt() * denominator)
}

/// Complementary error function, continuous everywhere with erfc(0) == 1
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let tail = if z < SERIES_LIMIT {
        1.0 - erf_series(z)
    } else {
        erfc_fraction(z)
    };
    if x >= 0.0 {
        tail
    } else {
        2.0 - tail
    }
}
