//! # Simplex SQP
//!
//! $$
//! \min_{\mathbf w} f(\mathbf w)\quad\text{s.t.}\quad \mathbf 1^\top\mathbf w = 1,\ 0\le w_i\le 1
//! $$
//!
//! Sequential quadratic programming restricted to the probability simplex.
//! Each iteration solves
//!
//! $$
//! \min_{\mathbf x\in\Delta}\ \tfrac12(\mathbf x-\mathbf w_k)^\top B_k(\mathbf x-\mathbf w_k) + \nabla f_k^\top(\mathbf x-\mathbf w_k)
//! $$
//!
//! exactly with a primal active-set method, backtracks along
//! $\mathbf d_k = \mathbf x^\* - \mathbf w_k$ (Armijo) and refreshes $B_k$ with a
//! Powell-damped BFGS update. Iterates never leave the simplex, so the
//! objective itself serves as merit function. The upper bound $w_i \le 1$ is
//! implied by the budget and non-negativity.
//!
//! [`SimplexSqp`] is an argmin [`Solver`] and runs under argmin's [`Executor`].

use anyhow::anyhow;
use argmin::core::CostFunction;
use argmin::core::Error;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::core::IterState;
use argmin::core::Problem;
use argmin::core::Solver;
use argmin::core::State;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::core::KV;
use nalgebra::DMatrix;
use nalgebra::DVector;

const ARMIJO_C1: f64 = 1e-4;
const MIN_STEP: f64 = 1e-10;
const QP_TOL: f64 = 1e-13;

const LINE_SEARCH_FAILED: &str = "line search could not decrease the objective";
const SUBPROBLEM_FAILED: &str = "quadratic subproblem could not be solved";

/// Iteration state of a [`SimplexSqp`] run.
pub type SqpState = IterState<Vec<f64>, Vec<f64>, (), (), (), f64>;

/// Stopping rules of [`SimplexSqp`].
#[derive(Clone, Debug, PartialEq)]
pub struct SqpSettings {
  /// Outer iteration budget, handed to the executor.
  pub max_iters: u64,
  /// Relative tolerance on the predicted decrease `-grad' d`.
  pub ftol: f64,
  /// Absolute tolerance on the largest component of the search direction.
  pub xtol: f64,
}

impl Default for SqpSettings {
  fn default() -> Self {
    Self {
      max_iters: 500,
      ftol: 1e-12,
      xtol: 1e-10,
    }
  }
}

/// Local SQP solver over the unit simplex.
#[derive(Clone, Debug, Default)]
pub struct SimplexSqp {
  settings: SqpSettings,
  hessian: Option<DMatrix<f64>>,
  scaled: bool,
  /// QP step from the current iterate; `None` once the subproblem failed.
  direction: Option<DVector<f64>>,
}

impl SimplexSqp {
  /// Solver with the given stopping rules.
  pub fn new(settings: SqpSettings) -> Self {
    Self {
      settings,
      ..Self::default()
    }
  }

  /// Borrow the stopping rules.
  pub fn settings(&self) -> &SqpSettings {
    &self.settings
  }

  /// Minimize `problem` from the feasible point `x0` and return the final state.
  ///
  /// Cost and gradient errors abort the run and are returned unchanged.
  pub fn minimize<O>(&self, problem: O, x0: Vec<f64>) -> Result<SqpState, Error>
  where
    O: CostFunction<Param = Vec<f64>, Output = f64>
      + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
  {
    let max_iters = self.settings.max_iters;
    let result = Executor::new(problem, self.clone())
      .configure(|state| state.param(x0).max_iters(max_iters))
      .run()?;
    Ok(result.state)
  }

  fn refresh_direction(&mut self, x: &[f64], g: &[f64]) {
    self.direction = self.hessian.as_ref().and_then(|b| {
      let x = DVector::from_column_slice(x);
      solve_simplex_qp(b, &DVector::from_column_slice(g), &x).map(|target| target - x)
    });
  }
}

/// Whether a finished run met the solver's own convergence test.
pub fn converged(state: &SqpState) -> bool {
  matches!(
    state.get_termination_reason(),
    Some(TerminationReason::SolverConverged)
  )
}

fn exit(state: SqpState, reason: &str) -> SqpState {
  state.terminate_with(TerminationReason::SolverExit(reason.to_string()))
}

impl<O> Solver<O, SqpState> for SimplexSqp
where
  O: CostFunction<Param = Vec<f64>, Output = f64>
    + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
  const NAME: &'static str = "Simplex SQP";

  fn init(
    &mut self,
    problem: &mut Problem<O>,
    state: SqpState,
  ) -> Result<(SqpState, Option<KV>), Error> {
    let x0 = state
      .get_param()
      .ok_or_else(|| anyhow!("SimplexSqp requires an initial parameter vector"))?
      .clone();
    let cost = problem.cost(&x0)?;
    let grad = problem.gradient(&x0)?;

    let n = x0.len();
    self.hessian = Some(DMatrix::identity(n, n));
    self.scaled = false;
    self.refresh_direction(&x0, &grad);

    Ok((state.cost(cost).gradient(grad), None))
  }

  fn next_iter(
    &mut self,
    problem: &mut Problem<O>,
    state: SqpState,
  ) -> Result<(SqpState, Option<KV>), Error> {
    let (Some(d), Some(param), Some(grad)) = (
      self.direction.clone(),
      state.get_param().cloned(),
      state.get_gradient().cloned(),
    ) else {
      return Ok((exit(state, SUBPROBLEM_FAILED), None));
    };

    let x = DVector::from_vec(param);
    let g = DVector::from_vec(grad);
    let f = state.get_cost();
    let slope = g.dot(&d);

    let mut alpha = 1.0;
    let accepted = loop {
      let mut trial = &x + &d * alpha;
      trial.iter_mut().for_each(|v| *v = v.max(0.0));
      let f_trial = problem.cost(&trial.as_slice().to_vec())?;
      if f_trial <= f + ARMIJO_C1 * alpha * slope {
        break Some((trial, f_trial));
      }
      alpha *= 0.5;
      if alpha < MIN_STEP {
        break None;
      }
    };

    let Some((x_new, f_new)) = accepted else {
      // at the rounding floor the predicted decrease is no longer measurable
      if -slope <= self.settings.ftol.sqrt() * (1.0 + f.abs()) {
        return Ok((state.terminate_with(TerminationReason::SolverConverged), None));
      }
      return Ok((exit(state, LINE_SEARCH_FAILED), None));
    };

    let x_new = x_new.as_slice().to_vec();
    let g_new = problem.gradient(&x_new)?;
    let s = DVector::from_column_slice(&x_new) - &x;
    let y = DVector::from_column_slice(&g_new) - &g;

    if let Some(b) = self.hessian.as_mut() {
      if !self.scaled {
        let sy = s.dot(&y);
        if sy > f64::EPSILON {
          let n = b.nrows();
          *b = DMatrix::identity(n, n) * (y.dot(&y) / sy);
        }
        self.scaled = true;
      }
      damped_bfgs_update(b, &s, &y);
    }
    self.refresh_direction(&x_new, &g_new);

    Ok((state.param(x_new).cost(f_new).gradient(g_new), None))
  }

  fn terminate(&mut self, state: &SqpState) -> TerminationStatus {
    let Some(d) = self.direction.as_ref() else {
      return TerminationStatus::Terminated(TerminationReason::SolverExit(
        SUBPROBLEM_FAILED.to_string(),
      ));
    };
    let Some(grad) = state.get_gradient() else {
      return TerminationStatus::NotTerminated;
    };

    let slope = DVector::from_column_slice(grad).dot(d);
    let scale = 1.0 + state.get_cost().abs();
    if d.amax() <= self.settings.xtol || -slope <= self.settings.ftol * scale {
      TerminationStatus::Terminated(TerminationReason::SolverConverged)
    } else {
      TerminationStatus::NotTerminated
    }
  }
}

/// Powell-damped BFGS update; keeps `b` positive definite.
fn damped_bfgs_update(b: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>) {
  let bs = &*b * s;
  let sbs = s.dot(&bs);
  if sbs <= f64::EPSILON * s.norm_squared() {
    return;
  }

  let sy = s.dot(y);
  let theta = if sy >= 0.2 * sbs {
    1.0
  } else {
    0.8 * sbs / (sbs - sy)
  };
  let r = y * theta + &bs * (1.0 - theta);
  let sr = s.dot(&r);
  if sr <= 0.0 {
    return;
  }

  *b += &r * r.transpose() / sr - &bs * bs.transpose() / sbs;
}

/// Solve `min ½(x - w)'B(x - w) + g'(x - w)` over the unit simplex.
///
/// Primal active-set method warm-started at the feasible point `w`. The
/// working set holds indices pinned at zero; each step solves the
/// equality-constrained problem on the free indices through its KKT system.
fn solve_simplex_qp(b: &DMatrix<f64>, g: &DVector<f64>, w: &DVector<f64>) -> Option<DVector<f64>> {
  let n = w.len();
  let mut x = w.map(|v| v.max(0.0));
  let mut pinned: Vec<bool> = x.iter().map(|&v| v <= 0.0).collect();

  for _ in 0..(10 * n + 50) {
    let free: Vec<usize> = (0..n).filter(|&i| !pinned[i]).collect();
    let m = free.len();
    if m == 0 {
      return None;
    }

    let grad = b * (&x - w) + g;
    let mut kkt = DMatrix::<f64>::zeros(m + 1, m + 1);
    let mut rhs = DVector::<f64>::zeros(m + 1);
    for (a, &i) in free.iter().enumerate() {
      for (c, &j) in free.iter().enumerate() {
        kkt[(a, c)] = b[(i, j)];
      }
      kkt[(a, m)] = 1.0;
      kkt[(m, a)] = 1.0;
      rhs[a] = -grad[i];
    }

    let sol = kkt.lu().solve(&rhs)?;
    let step = sol.rows(0, m);

    if step.amax() <= QP_TOL {
      // bound multiplier of pinned index i is grad_i + mu
      let mu = sol[m];
      let tol = QP_TOL * (1.0 + grad.amax());
      let release = (0..n)
        .filter(|&i| pinned[i])
        .map(|i| (i, grad[i] + mu))
        .min_by(|a, b| a.1.total_cmp(&b.1));

      match release {
        Some((i, lambda)) if lambda < -tol => pinned[i] = false,
        _ => return Some(x),
      }
      continue;
    }

    let mut alpha = 1.0;
    let mut blocking = None;
    for (a, &i) in free.iter().enumerate() {
      if step[a] < 0.0 {
        let ratio = -x[i] / step[a];
        if ratio < alpha {
          alpha = ratio;
          blocking = Some(i);
        }
      }
    }

    for (a, &i) in free.iter().enumerate() {
      x[i] += alpha * step[a];
    }
    if let Some(i) = blocking {
      x[i] = 0.0;
      pinned[i] = true;
    }
  }

  None
}
