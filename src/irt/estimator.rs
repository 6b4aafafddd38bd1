//! 边际极大似然估计（Bock-Aitkin EM）
//!
//! E 步在求积节点上计算每个考生能力的后验，得到各节点的期望人数与期望答对数；
//! M 步对每题在斜率/截距参数化下做 Fisher scoring，加弱先验保证有限解。

use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::irt::quadrature::Quadrature;
use crate::irt::{FitError, IrtFit, IrtModel};
use crate::models::{IrtParameters, ResponseMatrix};

pub const MIN_DISCRIMINATION: f64 = 0.01;
pub const MAX_DISCRIMINATION: f64 = 6.0;
pub const MAX_ABS_DIFFICULTY: f64 = 10.0;
pub const MIN_GUESSING: f64 = 0.001;
pub const MAX_GUESSING: f64 = 0.5;
/// 3PL 初始猜测参数
pub const INITIAL_GUESSING: f64 = 0.2;

const PROB_FLOOR: f64 = 1e-10;

/// 正态先验
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalPrior {
    pub mean: f64,
    pub sd: f64,
}

impl NormalPrior {
    fn precision(&self) -> f64 {
        1.0 / (self.sd * self.sd)
    }
}

/// Beta 先验
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaPrior {
    pub alpha: f64,
    pub beta: f64,
}

/// 拟合选项
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub quadrature_points: usize,
    pub max_cycles: usize,
    /// 一轮 EM 中参数最大变化量低于该值即视为收敛
    pub tolerance: f64,
    pub min_respondents: usize,
    /// 每次 M 步的 Fisher scoring 迭代上限
    pub max_newton_steps: usize,
    pub slope_prior: NormalPrior,
    pub intercept_prior: NormalPrior,
    pub guessing_prior: BetaPrior,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            quadrature_points: 21,
            max_cycles: 500,
            tolerance: 1e-4,
            min_respondents: 2,
            max_newton_steps: 10,
            slope_prior: NormalPrior { mean: 1.0, sd: 1.5 },
            intercept_prior: NormalPrior { mean: 0.0, sd: 3.0 },
            guessing_prior: BetaPrior {
                alpha: 5.0,
                beta: 17.0,
            },
        }
    }
}

/// 斜率/截距参数化的题目状态：P(θ) = c + (1 - c) / (1 + e^{-(aθ + d)})
#[derive(Debug, Clone, Copy, PartialEq)]
struct ItemState {
    a: f64,
    d: f64,
    c: f64,
}

impl ItemState {
    fn initial(correct: u64, total: usize, model: IrtModel) -> Self {
        let p = (correct as f64 + 0.5) / (total as f64 + 1.0);
        let c = match model {
            IrtModel::TwoPl => 0.0,
            IrtModel::ThreePl => INITIAL_GUESSING,
        };
        let p_star = ((p - c) / (1.0 - c)).clamp(0.02, 0.98);
        Self {
            a: 1.0,
            d: (p_star / (1.0 - p_star)).ln(),
            c,
        }
    }

    fn probability(&self, theta: f64) -> (f64, f64) {
        let logistic = logistic(self.a * theta + self.d);
        let p = self.c + (1.0 - self.c) * logistic;
        (p.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR), logistic)
    }

    fn clamp(&mut self, model: IrtModel) {
        self.a = self.a.clamp(MIN_DISCRIMINATION, MAX_DISCRIMINATION);
        let bound = MAX_ABS_DIFFICULTY * self.a;
        self.d = self.d.clamp(-bound, bound);
        self.c = match model {
            IrtModel::TwoPl => 0.0,
            IrtModel::ThreePl => self.c.clamp(MIN_GUESSING, MAX_GUESSING),
        };
    }

    fn max_abs_diff(&self, other: &ItemState) -> f64 {
        (self.a - other.a)
            .abs()
            .max((self.d - other.d).abs())
            .max((self.c - other.c).abs())
    }

    fn to_parameters(self, model: IrtModel) -> IrtParameters {
        IrtParameters {
            difficulty: -self.d / self.a,
            discrimination: self.a,
            guessing: match model {
                IrtModel::TwoPl => None,
                IrtModel::ThreePl => Some(self.c),
            },
        }
    }
}

fn logistic(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// E 步的充分统计量
struct ExpectedCounts {
    /// 各节点期望人数
    n: Vec<f64>,
    /// 各题各节点期望答对数
    r: Vec<Vec<f64>>,
    log_likelihood: f64,
}

fn expectation(
    matrix: &ResponseMatrix,
    items: &[ItemState],
    quadrature: &Quadrature,
    log_weights: &[f64],
) -> ExpectedCounts {
    let q = quadrature.len();
    let mut log_p = vec![vec![0.0; q]; items.len()];
    let mut log_q = vec![vec![0.0; q]; items.len()];
    for (j, item) in items.iter().enumerate() {
        for (k, &theta) in quadrature.nodes.iter().enumerate() {
            let (p, _) = item.probability(theta);
            log_p[j][k] = p.ln();
            log_q[j][k] = (1.0 - p).ln();
        }
    }

    let mut n = vec![0.0; q];
    let mut r = vec![vec![0.0; q]; items.len()];
    let mut log_likelihood = 0.0;
    let mut joint = vec![0.0; q];

    for row in matrix.rows() {
        for (k, slot) in joint.iter_mut().enumerate() {
            *slot = log_weights[k]
                + row
                    .iter()
                    .enumerate()
                    .map(|(j, &u)| if u == 1 { log_p[j][k] } else { log_q[j][k] })
                    .sum::<f64>();
        }
        let marginal = log_sum_exp(&joint);
        log_likelihood += marginal;

        for k in 0..q {
            let posterior = (joint[k] - marginal).exp();
            n[k] += posterior;
            for (j, &u) in row.iter().enumerate() {
                if u == 1 {
                    r[j][k] += posterior;
                }
            }
        }
    }

    ExpectedCounts {
        n,
        r,
        log_likelihood,
    }
}

/// 单题 M 步
fn maximize_item(
    start: ItemState,
    n: &[f64],
    r: &[f64],
    nodes: &[f64],
    model: IrtModel,
    options: &FitOptions,
) -> Result<ItemState, FitError> {
    let dim = match model {
        IrtModel::TwoPl => 2,
        IrtModel::ThreePl => 3,
    };
    // 单步更新幅度上限
    let max_step = [1.0, 2.0, 0.1];
    let mut item = start;

    for _ in 0..options.max_newton_steps {
        let mut grad = [0.0; 3];
        let mut info = [[0.0; 3]; 3];

        for (k, &theta) in nodes.iter().enumerate() {
            let (p, l) = item.probability(theta);
            let denom = p * (1.0 - p);
            let slope = (1.0 - item.c) * l * (1.0 - l);
            let dp = [slope * theta, slope, 1.0 - l];
            let resid = r[k] - n[k] * p;
            for i in 0..dim {
                grad[i] += resid / denom * dp[i];
                for m in 0..dim {
                    info[i][m] += n[k] / denom * dp[i] * dp[m];
                }
            }
        }

        let slope_prior = options.slope_prior;
        grad[0] -= (item.a - slope_prior.mean) * slope_prior.precision();
        info[0][0] += slope_prior.precision();
        let intercept_prior = options.intercept_prior;
        grad[1] -= (item.d - intercept_prior.mean) * intercept_prior.precision();
        info[1][1] += intercept_prior.precision();
        if dim == 3 {
            let BetaPrior { alpha, beta } = options.guessing_prior;
            let c = item.c;
            grad[2] += (alpha - 1.0) / c - (beta - 1.0) / (1.0 - c);
            info[2][2] += (alpha - 1.0) / (c * c) + (beta - 1.0) / ((1.0 - c) * (1.0 - c));
        }

        let information = DMatrix::from_fn(dim, dim, |i, m| info[i][m]);
        let gradient = DVector::from_fn(dim, |i, _| grad[i]);
        let delta = information
            .lu()
            .solve(&gradient)
            .ok_or_else(|| FitError::Numerical("singular item information matrix".into()))?;
        if delta.iter().any(|v| !v.is_finite()) {
            return Err(FitError::Numerical("non-finite scoring step".into()));
        }

        let scale = (0..dim)
            .map(|i| (max_step[i] / delta[i].abs().max(f64::MIN_POSITIVE)).min(1.0))
            .fold(1.0, f64::min);

        let previous = item;
        item.a += scale * delta[0];
        item.d += scale * delta[1];
        if dim == 3 {
            item.c += scale * delta[2];
        }
        item.clamp(model);

        if item.max_abs_diff(&previous) < options.tolerance * 0.1 {
            break;
        }
    }

    Ok(item)
}

/// 拟合 2PL / 3PL 模型
pub fn fit(
    matrix: &ResponseMatrix,
    model: IrtModel,
    options: &FitOptions,
) -> Result<IrtFit, FitError> {
    fit_with_cancel(matrix, model, options, &AtomicBool::new(false))
}

/// 可取消的拟合
///
/// 每轮 EM 开始前检查 `cancel`，置位后返回 [`FitError::Cancelled`]。
pub fn fit_with_cancel(
    matrix: &ResponseMatrix,
    model: IrtModel,
    options: &FitOptions,
    cancel: &AtomicBool,
) -> Result<IrtFit, FitError> {
    let students = matrix.num_students();
    let item_count = matrix.num_items();
    if item_count == 0 {
        return Err(FitError::InsufficientData("response matrix has no items".into()));
    }
    if students < options.min_respondents.max(2) {
        return Err(FitError::InsufficientData(format!(
            "{} respondent(s), at least {} required",
            students,
            options.min_respondents.max(2)
        )));
    }

    let quadrature = Quadrature::gauss_hermite(options.quadrature_points)?;
    let log_weights = quadrature.log_weights();

    let mut items: Vec<ItemState> = (0..item_count)
        .map(|j| {
            let mut state = ItemState::initial(matrix.item_correct(j), students, model);
            state.clamp(model);
            state
        })
        .collect();

    let mut last_change = f64::INFINITY;
    for cycle in 1..=options.max_cycles {
        if cancel.load(Ordering::Relaxed) {
            debug!("{} fit cancelled after {} cycles", model, cycle - 1);
            return Err(FitError::Cancelled { cycles: cycle - 1 });
        }
        let counts = expectation(matrix, &items, &quadrature, &log_weights);
        if !counts.log_likelihood.is_finite() {
            return Err(FitError::Numerical(format!(
                "marginal log-likelihood became non-finite at cycle {}",
                cycle
            )));
        }

        last_change = 0.0;
        for (j, item) in items.iter_mut().enumerate() {
            let updated = maximize_item(
                *item,
                &counts.n,
                &counts.r[j],
                &quadrature.nodes,
                model,
                options,
            )?;
            last_change = last_change.max(updated.max_abs_diff(item));
            *item = updated;
        }

        if cycle % 50 == 0 {
            debug!(
                "EM cycle {}: log-likelihood {:.4}, max change {:.2e}",
                cycle, counts.log_likelihood, last_change
            );
        }

        if last_change < options.tolerance {
            let final_counts = expectation(matrix, &items, &quadrature, &log_weights);
            debug!(
                "{} fit converged after {} cycles (log-likelihood {:.4})",
                model, cycle, final_counts.log_likelihood
            );
            return Ok(IrtFit {
                model,
                items: items.iter().map(|s| s.to_parameters(model)).collect(),
                log_likelihood: final_counts.log_likelihood,
                cycles: cycle,
            });
        }
    }

    warn!(
        "{} fit did not converge after {} cycles (max change {:.2e})",
        model, options.max_cycles, last_change
    );
    Err(FitError::NonConvergence {
        cycles: options.max_cycles,
        last_change,
    })
}
