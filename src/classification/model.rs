//! 多クラス（softmax）ロジスティック回帰。
//!
//! 目的関数は `½‖W‖² + C · Σ wᵢ · CE(xᵢ, yᵢ)`（切片は正則化しない）。
//! 全バッチ勾配降下 + バックトラッキング直線探索で最小化する。
use anyhow::{Result, ensure};
use ndarray::{Array1, Array2, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sprs::CsVec;
use tracing::{debug, warn};

/// クラス重み付け。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    #[default]
    None,
    /// `n / (k · count_c)`
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticRegressionParams {
    /// 正則化の強さの逆数。
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub class_weight: ClassWeight,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 200,
            tol: 1e-4,
            class_weight: ClassWeight::None,
        }
    }
}

/// 学習の収束状況。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub iterations: usize,
    pub converged: bool,
    pub objective: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// `n_classes × n_features`
    weights: Array2<f64>,
    intercept: Array1<f64>,
}

const MAX_LINE_SEARCH_STEPS: usize = 50;

impl LogisticRegression {
    /// クラス ID 列（`0..n_classes`）に対して学習する。
    ///
    /// # Errors
    /// 入力の長さが一致しない、またはクラス ID が範囲外の場合はエラーを返す。
    pub fn fit(
        rows: &[CsVec<f64>],
        targets: &[usize],
        n_classes: usize,
        n_features: usize,
        params: &LogisticRegressionParams,
    ) -> Result<(Self, FitReport)> {
        ensure!(!rows.is_empty(), "no training rows");
        ensure!(rows.len() == targets.len(), "rows/targets length mismatch");
        ensure!(n_classes >= 1, "at least one class is required");
        ensure!(params.c > 0.0, "C must be positive");
        ensure!(
            targets.iter().all(|&target| target < n_classes),
            "target class out of range"
        );
        ensure!(
            rows.iter().all(|row| row.dim() == n_features),
            "row dimension mismatch"
        );

        let sample_weights = sample_weights(targets, n_classes, params.class_weight);
        let problem = Problem {
            rows,
            targets,
            sample_weights: &sample_weights,
            c: params.c,
        };

        let mut model = Self {
            weights: Array2::zeros((n_classes, n_features)),
            intercept: Array1::zeros(n_classes),
        };
        if n_classes == 1 {
            return Ok((
                model,
                FitReport {
                    iterations: 0,
                    converged: true,
                    objective: 0.0,
                },
            ));
        }

        let mut step = 1.0;
        let mut objective = problem.objective(&model);
        let mut report = FitReport {
            iterations: 0,
            converged: false,
            objective,
        };

        for iteration in 1..=params.max_iter {
            let (grad_w, grad_b) = problem.gradient(&model);
            let max_component = grad_w
                .iter()
                .chain(grad_b.iter())
                .fold(0.0_f64, |acc, g| acc.max(g.abs()));
            if max_component < params.tol {
                report.converged = true;
                break;
            }
            let grad_sq = grad_w.iter().chain(grad_b.iter()).map(|g| g * g).sum::<f64>();

            // Armijo backtracking, starting from twice the last accepted step
            step *= 2.0;
            let mut accepted = None;
            for _ in 0..MAX_LINE_SEARCH_STEPS {
                let candidate = Self {
                    weights: &model.weights - &(&grad_w * step),
                    intercept: &model.intercept - &(&grad_b * step),
                };
                let candidate_objective = problem.objective(&candidate);
                if candidate_objective <= objective - 0.5 * step * grad_sq {
                    accepted = Some((candidate, candidate_objective));
                    break;
                }
                step *= 0.5;
            }

            report.iterations = iteration;
            // a stalled search is not convergence; the gradient is still above tol
            let Some((candidate, candidate_objective)) =
                accepted.filter(|(_, value)| *value < objective)
            else {
                debug!(iteration, max_component, "line search made no progress");
                break;
            };
            model = candidate;
            objective = candidate_objective;
            report.objective = objective;
        }

        if !report.converged {
            warn!(
                iterations = report.iterations,
                objective = report.objective,
                "logistic regression did not converge; consider increasing max_iter"
            );
        }
        Ok((model, report))
    }

    /// 学習済みの重みから復元する。
    ///
    /// # Errors
    /// 行列と切片の形が一致しない場合はエラーを返す。
    pub fn from_parts(weights: Array2<f64>, intercept: Array1<f64>) -> Result<Self> {
        let model = Self { weights, intercept };
        model.validate()?;
        Ok(model)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        ensure!(
            self.weights.nrows() == self.intercept.len(),
            "weight rows ({}) do not match intercept length ({})",
            self.weights.nrows(),
            self.intercept.len()
        );
        ensure!(
            self.weights.iter().chain(self.intercept.iter()).all(|v| v.is_finite()),
            "model parameters must be finite"
        );
        Ok(())
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.weights.nrows()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.weights.ncols()
    }

    /// 各クラスの確率。
    #[must_use]
    pub fn predict_proba(&self, row: &CsVec<f64>) -> Array1<f64> {
        softmax(self.scores(row))
    }

    /// 最も確率の高いクラス ID。同率の場合は小さい ID。
    #[must_use]
    pub fn predict(&self, row: &CsVec<f64>) -> usize {
        argmax(&self.scores(row))
    }

    fn scores(&self, row: &CsVec<f64>) -> Array1<f64> {
        let mut scores = self.intercept.clone();
        for (feature, value) in row.iter() {
            if feature >= self.n_features() {
                continue;
            }
            Zip::from(&mut scores)
                .and(self.weights.column(feature))
                .for_each(|score, &weight| *score += weight * value);
        }
        scores
    }
}

struct Problem<'a> {
    rows: &'a [CsVec<f64>],
    targets: &'a [usize],
    sample_weights: &'a [f64],
    c: f64,
}

impl Problem<'_> {
    fn objective(&self, model: &LogisticRegression) -> f64 {
        let data_loss: f64 = self
            .rows
            .par_iter()
            .zip(self.targets.par_iter())
            .zip(self.sample_weights.par_iter())
            .map(|((row, &target), &weight)| {
                let scores = model.scores(row);
                weight * (log_sum_exp(&scores) - scores[target])
            })
            .sum();
        let penalty = 0.5 * model.weights.iter().map(|w| w * w).sum::<f64>();
        penalty + self.c * data_loss
    }

    fn gradient(&self, model: &LogisticRegression) -> (Array2<f64>, Array1<f64>) {
        let residuals: Vec<Array1<f64>> = self
            .rows
            .par_iter()
            .zip(self.targets.par_iter())
            .zip(self.sample_weights.par_iter())
            .map(|((row, &target), &weight)| {
                let mut residual = softmax(model.scores(row));
                residual[target] -= 1.0;
                residual * (weight * self.c)
            })
            .collect();

        let mut grad_w = model.weights.clone();
        let mut grad_b = Array1::zeros(model.n_classes());
        for (row, residual) in self.rows.iter().zip(&residuals) {
            grad_b += residual;
            for (feature, value) in row.iter() {
                Zip::from(grad_w.column_mut(feature))
                    .and(residual)
                    .for_each(|g, &r| *g += r * value);
            }
        }
        (grad_w, grad_b)
    }
}

fn sample_weights(targets: &[usize], n_classes: usize, class_weight: ClassWeight) -> Vec<f64> {
    match class_weight {
        ClassWeight::None => vec![1.0; targets.len()],
        ClassWeight::Balanced => {
            let mut counts = vec![0_usize; n_classes];
            for &target in targets {
                counts[target] += 1;
            }
            let present = counts.iter().filter(|&&count| count > 0).count().max(1);
            let n = targets.len() as f64;
            targets
                .iter()
                .map(|&target| n / (present as f64 * counts[target] as f64))
                .collect()
        }
    }
}

fn log_sum_exp(scores: &Array1<f64>) -> f64 {
    let max = scores.fold(f64::NEG_INFINITY, |acc, &s| acc.max(s));
    max + scores.iter().map(|s| (s - max).exp()).sum::<f64>().ln()
}

fn softmax(scores: Array1<f64>) -> Array1<f64> {
    let lse = log_sum_exp(&scores);
    scores.mapv_into(|s| (s - lse).exp())
}

fn argmax(values: &Array1<f64>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (index, &value)| {
            if value > best.1 { (index, value) } else { best }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(dim: usize, entries: &[(usize, f64)]) -> CsVec<f64> {
        let (indices, data) = entries.iter().copied().unzip();
        CsVec::new(dim, indices, data)
    }

    fn toy_problem() -> (Vec<CsVec<f64>>, Vec<usize>) {
        let rows = vec![
            row(3, &[(0, 1.0)]),
            row(3, &[(0, 0.8), (2, 0.6)]),
            row(3, &[(1, 1.0)]),
            row(3, &[(1, 0.6), (2, 0.8)]),
        ];
        (rows, vec![0, 0, 1, 1])
    }

    #[test]
    fn fit_separates_linearly_separable_classes() {
        let (rows, targets) = toy_problem();
        let params = LogisticRegressionParams {
            c: 10.0,
            ..LogisticRegressionParams::default()
        };

        let (model, report) = LogisticRegression::fit(&rows, &targets, 2, 3, &params).expect("fit");

        assert!(report.iterations > 0);
        for (row, &target) in rows.iter().zip(&targets) {
            assert_eq!(model.predict(row), target);
        }
        let proba = model.predict_proba(&rows[0]);
        assert!((proba.sum() - 1.0).abs() < 1e-9);
        assert!(proba[0] > 0.5);
    }

    #[test]
    fn objective_decreases_from_zero_model() {
        let (rows, targets) = toy_problem();
        let params = LogisticRegressionParams::default();
        let weights = vec![1.0; rows.len()];
        let problem = Problem {
            rows: &rows,
            targets: &targets,
            sample_weights: &weights,
            c: params.c,
        };
        let initial = problem.objective(&LogisticRegression {
            weights: Array2::zeros((2, 3)),
            intercept: Array1::zeros(2),
        });

        let (_, report) = LogisticRegression::fit(&rows, &targets, 2, 3, &params).expect("fit");

        assert!((initial - 4.0 * 2.0_f64.ln()).abs() < 1e-9);
        assert!(report.objective < initial);
    }

    #[test]
    fn stalled_search_is_reported_as_not_converged() {
        let (rows, targets) = toy_problem();
        let params = LogisticRegressionParams {
            tol: 0.0,
            max_iter: 100_000,
            ..LogisticRegressionParams::default()
        };

        let (model, report) = LogisticRegression::fit(&rows, &targets, 2, 3, &params).expect("fit");

        assert!(!report.converged);
        assert!(report.iterations < params.max_iter);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn balanced_weights_follow_inverse_frequency() {
        let weights = sample_weights(&[0, 0, 0, 1], 2, ClassWeight::Balanced);
        let expected = [4.0 / 6.0, 4.0 / 6.0, 4.0 / 6.0, 2.0];
        for (got, want) in weights.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn fit_rejects_out_of_range_targets() {
        let (rows, _) = toy_problem();
        let params = LogisticRegressionParams::default();
        assert!(LogisticRegression::fit(&rows, &[0, 1, 2, 0], 2, 3, &params).is_err());
    }

    #[test]
    fn from_parts_validates_shapes() {
        assert!(LogisticRegression::from_parts(Array2::zeros((2, 3)), Array1::zeros(3)).is_err());
        assert!(LogisticRegression::from_parts(Array2::zeros((2, 3)), Array1::zeros(2)).is_ok());
    }
}
