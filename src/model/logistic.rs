//! L1/L2-regularized logistic regression fitted by (proximal) gradient descent.

use super::{Classifier, LogisticParams, ModelError, Penalty};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    params: LogisticParams,
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Intercept term
    pub intercept: Option<f64>,
    /// Cost per iteration of the last fit
    #[serde(skip)]
    pub cost_history: Vec<f64>,
}

impl LogisticRegression {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            coefficients: None,
            intercept: None,
            cost_history: Vec::new(),
        }
    }

    pub fn params(&self) -> &LogisticParams {
        &self.params
    }

    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let exp_z = z.exp();
            exp_z / (1.0 + exp_z)
        }
    }

    fn log_loss(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        let eps = 1e-15;
        let n = y_true.len() as f64;
        -y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(&y, &p)| {
                let p = p.clamp(eps, 1.0 - eps);
                y * p.ln() + (1.0 - y) * (1.0 - p).ln()
            })
            .sum::<f64>()
            / n
    }

    fn soft_threshold(w: f64, t: f64) -> f64 {
        w.signum() * (w.abs() - t).max(0.0)
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        let (n, d) = x.dim();
        if n == 0 {
            return Err(ModelError::InvalidParameter("empty training set".to_string()));
        }
        if y.len() != n {
            return Err(ModelError::DimensionMismatch { expected: n, got: y.len() });
        }
        if !(self.params.c > 0.0) {
            return Err(ModelError::InvalidParameter(format!("C must be positive, got {}", self.params.c)));
        }
        let positives = y.iter().filter(|&&v| v > 0.5).count();
        if positives == 0 || positives == n {
            return Err(ModelError::SingleClass);
        }

        let n_f = n as f64;
        // Objective is mean log-loss + penalty / (C * n), matching C-scaled sum loss.
        let alpha = 1.0 / (self.params.c * n_f);
        // Step 1/L from the Lipschitz bound of the mean log-loss gradient.
        let mean_sq_norm = x.iter().map(|v| v * v).sum::<f64>() / n_f;
        let l2_term = if self.params.penalty == Penalty::L2 { alpha } else { 0.0 };
        let step = 1.0 / (0.25 * (mean_sq_norm + 1.0) + l2_term);

        let mut weights = Array1::<f64>::zeros(d);
        let mut bias = 0.0;
        self.cost_history.clear();

        for iter in 0..self.params.max_iter {
            let linear = x.dot(&weights) + bias;
            let predictions = linear.mapv(Self::sigmoid);
            let errors = &predictions - y;
            let grad_w = x.t().dot(&errors) / n_f;
            let grad_b = errors.sum() / n_f;

            let penalty = match self.params.penalty {
                Penalty::L1 => alpha * weights.iter().map(|w| w.abs()).sum::<f64>(),
                Penalty::L2 => 0.5 * alpha * weights.dot(&weights),
            };
            let cost = Self::log_loss(y, &predictions) + penalty;
            if !cost.is_finite() {
                return Err(ModelError::ConvergenceFailed(iter));
            }

            weights = match self.params.penalty {
                Penalty::L2 => &weights - &((&grad_w + &(&weights * alpha)) * step),
                Penalty::L1 => (&weights - &(&grad_w * step)).mapv(|w| Self::soft_threshold(w, step * alpha)),
            };
            bias -= step * grad_b;

            let converged = self
                .cost_history
                .last()
                .map(|prev| (prev - cost).abs() < self.params.tolerance)
                .unwrap_or(false);
            self.cost_history.push(cost);
            if converged {
                tracing::debug!(iter, cost, "logistic regression converged");
                break;
            }
        }

        if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
            return Err(ModelError::ConvergenceFailed(self.params.max_iter));
        }
        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let weights = self.coefficients.as_ref().ok_or(ModelError::NotFitted)?;
        let bias = self.intercept.ok_or(ModelError::NotFitted)?;
        if x.ncols() != weights.len() {
            return Err(ModelError::DimensionMismatch {
                expected: weights.len(),
                got: x.ncols(),
            });
        }
        Ok((x.dot(weights) + bias).mapv(Self::sigmoid))
    }
}
