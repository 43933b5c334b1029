use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};

/// Mean squared error between predictions and targets of the same shape
pub fn mse_loss<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    MseLoss::new().forward(predictions, targets, Reduction::Mean)
}

/// Running regression metrics on the log-transformed target scale
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Number of examples seen
    pub count: usize,
    /// Sum of squared errors
    pub sum_squared_error: f64,
    /// Sum of absolute errors
    pub sum_absolute_error: f64,
}

impl RegressionMetrics {
    /// Accumulate one batch of `[batch, 1]` predictions
    pub fn update<B: Backend>(&mut self, predictions: Tensor<B, 2>, targets: Tensor<B, 2>) {
        let count = predictions.dims()[0];

        let squared: f64 = MseLoss::new()
            .forward(predictions.clone(), targets.clone(), Reduction::Sum)
            .into_scalar()
            .elem();
        let absolute: f64 = (predictions - targets).abs().sum().into_scalar().elem();

        self.count += count;
        self.sum_squared_error += squared;
        self.sum_absolute_error += absolute;
    }

    pub fn mse(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_squared_error / self.count as f64
        }
    }

    pub fn rmse(&self) -> f64 {
        self.mse().sqrt()
    }

    pub fn mae(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_absolute_error / self.count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn column(values: &[f32]) -> Tensor<TestBackend, 2> {
        let device = <TestBackend as Backend>::Device::default();
        Tensor::<TestBackend, 1>::from_floats(values, &device).reshape([values.len(), 1])
    }

    #[test]
    fn test_mse_loss() {
        let loss = mse_loss(column(&[1.0, 2.0, 3.0]), column(&[1.0, 0.0, 6.0]));

        let value: f32 = loss.into_scalar().elem();
        assert_approx_eq!(value, (0.0 + 4.0 + 9.0) / 3.0, 1e-5);
    }

    #[test]
    fn test_metrics_accumulate() {
        let mut metrics = RegressionMetrics::default();
        metrics.update(column(&[1.0, 2.0]), column(&[0.0, 2.0]));
        metrics.update(column(&[0.0]), column(&[-2.0]));

        assert_eq!(metrics.count, 3);
        assert_approx_eq!(metrics.mse(), 5.0 / 3.0, 1e-6);
        assert_approx_eq!(metrics.mae(), 1.0, 1e-6);
        assert_approx_eq!(metrics.rmse(), (5.0f64 / 3.0).sqrt(), 1e-6);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = RegressionMetrics::default();
        assert_eq!(metrics.mse(), 0.0);
        assert_eq!(metrics.mae(), 0.0);
    }
}
