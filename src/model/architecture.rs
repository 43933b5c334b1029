use crate::error::{Error, Result};
use crate::model::embedding::{BagLookup, EmbeddingLookup, FactorizedEmbeddings, SingleLookup};
use crate::model::loss::mse_loss;
use crate::model::{ModelConfig, ModelKind};
use burn::module::Ignored;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::tanh;

/// Factorized MLP: two embedding tables feeding a tanh MLP with a scalar output
#[derive(Module, Debug)]
pub struct FactorizedMlp<B: Backend> {
    /// Entity embedding tables
    embeddings: FactorizedEmbeddings<B>,
    /// Hidden layers, each followed by tanh
    hidden: Vec<Linear<B>>,
    /// Output layer
    output: Linear<B>,
    /// How feature rows are turned into embeddings
    kind: Ignored<ModelKind>,
}

/// Forward output with its loss, for callers driving an optimizer
#[derive(Debug)]
pub struct RegressionOutput<B: Backend> {
    pub loss: Tensor<B, 1>,
    pub predictions: Tensor<B, 2>,
    pub targets: Tensor<B, 2>,
}

impl<B: Backend> FactorizedMlp<B> {
    /// Embeddings of both entities, `[batch, emb]` each
    pub fn embed(&self, features: Tensor<B, 2, Int>) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        match self.kind.0 {
            ModelKind::Factor => SingleLookup.embed(&self.embeddings, features),
            ModelKind::Bag => BagLookup.embed(&self.embeddings, features),
        }
    }

    /// Predict one log-scale scalar per feature row; output is `[batch, 1]`
    pub fn forward(&self, features: Tensor<B, 2, Int>) -> Result<Tensor<B, 2>> {
        if features.dims()[0] == 0 {
            return Err(Error::ShapeMismatch("empty batch".to_string()));
        }

        let (emb_a, emb_b) = self.embed(features)?;
        let mut x = Tensor::cat(vec![emb_a, emb_b], 1);

        for layer in &self.hidden {
            x = tanh(layer.forward(x));
        }

        Ok(self.output.forward(x))
    }

    /// Forward pass with mean squared error against `targets` (`[batch, 1]`)
    pub fn forward_regression(
        &self,
        features: Tensor<B, 2, Int>,
        targets: Tensor<B, 2>,
    ) -> Result<RegressionOutput<B>> {
        let predictions = self.forward(features)?;
        if predictions.dims() != targets.dims() {
            return Err(Error::ShapeMismatch(format!(
                "targets {:?} do not match predictions {:?}",
                targets.dims(),
                predictions.dims()
            )));
        }

        let loss = mse_loss(predictions.clone(), targets.clone());
        Ok(RegressionOutput { loss, predictions, targets })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind.0
    }

    pub fn embeddings(&self) -> &FactorizedEmbeddings<B> {
        &self.embeddings
    }

    /// Hidden layer widths, in order
    pub fn layers_size(&self) -> Vec<usize> {
        self.hidden
            .iter()
            .map(|layer| layer.weight.val().dims()[1])
            .collect()
    }
}

impl ModelConfig {
    /// Initialize a model from this configuration
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<FactorizedMlp<B>> {
        self.validate()?;

        let embeddings = FactorizedEmbeddings::new(self.input_size, self.emb_size, device);

        let mut sizes = vec![self.mlp_input_size()];
        sizes.extend(&self.layers_size);

        let hidden = sizes
            .windows(2)
            .map(|pair| LinearConfig::new(pair[0], pair[1]).with_bias(true).init(device))
            .collect();

        let last = *sizes.last().unwrap_or(&self.mlp_input_size());
        let output = LinearConfig::new(last, 1).with_bias(true).init(device);

        Ok(FactorizedMlp {
            embeddings,
            hidden,
            output,
            kind: Ignored(self.kind),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::ElementConversion;

    type TestBackend = NdArray<f32>;

    fn device() -> <TestBackend as Backend>::Device {
        <TestBackend as Backend>::Device::default()
    }

    fn ids(rows: &[i64], width: usize) -> Tensor<TestBackend, 2, Int> {
        Tensor::from_data(TensorData::new(rows.to_vec(), [rows.len() / width, width]), &device())
    }

    #[test]
    fn test_model_forward_shape() {
        for layers_size in [vec![150, 100, 75, 50, 25, 10], vec![3], vec![8, 8], vec![]] {
            let model = ModelConfig::new([6, 4], layers_size.clone())
                .with_emb_size(3)
                .init::<TestBackend>(&device())
                .unwrap();

            let output = model.forward(ids(&[0, 0, 5, 3, 2, 1, 4, 2, 1, 0], 2)).unwrap();

            assert_eq!(output.dims(), [5, 1]);
            assert_eq!(model.layers_size(), layers_size);
        }
    }

    #[test]
    fn test_bag_model_forward_shape() {
        let model = ModelConfig::new([4, 1], vec![16, 8])
            .with_kind(ModelKind::Bag)
            .init::<TestBackend>(&device())
            .unwrap();

        let output = model.forward(ids(&[0, 1, 2, 3, 0, 3, 3, 1, 0, 0], 5)).unwrap();

        assert_eq!(output.dims(), [2, 1]);
        assert_eq!(model.kind(), ModelKind::Bag);
    }

    #[test]
    fn test_bag_model_permutation_invariant() {
        let model = ModelConfig::new([4, 1], vec![10, 5])
            .with_emb_size(4)
            .with_kind(ModelKind::Bag)
            .init::<TestBackend>(&device())
            .unwrap();

        let output = model
            .forward(ids(
                &[
                    0, 1, 2, 3, 3, 0, //
                    3, 3, 2, 1, 0, 0, //
                    1, 3, 0, 3, 2, 0,
                ],
                6,
            ))
            .unwrap();
        let values = output.into_data().convert::<f32>().to_vec::<f32>().unwrap();

        assert!((values[0] - values[1]).abs() < 1e-5);
        assert!((values[0] - values[2]).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_range_ids() {
        let model = ModelConfig::new([3, 2], vec![4])
            .init::<TestBackend>(&device())
            .unwrap();

        assert!(matches!(
            model.forward(ids(&[3, 0], 2)),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            model.forward(ids(&[0, 2], 2)),
            Err(Error::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_forward_regression_loss() {
        let model = ModelConfig::new([3, 2], vec![4])
            .init::<TestBackend>(&device())
            .unwrap();
        let targets = Tensor::<TestBackend, 2>::zeros([2, 1], &device());

        let output = model.forward_regression(ids(&[0, 0, 2, 1], 2), targets).unwrap();

        assert_eq!(output.predictions.dims(), [2, 1]);
        let loss: f32 = output.loss.into_scalar().elem();
        assert!(loss >= 0.0);

        let wrong = Tensor::<TestBackend, 2>::zeros([3, 1], &device());
        assert!(model.forward_regression(ids(&[0, 0, 2, 1], 2), wrong).is_err());
    }

    #[test]
    fn test_invalid_config() {
        assert!(ModelConfig::new([0, 2], vec![4])
            .init::<TestBackend>(&device())
            .is_err());
    }
}
