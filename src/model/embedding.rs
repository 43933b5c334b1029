use crate::error::{Error, Result};
use burn::nn::{Embedding, EmbeddingConfig};
use burn::prelude::*;
use burn::tensor::ElementConversion;

/// The two embedding tables of a factorized model
#[derive(Module, Debug)]
pub struct FactorizedEmbeddings<B: Backend> {
    /// Entity-a table (genes, or nucleotides)
    pub entity_a: Embedding<B>,
    /// Entity-b table (patients)
    pub entity_b: Embedding<B>,
}

impl<B: Backend> FactorizedEmbeddings<B> {
    pub fn new(input_size: [usize; 2], emb_size: usize, device: &B::Device) -> Self {
        Self {
            entity_a: EmbeddingConfig::new(input_size[0], emb_size).init(device),
            entity_b: EmbeddingConfig::new(input_size[1], emb_size).init(device),
        }
    }

    /// Vocabulary sizes of both tables
    pub fn input_size(&self) -> [usize; 2] {
        [
            self.entity_a.weight.val().dims()[0],
            self.entity_b.weight.val().dims()[0],
        ]
    }

    pub fn emb_size(&self) -> usize {
        self.entity_a.weight.val().dims()[1]
    }

    /// Embed `[batch, n]` ids of entity a into `[batch, n, emb]`
    fn lookup_a(&self, ids: Tensor<B, 2, Int>) -> Result<Tensor<B, 3>> {
        check_ids(&ids, self.input_size()[0], "entity-a")?;
        Ok(self.entity_a.forward(ids))
    }

    /// Embed `[batch, n]` ids of entity b into `[batch, n, emb]`
    fn lookup_b(&self, ids: Tensor<B, 2, Int>) -> Result<Tensor<B, 3>> {
        check_ids(&ids, self.input_size()[1], "entity-b")?;
        Ok(self.entity_b.forward(ids))
    }
}

/// Fail if any id falls outside `[0, size)`
fn check_ids<B: Backend>(ids: &Tensor<B, 2, Int>, size: usize, table: &'static str) -> Result<()> {
    if ids.dims().contains(&0) {
        return Ok(());
    }

    let min = ids.clone().min().into_scalar().elem::<i64>();
    let max = ids.clone().max().into_scalar().elem::<i64>();

    let index = if min < 0 {
        min
    } else if max >= size as i64 {
        max
    } else {
        return Ok(());
    };

    Err(Error::IndexOutOfRange { table, index, size })
}

/// Turns a batch of feature rows into one vector per entity
pub trait EmbeddingLookup {
    /// Returns `[batch, emb]` vectors for entity a and entity b
    fn embed<B: Backend>(
        &self,
        tables: &FactorizedEmbeddings<B>,
        features: Tensor<B, 2, Int>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>)>;
}

/// Rows are `[entity_a, entity_b]`; one lookup per entity
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleLookup;

impl EmbeddingLookup for SingleLookup {
    fn embed<B: Backend>(
        &self,
        tables: &FactorizedEmbeddings<B>,
        features: Tensor<B, 2, Int>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        let [batch, width] = features.dims();
        if width != 2 {
            return Err(Error::ShapeMismatch(format!(
                "expected 2 ids per example, got {}",
                width
            )));
        }
        let emb = tables.emb_size();

        let a = tables.lookup_a(features.clone().slice([0..batch, 0..1]))?;
        let b = tables.lookup_b(features.slice([0..batch, 1..2]))?;

        Ok((a.reshape([batch, emb]), b.reshape([batch, emb])))
    }
}

/// Rows are `[a_0, .., a_{k-1}, entity_b]`; the embeddings of the entity-a
/// sequence are summed, so the result ignores their order
#[derive(Debug, Clone, Copy, Default)]
pub struct BagLookup;

impl EmbeddingLookup for BagLookup {
    fn embed<B: Backend>(
        &self,
        tables: &FactorizedEmbeddings<B>,
        features: Tensor<B, 2, Int>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        let [batch, width] = features.dims();
        if width < 2 {
            return Err(Error::ShapeMismatch(format!(
                "expected a sequence and a patient id per example, got width {}",
                width
            )));
        }
        let emb = tables.emb_size();

        let sequence = tables.lookup_a(features.clone().slice([0..batch, 0..width - 1]))?;
        let patient = tables.lookup_b(features.slice([0..batch, width - 1..width]))?;

        Ok((
            sequence.sum_dim(1).reshape([batch, emb]),
            patient.sum_dim(1).reshape([batch, emb]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn ids(rows: &[i64], width: usize) -> Tensor<TestBackend, 2, Int> {
        let device = <TestBackend as Backend>::Device::default();
        Tensor::from_data(TensorData::new(rows.to_vec(), [rows.len() / width, width]), &device)
    }

    fn tables(input_size: [usize; 2], emb_size: usize) -> FactorizedEmbeddings<TestBackend> {
        let device = <TestBackend as Backend>::Device::default();
        FactorizedEmbeddings::new(input_size, emb_size, &device)
    }

    #[test]
    fn test_table_sizes() {
        let tables = tables([30, 7], 3);
        assert_eq!(tables.input_size(), [30, 7]);
        assert_eq!(tables.emb_size(), 3);
    }

    #[test]
    fn test_single_lookup_shapes() {
        let tables = tables([5, 3], 4);
        let (a, b) = SingleLookup.embed(&tables, ids(&[0, 0, 4, 2, 1, 1], 2)).unwrap();

        assert_eq!(a.dims(), [3, 4]);
        assert_eq!(b.dims(), [3, 4]);
    }

    #[test]
    fn test_single_lookup_out_of_range() {
        let tables = tables([5, 3], 4);

        match SingleLookup.embed(&tables, ids(&[5, 0], 2)) {
            Err(Error::IndexOutOfRange { table, index, size }) => {
                assert_eq!(table, "entity-a");
                assert_eq!(index, 5);
                assert_eq!(size, 5);
            }
            other => panic!("Expected IndexOutOfRange, got {:?}", other.map(|_| ())),
        }

        assert!(matches!(
            SingleLookup.embed(&tables, ids(&[1, 3], 2)),
            Err(Error::IndexOutOfRange { table: "entity-b", .. })
        ));
        assert!(matches!(
            SingleLookup.embed(&tables, ids(&[-1, 0], 2)),
            Err(Error::IndexOutOfRange { index: -1, .. })
        ));
    }

    #[test]
    fn test_single_lookup_rejects_wide_rows() {
        let tables = tables([5, 3], 4);
        assert!(matches!(
            SingleLookup.embed(&tables, ids(&[0, 1, 2], 3)),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_bag_lookup_sums_sequence() {
        let tables = tables([4, 1], 3);
        let (a, b) = BagLookup.embed(&tables, ids(&[0, 1, 2, 3, 0, 2, 2, 2, 2, 0], 5)).unwrap();

        assert_eq!(a.dims(), [2, 3]);
        assert_eq!(b.dims(), [2, 3]);

        let weights = tables.entity_a.weight.val();
        let expected = weights.clone().slice([2..3, 0..3]).mul_scalar(4.0);
        let second = a.slice([1..2, 0..3]);

        let diff: f32 = (second - expected).abs().max().into_scalar().elem();
        assert!(diff < 1e-5);
    }
}
