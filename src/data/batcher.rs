use crate::config::Options;
use crate::data::{DatasetAdapter, Example};
use crate::error::{Error, Result};
use crate::utils::random::seeded_rng;
use burn::prelude::*;
use burn::tensor::TensorData;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{debug, info};

/// A batch of examples on a device
#[derive(Debug, Clone)]
pub struct ExampleBatch<B: Backend> {
    /// Feature rows, `[batch_size, width]`
    pub features: Tensor<B, 2, Int>,
    /// Targets, `[batch_size, 1]`
    pub targets: Tensor<B, 2>,
}

/// Stack examples into tensors; every example must have the same feature width
pub fn collate<B: Backend>(examples: &[Example], device: &B::Device) -> Result<ExampleBatch<B>> {
    let first = examples
        .first()
        .ok_or_else(|| Error::ShapeMismatch("cannot collate an empty batch".to_string()))?;
    let width = first.features.width();

    let mut rows = Vec::with_capacity(examples.len() * width);
    let mut targets = Vec::with_capacity(examples.len());

    for example in examples {
        if example.features.width() != width {
            return Err(Error::ShapeMismatch(format!(
                "feature width {} differs from batch width {}",
                example.features.width(),
                width
            )));
        }
        rows.extend(example.features.to_row());
        targets.push(example.label);
    }

    let batch_size = examples.len();
    Ok(ExampleBatch {
        features: Tensor::from_data(TensorData::new(rows, [batch_size, width]), device),
        targets: Tensor::from_data(TensorData::new(targets, [batch_size, 1]), device),
    })
}

/// Batching, shuffling loader over a [`DatasetAdapter`].
///
/// Items of a batch are fetched on a pool of `num_workers` threads; with zero
/// workers they are fetched on the calling thread. Workers only read the adapter.
pub struct BatchLoader {
    dataset: Arc<DatasetAdapter>,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
    pool: Option<ThreadPool>,
}

impl BatchLoader {
    pub fn new(dataset: DatasetAdapter, batch_size: usize) -> Self {
        Self {
            dataset: Arc::new(dataset),
            batch_size: batch_size.max(1),
            shuffle: false,
            seed: 0,
            pool: None,
        }
    }

    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    pub fn with_num_workers(mut self, num_workers: usize) -> Result<Self> {
        self.pool = match num_workers {
            0 => None,
            n => Some(
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("fembed-loader-{}", i))
                    .build()?,
            ),
        };
        Ok(self)
    }

    pub fn dataset(&self) -> &DatasetAdapter {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches per epoch
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Example order for `epoch`; deterministic for a given seed and epoch
    pub fn epoch_order(&self, epoch: u64) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            let mut rng = seeded_rng(self.seed.wrapping_add(epoch));
            order.shuffle(&mut rng);
        }
        order
    }

    /// Iterate over the batches of one epoch
    pub fn batches(&self, epoch: u64) -> Batches<'_> {
        let order = self.epoch_order(epoch);
        debug!(
            "Epoch {}: {} examples in {} batches",
            epoch,
            order.len(),
            self.num_batches()
        );
        Batches { loader: self, order, cursor: 0 }
    }

    fn fetch(&self, indices: &[usize]) -> Result<Vec<Example>> {
        match &self.pool {
            Some(pool) => pool.install(|| {
                indices
                    .par_iter()
                    .map(|&i| self.dataset.item_at(i))
                    .collect()
            }),
            None => indices.iter().map(|&i| self.dataset.item_at(i)).collect(),
        }
    }
}

/// Batches of one epoch; an item failure ends the batch with an error
pub struct Batches<'a> {
    loader: &'a BatchLoader,
    order: Vec<usize>,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Vec<Example>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(self.order.len());
        let indices = &self.order[self.cursor..end];
        self.cursor = end;
        Some(self.loader.fetch(indices))
    }
}

/// Build the dataset named in `options` and wrap it in a batch loader
pub fn get_dataset(options: &Options) -> Result<BatchLoader> {
    options.validate()?;

    let dataset = DatasetAdapter::from_options(options)?;
    info!(
        "Dataset ready: {} examples, input size {:?}",
        dataset.len(),
        dataset.input_size()
    );

    let loader = BatchLoader::new(dataset, options.batch_size)
        .with_num_workers(options.num_workers)?;

    Ok(if options.shuffle {
        loader.with_shuffle(options.seed)
    } else {
        loader
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{ExampleSource, GeneDataset};
    use crate::data::expression::ExpressionData;
    use crate::data::Features;
    use burn::backend::NdArray;
    use ndarray::{Array1, Array2};
    use std::collections::HashSet;

    type TestBackend = NdArray<f32>;

    fn gene_loader(nb_gene: usize, nb_patient: usize, batch_size: usize) -> BatchLoader {
        let matrix = Array2::from_shape_fn((nb_gene, nb_patient), |(g, p)| (g + p) as f64);
        let labels = Array1::zeros(nb_patient);
        let data = ExpressionData::new(matrix, labels.clone(), labels).unwrap();
        let adapter = DatasetAdapter::new(ExampleSource::Gene(GeneDataset::new(data, true)));
        BatchLoader::new(adapter, batch_size)
    }

    #[test]
    fn test_batches_cover_every_example() {
        let loader = gene_loader(7, 3, 4).with_num_workers(2).unwrap().with_shuffle(7);

        assert_eq!(loader.num_batches(), 6);

        let batches: Vec<Vec<Example>> = loader.batches(0).collect::<Result<_>>().unwrap();
        assert_eq!(batches.len(), 6);
        assert_eq!(batches.last().unwrap().len(), 1);

        let seen: HashSet<_> = batches
            .iter()
            .flatten()
            .map(|e| e.features.to_row())
            .collect();
        assert_eq!(seen.len(), 21);
    }

    #[test]
    fn test_shuffle_is_reproducible() {
        let loader = gene_loader(10, 10, 8).with_shuffle(42);

        assert_eq!(loader.epoch_order(3), loader.epoch_order(3));
        assert_ne!(loader.epoch_order(0), loader.epoch_order(1));

        let unshuffled = gene_loader(10, 10, 8);
        assert_eq!(unshuffled.epoch_order(0), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_collate_shapes() {
        let device = <TestBackend as Backend>::Device::default();
        let examples = vec![
            Example { features: Features::Kmer { codes: vec![0, 1, 2], patient: 0 }, label: 1.0 },
            Example { features: Features::Kmer { codes: vec![3, 3, 1], patient: 0 }, label: 2.0 },
        ];

        let batch = collate::<TestBackend>(&examples, &device).unwrap();

        assert_eq!(batch.features.dims(), [2, 4]);
        assert_eq!(batch.targets.dims(), [2, 1]);
        assert_eq!(
            batch.features.into_data().convert::<i64>().to_vec::<i64>().unwrap(),
            vec![0, 1, 2, 0, 3, 3, 1, 0]
        );
    }

    #[test]
    fn test_collate_rejects_mixed_widths() {
        let device = <TestBackend as Backend>::Device::default();
        let examples = vec![
            Example { features: Features::Kmer { codes: vec![0, 1], patient: 0 }, label: 1.0 },
            Example { features: Features::Kmer { codes: vec![0], patient: 0 }, label: 1.0 },
        ];

        assert!(matches!(
            collate::<TestBackend>(&examples, &device),
            Err(Error::ShapeMismatch(_))
        ));
        assert!(collate::<TestBackend>(&[], &device).is_err());
    }

    #[test]
    fn test_get_dataset_rejects_unknown_tag() {
        let options = Options { dataset: "rna".to_string(), ..Options::default() };
        assert!(matches!(
            get_dataset(&options),
            Err(Error::UnsupportedConfiguration(_))
        ));
    }
}
