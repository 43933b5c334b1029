use crate::data::expression::{ExpressionData, ExpressionFiles};
use crate::data::kmer::{encode_row, NUCLEOTIDES};
use crate::data::loader::{open_kmer_table, KmerTable, LoaderConfig};
use crate::data::pairs::{enumerate_pairs, GenePairs};
use crate::data::{DatasetKind, Example, Features};
use crate::config::Options;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Pure function applied to every fetched example
pub type Transform = Arc<dyn Fn(Example) -> Example + Send + Sync>;

/// Gene expression examples: every (gene, patient) cell of the matrix
#[derive(Debug, Clone)]
pub struct GeneDataset {
    data: ExpressionData,
    pairs: GenePairs,
}

impl GeneDataset {
    pub fn new(data: ExpressionData, log_transform: bool) -> Self {
        let pairs = enumerate_pairs(data.matrix(), log_transform);
        Self { data, pairs }
    }

    pub fn load(options: &Options) -> Result<Self> {
        let files = ExpressionFiles {
            matrix: options.matrix_file.clone(),
            types: options.types_file.clone(),
            subtypes: options.subtypes_file.clone(),
        };
        let data = ExpressionData::load(&options.data_dir, &files)?;
        Ok(Self::new(data, options.log_transform))
    }

    pub fn data(&self) -> &ExpressionData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn item_at(&self, index: usize) -> Result<Example> {
        match (self.pairs.pair(index), self.pairs.label(index)) {
            (Some([gene, patient]), Some(label)) => Ok(Example {
                features: Features::GenePair { gene, patient },
                label,
            }),
            _ => Err(Error::IndexOutOfRange {
                table: "gene example",
                index: index as i64,
                size: self.pairs.len(),
            }),
        }
    }

    pub fn input_size(&self) -> [usize; 2] {
        [self.data.nb_gene(), self.data.nb_patient()]
    }
}

/// K-mer examples read row by row from a k-mer count table
pub struct KmerDataset {
    table: Box<dyn KmerTable>,
}

impl KmerDataset {
    pub fn new(table: Box<dyn KmerTable>) -> Self {
        Self { table }
    }

    pub fn load(options: &Options) -> Result<Self> {
        let config = LoaderConfig {
            has_header: options.kmer_has_header,
            staging_dir: options.staging_dir.clone(),
        };
        let table = open_kmer_table(options.data_path(&options.kmer_file), &config)?;
        Ok(Self::new(Box::new(table)))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn item_at(&self, index: usize) -> Result<Example> {
        let encoded = encode_row(&self.table.row_at(index)?)?;
        Ok(Example {
            features: Features::Kmer {
                codes: encoded.codes,
                patient: encoded.patient,
            },
            label: encoded.label,
        })
    }

    /// Nucleotide alphabet size and number of patients
    pub fn input_size(&self) -> [usize; 2] {
        [NUCLEOTIDES.len(), 1]
    }
}

impl fmt::Debug for KmerDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmerDataset")
            .field("records", &self.table.len())
            .finish()
    }
}

/// Examples of either dataset kind
#[derive(Debug)]
pub enum ExampleSource {
    Gene(GeneDataset),
    Kmer(KmerDataset),
}

/// Indexed access to examples, with an optional per-item transform
pub struct DatasetAdapter {
    source: ExampleSource,
    transform: Option<Transform>,
}

impl DatasetAdapter {
    pub fn new(source: ExampleSource) -> Self {
        Self { source, transform: None }
    }

    /// Build the dataset named by `options.dataset`
    pub fn from_options(options: &Options) -> Result<Self> {
        let kind: DatasetKind = options.dataset.parse()?;
        info!("Building {} dataset", kind);

        let source = match kind {
            DatasetKind::Gene => ExampleSource::Gene(GeneDataset::load(options)?),
            DatasetKind::Kmer => ExampleSource::Kmer(KmerDataset::load(options)?),
        };
        Ok(Self::new(source))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn kind(&self) -> DatasetKind {
        match self.source {
            ExampleSource::Gene(_) => DatasetKind::Gene,
            ExampleSource::Kmer(_) => DatasetKind::Kmer,
        }
    }

    pub fn source(&self) -> &ExampleSource {
        &self.source
    }

    pub fn len(&self) -> usize {
        match &self.source {
            ExampleSource::Gene(d) => d.len(),
            ExampleSource::Kmer(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch example `index`, applying the transform if one is set
    pub fn item_at(&self, index: usize) -> Result<Example> {
        let example = match &self.source {
            ExampleSource::Gene(d) => d.item_at(index)?,
            ExampleSource::Kmer(d) => d.item_at(index)?,
        };

        Ok(match &self.transform {
            Some(transform) => transform(example),
            None => example,
        })
    }

    /// Vocabulary sizes of the two embedding tables
    pub fn input_size(&self) -> [usize; 2] {
        match &self.source {
            ExampleSource::Gene(d) => d.input_size(),
            ExampleSource::Kmer(d) => d.input_size(),
        }
    }

    /// Extra per-entity info to dump next to the embeddings
    pub fn extra_info(&self) -> BTreeMap<String, Vec<i64>> {
        match &self.source {
            ExampleSource::Gene(d) => d.data().extra_info(),
            ExampleSource::Kmer(_) => BTreeMap::new(),
        }
    }
}

impl fmt::Debug for DatasetAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetAdapter")
            .field("source", &self.source)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}
