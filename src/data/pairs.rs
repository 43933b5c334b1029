use ndarray::Array2;
use tracing::info;

/// Dense (gene, patient) -> value examples enumerated from a matrix.
///
/// Example `i` covers gene `i % nb_gene` and patient `i / nb_gene`: all genes
/// of patient 0 come first, then all genes of patient 1, and so on.
#[derive(Debug, Clone, PartialEq)]
pub struct GenePairs {
    indices: Vec<[usize; 2]>,
    labels: Vec<f32>,
}

impl GenePairs {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// `[gene, patient]` index pair of example `idx`
    pub fn pair(&self, idx: usize) -> Option<[usize; 2]> {
        self.indices.get(idx).copied()
    }

    pub fn label(&self, idx: usize) -> Option<f32> {
        self.labels.get(idx).copied()
    }

    pub fn indices(&self) -> &[[usize; 2]] {
        &self.indices
    }

    pub fn labels(&self) -> &[f32] {
        &self.labels
    }
}

/// log10(value + 1); defined at zero
pub fn log_expression(value: f64) -> f32 {
    (value + 1.0).log10() as f32
}

/// Expand every cell of `matrix` into one example.
///
/// Always yields exactly `rows * cols` examples covering the full cross product
/// of row and column indices.
pub fn enumerate_pairs(matrix: &Array2<f64>, log_transform: bool) -> GenePairs {
    let (nb_gene, nb_patient) = matrix.dim();
    let total = nb_gene * nb_patient;

    let mut indices = Vec::with_capacity(total);
    let mut labels = Vec::with_capacity(total);

    for patient in 0..nb_patient {
        for gene in 0..nb_gene {
            let value = matrix[[gene, patient]];
            indices.push([gene, patient]);
            labels.push(if log_transform {
                log_expression(value)
            } else {
                value as f32
            });
        }
    }

    info!("Total number of examples: {}", total);
    GenePairs { indices, labels }
}
