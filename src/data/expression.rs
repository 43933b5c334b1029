use crate::error::{Error, Result};
use ndarray::{Array1, Array2};
use ndarray_npy::{read_npy, ReadNpyError};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File names of the three arrays making up an expression dataset
#[derive(Debug, Clone)]
pub struct ExpressionFiles {
    /// Gene x patient expression matrix
    pub matrix: String,
    /// Tissue type per patient
    pub types: String,
    /// Tissue subtype per patient
    pub subtypes: String,
}

impl Default for ExpressionFiles {
    fn default() -> Self {
        Self {
            matrix: "30by30_dataset.npy".to_string(),
            types: "30by30_types.npy".to_string(),
            subtypes: "30by30_subtypes.npy".to_string(),
        }
    }
}

/// Gene expression matrix with its per-patient labels.
///
/// Rows are genes, columns are patients. The arrays are never mutated once
/// loaded.
#[derive(Debug, Clone)]
pub struct ExpressionData {
    matrix: Array2<f64>,
    types: Array1<i64>,
    subtypes: Array1<i64>,
}

impl ExpressionData {
    /// Build from in-memory arrays, checking label lengths and cell values
    pub fn new(matrix: Array2<f64>, types: Array1<i64>, subtypes: Array1<i64>) -> Result<Self> {
        let nb_patient = matrix.ncols();

        if types.len() != nb_patient {
            return Err(Error::ShapeMismatch(format!(
                "type labels have {} entries, matrix has {} patients",
                types.len(),
                nb_patient
            )));
        }
        if subtypes.len() != nb_patient {
            return Err(Error::ShapeMismatch(format!(
                "subtype labels have {} entries, matrix has {} patients",
                subtypes.len(),
                nb_patient
            )));
        }

        if let Some(((gene, patient), &value)) = matrix
            .indexed_iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(Error::InvalidValue { gene, patient, value });
        }

        Ok(Self { matrix, types, subtypes })
    }

    /// Load the matrix and both label vectors from `.npy` files under `root_dir`
    pub fn load<P: AsRef<Path>>(root_dir: P, files: &ExpressionFiles) -> Result<Self> {
        let root_dir = root_dir.as_ref();
        info!("Loading expression data from {:?}", root_dir);

        let matrix = read_array(root_dir.join(&files.matrix), read_matrix)?;
        let types = read_array(root_dir.join(&files.types), read_labels)?;
        let subtypes = read_array(root_dir.join(&files.subtypes), read_labels)?;

        debug!(
            "Matrix shape: {:?}, {} type labels, {} subtype labels",
            matrix.shape(),
            types.len(),
            subtypes.len()
        );

        let data = Self::new(matrix, types, subtypes)?;
        info!(
            "Loaded {} genes x {} patients ({} tissues)",
            data.nb_gene(),
            data.nb_patient(),
            data.nb_tissue()
        );
        Ok(data)
    }

    /// Number of genes (matrix rows)
    pub fn nb_gene(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of patients (matrix columns)
    pub fn nb_patient(&self) -> usize {
        self.matrix.ncols()
    }

    /// Number of distinct tissue types
    pub fn nb_tissue(&self) -> usize {
        self.types.iter().collect::<HashSet<_>>().len()
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn types(&self) -> &Array1<i64> {
        &self.types
    }

    pub fn subtypes(&self) -> &Array1<i64> {
        &self.subtypes
    }

    /// Per-patient labels to store alongside exported embeddings
    pub fn extra_info(&self) -> BTreeMap<String, Vec<i64>> {
        let mut info = BTreeMap::new();
        info.insert("type".to_string(), self.types.to_vec());
        info.insert("subtype".to_string(), self.subtypes.to_vec());
        info
    }
}

type NpyResult<T> = std::result::Result<T, ReadNpyError>;

fn read_array<T>(path: PathBuf, read: fn(&Path) -> NpyResult<T>) -> Result<T> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path));
    }
    debug!("Reading {:?}", path);
    read(&path).map_err(|source| Error::Npy { path, source })
}

/// Try the next element type when the stored dtype does not match
fn on_wrong_dtype<T>(err: ReadNpyError, read: impl FnOnce() -> NpyResult<T>) -> NpyResult<T> {
    match err {
        ReadNpyError::WrongDescriptor(_) => read(),
        other => Err(other),
    }
}

/// Expression matrix of any float or integer dtype, widened to `f64`
fn read_matrix(path: &Path) -> NpyResult<Array2<f64>> {
    read_npy::<_, Array2<f64>>(path)
        .or_else(|e| on_wrong_dtype(e, || read_npy::<_, Array2<f32>>(path).map(|a| a.mapv(f64::from))))
        .or_else(|e| on_wrong_dtype(e, || read_npy::<_, Array2<i64>>(path).map(|a| a.mapv(|v| v as f64))))
        .or_else(|e| on_wrong_dtype(e, || read_npy::<_, Array2<i32>>(path).map(|a| a.mapv(f64::from))))
}

/// Label vector of any integer dtype, or integral floats, as `i64`
fn read_labels(path: &Path) -> NpyResult<Array1<i64>> {
    read_npy::<_, Array1<i64>>(path)
        .or_else(|e| on_wrong_dtype(e, || read_npy::<_, Array1<i32>>(path).map(|a| a.mapv(i64::from))))
        .or_else(|e| on_wrong_dtype(e, || read_npy::<_, Array1<f64>>(path).map(|a| a.mapv(|v| v as i64))))
        .or_else(|e| on_wrong_dtype(e, || read_npy::<_, Array1<f32>>(path).map(|a| a.mapv(|v| v as i64))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::write_npy;
    use tempfile::TempDir;

    fn write_dataset(dir: &Path, types: Array1<i64>) {
        let files = ExpressionFiles::default();
        write_npy(dir.join(&files.matrix), &array![[1.0, 9.0, 4.0], [0.0, 99.0, 2.0]]).unwrap();
        write_npy(dir.join(&files.types), &types).unwrap();
        write_npy(dir.join(&files.subtypes), &array![0i64, 1, 2]).unwrap();
    }

    #[test]
    fn test_load_counts() {
        let temp_dir = TempDir::new().unwrap();
        write_dataset(temp_dir.path(), array![3i64, 3, 7]);

        let data = ExpressionData::load(temp_dir.path(), &ExpressionFiles::default()).unwrap();

        assert_eq!(data.nb_gene(), 2);
        assert_eq!(data.nb_patient(), 3);
        assert_eq!(data.nb_tissue(), 2);
        assert_eq!(data.extra_info()["type"], vec![3, 3, 7]);
        assert_eq!(data.extra_info()["subtype"], vec![0, 1, 2]);
    }

    #[test]
    fn test_load_narrow_dtypes() {
        let temp_dir = TempDir::new().unwrap();
        let files = ExpressionFiles::default();
        write_npy(temp_dir.path().join(&files.matrix), &array![[1.0f32, 9.0], [0.0, 99.0]]).unwrap();
        write_npy(temp_dir.path().join(&files.types), &array![0i32, 1]).unwrap();
        write_npy(temp_dir.path().join(&files.subtypes), &array![2.0f64, 5.0]).unwrap();

        let data = ExpressionData::load(temp_dir.path(), &files).unwrap();

        assert_eq!(data.nb_gene(), 2);
        assert_eq!(data.nb_patient(), 2);
        assert_eq!(data.matrix(), &array![[1.0, 9.0], [0.0, 99.0]]);
        assert_eq!(data.types(), &array![0i64, 1]);
        assert_eq!(data.subtypes(), &array![2i64, 5]);
    }

    #[test]
    fn test_unsupported_dtype() {
        let temp_dir = TempDir::new().unwrap();
        let files = ExpressionFiles::default();
        write_npy(temp_dir.path().join(&files.matrix), &array![[true, false]]).unwrap();
        write_npy(temp_dir.path().join(&files.types), &array![0i64, 1]).unwrap();
        write_npy(temp_dir.path().join(&files.subtypes), &array![0i64, 1]).unwrap();

        let err = ExpressionData::load(temp_dir.path(), &files).unwrap_err();
        assert!(matches!(err, Error::Npy { .. }));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ExpressionData::load(temp_dir.path(), &ExpressionFiles::default()).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_label_length_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        write_dataset(temp_dir.path(), array![1i64, 2]);

        let err = ExpressionData::load(temp_dir.path(), &ExpressionFiles::default()).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    #[test]
    fn test_negative_value_rejected() {
        let err = ExpressionData::new(
            array![[1.0, -2.0]],
            array![0i64, 0],
            array![0i64, 0],
        )
        .unwrap_err();

        assert!(matches!(err, Error::InvalidValue { gene: 0, patient: 1, .. }));
    }
}
