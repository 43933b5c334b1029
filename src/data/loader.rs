use crate::data::kmer::KmerRow;
use crate::data::staging::{ensure_staged, is_gzipped};
use crate::error::{Error, Result};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Supported k-mer table formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Tsv,
}

impl FileFormat {
    /// Detect file format from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => Ok(FileFormat::Csv),
            Some("tsv") | Some("txt") => Ok(FileFormat::Tsv),
            Some("gz") => Err(Error::UnsupportedConfiguration(format!(
                "Gzipped table {:?} cannot be read at random; set a staging directory",
                path
            ))),
            _ => Err(Error::UnsupportedConfiguration(format!(
                "Unsupported table format: {:?}",
                path
            ))),
        }
    }

    /// Get delimiter character
    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv => b',',
            FileFormat::Tsv => b'\t',
        }
    }
}

/// K-mer table loader configuration
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Whether the table starts with a header line
    pub has_header: bool,
    /// Directory the table is staged into before opening
    pub staging_dir: Option<PathBuf>,
}

/// Row-addressable view of a k-mer count table.
///
/// Implementations must not assume the whole table fits in memory.
pub trait KmerTable: Send + Sync {
    /// Number of rows
    fn len(&self) -> usize;

    /// Parse row `index`
    fn row_at(&self, index: usize) -> Result<KmerRow>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// K-mer table backed by a memory-mapped CSV/TSV file.
///
/// Only the byte offset of every row is kept in memory; rows are parsed on
/// demand. The first column is the k-mer, the last one its count. An empty
/// file is a table of length 0 and is not mapped.
pub struct MappedKmerTable {
    path: PathBuf,
    mmap: Option<Mmap>,
    offsets: Vec<u64>,
    delimiter: u8,
}

impl MappedKmerTable {
    /// Open `path`, indexing row offsets
    pub fn open<P: AsRef<Path>>(path: P, has_header: bool) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        let format = FileFormat::from_path(path)?;
        debug!("Detected table format: {:?}", format);

        let file = File::open(path)?;
        let mmap = if file.metadata()?.len() == 0 {
            warn!("K-mer table {:?} is empty", path);
            None
        } else {
            // SAFETY: the table is opened read-only and never modified while mapped.
            Some(unsafe { Mmap::map(&file)? })
        };

        let offsets = match &mmap {
            Some(mmap) => index_rows(mmap, format.delimiter(), has_header)?,
            None => Vec::new(),
        };
        info!("Indexed {} k-mer records in {:?}", offsets.len(), path);

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            offsets,
            delimiter: format.delimiter(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or_default()
    }

    fn parse_row(&self, index: usize, record: &StringRecord) -> Result<KmerRow> {
        let invalid = |reason: String| Error::InvalidRecord { row: index, reason };

        if record.len() < 2 {
            return Err(invalid(format!("expected at least 2 columns, got {}", record.len())));
        }

        let kmer = record.get(0).unwrap_or_default().trim().to_string();
        let count_field = record.get(record.len() - 1).unwrap_or_default().trim();
        let count = count_field
            .parse::<u64>()
            .map_err(|_| invalid(format!("count {:?} is not a non-negative integer", count_field)))?;

        Ok(KmerRow { kmer, count })
    }
}

impl KmerTable for MappedKmerTable {
    fn len(&self) -> usize {
        self.offsets.len()
    }

    fn row_at(&self, index: usize) -> Result<KmerRow> {
        let start = *self.offsets.get(index).ok_or_else(|| Error::IndexOutOfRange {
            table: "k-mer record",
            index: index as i64,
            size: self.offsets.len(),
        })? as usize;
        let end = self
            .offsets
            .get(index + 1)
            .map(|&o| o as usize)
            .unwrap_or(self.bytes().len());

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(&self.bytes()[start..end]);

        let mut record = StringRecord::new();
        if !reader.read_record(&mut record)? {
            return Err(Error::InvalidRecord {
                row: index,
                reason: "row is empty".to_string(),
            });
        }

        self.parse_row(index, &record)
    }
}

impl fmt::Debug for MappedKmerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedKmerTable")
            .field("path", &self.path)
            .field("records", &self.offsets.len())
            .finish()
    }
}

fn index_rows(bytes: &[u8], delimiter: u8, has_header: bool) -> Result<Vec<u64>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_header)
        .flexible(true)
        .from_reader(bytes);

    let mut offsets = Vec::new();
    let mut record = ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        let position = record.position().ok_or_else(|| Error::InvalidRecord {
            row: offsets.len(),
            reason: "record has no position".to_string(),
        })?;
        offsets.push(position.byte());
    }

    Ok(offsets)
}

/// Open the k-mer table at `source`, staging it first when configured
pub fn open_kmer_table<P: AsRef<Path>>(source: P, config: &LoaderConfig) -> Result<MappedKmerTable> {
    let source = source.as_ref();

    let path = match &config.staging_dir {
        Some(staging_dir) => ensure_staged(source, staging_dir)?,
        None if is_gzipped(source) => {
            return Err(Error::UnsupportedConfiguration(format!(
                "Gzipped table {:?} requires a staging directory",
                source
            )))
        }
        None => source.to_path_buf(),
    };

    MappedKmerTable::open(path, config.has_header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_table(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_file_format_detection() {
        assert_eq!(FileFormat::from_path("kmers.csv").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path("kmers.tsv").unwrap(), FileFormat::Tsv);
        assert_eq!(FileFormat::from_path("kmers.txt").unwrap(), FileFormat::Tsv);
        assert!(FileFormat::from_path("kmers.tsv.gz").is_err());
        assert!(FileFormat::from_path("kmers.hdf5").is_err());
    }

    #[test]
    fn test_random_access_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_table(temp_dir.path(), "kmers.tsv", "ACGT\t3\nTTGA\t0\nGGCC\t12");

        let table = MappedKmerTable::open(&path, false).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.row_at(2).unwrap(), KmerRow { kmer: "GGCC".into(), count: 12 });
        assert_eq!(table.row_at(0).unwrap(), KmerRow { kmer: "ACGT".into(), count: 3 });
        assert_eq!(table.row_at(1).unwrap().count, 0);
        assert!(matches!(table.row_at(3), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_header_and_extra_columns() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_table(
            temp_dir.path(),
            "kmers.csv",
            "kmer,sample,count\nAAC,s1,5\nCAT,s1,7\n",
        );

        let table = MappedKmerTable::open(&path, true).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.row_at(1).unwrap(), KmerRow { kmer: "CAT".into(), count: 7 });
    }

    #[test]
    fn test_invalid_count() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_table(temp_dir.path(), "kmers.tsv", "ACGT\t-3\nACGT\tx\n");

        let table = MappedKmerTable::open(&path, false).unwrap();

        assert!(matches!(table.row_at(0), Err(Error::InvalidRecord { row: 0, .. })));
        assert!(matches!(table.row_at(1), Err(Error::InvalidRecord { row: 1, .. })));
    }

    #[test]
    fn test_open_with_staging() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_table(temp_dir.path(), "kmers.tsv", "ACGT\t3\n");
        let config = LoaderConfig {
            has_header: false,
            staging_dir: Some(temp_dir.path().join("local")),
        };

        let table = open_kmer_table(&source, &config).unwrap();

        assert_eq!(table.path(), temp_dir.path().join("local").join("kmers.tsv"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_empty_table() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_table(temp_dir.path(), "kmers.tsv", "");

        let table = MappedKmerTable::open(&path, false).unwrap();

        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        assert!(matches!(table.row_at(0), Err(Error::IndexOutOfRange { index: 0, size: 0, .. })));
    }

    #[test]
    fn test_header_only_table() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_table(temp_dir.path(), "kmers.csv", "kmer,count\n");

        let table = MappedKmerTable::open(&path, true).unwrap();

        assert!(table.is_empty());
    }

    #[test]
    fn test_missing_table() {
        let err = open_kmer_table("/nonexistent/kmers.tsv", &LoaderConfig::default()).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn test_debug_reports_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_table(temp_dir.path(), "kmers.tsv", "ACGT\t3\nTTGA\t0\n");

        let table = MappedKmerTable::open(&path, false).unwrap();
        let debug = format!("{:?}", table);

        assert!(debug.contains("MappedKmerTable"));
        assert!(debug.contains("records: 2"));
    }
}
