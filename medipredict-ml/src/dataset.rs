//! Tabular datasets loaded from CSV.
//!
//! Two schemas are supported: positional (every column but the last is a
//! feature, the last is the label) and named (features and label picked by
//! header name). Both keep the feature order the model is trained on.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::MlError;

/// Numeric feature rows with one string label each.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<String>,
}

impl Dataset {
    pub fn new(
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        labels: Vec<String>,
    ) -> Result<Self, MlError> {
        if features.len() != labels.len() {
            return Err(MlError::dataset(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let width = feature_names.len();
        if let Some((row, r)) = features.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(MlError::dataset(format!(
                "row {row} has {} features, expected {width}",
                r.len()
            )));
        }
        Ok(Self {
            feature_names,
            features,
            labels,
        })
    }

    /// Load a CSV whose last column is the label.
    pub fn from_csv_positional(path: &Path) -> Result<Self, MlError> {
        let file = open(path)?;
        let dataset = Self::from_reader_positional(file)?;
        debug!(path = %path.display(), rows = dataset.len(), "Loaded positional dataset");
        Ok(dataset)
    }

    /// Load a CSV selecting `features` and `label` by header name.
    pub fn from_csv_columns(path: &Path, features: &[&str], label: &str) -> Result<Self, MlError> {
        let file = open(path)?;
        let dataset = Self::from_reader_columns(file, features, label)?;
        debug!(path = %path.display(), rows = dataset.len(), "Loaded named-column dataset");
        Ok(dataset)
    }

    pub fn from_reader_positional<R: Read>(reader: R) -> Result<Self, MlError> {
        let mut rdr = csv_reader(reader);
        let headers = rdr.headers()?.clone();
        if headers.len() < 2 {
            return Err(MlError::dataset(
                "expected at least one feature column and a label column",
            ));
        }
        let label_col = headers.len() - 1;
        let feature_cols: Vec<usize> = (0..label_col).collect();
        let names = feature_cols.iter().map(|&i| headers[i].to_string()).collect();
        read_rows(&mut rdr, names, &feature_cols, label_col)
    }

    pub fn from_reader_columns<R: Read>(
        reader: R,
        features: &[&str],
        label: &str,
    ) -> Result<Self, MlError> {
        let mut rdr = csv_reader(reader);
        let headers = rdr.headers()?.clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| MlError::dataset(format!("missing column '{name}'")))
        };
        let feature_cols = features
            .iter()
            .map(|name| find(name))
            .collect::<Result<Vec<_>, _>>()?;
        let label_col = find(label)?;
        let names = features.iter().map(|s| s.to_string()).collect();
        read_rows(&mut rdr, names, &feature_cols, label_col)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Rows at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }

    /// Shuffle with `seed` and split into `(train, test)`.
    ///
    /// The test partition gets `ceil(len * test_fraction)` rows; both
    /// partitions are guaranteed non-empty.
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self), MlError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(MlError::dataset(format!(
                "test fraction must be in (0, 1), got {test_fraction}"
            )));
        }
        if self.len() < 2 {
            return Err(MlError::dataset(format!(
                "need at least 2 rows to split, got {}",
                self.len()
            )));
        }
        let n_test = ((self.len() as f64 * test_fraction).ceil() as usize).clamp(1, self.len() - 1);

        let mut order: Vec<usize> = (0..self.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        let (test_idx, train_idx) = order.split_at(n_test);
        Ok((self.subset(train_idx), self.subset(test_idx)))
    }
}

fn open(path: &Path) -> Result<std::fs::File, MlError> {
    std::fs::File::open(path)
        .map_err(|e| MlError::dataset(format!("cannot open {}: {e}", path.display())))
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn read_rows<R: Read>(
    rdr: &mut csv::Reader<R>,
    names: Vec<String>,
    feature_cols: &[usize],
    label_col: usize,
) -> Result<Dataset, MlError> {
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = i + 2;
        let row = feature_cols
            .iter()
            .map(|&c| {
                let raw = record.get(c).unwrap_or("");
                raw.parse::<f64>().map_err(|_| {
                    MlError::dataset(format!("line {line}: column {c} is not numeric: '{raw}'"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let label = record.get(label_col).unwrap_or("").to_string();
        if label.is_empty() {
            return Err(MlError::dataset(format!("line {line}: empty label")));
        }
        features.push(row);
        labels.push(label);
    }
    if labels.is_empty() {
        return Err(MlError::dataset("dataset has no rows"));
    }
    Dataset::new(names, features, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DISEASE_CSV: &str = "\
itching,skin_rash,cough,fever,headache,prognosis
1,1,0,0,0,Fungal infection
0,0,1,1,0,Common Cold
0,0,0,1,1,Malaria
";

    const HABIT_CSV: &str = "\
tips,stress,water_intake,exercise,working_hours,sleep,diet
Drink more water,5,1.0,3,8,7,4
Sleep more,6,2.5,3,8,5,4
";

    #[test]
    fn test_positional_schema() {
        let ds = Dataset::from_reader_positional(DISEASE_CSV.as_bytes()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.n_features(), 5);
        assert_eq!(ds.feature_names[0], "itching");
        assert_eq!(ds.features[1], vec![0.0, 0.0, 1.0, 1.0, 0.0]);
        assert_eq!(ds.labels[2], "Malaria");
    }

    #[test]
    fn test_named_columns_follow_requested_order() {
        let ds = Dataset::from_reader_columns(
            HABIT_CSV.as_bytes(),
            &["water_intake", "exercise", "working_hours", "sleep", "diet", "stress"],
            "tips",
        )
        .unwrap();
        assert_eq!(ds.features[0], vec![1.0, 3.0, 8.0, 7.0, 4.0, 5.0]);
        assert_eq!(ds.labels, vec!["Drink more water", "Sleep more"]);
    }

    #[test]
    fn test_missing_column() {
        let err = Dataset::from_reader_columns(HABIT_CSV.as_bytes(), &["water_intake"], "advice")
            .unwrap_err();
        assert!(err.to_string().contains("missing column 'advice'"));
    }

    #[test]
    fn test_non_numeric_cell() {
        let csv = "a,b,label\n1,x,yes\n";
        let err = Dataset::from_reader_positional(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_empty_dataset() {
        let err = Dataset::from_reader_positional("a,label\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MlError::Dataset(_)));
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let features = (0..10).map(|i| vec![i as f64]).collect();
        let labels = (0..10).map(|i| format!("c{}", i % 2)).collect();
        let ds = Dataset::new(vec!["x".into()], features, labels).unwrap();

        let (train, test) = ds.train_test_split(0.2, 42).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let (train2, test2) = ds.train_test_split(0.2, 42).unwrap();
        assert_eq!(train, train2);
        assert_eq!(test, test2);

        let mut all: Vec<f64> = train.features.iter().chain(&test.features).map(|r| r[0]).collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(all, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rejects_bad_fraction() {
        let ds = Dataset::new(vec!["x".into()], vec![vec![1.0], vec![2.0]], vec!["a".into(), "b".into()])
            .unwrap();
        assert!(ds.train_test_split(0.0, 1).is_err());
        assert!(ds.train_test_split(1.0, 1).is_err());
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let err = Dataset::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![1.0]],
            vec!["x".into(), "y".into()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}
