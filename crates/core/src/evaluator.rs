//! Scoring scan output against labels derived from fixture paths.
//!
//! Fixtures live under one directory per category (`examples/RSA/rsa.py`), so
//! the parent directory name is the expected label.

use crate::error::ClassifyError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Second-to-last path component, cut at the first `.`. A `.` or `..`
/// component yields an empty label; a bare file name has none.
pub fn ground_truth(path: &Path) -> Option<String> {
    let dir = match path.components().rev().nth(1)? {
        Component::Normal(name) => name.to_str()?,
        _ => "",
    };
    let label = dir.split('.').next().unwrap_or(dir);
    Some(label.to_string())
}

/// Row: predicted label of a correctly classified file. Column: expected label
/// of a misclassified one.
pub type ConfusionMatrix = BTreeMap<String, BTreeMap<String, usize>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    pub path: PathBuf,
    pub predicted: String,
    pub actual: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub total: usize,
    pub correct: usize,
    pub matrix: ConfusionMatrix,
    pub mismatches: Vec<Mismatch>,
}

impl Evaluation {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }
}

type TruthFn = Box<dyn Fn(&Path) -> Option<String> + Send + Sync>;

pub struct Evaluator {
    truth: TruthFn,
    total: usize,
    rights: Vec<(PathBuf, String)>,
    wrongs: Vec<Mismatch>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::with_truth(ground_truth)
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_truth(truth: impl Fn(&Path) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            truth: Box::new(truth),
            total: 0,
            rights: Vec::new(),
            wrongs: Vec::new(),
        }
    }

    pub fn record(&mut self, path: &Path, predicted: &str) -> Result<(), ClassifyError> {
        let actual =
            (self.truth)(path).ok_or_else(|| ClassifyError::NoGroundTruth(path.to_path_buf()))?;
        self.total += 1;
        if actual == predicted {
            self.rights.push((path.to_path_buf(), predicted.to_string()));
        } else {
            self.wrongs.push(Mismatch {
                path: path.to_path_buf(),
                predicted: predicted.to_string(),
                actual,
            });
        }
        Ok(())
    }

    /// Every (correct prediction, expected label of a miss) pair gets a cell;
    /// a cell only counts up when the two records share a path, which a single
    /// scan never produces.
    pub fn finish(self) -> Evaluation {
        let mut matrix = ConfusionMatrix::new();
        for (right_path, right_label) in &self.rights {
            let row = matrix.entry(right_label.clone()).or_default();
            for wrong in &self.wrongs {
                let cell = row.entry(wrong.actual.clone()).or_insert(0);
                if &wrong.path == right_path {
                    *cell += 1;
                }
            }
        }
        Evaluation {
            total: self.total,
            correct: self.rights.len(),
            matrix,
            mismatches: self.wrongs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truth_is_parent_directory() {
        assert_eq!(
            ground_truth(Path::new("examples/RSA/rsa.py")).as_deref(),
            Some("RSA")
        );
        assert_eq!(
            ground_truth(Path::new("examples/PASSWORD_BCRYPT.v2/x.go")).as_deref(),
            Some("PASSWORD_BCRYPT")
        );
        assert_eq!(ground_truth(Path::new("lonely.py")), None);
    }

    #[test]
    fn files_directly_under_a_dot_root_get_an_empty_label() {
        assert_eq!(ground_truth(Path::new("./x.py")).as_deref(), Some(""));
        assert_eq!(ground_truth(Path::new("../x.py")).as_deref(), Some(""));
        assert_eq!(ground_truth(Path::new("/x.py")).as_deref(), Some(""));

        let mut ev = Evaluator::new();
        ev.record(Path::new("./x.py"), "NOCRYPTO").unwrap();
        let eval = ev.finish();
        assert_eq!(eval.total, 1);
        assert_eq!(eval.mismatches[0].actual, "");
    }

    #[test]
    fn empty_run_has_zero_accuracy() {
        let eval = Evaluator::new().finish();
        assert_eq!(eval.total, 0);
        assert_eq!(eval.accuracy(), 0.0);
        assert!(eval.matrix.is_empty());
    }

    #[test]
    fn counts_and_mismatches() {
        let mut ev = Evaluator::new();
        ev.record(Path::new("examples/RSA/a.py"), "RSA").unwrap();
        ev.record(Path::new("examples/RSA/b.py"), "LLM RSA").unwrap();
        ev.record(Path::new("examples/SHA/c.py"), "SHA").unwrap();
        ev.record(Path::new("examples/NOCRYPTO/d.py"), "NOCRYPTO").unwrap();
        let eval = ev.finish();
        assert_eq!(eval.total, 4);
        assert_eq!(eval.correct, 3);
        assert_eq!(eval.accuracy(), 0.75);
        assert_eq!(
            eval.mismatches,
            vec![Mismatch {
                path: PathBuf::from("examples/RSA/b.py"),
                predicted: "LLM RSA".into(),
                actual: "RSA".into(),
            }]
        );
    }

    #[test]
    fn matrix_rows_list_missed_labels_at_zero() {
        let mut ev = Evaluator::new();
        ev.record(Path::new("ex/RSA/a.py"), "RSA").unwrap();
        ev.record(Path::new("ex/SHA/b.py"), "SHA").unwrap();
        ev.record(Path::new("ex/AES/c.py"), "DES").unwrap();
        ev.record(Path::new("ex/MD5/d.py"), "LLM MD5").unwrap();
        let eval = ev.finish();

        let mut expected_row = BTreeMap::new();
        expected_row.insert("AES".to_string(), 0);
        expected_row.insert("MD5".to_string(), 0);
        assert_eq!(eval.matrix.len(), 2);
        assert_eq!(eval.matrix["RSA"], expected_row);
        assert_eq!(eval.matrix["SHA"], expected_row);
    }

    #[test]
    fn custom_truth_and_missing_truth() {
        let mut ev = Evaluator::with_truth(|p: &Path| {
            p.file_stem().and_then(|s| s.to_str()).map(str::to_string)
        });
        ev.record(Path::new("RSA.py"), "RSA").unwrap();
        assert_eq!(ev.finish().correct, 1);

        let mut ev = Evaluator::new();
        let err = ev.record(Path::new("orphan.py"), "RSA").unwrap_err();
        assert!(matches!(err, ClassifyError::NoGroundTruth(_)));
    }
}
