//! Static fixture files: the SQL that seeds the source table and the sorted
//! output the whole pipeline must reproduce.

use std::path::PathBuf;

use crate::error::{HarnessError, Result};

#[derive(Debug, Clone)]
pub struct Fixtures {
    root: PathBuf,
}

impl Fixtures {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `input/load_<table>.sql`
    pub fn load_sql(&self, table: &str) -> PathBuf {
        self.root.join("input").join(format!("load_{}.sql", table))
    }

    /// `output/<exported_filename>.sorted`
    pub fn expected_output(&self, exported_filename: &str) -> PathBuf {
        self.root
            .join("output")
            .join(format!("{}.sorted", exported_filename))
    }

    /// Fail before any external effect if a fixture is missing.
    pub fn verify(&self, table: &str, exported_filename: &str) -> Result<()> {
        let missing: Vec<String> = [self.load_sql(table), self.expected_output(exported_filename)]
            .into_iter()
            .filter(|p| !p.is_file())
            .map(|p| p.display().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::validation(format!(
                "missing fixture files: {}",
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_fixture_paths() {
        let fixtures = Fixtures::new("/data/fixtures");
        assert_eq!(
            fixtures.load_sql("courseware_studentmodule"),
            PathBuf::from("/data/fixtures/input/load_courseware_studentmodule.sql")
        );
        assert_eq!(
            fixtures.expected_output("a.sql"),
            PathBuf::from("/data/fixtures/output/a.sql.sorted")
        );
    }

    #[test]
    fn test_verify_lists_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let fixtures = Fixtures::new(dir.path());
        fs::create_dir_all(dir.path().join("input")).unwrap();
        fs::write(fixtures.load_sql("t"), "SELECT 1;\n").unwrap();

        let err = fixtures.verify("t", "out.sql").unwrap_err().to_string();
        assert!(err.contains("out.sql.sorted"));
        assert!(!err.contains("load_t.sql"));

        fs::create_dir_all(dir.path().join("output")).unwrap();
        fs::write(fixtures.expected_output("out.sql"), "").unwrap();
        assert!(fixtures.verify("t", "out.sql").is_ok());
    }
}
