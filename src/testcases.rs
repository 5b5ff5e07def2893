//! External test-case store contract and its default file-backed
//! implementation. The judging engine only consumes the ordered list; it
//! never writes to the store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTestCase {
    pub index: usize,
    pub input: String,
    pub expected_output: String,
    #[serde(default = "default_public")]
    pub is_public: bool,
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_public() -> bool {
    true
}

#[async_trait]
pub trait TestCaseLoader: Send + Sync {
    /// Ordered test cases for one question. When `include_private` is false,
    /// non-public entries are omitted.
    async fn load_test_cases(
        &self,
        room_id: &str,
        question_id: &str,
        include_private: bool,
    ) -> Result<Vec<StoredTestCase>>;
}

/// File-backed store: `{root}/{room_id}/{question_id}/testcases.json` holds
/// an ordered array of [`StoredTestCase`].
pub struct FileTestCaseStore {
    root: PathBuf,
}

impl FileTestCaseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn question_path(&self, room_id: &str, question_id: &str) -> Result<PathBuf> {
        // Identifiers become path segments; refuse anything that could
        // escape the store root.
        for id in [room_id, question_id] {
            if id.is_empty()
                || !id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                anyhow::bail!("invalid identifier: {id:?}");
            }
        }
        Ok(self
            .root
            .join(room_id)
            .join(question_id)
            .join("testcases.json"))
    }
}

#[async_trait]
impl TestCaseLoader for FileTestCaseStore {
    async fn load_test_cases(
        &self,
        room_id: &str,
        question_id: &str,
        include_private: bool,
    ) -> Result<Vec<StoredTestCase>> {
        let path = self.question_path(room_id, question_id)?;
        let raw = tokio::fs::read(&path)
            .await
            .with_context(|| format!("No test cases for room {room_id}, question {question_id}"))?;

        let mut cases: Vec<StoredTestCase> =
            serde_json::from_slice(&raw).context("Malformed test case file")?;

        if !include_private {
            cases.retain(|case| case.is_public);
        }
        cases.sort_by_key(|case| case.index);
        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_store(dir: &std::path::Path, room: &str, question: &str, body: &str) {
        let question_dir = dir.join(room).join(question);
        std::fs::create_dir_all(&question_dir).unwrap();
        std::fs::write(question_dir.join("testcases.json"), body).unwrap();
    }

    const CASES: &str = r#"[
        {"index": 1, "input": "2 3", "expectedOutput": "5", "isPublic": false, "points": 10},
        {"index": 0, "input": "1 1", "expectedOutput": "2"}
    ]"#;

    #[tokio::test]
    async fn loads_cases_ordered_by_index() {
        let dir = tempfile::tempdir().unwrap();
        write_store(dir.path(), "room1", "q1", CASES);

        let store = FileTestCaseStore::new(dir.path());
        let cases = store.load_test_cases("room1", "q1", true).await.unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].index, 0);
        assert_eq!(cases[1].expected_output, "5");
        assert_eq!(cases[1].points, Some(10));
    }

    #[tokio::test]
    async fn filters_private_cases_by_default_flag() {
        let dir = tempfile::tempdir().unwrap();
        write_store(dir.path(), "room1", "q1", CASES);

        let store = FileTestCaseStore::new(dir.path());
        let cases = store.load_test_cases("room1", "q1", false).await.unwrap();
        assert_eq!(cases.len(), 1);
        assert!(cases[0].is_public);
    }

    #[tokio::test]
    async fn rejects_path_escaping_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTestCaseStore::new(dir.path());
        assert!(store.load_test_cases("../etc", "q1", true).await.is_err());
        assert!(store.load_test_cases("room1", "", true).await.is_err());
    }

    #[tokio::test]
    async fn missing_question_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTestCaseStore::new(dir.path());
        assert!(store.load_test_cases("room1", "q404", true).await.is_err());
    }
}
