use std::{
    collections::VecDeque,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use serde::de::DeserializeOwned;

use crate::Result;

/// Read the last `n` records of a journal stream (all of them when `n` is
/// `None`). A missing file yields no records; malformed lines are skipped.
pub async fn read_tail<T>(path: &Path, n: Option<usize>) -> Result<Vec<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(vec![]);
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut tail: VecDeque<T> = VecDeque::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(record) => {
                    tail.push_back(record);
                    if n.is_some_and(|n| tail.len() > n) {
                        tail.pop_front();
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = idx + 1,
                        "skipping malformed journal line: {e}"
                    );
                },
            }
        }

        Ok(tail.into())
    })
    .await?
}
