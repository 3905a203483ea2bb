use std::path::{Path, PathBuf};

use futures::FutureExt;
use tokio::io::AsyncReadExt;

use crate::core::errors::{KeydropError, Result};
use crate::core::models::data::{Input, InputBatch};

/// Path that means "read standard input".
pub const STDIN: &str = "-";

/// Turns command-line paths into input batches.
///
/// A file is one batch of one input; a directory is one batch holding its
/// regular files in name order, not recursing. Nothing is read until the
/// batch is awaited.
pub fn batches(paths: &[PathBuf]) -> Vec<InputBatch> {
    paths.iter().cloned().map(batch).collect()
}

fn batch(path: PathBuf) -> InputBatch {
    async move {
        if path.as_os_str() == STDIN {
            return Ok(vec![read_stdin().boxed()]);
        }
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(&path, e))?;
        let files = if metadata.is_dir() {
            list_dir(&path).await?
        } else {
            vec![path]
        };
        Ok(files
            .into_iter()
            .map(|file| async move { read_file(&file).await }.boxed())
            .collect())
    }
    .boxed()
}

fn not_found_or_io(path: &Path, e: std::io::Error) -> KeydropError {
    match e.kind() {
        std::io::ErrorKind::NotFound => KeydropError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => KeydropError::Io(e),
    }
}

async fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    tracing::debug!(dir = %dir.display(), files = files.len(), "expanded directory");
    Ok(files)
}

/// Read a file, keeping its name.
pub async fn read_file(path: &Path) -> Result<Input> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| not_found_or_io(path, e))?;
    let input = Input::new(data);
    Ok(match path.file_name() {
        Some(name) => input.with_filename(name.to_string_lossy()),
        None => input,
    })
}

async fn read_stdin() -> Result<Input> {
    let mut data = Vec::new();
    tokio::io::stdin().read_to_end(&mut data).await?;
    Ok(Input::new(data))
}
