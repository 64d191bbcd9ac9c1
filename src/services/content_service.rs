//! Loads the board produced by the external content loader.

use std::{io::ErrorKind, path::Path};

use anyhow::Context;
use tracing::{info, warn};

use crate::state::board::Board;

/// Read the board JSON at `path`. A missing file yields an empty board.
pub async fn load_board(path: &Path) -> anyhow::Result<Board> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let board: Board = serde_json::from_str(&contents)
                .with_context(|| format!("invalid board file {}", path.display()))?;
            info!(
                path = %path.display(),
                categories = board.categories().len(),
                remaining = board.remaining(),
                "board loaded"
            );
            Ok(board)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "board file not found; starting with an empty board");
            Ok(Board::default())
        }
        Err(err) => Err(err).with_context(|| format!("failed to read board file {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_board_file_gives_empty_board() {
        let board = load_board(Path::new("does/not/exist.json")).await.unwrap();
        assert!(board.categories().is_empty());
        assert!(board.all_complete());
    }

    #[tokio::test]
    async fn reads_board_from_disk() {
        let path = std::env::temp_dir().join(format!("board-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(
            &path,
            r#"[{"title": "Geo", "questions": [{"kind": "Text", "prompt": "Capital of Peru?", "answer": "Lima", "reward": 100}]}]"#,
        )
        .await
        .unwrap();

        let board = load_board(&path).await.unwrap();
        assert_eq!(board.categories()[0].questions[0].answer, "Lima");
        let _ = tokio::fs::remove_file(&path).await;
    }
}
