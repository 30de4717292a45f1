use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;

use crate::models::NumberBatch;

/// 从 TOML 文件加载数据并转换为 NumberBatch 对象
pub async fn load_toml_to_batch(toml_file_path: &Path) -> Result<NumberBatch> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut batch: NumberBatch = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    // 设置文件路径
    batch.file_path = Some(toml_file_path.to_string_lossy().to_string());

    if batch.name.is_none() {
        batch.name = toml_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string());
    }

    Ok(batch)
}

/// 从文件夹中加载所有 TOML 文件并转换为 NumberBatch 对象列表
pub async fn load_all_batches(folder_path: &str) -> Result<Vec<NumberBatch>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut batches = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            tracing::info!(
                "正在加载: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );

            match load_toml_to_batch(&path).await {
                Ok(batch) => {
                    tracing::info!("成功加载 {} 个案件编号", batch.numbers.len());
                    batches.push(batch);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_batch_and_fills_name_from_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lote_teste.toml");
        std::fs::write(
            &file,
            r#"numbers = ["8128688-83.2024.8.05.0001", "0000001-01.2015.8.19.0001"]"#,
        )
        .unwrap();

        let batch = load_toml_to_batch(&file).await.unwrap();
        assert_eq!(batch.name.as_deref(), Some("lote_teste"));
        assert_eq!(batch.numbers.len(), 2);
        assert!(batch.file_path.is_some());
    }

    #[tokio::test]
    async fn scans_folder_skipping_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ok.toml"),
            r#"name = "ok"
numbers = ["8128688-83.2024.8.05.0001"]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.toml"), "numbers = 42").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "nada").unwrap();

        let batches = load_all_batches(dir.path().to_str().unwrap()).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].name.as_deref(), Some("ok"));
    }
}
