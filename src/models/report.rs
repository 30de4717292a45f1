//! 批次运行报告
//!
//! 每个工作项记录一条结果，顺序与输入一致；报告构建完成后不再修改。

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::{AppResult, ErrorKind};
use crate::models::process::WorkItem;

/// 单个案件的最终去向
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum Outcome {
    /// 全部文书下载并校验通过
    Succeeded { files: Vec<PathBuf> },
    /// 保密案件，当前角色无权查看
    Restricted,
    /// 所有解析路径都没找到
    NotFound,
    /// 批次被取消，案件未处理或未处理完
    Cancelled,
    /// 带着错误种类的失败
    Failed { kind: ErrorKind },
}

impl Outcome {
    /// 是否为终态（非取消）
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Cancelled)
    }
}

/// 单个工作项的处理结果
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub item: WorkItem,
    pub number: String,
    pub outcome: Outcome,
    /// 所有阶段累计的尝试次数
    pub attempts: u32,
    pub elapsed_ms: u64,
}

/// 各类结果的汇总计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub restricted: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub not_found: usize,
}

impl OutcomeCounts {
    pub fn tally(results: &[ProcessResult]) -> Self {
        let mut counts = Self::default();
        for r in results {
            match &r.outcome {
                Outcome::Succeeded { .. } => counts.succeeded += 1,
                Outcome::Restricted => counts.restricted += 1,
                Outcome::NotFound => counts.not_found += 1,
                Outcome::Cancelled => counts.cancelled += 1,
                Outcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}

/// 批次报告
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// 批次名称（任务名 / 标签名 / 编号批次名）
    pub batch: String,
    pub directory: String,
    pub started_at: String,
    pub finished_at: String,
    /// 按输入顺序排列的结果
    pub results: Vec<ProcessResult>,
    pub counts: OutcomeCounts,
    /// 运行期间记录的非致命问题（非法编号等）
    pub errors: Vec<String>,
    /// 会话无法续期等致命条件；致命中止时未开始的案件记为 Cancelled
    pub fatal_kind: Option<ErrorKind>,
}

impl Report {
    pub fn new(
        batch: impl Into<String>,
        directory: &Path,
        started_at: String,
        results: Vec<ProcessResult>,
        errors: Vec<String>,
        fatal_kind: Option<ErrorKind>,
    ) -> Self {
        let counts = OutcomeCounts::tally(&results);
        Self {
            batch: batch.into(),
            directory: directory.display().to_string(),
            started_at,
            finished_at: chrono::Local::now().to_rfc3339(),
            results,
            counts,
            errors,
            fatal_kind,
        }
    }

    /// 把报告写到批次目录下 `relatorio_<时间戳>.json`
    pub async fn save(&self, directory: &Path) -> AppResult<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = directory.join(format!("relatorio_{}.json", stamp));
        let body = serde_json::to_string_pretty(self)?;

        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|e| crate::error::AppError::file_write_failed(directory.display().to_string(), e))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| crate::error::AppError::file_write_failed(path.display().to_string(), e))?;

        info!("📄 报告已保存: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::case_number::CaseNumber;

    fn item(n: &str) -> WorkItem {
        WorkItem::Number {
            number: CaseNumber::parse(n).unwrap(),
        }
    }

    fn result(n: &str, outcome: Outcome) -> ProcessResult {
        ProcessResult {
            item: item(n),
            number: n.to_string(),
            outcome,
            attempts: 1,
            elapsed_ms: 10,
        }
    }

    #[test]
    fn tallies_every_outcome_class() {
        let results = vec![
            result("81286888320248050001", Outcome::Succeeded { files: vec![] }),
            result("81286888320248050001", Outcome::Succeeded { files: vec![] }),
            result("81286888320248050001", Outcome::Restricted),
            result("81286888320248050001", Outcome::NotFound),
            result("81286888320248050001", Outcome::Cancelled),
            result(
                "81286888320248050001",
                Outcome::Failed {
                    kind: ErrorKind::TransientNetworkError,
                },
            ),
        ];
        let counts = OutcomeCounts::tally(&results);
        assert_eq!(counts.succeeded, 2);
        assert_eq!(counts.restricted, 1);
        assert_eq!(counts.not_found, 1);
        assert_eq!(counts.cancelled, 1);
        assert_eq!(counts.failed, 1);
    }

    #[test]
    fn cancelled_is_not_terminal() {
        assert!(!Outcome::Cancelled.is_terminal());
        assert!(Outcome::Restricted.is_terminal());
    }
}
