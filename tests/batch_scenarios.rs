//! 批次级场景测试
//!
//! 用脚本化的假门户能力（解析 / 文书来源 / 续期）驱动真实的
//! ProcessFlow + run_batch 组合，验证批次层面的结果归类。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pje_batch_download::error::{AppError, AppResult, ErrorKind};
use pje_batch_download::models::{DocumentEntry, OutcomeCounts, Outcome, ProcessRef, Report, WorkItem};
use pje_batch_download::services::{DocumentSource, ProcessResolver, SessionRenewer};
use pje_batch_download::workflow::{ProcessFlow, RetryPolicy, RunControl};
use pje_batch_download::run_batch;
use tokio::sync::Mutex;

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    }
}

fn task_items(n: usize) -> Vec<WorkItem> {
    (0..n)
        .map(|i| WorkItem::TaskEntry {
            task: "Minutar sentença".into(),
            process_id: i as i64 + 1,
            number: format!("000000{}-11.2024.8.05.0001", i + 1),
            task_instance_id: 100 + i as i64,
        })
        .collect()
}

fn doc(id: i64) -> DocumentEntry {
    DocumentEntry {
        id,
        name: format!("documento-{}", id),
        declared_size: 0,
        sha256: None,
    }
}

/// 每个案件发一把独立密钥的假解析器
struct PanelResolver;

#[async_trait]
impl ProcessResolver for PanelResolver {
    async fn resolve(&self, item: &WorkItem) -> AppResult<ProcessRef> {
        let id = item
            .known_process_id()
            .ok_or_else(|| AppError::not_found(item.number_display()))?;
        Ok(ProcessRef {
            process_id: id,
            access_key: format!("chave-{}", id),
            task_instance_id: None,
        })
    }
}

/// 脚本化文书来源
struct FakePortal {
    /// 保密案件
    restricted: Vec<i64>,
    /// 列表阶段一直 503 的案件
    flaky_listing: Vec<i64>,
    fetch_calls: Mutex<HashMap<i64, u32>>,
}

impl FakePortal {
    fn new() -> Self {
        Self {
            restricted: Vec::new(),
            flaky_listing: Vec::new(),
            fetch_calls: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl DocumentSource for FakePortal {
    async fn list_documents(&self, pref: &ProcessRef) -> AppResult<Vec<DocumentEntry>> {
        if self.restricted.contains(&pref.process_id) {
            return Err(AppError::access_denied(pref.process_id));
        }
        if self.flaky_listing.contains(&pref.process_id) {
            return Err(AppError::bad_status("listAutosDigitais.seam", 503));
        }
        Ok(vec![doc(pref.process_id * 10), doc(pref.process_id * 10 + 1)])
    }

    async fn fetch_document(
        &self,
        pref: &ProcessRef,
        doc: &DocumentEntry,
        dest_dir: &Path,
    ) -> AppResult<PathBuf> {
        *self
            .fetch_calls
            .lock()
            .await
            .entry(pref.process_id)
            .or_insert(0) += 1;
        Ok(dest_dir.join(format!("{}.pdf", doc.id)))
    }
}

#[derive(Default)]
struct NoopRenewer {
    renewals: AtomicU32,
}

#[async_trait]
impl SessionRenewer for NoopRenewer {
    async fn renew(&self) -> AppResult<()> {
        self.renewals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn flow(portal: Arc<FakePortal>) -> Arc<ProcessFlow> {
    Arc::new(ProcessFlow::new(
        Arc::new(PanelResolver),
        portal,
        Arc::new(NoopRenewer::default()),
        policy(),
    ))
}

/// 任务里 3 个案件、1 个保密：报告 2 成功 + 1 保密 + 0 失败
#[tokio::test]
async fn three_processes_one_restricted() {
    let portal = Arc::new(FakePortal {
        restricted: vec![2],
        ..FakePortal::new()
    });

    let results = run_batch(
        task_items(3),
        flow(portal),
        2,
        Arc::new(RunControl::new()),
        Path::new("/tmp/lote"),
    )
    .await;

    let counts = OutcomeCounts::tally(&results);
    assert_eq!(counts.succeeded, 2);
    assert_eq!(counts.restricted, 1);
    assert_eq!(counts.failed, 0);
}

/// 只遇到瞬时错误的案件：尝试次数不超过上限，
/// 最终结果是 Failed(TransientNetworkError)，批次继续
#[tokio::test]
async fn transient_only_item_fails_with_bounded_attempts() {
    let portal = Arc::new(FakePortal {
        flaky_listing: vec![1],
        ..FakePortal::new()
    });

    let results = run_batch(
        task_items(2),
        flow(portal),
        1,
        Arc::new(RunControl::new()),
        Path::new("/tmp/lote"),
    )
    .await;

    assert_eq!(
        results[0].outcome,
        Outcome::Failed {
            kind: ErrorKind::TransientNetworkError
        }
    );
    // 解析 1 次 + 列表阶段 3 次（上限）
    assert_eq!(results[0].attempts, 4);

    // 批次没有被失败案件打断
    assert!(matches!(results[1].outcome, Outcome::Succeeded { .. }));
}

/// 完整批次的报告聚合与顺序
#[tokio::test]
async fn report_aggregates_batch() {
    let portal = Arc::new(FakePortal {
        restricted: vec![3],
        ..FakePortal::new()
    });

    let items = task_items(4);
    let results = run_batch(
        items,
        flow(portal),
        2,
        Arc::new(RunControl::new()),
        Path::new("/tmp/lote"),
    )
    .await;

    let report = Report::new(
        "Minutar sentença",
        Path::new("/tmp/lote"),
        chrono::Local::now().to_rfc3339(),
        results,
        Vec::new(),
        None,
    );

    assert_eq!(report.counts.succeeded, 3);
    assert_eq!(report.counts.restricted, 1);
    assert!(report.fatal_kind.is_none());

    let numbers: Vec<&str> = report.results.iter().map(|r| r.number.as_str()).collect();
    assert_eq!(
        numbers,
        vec![
            "0000001-11.2024.8.05.0001",
            "0000002-11.2024.8.05.0001",
            "0000003-11.2024.8.05.0001",
            "0000004-11.2024.8.05.0001",
        ]
    );
}

/// 面板已标记保密的标签条目不触发任何请求
#[tokio::test]
async fn panel_flagged_restricted_short_circuits() {
    let portal = Arc::new(FakePortal::new());

    let items = vec![WorkItem::TagEntry {
        tag: "urgentes".into(),
        process_id: 9,
        number: "0000009-11.2024.8.05.0001".into(),
        restricted: true,
    }];

    let results = run_batch(
        items,
        flow(portal.clone()),
        1,
        Arc::new(RunControl::new()),
        Path::new("/tmp/lote"),
    )
    .await;

    assert_eq!(results[0].outcome, Outcome::Restricted);
    assert!(portal.fetch_calls.lock().await.is_empty());
}
