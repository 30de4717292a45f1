//! 案件处理流程 - 流程层
//!
//! 核心职责：定义"一个案件"的完整处理流程
//!
//! 状态推进：待处理 → 解析 → 密钥就绪 → 取列表 → 下载 → 校验 → 终态。
//! 每个阶段经重试驱动执行：瞬时错误退避重试，会话过期先续期；
//! 续期后旧访问密钥全部作废，流程会重新解析出新密钥，但已经校验
//! 通过的文书不会重新下载。取消在文书之间检查，在途文书允许下完。

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, ErrorKind};
use crate::models::{Outcome, ProcessRef, ProcessResult, WorkItem};
use crate::services::auth::SessionRenewer;
use crate::services::download::DocumentSource;
use crate::services::resolver::ProcessResolver;
use crate::workflow::control::RunControl;
use crate::workflow::process_ctx::ProcessCtx;
use crate::workflow::retry::{run_with_retry, RetryPolicy};

/// 案件处理能力（编排层依赖的接口）
#[async_trait]
pub trait ProcessHandler: Send + Sync {
    async fn handle(
        &self,
        item: &WorkItem,
        ctx: &ProcessCtx,
        control: &RunControl,
    ) -> ProcessResult;
}

/// 案件处理流程
///
/// - 编排单个案件从解析到校验的全部阶段
/// - 不持有 HTTP 资源，只依赖业务能力接口
/// - 不认识批次与并发
pub struct ProcessFlow {
    resolver: Arc<dyn ProcessResolver>,
    documents: Arc<dyn DocumentSource>,
    renewer: Arc<dyn SessionRenewer>,
    policy: RetryPolicy,
}

impl ProcessFlow {
    pub fn new(
        resolver: Arc<dyn ProcessResolver>,
        documents: Arc<dyn DocumentSource>,
        renewer: Arc<dyn SessionRenewer>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            resolver,
            documents,
            renewer,
            policy,
        }
    }

    /// 取当前代的案件引用；续期过的旧引用作废，重新解析
    async fn current_ref(
        &self,
        item: &WorkItem,
        holder: &Mutex<Option<(ProcessRef, u64)>>,
        epoch: &AtomicU64,
    ) -> AppResult<ProcessRef> {
        let mut guard = holder.lock().await;
        let now = epoch.load(Ordering::Acquire);

        if let Some((pref, seen)) = &*guard {
            if *seen == now {
                return Ok(pref.clone());
            }
        }

        let pref = self.resolver.resolve(item).await?;
        *guard = Some((pref.clone(), now));
        Ok(pref)
    }

    fn outcome_for_error(err: &AppError) -> Outcome {
        match err.kind() {
            ErrorKind::ResolutionNotFound => Outcome::NotFound,
            ErrorKind::AccessDenied => Outcome::Restricted,
            kind => Outcome::Failed { kind },
        }
    }
}

#[async_trait]
impl ProcessHandler for ProcessFlow {
    async fn handle(
        &self,
        item: &WorkItem,
        ctx: &ProcessCtx,
        control: &RunControl,
    ) -> ProcessResult {
        let started = Instant::now();
        let attempts = AtomicU32::new(0);
        // 每成功续期一次加一；用于判断手里的访问密钥是否已作废
        let epoch = AtomicU64::new(0);
        let renewer = EpochRenewer {
            inner: self.renewer.as_ref(),
            epoch: &epoch,
        };
        let holder: Mutex<Option<(ProcessRef, u64)>> = Mutex::new(None);

        let finish = |outcome: Outcome, attempts: &AtomicU32| ProcessResult {
            item: item.clone(),
            number: ctx.number.clone(),
            outcome,
            attempts: attempts.load(Ordering::Relaxed),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        // 面板已标出保密的案件直接落保密终态，不再发请求
        if let WorkItem::TagEntry {
            restricted: true, ..
        } = item
        {
            info!("{} 🔒 面板已标记为保密案件", ctx);
            return finish(Outcome::Restricted, &attempts);
        }

        // ========== 阶段 1: 解析 ==========
        info!("{} 🔍 解析案件编号...", ctx);

        let pref = match run_with_retry(&self.policy, &renewer, &attempts, || async {
            self.current_ref(item, &holder, &epoch).await
        })
        .await
        {
            Ok(pref) => pref,
            Err(e) => {
                if e.is_fatal() {
                    control.mark_fatal();
                }
                warn!("{} ❌ 解析失败: {}", ctx, e);
                return finish(Self::outcome_for_error(&e), &attempts);
            }
        };

        info!("{} ✓ 密钥就绪 (ID: {})", ctx, pref.process_id);

        // ========== 阶段 2: 取文书列表 ==========
        let docs = match run_with_retry(&self.policy, &renewer, &attempts, || async {
            let pref = self.current_ref(item, &holder, &epoch).await?;
            self.documents.list_documents(&pref).await
        })
        .await
        {
            Ok(docs) => docs,
            Err(e) => {
                if e.is_fatal() {
                    control.mark_fatal();
                }
                if e.kind() == ErrorKind::AccessDenied {
                    info!("{} 🔒 保密案件，跳过", ctx);
                } else {
                    warn!("{} ❌ 文书列表获取失败: {}", ctx, e);
                }
                return finish(Self::outcome_for_error(&e), &attempts);
            }
        };

        if docs.is_empty() {
            info!("{} 没有可下载的文书", ctx);
            return finish(Outcome::Succeeded { files: Vec::new() }, &attempts);
        }

        info!("{} 📄 共 {} 份文书待下载", ctx, docs.len());

        // ========== 阶段 3: 按列表顺序下载并校验 ==========
        let mut files: Vec<PathBuf> = Vec::new();

        for (doc_index, doc) in docs.iter().enumerate() {
            // 取消在文书之间检查；在途传输允许完成
            if control.is_cancelled() {
                info!(
                    "{} 🛑 观察到取消 ({}/{} 份已完成)",
                    ctx,
                    files.len(),
                    docs.len()
                );
                return finish(Outcome::Cancelled, &attempts);
            }

            let fetched = run_with_retry(&self.policy, &renewer, &attempts, || async {
                let pref = self.current_ref(item, &holder, &epoch).await?;
                self.documents
                    .fetch_document(&pref, doc, &ctx.process_dir)
                    .await
            })
            .await;

            match fetched {
                Ok(path) => {
                    files.push(path);
                }
                Err(e) => {
                    if e.is_fatal() {
                        control.mark_fatal();
                    }
                    warn!(
                        "{} ❌ 文书 {}/{} 下载失败: {}",
                        ctx,
                        doc_index + 1,
                        docs.len(),
                        e
                    );
                    return finish(Self::outcome_for_error(&e), &attempts);
                }
            }
        }

        info!("{} ✅ 全部 {} 份文书校验通过", ctx, files.len());
        finish(Outcome::Succeeded { files }, &attempts)
    }
}

/// 续期适配器：续期成功后前移代数，让流程丢弃旧访问密钥
struct EpochRenewer<'a> {
    inner: &'a dyn SessionRenewer,
    epoch: &'a AtomicU64,
}

#[async_trait]
impl SessionRenewer for EpochRenewer<'_> {
    async fn renew(&self) -> AppResult<()> {
        self.inner.renew().await?;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
