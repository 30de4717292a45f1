//! 批量案件处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量案件的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、建立会话、登录、选择角色
//! 2. **工作项加载**：从任务 / 标签 / 编号批次文件得到 `Vec<WorkItem>`
//! 3. **并发控制**：使用 Semaphore 限制并发数量（门户有限流，并发必须小）
//! 4. **取消与致命中止**：取消后不再开始新案件；会话无法续期时中止剩余案件
//! 5. **结果收集**：并发安全地按输入顺序收集每个案件的结果
//! 6. **报告落盘**：批次目录下保存 JSON 报告并输出统计
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个案件的细节
//! - **资源所有者**：唯一持有 Session 创建权的模块
//! - **向下委托**：委托 workflow::ProcessFlow 处理单个案件

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ErrorKind;
use crate::infrastructure::Session;
use crate::models::{
    load_all_batches, CaseNumber, Outcome, ProcessResult, Report, WorkItem,
};
use crate::services::{
    AccessKeyIssuer, AuthService, CaptchaSolver, DownloadService, Resolver, TagService,
    TaskService,
};
use crate::utils::logging;
use crate::utils::text::sanitize_folder_name;
use crate::workflow::{ProcessCtx, ProcessFlow, ProcessHandler, RetryPolicy, RunControl};

/// 应用主结构
pub struct App {
    config: Config,
    auth: Arc<AuthService>,
    tasks: Arc<TaskService>,
    tags: Arc<TagService>,
    handler: Arc<ProcessFlow>,
    control: Arc<RunControl>,
}

impl App {
    /// 初始化应用：建会话、登录、装配各层
    pub async fn initialize(config: Config) -> Result<Self> {
        Self::initialize_with_solver(config, None).await
    }

    /// 初始化应用，外部可注入验证码求解协作者
    pub async fn initialize_with_solver(
        config: Config,
        solver: Option<Arc<dyn CaptchaSolver>>,
    ) -> Result<Self> {
        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;
        logging::log_startup(config.max_concurrent, config.max_attempts);

        let session = Arc::new(Session::new(&config)?);
        let auth = Arc::new(AuthService::new(session.clone(), &config));

        // 登录（带有限重试），失败直接终止
        auth.login().await.context("登录失败")?;

        let tasks = Arc::new(TaskService::new(session.clone(), &config));
        let tags = Arc::new(TagService::new(session.clone(), &config));
        let issuer = Arc::new(AccessKeyIssuer::new(session.clone()));

        let resolver = Arc::new(Resolver::standard(
            session.clone(),
            issuer,
            tasks.clone(),
            tags.clone(),
            solver,
            &config,
        ));
        let downloads = Arc::new(DownloadService::new(session.clone(), &config));

        let handler = Arc::new(ProcessFlow::new(
            resolver,
            downloads,
            auth.clone(),
            RetryPolicy::from_config(&config),
        ));

        Ok(Self {
            config,
            auth,
            tasks,
            tags,
            handler,
            control: Arc::new(RunControl::new()),
        })
    }

    /// 批次共享的控制标志（调用方用它请求取消）
    pub fn control(&self) -> Arc<RunControl> {
        self.control.clone()
    }

    /// 请求取消：不再开始新案件，在途案件下完当前文书后收尾
    pub fn cancel(&self) {
        self.control.request_cancel();
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<Report> {
        let started_at = chrono::Local::now().to_rfc3339();

        // 确认会话仍然有效（近期校验过则免请求）
        self.auth.ensure_logged_in().await.context("会话确认失败")?;

        // 加载待处理的工作项
        let (batch_name, items, mut errors) = self.load_work_items().await?;

        let batch_dir =
            PathBuf::from(&self.config.download_dir).join(sanitize_folder_name(&batch_name));
        tokio::fs::create_dir_all(&batch_dir)
            .await
            .with_context(|| format!("无法创建批次目录: {}", batch_dir.display()))?;

        if items.is_empty() {
            warn!("⚠️ 没有找到待处理的案件，程序结束");
            let report = Report::new(batch_name, &batch_dir, started_at, Vec::new(), errors, None);
            report.save(&batch_dir).await?;
            return Ok(report);
        }

        logging::log_batch_source(&batch_name, items.len());

        // 处理整个批次
        let results = run_batch(
            items,
            self.handler.clone(),
            self.config.max_concurrent,
            self.control.clone(),
            &batch_dir,
        )
        .await;

        // 收尾完整性核查：报告里的文件必须仍然在盘上且非空
        let results = verify_files_on_disk(results, &mut errors).await;

        let fatal_kind = if self.control.is_fatal() {
            Some(ErrorKind::AuthExpired)
        } else {
            None
        };

        let report = Report::new(batch_name, &batch_dir, started_at, results, errors, fatal_kind);
        report.save(&batch_dir).await?;

        // 输出最终统计
        logging::print_final_stats(&report, &self.config.output_log_file);

        Ok(report)
    }

    /// 按配置的来源加载工作项
    async fn load_work_items(&self) -> Result<(String, Vec<WorkItem>, Vec<String>)> {
        if let Some(task_name) = &self.config.task_name {
            let task = self
                .tasks
                .find_task(task_name, self.config.favorite_tasks)
                .await?
                .with_context(|| format!("任务 '{}' 不存在", task_name))?;

            let processes = self
                .tasks
                .list_all_task_processes(&task.name, self.config.favorite_tasks)
                .await?;

            let items = processes
                .into_iter()
                .map(|p| WorkItem::TaskEntry {
                    task: task.name.clone(),
                    process_id: p.process_id,
                    number: p.number,
                    task_instance_id: p.task_instance_id,
                })
                .collect();
            return Ok((task.name.clone(), items, Vec::new()));
        }

        if let Some(tag_name) = &self.config.tag_name {
            let tag = self
                .tags
                .find_tag(tag_name)
                .await?
                .with_context(|| format!("标签 '{}' 不存在", tag_name))?;

            let total = self.tags.count_tag_processes(tag.id).await.unwrap_or(0);
            info!("标签 '{}' 下共 {} 个案件", tag.name, total);

            let processes = self.tags.list_tag_processes(tag.id, 500).await?;
            let items = processes
                .into_iter()
                .map(|p| WorkItem::TagEntry {
                    tag: tag.name.clone(),
                    process_id: p.process_id,
                    number: p.number,
                    restricted: p.restricted,
                })
                .collect();
            return Ok((tag.name.clone(), items, Vec::new()));
        }

        if let Some(folder) = &self.config.numbers_folder {
            info!("\n📁 正在扫描编号批次文件...");
            let batches = load_all_batches(folder).await?;

            let mut items = Vec::new();
            let mut errors = Vec::new();
            for batch in &batches {
                for raw in &batch.numbers {
                    match CaseNumber::parse(raw) {
                        Ok(number) => items.push(WorkItem::Number { number }),
                        Err(e) => {
                            warn!("忽略非法编号 '{}': {}", raw, e);
                            errors.push(format!("非法编号 '{}': {}", raw, e));
                        }
                    }
                }
            }

            let name = match batches.as_slice() {
                [single] => single
                    .name
                    .clone()
                    .unwrap_or_else(default_number_batch_name),
                _ => default_number_batch_name(),
            };
            return Ok((name, items, errors));
        }

        Err(crate::error::AppError::Config(crate::error::ConfigError::NoWorkSource).into())
    }
}

fn default_number_batch_name() -> String {
    format!(
        "processos_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// 处理一个批次，返回与输入同序的结果
///
/// 有界工作者池共享同一个处理器与控制标志。取消或致命中止后
/// 未开始的案件直接记为 Cancelled，不再产生网络流量。
pub async fn run_batch(
    items: Vec<WorkItem>,
    handler: Arc<dyn ProcessHandler>,
    max_concurrent: usize,
    control: Arc<RunControl>,
    batch_dir: &Path,
) -> Vec<ProcessResult> {
    let total = items.len();
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let slots: Arc<Mutex<Vec<Option<ProcessResult>>>> =
        Arc::new(Mutex::new((0..total).map(|_| None).collect()));
    // 任务崩溃时兜底用的工作项副本
    let mut spawned: Vec<(usize, WorkItem)> = Vec::new();

    let mut handles = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        // 许可先于取消检查：等待许可期间到达的取消同样生效
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        if !control.may_start() {
            let mut slots = slots.lock().await;
            slots[index] = Some(cancelled_result(item));
            continue;
        }

        let number = item.number_display();
        let ctx = ProcessCtx::new(
            index + 1,
            total,
            number.clone(),
            batch_dir.join(sanitize_folder_name(&number)),
        );

        let handler = handler.clone();
        let control = control.clone();
        let slots = slots.clone();
        spawned.push((index, item.clone()));

        let handle = tokio::spawn(async move {
            let _permit = permit;
            let result = handler.handle(&item, &ctx, &control).await;
            let mut slots = slots.lock().await;
            slots[index] = Some(result);
        });
        handles.push((index, handle));
    }

    // 等待所有在途案件收尾
    for (index, handle) in handles {
        if let Err(e) = handle.await {
            error!("[案件 {}] 任务执行失败: {}", index + 1, e);
        }
    }

    // 任务崩溃留下的空槽降级为失败记录
    let mut slots = slots.lock().await;
    for (index, item) in spawned {
        if slots[index].is_none() {
            let number = item.number_display();
            slots[index] = Some(ProcessResult {
                item,
                number,
                outcome: Outcome::Failed {
                    kind: ErrorKind::Other,
                },
                attempts: 0,
                elapsed_ms: 0,
            });
        }
    }

    slots.drain(..).flatten().collect()
}

fn cancelled_result(item: WorkItem) -> ProcessResult {
    let number = item.number_display();
    ProcessResult {
        item,
        number,
        outcome: Outcome::Cancelled,
        attempts: 0,
        elapsed_ms: 0,
    }
}

/// 收尾完整性核查：成功案件的文件必须仍然在盘上且非空，
/// 否则降级为完整性失败并记录
async fn verify_files_on_disk(
    results: Vec<ProcessResult>,
    errors: &mut Vec<String>,
) -> Vec<ProcessResult> {
    let mut verified = Vec::with_capacity(results.len());

    for mut result in results {
        if let Outcome::Succeeded { files } = &result.outcome {
            let mut missing = Vec::new();
            for file in files {
                match tokio::fs::metadata(file).await {
                    Ok(meta) if meta.len() > 0 => {}
                    _ => missing.push(file.display().to_string()),
                }
            }
            if !missing.is_empty() {
                errors.push(format!(
                    "案件 {} 有 {} 个文件在收尾核查时缺失或为空",
                    result.number,
                    missing.len()
                ));
                result.outcome = Outcome::Failed {
                    kind: ErrorKind::IntegrityError,
                };
            }
        }
        verified.push(result);
    }

    verified
}
