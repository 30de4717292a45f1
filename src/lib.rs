//! # PJe Batch Download
//!
//! 一个用于批量下载司法案件文书的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（已认证会话），只暴露能力
//! - `Session` - 唯一的 HTTP 传输 owner，提供请求与单飞续期能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个对象
//! - `AuthService` - SSO 登录与角色选择能力
//! - `TaskService` / `TagService` - 任务与标签目录枚举能力
//! - `Resolver` - 编号 → 内部 ID + 访问密钥的多路径解析能力
//! - `AccessKeyIssuer` - 按案件单飞的密钥签发能力
//! - `DownloadService` - 文书列表、流式下载与校验能力
//! - `markup` - 遗留页面结构的窄解析器
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个案件"的完整处理流程
//! - `ProcessCtx` - 上下文封装（序号 + 编号 + 落盘目录）
//! - `ProcessFlow` - 流程编排（解析 → 列表 → 下载 → 校验）
//! - `retry` - 按错误种类决策的重试驱动
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量案件处理器，管理会话、并发与取消
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};
pub use infrastructure::Session;
pub use models::{CaseNumber, Outcome, ProcessRef, ProcessResult, Report, WorkItem};
pub use orchestrator::{run_batch, App};
pub use services::{AuthService, DownloadService, Resolver, TagService, TaskService};
pub use workflow::{ProcessCtx, ProcessFlow, ProcessHandler, RetryPolicy, RunControl};
