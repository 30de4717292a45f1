use anyhow::Result;
/// 日志工具模块
///
/// 提供 tracing 初始化、运行日志文件和批次统计输出的辅助函数
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::Report;

/// 初始化 tracing 日志
///
/// 默认 info 级别，可用 RUST_LOG 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// 初始化运行日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n案件下载日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(max_concurrent: usize, max_attempts: u32) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量案件下载模式");
    info!("📊 最大并发数: {}", max_concurrent);
    info!("🔁 单案件最大尝试次数: {}", max_attempts);
    info!("{}", "=".repeat(60));
}

/// 记录批次来源信息
///
/// # 参数
/// - `source`: 来源描述（任务 / 标签 / 编号批次）
/// - `total`: 案件总数
pub fn log_batch_source(source: &str, total: usize) {
    info!("✓ {} 共找到 {} 个待处理案件", source, total);
    info!("💡 所有工作者共享同一会话，受门户限流约束\n");
}

/// 打印最终统计信息
pub fn print_final_stats(report: &Report, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 批次处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", report.counts.succeeded, report.results.len());
    info!("🔒 保密: {}", report.counts.restricted);
    info!("🔍 未找到: {}", report.counts.not_found);
    info!("❌ 失败: {}", report.counts.failed);
    info!("🛑 取消: {}", report.counts.cancelled);
    if let Some(kind) = report.fatal_kind {
        info!("⚠️ 批次因致命错误提前中止: {}", kind);
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}
