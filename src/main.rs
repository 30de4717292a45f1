use anyhow::Result;
use pje_batch_download::utils::logging;
use pje_batch_download::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();

    // 初始化应用（建会话 + 登录 + 选角色）
    let app = App::initialize(config).await?;

    // Ctrl-C 触发协作式取消：在途文书下完，未开始的案件不再处理
    let control = app.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 收到 Ctrl-C，请求取消批次");
            control.request_cancel();
        }
    });

    // 运行批次
    let report = app.run().await?;

    // 退出码与结果对应：有失败或致命中止时非零退出
    if report.fatal_kind.is_some() || report.counts.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
