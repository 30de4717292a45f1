use pje_batch_download::utils::logging;
use pje_batch_download::{App, Config};

#[tokio::test]
#[ignore] // 默认忽略，需要真实门户凭据：cargo test -- --ignored
async fn test_login_and_list_tasks() {
    // 初始化日志
    logging::init();

    // 加载配置（PJE_USER / PJE_PASSWORD 来自环境）
    let config = Config::from_env();

    let app = App::initialize(config).await.expect("登录失败");
    drop(app);
}

#[tokio::test]
#[ignore]
async fn test_download_single_number() {
    // 初始化日志
    logging::init();

    // 加载配置
    let mut config = Config::from_env();

    // 注意：请根据实际情况修改编号批次目录
    config.task_name = None;
    config.tag_name = None;
    config.numbers_folder = Some("lotes".to_string());

    let app = App::initialize(config).await.expect("登录失败");
    let report = app.run().await.expect("批次运行失败");

    assert!(
        report.counts.failed == 0,
        "不应有失败案件: {:?}",
        report.counts
    );
}

#[tokio::test]
#[ignore]
async fn test_download_by_task() {
    // 初始化日志
    logging::init();

    // 加载配置
    let mut config = Config::from_env();
    config.task_name = Some("Minutar sentença".to_string());

    let app = App::initialize(config).await.expect("登录失败");
    let report = app.run().await.expect("批次运行失败");

    println!(
        "成功 {} / 保密 {} / 失败 {}",
        report.counts.succeeded, report.counts.restricted, report.counts.failed
    );
}
