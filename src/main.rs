use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use b2b_report_download::browser;
use b2b_report_download::infrastructure::PortalDriver;
use b2b_report_download::utils::logging;
use b2b_report_download::{App, Config, MySqlRunLedger, RunOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 命令行只收一个位置参数：客户标识
    let Some(cliente) = std::env::args().nth(1) else {
        eprintln!("用法: b2b_report_download <cliente>");
        std::process::exit(1);
    };

    // 加载配置
    let config = Config::from_env();
    logging::init_log_file(&config.output_log_file)?;
    logging::log_startup(&cliente, &config.cadena);

    // 连接台账
    let ledger = Arc::new(MySqlRunLedger::connect(&config.database_url).await?);

    // 启动浏览器并构建驱动
    let (browser, page) = browser::launch_headless_browser(&config.base_url).await?;
    let driver = Arc::new(PortalDriver::new(browser, page));

    // 初始化并运行应用
    let app = App::new(config, ledger, driver);
    match app.run(&cliente).await {
        Ok(RunOutcome::Completed) => {
            info!("✅ 报表下载全部完成");
            Ok(())
        }
        Ok(RunOutcome::AlreadyDone) => {
            info!("今天已成功执行过，无需重复");
            Ok(())
        }
        Ok(RunOutcome::StaleData) => {
            error!("参考日期过旧，本次已记录为失败");
            std::process::exit(1);
        }
        Err(e) => {
            error!("❌ 执行失败: {:#}", e);
            Err(e)
        }
    }
}
