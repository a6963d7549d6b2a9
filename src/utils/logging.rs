use anyhow::Result;
/// 日志工具模块
///
/// 提供 tracing 初始化和输出格式辅助函数
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 日志
///
/// 默认 info 级别，可用 RUST_LOG 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n报表下载日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(cliente: &str, cadena: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - B2B 报表下载");
    info!("👤 客户: {} | 渠道: {}", cliente, cadena);
    info!("{}", "=".repeat(60));
}

/// 记录报表轮次开始
pub fn log_pass_start(kind_label: &str, unit_count: u32) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始{}报表遍历，共 {} 个业务单元", kind_label, unit_count);
    info!("{}", "=".repeat(60));
}

/// 记录报表轮次结束
pub fn log_pass_complete(kind_label: &str, unit_count: u32) {
    info!("\n{}", "─".repeat(60));
    info!("✓ {}报表遍历完成: {}/{} 个业务单元", kind_label, unit_count, unit_count);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
