//! 工作流集成测试
//!
//! 用内存实现的 UiDriver / RunLedger 驱动完整状态机，
//! 不需要真实浏览器和数据库。

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use b2b_report_download::infrastructure::ElementRef;
use b2b_report_download::services::selectors;
use b2b_report_download::{
    App, AppError, ClientProfile, Config, RunLedger, RunOutcome, RunStatus, UiDriver, UnitPattern,
};

// ========== 台账 Mock ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedgerEvent {
    Insert,
    Update(RunStatus),
}

struct MockLedger {
    profile: ClientProfile,
    patterns: Vec<UnitPattern>,
    success_today: AtomicBool,
    events: Mutex<Vec<LedgerEvent>>,
}

impl MockLedger {
    fn new(profile: ClientProfile, patterns: Vec<UnitPattern>) -> Self {
        Self {
            profile,
            patterns,
            success_today: AtomicBool::new(false),
            events: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().expect("events 锁").clone()
    }
}

#[async_trait]
impl RunLedger for MockLedger {
    async fn get_client_profile(&self, _cliente: &str, _cadena: &str) -> Result<ClientProfile> {
        Ok(self.profile.clone())
    }

    async fn has_success_today(&self, _cliente: &str, _cadena: &str) -> Result<bool> {
        Ok(self.success_today.load(Ordering::SeqCst))
    }

    async fn insert_run(&self, _cliente: &str, _cadena: &str) -> Result<()> {
        self.events.lock().expect("events 锁").push(LedgerEvent::Insert);
        Ok(())
    }

    async fn update_run_status(
        &self,
        _cliente: &str,
        _cadena: &str,
        status: RunStatus,
    ) -> Result<()> {
        self.events
            .lock()
            .expect("events 锁")
            .push(LedgerEvent::Update(status));
        if status == RunStatus::Success {
            self.success_today.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn unit_naming_patterns(&self, _cliente_id: i64) -> Result<Vec<UnitPattern>> {
        Ok(self.patterns.clone())
    }

    async fn close(&self) {}
}

// ========== 驱动 Mock ==========

/// 模拟门户的内存驱动
///
/// - 点击下载链接时往下载目录写 zip / csv
/// - 可配置会话过期标记的出现与清除方式
struct MockDriver {
    download_dir: Mutex<Option<PathBuf>>,
    interactions: AtomicUsize,
    clicks: Mutex<Vec<String>>,
    logins: AtomicUsize,
    /// `.back-home` 标记当前是否可见
    session_expired: AtomicBool,
    /// 第一次点击该选择器时触发会话过期（消费一次）
    expire_on_click: Mutex<Option<String>>,
    /// 过期期间非登录类点击是否失败
    fail_clicks_when_expired: bool,
    /// 登录提交是否能清掉过期标记（门户持续无响应时为 false）
    login_clears_expiry: bool,
    /// 点击下载链接是否真的产出文件（模拟下载没落盘时为 false）
    produce_artifacts: bool,
    /// 状态栅格显示的参考日期（DD-MM-YYYY）
    fecha_title: String,
    artifact_counter: AtomicUsize,
}

impl MockDriver {
    fn new(fecha: NaiveDate) -> Self {
        Self {
            download_dir: Mutex::new(None),
            interactions: AtomicUsize::new(0),
            clicks: Mutex::new(Vec::new()),
            logins: AtomicUsize::new(0),
            session_expired: AtomicBool::new(false),
            expire_on_click: Mutex::new(None),
            fail_clicks_when_expired: true,
            login_clears_expiry: true,
            produce_artifacts: true,
            fecha_title: fecha.format("%d-%m-%Y").to_string(),
            artifact_counter: AtomicUsize::new(0),
        }
    }

    fn interaction_count(&self) -> usize {
        self.interactions.load(Ordering::SeqCst)
    }

    fn login_count(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    fn clicked(&self, selector: &str) -> bool {
        self.clicks
            .lock()
            .expect("clicks 锁")
            .iter()
            .any(|s| s == selector)
    }

    fn is_login_selector(selector: &str) -> bool {
        [
            selectors::PAIS_SELECT,
            selectors::UNEG_SELECT,
            selectors::LOGIN_ENTRY_BUTTON,
            selectors::USERNAME_INPUT,
            selectors::PASSWORD_INPUT,
            selectors::LOGIN_SUBMIT_BUTTON,
        ]
        .contains(&selector)
    }

    fn current_download_dir(&self) -> PathBuf {
        self.download_dir
            .lock()
            .expect("download_dir 锁")
            .clone()
            .expect("下载目录应已设置")
    }

    fn write_sales_zip(&self) {
        let n = self.artifact_counter.fetch_add(1, Ordering::SeqCst);
        let dir = self.current_download_dir();
        let path = dir.join(format!("venta_{}.zip", n));
        let file = std::fs::File::create(&path).expect("创建 zip 失败");
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("venta_detalle.csv", zip::write::SimpleFileOptions::default())
            .expect("写 zip 条目失败");
        writer
            .write_all(format!("sku;monto\n{};100\n", n).as_bytes())
            .expect("写 csv 内容失败");
        writer.finish().expect("关闭 zip 失败");
    }

    fn write_inventory_csv(&self) {
        let n = self.artifact_counter.fetch_add(1, Ordering::SeqCst);
        let dir = self.current_download_dir();
        std::fs::write(
            dir.join(format!("detalleinventario_{}.csv", n)),
            format!("sku;stock\n{};5\n", n),
        )
        .expect("写库存 csv 失败");
    }
}

#[async_trait]
impl UiDriver for MockDriver {
    async fn navigate(&self, _url: &str) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_element(&self, selector: &str, _timeout: Duration) -> Result<ElementRef> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        Ok(ElementRef::new(selector))
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let selector = element.selector().to_string();

        // 触发一次性的会话过期
        {
            let mut trigger = self.expire_on_click.lock().expect("trigger 锁");
            if trigger.as_deref() == Some(selector.as_str()) {
                *trigger = None;
                self.session_expired.store(true, Ordering::SeqCst);
                if self.fail_clicks_when_expired {
                    return Err(AppError::element_timeout(selector, 0).into());
                }
            }
        }

        // 过期期间：除登录流程外的点击都失败
        if self.session_expired.load(Ordering::SeqCst)
            && self.fail_clicks_when_expired
            && !Self::is_login_selector(&selector)
        {
            return Err(AppError::element_timeout(selector, 0).into());
        }

        self.clicks.lock().expect("clicks 锁").push(selector.clone());

        if selector == selectors::LOGIN_SUBMIT_BUTTON {
            self.logins.fetch_add(1, Ordering::SeqCst);
            if self.login_clears_expiry {
                self.session_expired.store(false, Ordering::SeqCst);
            }
        } else if selector == selectors::SALES_CSV_LINK {
            if self.produce_artifacts {
                self.write_sales_zip();
            }
        } else if selector == selectors::INVENTORY_CSV_LINK {
            if self.produce_artifacts {
                self.write_inventory_csv();
            }
        }

        Ok(())
    }

    async fn read_attribute(&self, element: &ElementRef, _name: &str) -> Result<Option<String>> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let value = match element.selector() {
            s if s == selectors::GRID_FECHA_CELL => Some(self.fecha_title.clone()),
            s if s == selectors::GRID_ULTIMA_CARGA_CELL => {
                Some(format!("{} 06:00", self.fecha_title))
            }
            _ => None,
        };
        Ok(value)
    }

    async fn type_text(&self, _element: &ElementRef, _text: &str) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_value(&self, _element: &ElementRef, _value: &str) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_present(&self, selector: &str) -> bool {
        if selector == selectors::SESSION_EXPIRED_MARKER {
            return self.session_expired.load(Ordering::SeqCst);
        }
        true
    }

    async fn current_context(&self) -> Result<String> {
        Ok("mock://portal".to_string())
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<()> {
        *self.download_dir.lock().expect("download_dir 锁") = Some(dir.to_path_buf());
        Ok(())
    }

    async fn close(&self) {}
}

// ========== 测试脚手架 ==========

fn profile(units: u32) -> ClientProfile {
    ClientProfile {
        id: 11,
        cliente: "farmatest".to_string(),
        nombre: "FARMACIA_TEST".to_string(),
        user: "usuario".to_string(),
        password: "clave".to_string(),
        unidad_negocio: units,
    }
}

fn patterns(count: usize) -> Vec<UnitPattern> {
    (0..count)
        .map(|i| UnitPattern {
            unidad_negocio_id: (count - i) as i64,
            archivo_venta: format!("VCV{:02}", i + 1),
            archivo_inventario: format!("ICV{:02}", i + 1),
        })
        .collect()
}

fn test_config(root: &Path) -> Config {
    Config {
        archivo_base: root.to_string_lossy().to_string(),
        step_pause_secs: 0,
        download_settle_secs: 0,
        retry_pause_secs: 0,
        ..Config::default()
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn output_dir(root: &Path) -> PathBuf {
    root.join("FARMACIA_TEST").join("CRUZ_VERDE")
}

// ========== 场景测试 ==========

#[tokio::test]
async fn test_second_run_short_circuits_without_side_effects() {
    let root = tempfile::tempdir().expect("临时目录");
    let ledger = Arc::new(MockLedger::new(profile(2), patterns(2)));
    ledger.success_today.store(true, Ordering::SeqCst);
    let driver = Arc::new(MockDriver::new(today()));

    let app = App::new(test_config(root.path()), ledger.clone(), driver.clone());
    let outcome = app.run("farmatest").await.expect("应正常返回");

    assert_eq!(outcome, RunOutcome::AlreadyDone);
    // 幂等检查之外零 UI 调用、零台账写入
    assert_eq!(driver.interaction_count(), 0);
    assert!(ledger.events().is_empty());
}

#[tokio::test]
async fn test_stale_reference_date_is_recorded_and_rejected() {
    let root = tempfile::tempdir().expect("临时目录");
    let ledger = Arc::new(MockLedger::new(profile(2), patterns(2)));
    // 参考日期 3 天前：超出 2 天上限
    let stale = today() - chrono::Duration::days(3);
    let driver = Arc::new(MockDriver::new(stale));

    let app = App::new(test_config(root.path()), ledger.clone(), driver.clone());
    let outcome = app.run("farmatest").await.expect("拒绝也属于正常返回");

    assert_eq!(outcome, RunOutcome::StaleData);
    // 刻意记录的尝试：pending 后立即置失败
    assert_eq!(
        ledger.events(),
        vec![
            LedgerEvent::Insert,
            LedgerEvent::Update(RunStatus::Failed)
        ]
    );
    // 没有触发任何下载
    assert!(!driver.clicked(selectors::SALES_CSV_LINK));
    assert!(!driver.clicked(selectors::INVENTORY_CSV_LINK));
}

#[tokio::test]
async fn test_full_run_two_units_produces_four_canonical_files() {
    let root = tempfile::tempdir().expect("临时目录");
    let ledger = Arc::new(MockLedger::new(profile(2), patterns(2)));
    let driver = Arc::new(MockDriver::new(today()));

    let app = App::new(test_config(root.path()), ledger.clone(), driver.clone());
    let outcome = app.run("farmatest").await.expect("完整执行应成功");

    assert_eq!(outcome, RunOutcome::Completed);

    // 正好一次 pending → success 转换
    assert_eq!(
        ledger.events(),
        vec![
            LedgerEvent::Insert,
            LedgerEvent::Update(RunStatus::Success)
        ]
    );
    // 成功记录生效后，幂等检查立即可见
    assert!(ledger.success_today.load(Ordering::SeqCst));

    // 2 个销售 + 2 个库存规范文件
    let stamp = today().format("%Y%m%d").to_string();
    let out = output_dir(root.path());
    for prefix in ["VCV01", "VCV02", "ICV01", "ICV02"] {
        let path = out.join(format!("{}{}.csv", prefix, stamp));
        assert!(path.exists(), "缺少规范文件 {}", path.display());
    }

    // 下载目录里的 zip 已全部被消费
    let leftovers: Vec<_> = std::fs::read_dir(out.join("Zip"))
        .expect("下载目录应存在")
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "zip")
                .unwrap_or(false)
        })
        .collect();
    assert!(leftovers.is_empty(), "不应残留未消费的 zip");

    // 成功前登出过
    assert!(driver.clicked(selectors::LOGOUT_BUTTON));
}

#[tokio::test]
async fn test_session_expiry_mid_pass_recovers_and_completes() {
    let root = tempfile::tempdir().expect("临时目录");
    let ledger = Arc::new(MockLedger::new(profile(3), patterns(3)));
    let driver = Arc::new(MockDriver::new(today()));
    // 第 2 个单元的第一步（过滤器重置）触发会话过期
    *driver.expire_on_click.lock().expect("trigger 锁") =
        Some(selectors::FILTER_RESET_BUTTON.to_string());

    let app = App::new(test_config(root.path()), ledger.clone(), driver.clone());
    let outcome = app.run("farmatest").await.expect("恢复后应继续完成");

    assert_eq!(outcome, RunOutcome::Completed);
    // 初始登录 + 一次恢复登录
    assert_eq!(driver.login_count(), 2);

    // 3 个单元全部产出
    let stamp = today().format("%Y%m%d").to_string();
    let out = output_dir(root.path());
    for prefix in ["VCV01", "VCV02", "VCV03", "ICV01", "ICV02", "ICV03"] {
        assert!(out.join(format!("{}{}.csv", prefix, stamp)).exists());
    }

    assert_eq!(
        ledger.events(),
        vec![
            LedgerEvent::Insert,
            LedgerEvent::Update(RunStatus::Success)
        ]
    );
}

#[tokio::test]
async fn test_recovery_budget_is_per_pass_and_bounded() {
    let root = tempfile::tempdir().expect("临时目录");
    // 4 个单元：过期标记永不消失时，第 4 次恢复请求必然超出预算 3
    let ledger = Arc::new(MockLedger::new(profile(4), patterns(4)));
    let mut driver = MockDriver::new(today());
    driver.fail_clicks_when_expired = false;
    driver.login_clears_expiry = false;
    driver.session_expired.store(true, Ordering::SeqCst);
    let driver = Arc::new(driver);

    let app = App::new(test_config(root.path()), ledger.clone(), driver.clone());
    let err = app
        .run("farmatest")
        .await
        .expect_err("恢复预算耗尽应失败");

    let app_err = err.downcast_ref::<AppError>().expect("应是 AppError");
    assert!(matches!(
        app_err,
        AppError::Session(b2b_report_download::error::SessionError::RecoveryExhausted {
            attempts: 3
        })
    ));

    // 初始登录 + 预算内的 3 次恢复登录
    assert_eq!(driver.login_count(), 4);

    // 失败必须落成终态，不残留 pending
    assert_eq!(
        ledger.events(),
        vec![
            LedgerEvent::Insert,
            LedgerEvent::Update(RunStatus::Failed)
        ]
    );
}

#[tokio::test]
async fn test_missing_artifact_fails_run_with_failed_ledger_state() {
    let root = tempfile::tempdir().expect("临时目录");
    let ledger = Arc::new(MockLedger::new(profile(1), patterns(1)));
    let mut driver = MockDriver::new(today());
    // 下载动作"成功"但文件从未落盘
    driver.produce_artifacts = false;
    let driver = Arc::new(driver);

    let app = App::new(test_config(root.path()), ledger.clone(), driver.clone());
    let err = app.run("farmatest").await.expect_err("产物缺失应失败");

    let app_err = err.downcast_ref::<AppError>().expect("应是 AppError");
    assert!(matches!(
        app_err,
        AppError::File(b2b_report_download::error::FileError::NoRecentArtifact { .. })
    ));

    // 台账必须是 failed 终态，而不是残留 pending
    assert_eq!(
        ledger.events(),
        vec![
            LedgerEvent::Insert,
            LedgerEvent::Update(RunStatus::Failed)
        ]
    );
}

#[tokio::test]
async fn test_missing_naming_pattern_fails_before_ledger_write() {
    let root = tempfile::tempdir().expect("临时目录");
    // 2 个业务单元但只有 1 条命名模式
    let ledger = Arc::new(MockLedger::new(profile(2), patterns(1)));
    let driver = Arc::new(MockDriver::new(today()));

    let app = App::new(test_config(root.path()), ledger.clone(), driver.clone());
    let err = app.run("farmatest").await.expect_err("配置缺失应失败");

    let app_err = err.downcast_ref::<AppError>().expect("应是 AppError");
    assert!(matches!(
        app_err,
        AppError::Config(b2b_report_download::error::ConfigError::MissingUnitPattern {
            unit_index: 1,
            available: 1
        })
    ));

    // 失败发生在写台账之前：不留任何记录
    assert!(ledger.events().is_empty());
    // 也没碰过登录
    assert_eq!(driver.login_count(), 0);
}
