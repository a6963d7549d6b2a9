//! 会话管理服务 - 业务能力层
//!
//! 只负责"登录 / 探测过期 / 恢复"能力，不关心报表流程。
//!
//! 恢复目标用逻辑上下文名表示，上下文到导航序列的映射是
//! 编译期固定的；映射中没有的上下文必须由调用方按致命错误处理。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::infrastructure::UiDriver;
use crate::models::ClientProfile;
use crate::services::selectors;
use crate::utils::RetryPolicy;

/// 一步菜单导航
#[derive(Debug, Clone, Copy)]
pub struct NavStep {
    pub selector: &'static str,
    pub description: &'static str,
}

static VENTAS_NAV: [NavStep; 3] = [
    NavStep {
        selector: selectors::MENU_BUTTON,
        description: "菜单按钮",
    },
    NavStep {
        selector: selectors::MENU_REPORTS_ITEM,
        description: "报表菜单",
    },
    NavStep {
        selector: selectors::MENU_SALES_ITEM,
        description: "销售报表入口",
    },
];

static INVENTARIO_NAV: [NavStep; 2] = [
    NavStep {
        selector: selectors::MENU_BUTTON,
        description: "菜单按钮",
    },
    NavStep {
        selector: selectors::MENU_INVENTORY_ITEM,
        description: "库存报表入口",
    },
];

/// 逻辑上下文名 → 导航序列
static NAV_SEQUENCES: phf::Map<&'static str, &'static [NavStep]> = phf::phf_map! {
    "ventas" => &VENTAS_NAV,
    "inventario" => &INVENTARIO_NAV,
};

/// 会话管理服务
///
/// 职责：
/// - 登录门户（失败即致命，不重试）
/// - 廉价探测会话过期标记
/// - 恢复会话并导航回指定上下文
/// - 登出
#[derive(Clone)]
pub struct SessionService {
    driver: Arc<dyn UiDriver>,
    base_url: String,
    element_timeout: Duration,
    step_pause: Duration,
    retry: RetryPolicy,
}

impl SessionService {
    /// 创建新的会话管理服务
    pub fn new(
        driver: Arc<dyn UiDriver>,
        base_url: impl Into<String>,
        element_timeout: Duration,
        step_pause: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            driver,
            base_url: base_url.into(),
            element_timeout,
            step_pause,
            retry,
        }
    }

    /// 会话是否仍然有效
    ///
    /// 出现过期标记即视为无效；本检查无副作用，
    /// 必须在任何依赖登录态的交互之前调用
    pub async fn is_session_active(&self) -> bool {
        let expired = self
            .driver
            .is_present(selectors::SESSION_EXPIRED_MARKER)
            .await;
        if expired {
            debug!("检测到会话过期标记");
        }
        !expired
    }

    /// 登录门户
    ///
    /// 凭证表单是确定性的，失败直接上抛，不做重试
    pub async fn login(&self, profile: &ClientProfile) -> Result<()> {
        info!("🔑 正在登录门户...");

        let result = self.do_login(profile).await;
        match result {
            Ok(()) => {
                info!("✓ 登录成功");
                Ok(())
            }
            Err(e) => Err(AppError::Session(crate::error::SessionError::LoginFailed {
                source: e.into(),
            })
            .into()),
        }
    }

    async fn do_login(&self, profile: &ClientProfile) -> Result<()> {
        self.driver.navigate(&self.base_url).await?;

        // 选择国家与业务线
        let pais = self
            .driver
            .wait_for_element(selectors::PAIS_SELECT, self.element_timeout)
            .await?;
        self.driver.type_text(&pais, "Chile").await?;

        let uneg = self
            .driver
            .wait_for_element(selectors::UNEG_SELECT, self.element_timeout)
            .await?;
        self.driver.type_text(&uneg, "Salud").await?;

        let entry = self
            .driver
            .wait_for_element(selectors::LOGIN_ENTRY_BUTTON, self.element_timeout)
            .await?;
        self.driver.click(&entry).await?;

        // 填写凭证
        let username = self
            .driver
            .wait_for_element(selectors::USERNAME_INPUT, self.element_timeout)
            .await?;
        self.driver.type_text(&username, &profile.user).await?;

        let password = self
            .driver
            .wait_for_element(selectors::PASSWORD_INPUT, self.element_timeout)
            .await?;
        self.driver.type_text(&password, &profile.password).await?;

        let submit = self
            .driver
            .wait_for_element(selectors::LOGIN_SUBMIT_BUTTON, self.element_timeout)
            .await?;
        self.driver.click(&submit).await?;

        // 等待登录后的首页渲染
        sleep(self.step_pause).await;
        Ok(())
    }

    /// 登出门户，清理远端会话
    pub async fn logout(&self) -> Result<()> {
        info!("🚪 正在登出...");
        self.retry
            .run("登出按钮", || async move {
                let button = self
                    .driver
                    .wait_for_element(selectors::LOGOUT_BUTTON, self.element_timeout)
                    .await?;
                self.driver.click(&button).await
            })
            .await?;
        sleep(self.step_pause).await;
        info!("✓ 已登出");
        Ok(())
    }

    /// 按逻辑上下文导航到对应的报表界面
    pub async fn navigate_to(&self, context: &str) -> Result<()> {
        let Some(steps) = NAV_SEQUENCES.get(context) else {
            return Err(AppError::Session(crate::error::SessionError::UnknownContext {
                context: context.to_string(),
            })
            .into());
        };
        self.run_sequence(context, steps).await
    }

    /// 恢复会话并导航回指定上下文
    ///
    /// # 返回
    /// - `Ok(true)`: 重新登录并导航成功
    /// - `Ok(false)`: 映射中没有该上下文，调用方必须按致命错误处理
    pub async fn recover_and_resume(
        &self,
        profile: &ClientProfile,
        context: &str,
    ) -> Result<bool> {
        warn!("♻️ 会话失效，重新登录并返回上下文 {}", context);

        let Some(steps) = NAV_SEQUENCES.get(context) else {
            warn!("⚠️ 没有上下文 {} 的导航序列", context);
            return Ok(false);
        };

        self.login(profile).await?;
        self.run_sequence(context, steps).await?;

        info!("✓ 会话恢复完成，已回到 {}", context);
        Ok(true)
    }

    /// 逐步执行导航序列，每步带限次重试
    async fn run_sequence(&self, context: &str, steps: &[NavStep]) -> Result<()> {
        debug!("导航到上下文: {}", context);
        sleep(self.step_pause).await;

        for step in steps {
            let step = *step;
            self.retry
                .run(step.description, || async move {
                    let element = self
                        .driver
                        .wait_for_element(step.selector, self.element_timeout)
                        .await?;
                    self.driver.click(&element).await
                })
                .await?;
            // 等菜单展开
            sleep(self.step_pause).await;
        }

        info!("✓ 已进入 {} 界面", context);
        Ok(())
    }
}
