//! 远程 UI 驱动 - 基础设施层
//!
//! 持有唯一的浏览器页面资源，只暴露"导航 / 等元素 / 点击 / 读属性"等能力。
//! 工作流各层只依赖 `UiDriver` trait，不认识 chromiumoxide，
//! 测试时可以用内存实现替换。

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, Page};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::AppError;

/// 页面元素引用
///
/// 只记录定位用的选择器；具体驱动在每次操作时重新定位，
/// 避免跨交互持有远端元素句柄（门户的组件会整体重绘）。
#[derive(Debug, Clone)]
pub struct ElementRef {
    selector: String,
}

impl ElementRef {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }
}

/// 远程 UI 驱动能力
///
/// 职责：
/// - 暴露导航、等待元素、点击、读属性等原子能力
/// - 不认识报表 / 客户 / 台账
/// - 不处理业务流程
#[async_trait]
pub trait UiDriver: Send + Sync {
    /// 导航到指定地址
    async fn navigate(&self, url: &str) -> Result<()>;

    /// 等待元素出现，超时返回瞬态错误
    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<ElementRef>;

    /// 点击元素
    async fn click(&self, element: &ElementRef) -> Result<()>;

    /// 读取元素属性
    async fn read_attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>>;

    /// 向元素输入文本
    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<()>;

    /// 直接设置元素的 value 并派发 value-changed 事件
    ///
    /// 门户的日期控件不接受普通键入，必须走这条路
    async fn set_value(&self, element: &ElementRef, value: &str) -> Result<()>;

    /// 元素当前是否存在（廉价检查，无副作用，不等待）
    async fn is_present(&self, selector: &str) -> bool;

    /// 当前页面地址
    async fn current_context(&self) -> Result<String>;

    /// 设置浏览器的下载目录
    async fn set_download_dir(&self, dir: &Path) -> Result<()>;

    /// 释放驱动资源
    async fn close(&self);
}

/// 门户驱动（chromiumoxide 实现）
///
/// 唯一持有 Page 的模块；Browser 一并持有以维持进程生命周期
pub struct PortalDriver {
    browser: Mutex<Browser>,
    page: Page,
    /// 等待元素时的轮询间隔
    poll_interval: Duration,
}

impl PortalDriver {
    /// 创建新的门户驱动
    pub fn new(browser: Browser, page: Page) -> Self {
        Self {
            browser: Mutex::new(browser),
            page,
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[async_trait]
impl UiDriver for PortalDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("导航到: {}", url);
        self.page.goto(url).await.map_err(|e| {
            AppError::Driver(crate::error::DriverError::NavigationFailed {
                url: url.to_string(),
                source: Box::new(e),
            })
        })?;
        Ok(())
    }

    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<ElementRef> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(ElementRef::new(selector));
            }
            if Instant::now() >= deadline {
                return Err(AppError::element_timeout(selector, timeout.as_secs()).into());
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        debug!("点击元素: {}", element.selector());
        let found = self
            .page
            .find_element(element.selector())
            .await
            .map_err(|e| AppError::interaction_failed(element.selector(), e))?;
        found
            .click()
            .await
            .map_err(|e| AppError::interaction_failed(element.selector(), e))?;
        Ok(())
    }

    async fn read_attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        let found = self
            .page
            .find_element(element.selector())
            .await
            .map_err(|e| AppError::interaction_failed(element.selector(), e))?;
        let value = found
            .attribute(name)
            .await
            .map_err(|e| AppError::interaction_failed(element.selector(), e))?;
        Ok(value)
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<()> {
        let found = self
            .page
            .find_element(element.selector())
            .await
            .map_err(|e| AppError::interaction_failed(element.selector(), e))?;
        found
            .click()
            .await
            .map_err(|e| AppError::interaction_failed(element.selector(), e))?;
        found
            .type_str(text)
            .await
            .map_err(|e| AppError::interaction_failed(element.selector(), e))?;
        Ok(())
    }

    async fn set_value(&self, element: &ElementRef, value: &str) -> Result<()> {
        // 构造与门户组件兼容的 value-changed 事件
        let js_code = format!(
            r#"
            (() => {{
                const el = document.querySelector({selector});
                if (!el) return false;
                el.value = {value};
                el.dispatchEvent(new CustomEvent('value-changed', {{
                    detail: {{ value: {value} }},
                    bubbles: true,
                    composed: true
                }}));
                return true;
            }})()
            "#,
            selector = serde_json::to_string(element.selector())?,
            value = serde_json::to_string(value)?,
        );

        let result = self.page.evaluate(js_code).await.map_err(|e| {
            AppError::Driver(crate::error::DriverError::ScriptExecutionFailed {
                source: Box::new(e),
            })
        })?;

        let applied: bool = result.into_value().unwrap_or(false);
        if !applied {
            return Err(AppError::element_timeout(element.selector(), 0).into());
        }
        Ok(())
    }

    async fn is_present(&self, selector: &str) -> bool {
        self.page.find_element(selector).await.is_ok()
    }

    async fn current_context(&self) -> Result<String> {
        let url = self.page.url().await.map_err(|e| {
            AppError::Driver(crate::error::DriverError::ScriptExecutionFailed {
                source: Box::new(e),
            })
        })?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<()> {
        debug!("设置下载目录: {}", dir.display());
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().to_string())
            .build()
            .map_err(|e| anyhow::anyhow!("构造下载行为参数失败: {}", e))?;
        self.page.execute(params).await.map_err(|e| {
            AppError::Driver(crate::error::DriverError::ScriptExecutionFailed {
                source: Box::new(e),
            })
        })?;
        Ok(())
    }

    async fn close(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            debug!("关闭浏览器失败（忽略）: {}", e);
        }
    }
}
