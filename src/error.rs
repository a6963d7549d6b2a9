use std::fmt;
use std::path::PathBuf;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 浏览器驱动相关错误
    Driver(DriverError),
    /// 会话相关错误
    Session(SessionError),
    /// 台账（数据库）错误
    Ledger(LedgerError),
    /// 文件归整错误
    File(FileError),
    /// 业务规则错误
    Business(BusinessError),
    /// 配置错误
    Config(ConfigError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Driver(e) => write!(f, "驱动错误: {}", e),
            AppError::Session(e) => write!(f, "会话错误: {}", e),
            AppError::Ledger(e) => write!(f, "台账错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Business(e) => write!(f, "业务错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Driver(e) => Some(e),
            AppError::Session(e) => Some(e),
            AppError::Ledger(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Business(e) => Some(e),
            AppError::Config(e) => Some(e),
        }
    }
}

/// 浏览器驱动相关错误
///
/// 元素超时 / 交互失败属于瞬态错误，受限次重试策略管辖；
/// 其余一律视为致命错误。
#[derive(Debug)]
pub enum DriverError {
    /// 导航失败
    NavigationFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 等待元素超时
    ElementTimeout {
        selector: String,
        timeout_secs: u64,
    },
    /// 元素交互失败
    InteractionFailed {
        selector: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 执行脚本失败
    ScriptExecutionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::NavigationFailed { url, source } => {
                write!(f, "导航到 {} 失败: {}", url, source)
            }
            DriverError::ElementTimeout {
                selector,
                timeout_secs,
            } => {
                write!(f, "等待元素 {} 超时 ({}秒)", selector, timeout_secs)
            }
            DriverError::InteractionFailed { selector, source } => {
                write!(f, "元素 {} 交互失败: {}", selector, source)
            }
            DriverError::ScriptExecutionFailed { source } => {
                write!(f, "执行脚本失败: {}", source)
            }
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DriverError::NavigationFailed { source, .. }
            | DriverError::InteractionFailed { source, .. }
            | DriverError::ScriptExecutionFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            DriverError::ElementTimeout { .. } => None,
        }
    }
}

/// 会话相关错误
#[derive(Debug)]
pub enum SessionError {
    /// 会话已过期（页面出现过期标记）
    Expired {
        context: String,
    },
    /// 登录失败（凭证表单是确定性的，不重试）
    LoginFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 会话恢复次数耗尽
    RecoveryExhausted {
        attempts: usize,
    },
    /// 恢复目标上下文没有对应的导航序列
    UnknownContext {
        context: String,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Expired { context } => {
                write!(f, "会话已过期 (上下文: {})", context)
            }
            SessionError::LoginFailed { source } => {
                write!(f, "登录失败: {}", source)
            }
            SessionError::RecoveryExhausted { attempts } => {
                write!(f, "会话恢复失败，已尝试 {} 次", attempts)
            }
            SessionError::UnknownContext { context } => {
                write!(f, "未知的恢复上下文: {}", context)
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::LoginFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 台账（数据库）错误
///
/// 写入失败绝不允许被吞掉，否则会造成重复执行。
#[derive(Debug)]
pub enum LedgerError {
    /// 连接数据库失败
    ConnectionFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 查询失败
    QueryFailed {
        operation: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入失败
    WriteFailed {
        operation: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 客户不存在
    ClientNotFound {
        cliente: String,
    },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::ConnectionFailed { source } => {
                write!(f, "连接台账数据库失败: {}", source)
            }
            LedgerError::QueryFailed { operation, source } => {
                write!(f, "台账查询失败 ({}): {}", operation, source)
            }
            LedgerError::WriteFailed { operation, source } => {
                write!(f, "台账写入失败 ({}): {}", operation, source)
            }
            LedgerError::ClientNotFound { cliente } => {
                write!(f, "找不到客户信息: {}", cliente)
            }
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::ConnectionFailed { source }
            | LedgerError::QueryFailed { source, .. }
            | LedgerError::WriteFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            LedgerError::ClientNotFound { .. } => None,
        }
    }
}

/// 文件归整错误
#[derive(Debug)]
pub enum FileError {
    /// 下载目录中没有新鲜度窗口内的产物
    NoRecentArtifact {
        kind: String,
        dir: PathBuf,
    },
    /// 解压失败
    ExtractionFailed {
        archive: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 压缩包中找不到符合命名约定的文件
    NoMatchingEntry {
        archive: PathBuf,
    },
    /// 移动/重命名失败
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NoRecentArtifact { kind, dir } => {
                write!(f, "下载目录 {} 中没有新鲜的 {} 产物", dir.display(), kind)
            }
            FileError::ExtractionFailed { archive, source } => {
                write!(f, "解压 {} 失败: {}", archive.display(), source)
            }
            FileError::NoMatchingEntry { archive } => {
                write!(f, "压缩包 {} 中没有符合命名约定的文件", archive.display())
            }
            FileError::MoveFailed { from, to, source } => {
                write!(
                    f,
                    "移动 {} 到 {} 失败: {}",
                    from.display(),
                    to.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ExtractionFailed { source, .. } | FileError::MoveFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 业务规则错误
#[derive(Debug)]
pub enum BusinessError {
    /// 门户参考日期过旧（拒绝执行并记录失败）
    StaleReferenceDate {
        fecha: String,
        today: String,
    },
    /// 无法解析门户给出的日期
    ReferenceDateUnparsable {
        raw: String,
    },
}

impl fmt::Display for BusinessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessError::StaleReferenceDate { fecha, today } => {
                write!(f, "参考日期 {} 距今天 {} 已超过允许范围", fecha, today)
            }
            BusinessError::ReferenceDateUnparsable { raw } => {
                write!(f, "无法解析参考日期: {}", raw)
            }
        }
    }
}

impl std::error::Error for BusinessError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 客户的命名模式行数少于业务单元数
    MissingUnitPattern {
        unit_index: usize,
        available: usize,
    },
    /// 客户没有配置任何业务单元
    NoBusinessUnits {
        cliente: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingUnitPattern {
                unit_index,
                available,
            } => {
                write!(
                    f,
                    "业务单元 {} 没有对应的命名模式 (共 {} 条)",
                    unit_index, available
                )
            }
            ConfigError::NoBusinessUnits { cliente } => {
                write!(f, "客户 {} 没有配置业务单元", cliente)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建元素等待超时错误
    pub fn element_timeout(selector: impl Into<String>, timeout_secs: u64) -> Self {
        AppError::Driver(DriverError::ElementTimeout {
            selector: selector.into(),
            timeout_secs,
        })
    }

    /// 创建元素交互失败错误
    pub fn interaction_failed(
        selector: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Driver(DriverError::InteractionFailed {
            selector: selector.into(),
            source: Box::new(source),
        })
    }

    /// 创建会话过期错误
    pub fn session_expired(context: impl Into<String>) -> Self {
        AppError::Session(SessionError::Expired {
            context: context.into(),
        })
    }

    /// 创建台账写入失败错误
    pub fn ledger_write_failed(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Ledger(LedgerError::WriteFailed {
            operation: operation.into(),
            source: Box::new(source),
        })
    }

    /// 创建产物缺失错误
    pub fn no_recent_artifact(kind: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        AppError::File(FileError::NoRecentArtifact {
            kind: kind.into(),
            dir: dir.into(),
        })
    }
}

// ========== 错误分类 ==========

impl AppError {
    /// 是否为瞬态 UI 错误（元素未就绪 / 交互失败），可按策略重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Driver(
                DriverError::ElementTimeout { .. } | DriverError::InteractionFailed { .. }
            )
        )
    }

    /// 是否为会话过期错误，需要走会话恢复路径
    pub fn is_session_expired(&self) -> bool {
        matches!(self, AppError::Session(SessionError::Expired { .. }))
    }
}

/// 判断 anyhow 错误链是否为瞬态 UI 错误
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<AppError>()
        .map(AppError::is_transient)
        .unwrap_or(false)
}

/// 判断 anyhow 错误链是否为会话过期
pub fn is_session_expired(err: &anyhow::Error) -> bool {
    err.downcast_ref::<AppError>()
        .map(AppError::is_session_expired)
        .unwrap_or(false)
}
