use std::fmt;
use std::time::Duration;

use crate::models::case_number::CaseNumberError;
use crate::services::markup::ScrapeError;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 认证相关错误
    Auth(AuthError),
    /// 门户 HTTP 调用错误
    Portal(PortalError),
    /// 案件解析（编号 → 内部 ID）错误
    Resolve(ResolveError),
    /// 文书下载错误
    Download(DownloadError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Auth(e) => write!(f, "认证错误: {}", e),
            AppError::Portal(e) => write!(f, "门户错误: {}", e),
            AppError::Resolve(e) => write!(f, "解析错误: {}", e),
            AppError::Download(e) => write!(f, "下载错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Auth(e) => Some(e),
            AppError::Portal(e) => Some(e),
            AppError::Resolve(e) => Some(e),
            AppError::Download(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 认证相关错误
#[derive(Debug)]
pub enum AuthError {
    /// 用户名或密码错误（不重试）
    InvalidCredentials,
    /// 会话已过期
    Expired,
    /// 会话无法续期（整个批次的致命错误）
    RenewalFailed,
    /// 登录被限流
    RateLimited {
        /// 门户通过 Retry-After 给出的冷却秒数
        retry_after: Option<u64>,
    },
    /// SSO 服务不可达
    Unreachable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 登录页没有跳转到 SSO
    SsoRedirectMissing {
        url: String,
    },
    /// 找不到指定的角色
    ProfileNotFound {
        name: String,
    },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "用户名或密码错误"),
            AuthError::Expired => write!(f, "会话已过期"),
            AuthError::RenewalFailed => write!(f, "会话续期失败，无法继续"),
            AuthError::RateLimited { retry_after } => {
                write!(f, "登录请求被限流, 建议等待: {:?}秒", retry_after)
            }
            AuthError::Unreachable { source } => {
                write!(f, "无法连接登录服务: {}", source)
            }
            AuthError::SsoRedirectMissing { url } => {
                write!(f, "登录页未跳转到 SSO (当前: {})", url)
            }
            AuthError::ProfileNotFound { name } => {
                write!(f, "角色 '{}' 不存在", name)
            }
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Unreachable { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 门户 HTTP 调用错误
#[derive(Debug)]
pub enum PortalError {
    /// 网络请求失败（连接失败、超时等，可重试）
    RequestFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 门户返回非预期状态码
    BadStatus {
        endpoint: String,
        status: u16,
    },
    /// 门户返回空响应
    EmptyResponse {
        endpoint: String,
    },
    /// JSON 解析失败
    JsonParseFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 页面结构解析失败
    MarkupParseFailed {
        source: ScrapeError,
    },
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortalError::RequestFailed { endpoint, source } => {
                write!(f, "请求失败 ({}): {}", endpoint, source)
            }
            PortalError::BadStatus { endpoint, status } => {
                write!(f, "门户返回状态码 {} ({})", status, endpoint)
            }
            PortalError::EmptyResponse { endpoint } => {
                write!(f, "门户返回空响应: {}", endpoint)
            }
            PortalError::JsonParseFailed { source } => {
                write!(f, "JSON解析失败: {}", source)
            }
            PortalError::MarkupParseFailed { source } => {
                write!(f, "页面解析失败: {}", source)
            }
        }
    }
}

impl std::error::Error for PortalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PortalError::RequestFailed { source, .. }
            | PortalError::JsonParseFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            PortalError::MarkupParseFailed { source } => Some(source),
            _ => None,
        }
    }
}

/// 案件解析错误
#[derive(Debug)]
pub enum ResolveError {
    /// 所有解析路径都没有找到该案件
    NotFound {
        number: String,
    },
    /// 公开查询需要验证码，但没有配置验证码求解器
    CaptchaRequired,
    /// 案件编号格式非法
    InvalidNumber {
        source: CaseNumberError,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound { number } => {
                write!(f, "未找到案件: {}", number)
            }
            ResolveError::CaptchaRequired => {
                write!(f, "公开查询需要验证码，但未配置求解器")
            }
            ResolveError::InvalidNumber { source } => {
                write!(f, "案件编号非法: {}", source)
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::InvalidNumber { source } => Some(source),
            _ => None,
        }
    }
}

/// 文书下载错误
#[derive(Debug)]
pub enum DownloadError {
    /// 保密案件，当前角色无权查看
    AccessDenied {
        process_id: i64,
    },
    /// 字节数不匹配
    Integrity {
        document_id: i64,
        expected: u64,
        got: u64,
    },
    /// 校验和不匹配
    ChecksumMismatch {
        document_id: i64,
    },
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadError::AccessDenied { process_id } => {
                write!(f, "案件 {} 为保密案件，无权访问", process_id)
            }
            DownloadError::Integrity {
                document_id,
                expected,
                got,
            } => {
                write!(
                    f,
                    "文书 {} 大小不符: 期望 {} 字节, 实际 {} 字节",
                    document_id, expected, got
                )
            }
            DownloadError::ChecksumMismatch { document_id } => {
                write!(f, "文书 {} 校验和不匹配", document_id)
            }
        }
    }
}

impl std::error::Error for DownloadError {}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 目录不存在
    DirectoryNotFound {
        path: String,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
            FileError::DirectoryNotFound { path } => write!(f, "目录不存在: {}", path),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 必需的环境变量不存在
    EnvVarNotFound {
        var_name: String,
    },
    /// 没有指定任何处理来源（任务 / 标签 / 编号文件）
    NoWorkSource,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::EnvVarNotFound { var_name } => {
                write!(f, "环境变量 {} 不存在", var_name)
            }
            ConfigError::NoWorkSource => {
                write!(f, "未指定处理来源: 需要任务名、标签名或编号文件目录之一")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 错误分类 ==========

/// 错误种类 - 决定重试策略与报告归类
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    AuthExpired,
    InvalidCredentials,
    RateLimited,
    CaptchaRequired,
    ResolutionNotFound,
    AccessDenied,
    TransientNetworkError,
    IntegrityError,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::AuthExpired => "AuthExpired",
            ErrorKind::InvalidCredentials => "InvalidCredentials",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::CaptchaRequired => "CaptchaRequired",
            ErrorKind::ResolutionNotFound => "ResolutionNotFound",
            ErrorKind::AccessDenied => "AccessDenied",
            ErrorKind::TransientNetworkError => "TransientNetworkError",
            ErrorKind::IntegrityError => "IntegrityError",
            ErrorKind::Other => "Other",
        };
        write!(f, "{}", name)
    }
}

impl AppError {
    /// 把错误归入固定的种类，重试驱动和报告都以此为准
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Auth(AuthError::InvalidCredentials) => ErrorKind::InvalidCredentials,
            AppError::Auth(AuthError::Expired) | AppError::Auth(AuthError::RenewalFailed) => {
                ErrorKind::AuthExpired
            }
            AppError::Auth(AuthError::RateLimited { .. }) => ErrorKind::RateLimited,
            AppError::Auth(AuthError::Unreachable { .. }) => ErrorKind::TransientNetworkError,
            AppError::Auth(_) => ErrorKind::Other,
            AppError::Portal(PortalError::RequestFailed { .. }) => {
                ErrorKind::TransientNetworkError
            }
            AppError::Portal(PortalError::BadStatus { status, .. }) => match status {
                401 => ErrorKind::AuthExpired,
                403 => ErrorKind::AccessDenied,
                429 => ErrorKind::RateLimited,
                500..=599 => ErrorKind::TransientNetworkError,
                _ => ErrorKind::Other,
            },
            AppError::Portal(_) => ErrorKind::Other,
            AppError::Resolve(ResolveError::NotFound { .. })
            | AppError::Resolve(ResolveError::InvalidNumber { .. }) => {
                ErrorKind::ResolutionNotFound
            }
            AppError::Resolve(ResolveError::CaptchaRequired) => ErrorKind::CaptchaRequired,
            AppError::Download(DownloadError::AccessDenied { .. }) => ErrorKind::AccessDenied,
            AppError::Download(DownloadError::Integrity { .. })
            | AppError::Download(DownloadError::ChecksumMismatch { .. }) => {
                ErrorKind::IntegrityError
            }
            AppError::File(_) | AppError::Config(_) | AppError::Other(_) => ErrorKind::Other,
        }
    }

    /// 是否为瞬时错误（网络抖动、超时、限流、5xx）
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientNetworkError | ErrorKind::RateLimited
        )
    }

    /// 是否表示会话过期（需要先续期再重试）
    pub fn is_auth_expired(&self) -> bool {
        matches!(self.kind(), ErrorKind::AuthExpired)
            && !matches!(self, AppError::Auth(AuthError::RenewalFailed))
    }

    /// 续期本身失败时为 true，批次必须中止
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Auth(AuthError::RenewalFailed))
    }

    /// 重试驱动是否应再次尝试该错误
    pub fn is_retryable(&self) -> bool {
        if self.is_fatal() {
            return false;
        }
        self.is_transient() || self.is_auth_expired() || self.kind() == ErrorKind::IntegrityError
    }

    /// 门户建议的冷却时间（Retry-After）
    pub fn retry_after_hint(&self) -> Option<Duration> {
        match self {
            AppError::Auth(AuthError::RateLimited {
                retry_after: Some(secs),
            }) => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err.url().map(|u| u.path().to_string()).unwrap_or_default();
        AppError::Portal(PortalError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Portal(PortalError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<ScrapeError> for AppError {
    fn from(err: ScrapeError) -> Self {
        AppError::Portal(PortalError::MarkupParseFailed { source: err })
    }
}

impl From<CaseNumberError> for AppError {
    fn from(err: CaseNumberError) -> Self {
        AppError::Resolve(ResolveError::InvalidNumber { source: err })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建请求失败错误
    pub fn request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Portal(PortalError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建状态码错误
    pub fn bad_status(endpoint: impl Into<String>, status: u16) -> Self {
        AppError::Portal(PortalError::BadStatus {
            endpoint: endpoint.into(),
            status,
        })
    }

    /// 创建空响应错误
    pub fn empty_response(endpoint: impl Into<String>) -> Self {
        AppError::Portal(PortalError::EmptyResponse {
            endpoint: endpoint.into(),
        })
    }

    /// 创建保密案件错误
    pub fn access_denied(process_id: i64) -> Self {
        AppError::Download(DownloadError::AccessDenied { process_id })
    }

    /// 创建案件未找到错误
    pub fn not_found(number: impl Into<String>) -> Self {
        AppError::Resolve(ResolveError::NotFound {
            number: number.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_retryable() {
        let err = AppError::bad_status("painelUsuario/tarefas", 502);
        assert_eq!(err.kind(), ErrorKind::TransientNetworkError);
        assert!(err.is_retryable());
    }

    #[test]
    fn unauthorized_maps_to_auth_expired() {
        let err = AppError::bad_status("painelUsuario/tarefas", 401);
        assert_eq!(err.kind(), ErrorKind::AuthExpired);
        assert!(err.is_auth_expired());
        assert!(err.is_retryable());
    }

    #[test]
    fn captcha_and_not_found_are_terminal() {
        let captcha = AppError::Resolve(ResolveError::CaptchaRequired);
        assert!(!captcha.is_retryable());

        let missing = AppError::not_found("0000000-00.2024.8.05.0001");
        assert_eq!(missing.kind(), ErrorKind::ResolutionNotFound);
        assert!(!missing.is_retryable());
    }

    #[test]
    fn renewal_failure_is_fatal_and_not_retryable() {
        let err = AppError::Auth(AuthError::RenewalFailed);
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::AuthExpired);
    }

    #[test]
    fn rate_limit_carries_cooldown_hint() {
        let err = AppError::Auth(AuthError::RateLimited {
            retry_after: Some(7),
        });
        assert_eq!(err.retry_after_hint(), Some(Duration::from_secs(7)));
        assert!(err.is_transient());
    }
}
