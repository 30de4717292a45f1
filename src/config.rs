/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 门户地址
    pub base_url: String,
    /// SSO 登录地址
    pub sso_url: String,
    /// 登录用户名
    pub username: String,
    /// 登录密码
    pub password: String,
    /// 登录后选择的角色（可选）
    pub profile: Option<String>,
    // --- 处理来源（三选一） ---
    /// 按任务处理：任务名
    pub task_name: Option<String>,
    /// 任务来源是否用收藏列表
    pub favorite_tasks: bool,
    /// 按标签处理：标签名
    pub tag_name: Option<String>,
    /// 按编号处理：TOML 批次文件目录
    pub numbers_folder: Option<String>,
    // --- 下载 ---
    /// 下载根目录
    pub download_dir: String,
    /// 文书类型过滤（展示名，"Selecione" 为全部）
    pub document_type: String,
    // --- 并发与重试 ---
    /// 同时处理的案件数量（门户有限流，保持小并发）
    pub max_concurrent: usize,
    /// 单阶段最大尝试次数
    pub max_attempts: u32,
    /// 退避基准毫秒数
    pub retry_base_delay_ms: u64,
    /// 退避上限毫秒数
    pub retry_max_delay_ms: u64,
    /// 单次 HTTP 调用超时秒数
    pub request_timeout_secs: u64,
    /// 分页大小
    pub page_size: usize,
    /// 兜底解析最多扫描的任务数
    pub fallback_task_limit: usize,
    /// 兜底解析最多扫描的标签数
    pub fallback_tag_limit: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://pje.tjba.jus.br".to_string(),
            sso_url: "https://sso.cloud.pje.jus.br".to_string(),
            username: String::new(),
            password: String::new(),
            profile: None,
            task_name: None,
            favorite_tasks: false,
            tag_name: None,
            numbers_folder: None,
            download_dir: "downloads".to_string(),
            document_type: "Selecione".to_string(),
            max_concurrent: 2,
            max_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
            request_timeout_secs: 30,
            page_size: 100,
            fallback_task_limit: 10,
            fallback_tag_limit: 15,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            base_url: std::env::var("PJE_BASE_URL").unwrap_or(default.base_url),
            sso_url: std::env::var("PJE_SSO_URL").unwrap_or(default.sso_url),
            username: std::env::var("PJE_USER").unwrap_or(default.username),
            password: std::env::var("PJE_PASSWORD").unwrap_or(default.password),
            profile: std::env::var("PJE_PROFILE").ok(),
            task_name: std::env::var("PJE_TASK").ok(),
            favorite_tasks: std::env::var("PJE_FAVORITE_TASKS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.favorite_tasks),
            tag_name: std::env::var("PJE_TAG").ok(),
            numbers_folder: std::env::var("PJE_NUMBERS_FOLDER").ok(),
            download_dir: std::env::var("PJE_DOWNLOAD_DIR").unwrap_or(default.download_dir),
            document_type: std::env::var("PJE_DOCUMENT_TYPE").unwrap_or(default.document_type),
            max_concurrent: std::env::var("PJE_MAX_CONCURRENT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent),
            max_attempts: std::env::var("PJE_MAX_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_attempts),
            retry_base_delay_ms: std::env::var("PJE_RETRY_BASE_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_base_delay_ms),
            retry_max_delay_ms: std::env::var("PJE_RETRY_MAX_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_max_delay_ms),
            request_timeout_secs: std::env::var("PJE_REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            page_size: std::env::var("PJE_PAGE_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.page_size),
            fallback_task_limit: std::env::var("PJE_FALLBACK_TASK_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.fallback_task_limit),
            fallback_tag_limit: std::env::var("PJE_FALLBACK_TAG_LIMIT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.fallback_tag_limit),
            verbose_logging: std::env::var("PJE_VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("PJE_OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    /// 门户遗留 REST 接口前缀
    pub fn api_base(&self) -> String {
        format!("{}/pje/seam/resource/rest/pje-legacy", self.base_url)
    }
}
