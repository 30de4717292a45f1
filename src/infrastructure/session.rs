//! 会话 - 基础设施层
//!
//! 持有唯一的已认证 HTTP 传输资源（带 cookie 的 reqwest 客户端），
//! 只暴露"发请求"和"续期"两种能力。
//!
//! 续期不变式：任何时刻最多只有一次续期在进行；并发调用者要么看到
//! 续期前的状态，要么看到续期后的状态，绝不会看到中间状态。

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, AuthError};
use crate::models::User;

/// 已认证会话
///
/// 职责：
/// - 持有唯一的 HTTP 客户端（cookie 罐在客户端内部）
/// - 暴露门户 REST 与页面两类请求能力
/// - 串行化续期（单飞），向所有持有者提供一致视图
/// - 不认识任务 / 标签 / 案件，不处理业务流程
pub struct Session {
    http: reqwest::Client,
    base_url: String,
    api_base: String,
    user: RwLock<Option<User>>,
    /// 首次登录 / 最近一次续期的时间
    issued_at: RwLock<Option<Instant>>,
    /// 最近一次向门户确认会话有效的时间
    last_verified: RwLock<Option<Instant>>,
    /// 每次成功续期递增；访问密钥缓存以此判断失效
    generation: AtomicU64,
    /// 被任何组件标记过期后置 false
    valid: AtomicBool,
    /// 续期彻底失败后置 true，批次必须中止
    fatal: AtomicBool,
    /// 单飞续期锁；不得在下载等长操作中持有
    renewal: tokio::sync::Mutex<()>,
}

impl Session {
    /// 创建未登录的会话
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            )
            .build()
            .map_err(|e| AppError::request_failed("client", e))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_base: config.api_base(),
            user: RwLock::new(None),
            issued_at: RwLock::new(None),
            last_verified: RwLock::new(None),
            generation: AtomicU64::new(0),
            valid: AtomicBool::new(false),
            fatal: AtomicBool::new(false),
            renewal: tokio::sync::Mutex::new(()),
        })
    }

    /// 获取底层 HTTP 客户端（页面请求等特殊场景用）
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 当前用户
    pub fn user(&self) -> Option<User> {
        self.user.read().ok().and_then(|u| u.clone())
    }

    /// 登录 / 选择角色后更新用户
    pub fn set_user(&self, user: User) {
        if let Ok(mut slot) = self.user.write() {
            *slot = Some(user);
        }
        let now = Instant::now();
        if let Ok(mut issued) = self.issued_at.write() {
            issued.get_or_insert(now);
        }
        if let Ok(mut verified) = self.last_verified.write() {
            *verified = Some(now);
        }
        self.valid.store(true, Ordering::Release);
    }

    /// 最近 `ttl` 内是否向门户确认过会话有效
    pub fn recently_verified(&self, ttl: Duration) -> bool {
        self.last_verified
            .read()
            .ok()
            .and_then(|v| *v)
            .map(|at| at.elapsed() < ttl)
            .unwrap_or(false)
    }

    /// 当前会话代数；续期一次加一
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire) && !self.is_fatal()
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::Acquire)
    }

    /// 任何组件收到门户的认证失败信号后调用
    pub fn mark_expired(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            warn!("⚠️ 会话被标记为过期");
        }
    }

    /// 单飞续期
    ///
    /// 并发调用者阻塞在同一把锁上；等待期间已有人完成续期
    /// （代数前移）的调用者直接返回，不再触发第二次登录。
    /// `relogin` 失败则置致命标记，之后的所有调用立刻失败。
    pub async fn renew_with<F, Fut>(&self, relogin: F) -> AppResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<()>>,
    {
        if self.is_fatal() {
            return Err(AppError::Auth(AuthError::RenewalFailed));
        }
        // 晚到的调用者：会话已经被续期回有效状态，直接复用
        if self.is_valid() {
            return Ok(());
        }

        let seen = self.generation();
        let _guard = self.renewal.lock().await;

        if self.is_fatal() {
            return Err(AppError::Auth(AuthError::RenewalFailed));
        }
        if self.is_valid() || self.generation() != seen {
            debug!("会话已被其他调用者续期 (代数 {})", self.generation());
            return Ok(());
        }

        match relogin().await {
            Ok(()) => {
                self.generation.fetch_add(1, Ordering::AcqRel);
                if let Ok(mut issued) = self.issued_at.write() {
                    *issued = Some(Instant::now());
                }
                self.valid.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                warn!("❌ 会话续期失败: {}", e);
                self.fatal.store(true, Ordering::Release);
                Err(AppError::Auth(AuthError::RenewalFailed))
            }
        }
    }

    // ========== 门户 REST 接口 ==========

    /// REST 接口公共头
    fn api_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("X-pje-legacy-app", "pje-tjba-1g".to_string()),
            ("Origin", "https://frontend.cloud.pje.jus.br".to_string()),
            ("Referer", "https://frontend.cloud.pje.jus.br/".to_string()),
        ];
        if let Some(user) = self.user() {
            if user.location_id != 0 {
                headers.push(("X-pje-usuario-localizacao", user.location_id.to_string()));
            }
        }
        headers
    }

    /// GET 请求门户 REST 接口，返回原始响应体
    pub async fn api_get_text(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> AppResult<String> {
        let url = format!("{}/{}", self.api_base, endpoint);
        let mut req = self.http.get(&url).query(query);
        for (k, v) in self.api_headers() {
            req = req.header(k, v);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AppError::request_failed(endpoint, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(self.classify_status(endpoint, status));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| AppError::request_failed(endpoint, e))?;
        if body.is_empty() {
            return Err(AppError::empty_response(endpoint));
        }
        Ok(body)
    }

    /// GET 请求门户 REST 接口并反序列化
    pub async fn api_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let body = self.api_get_text(endpoint, query).await?;
        let value = serde_json::from_str(&body)?;
        Ok(value)
    }

    /// POST 请求门户 REST 接口并反序列化
    pub async fn api_post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        json_body: &serde_json::Value,
    ) -> AppResult<T> {
        let url = format!("{}/{}", self.api_base, endpoint);
        let mut req = self.http.post(&url).json(json_body);
        for (k, v) in self.api_headers() {
            req = req.header(k, v);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AppError::request_failed(endpoint, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(self.classify_status(endpoint, status));
        }

        let value = resp
            .json()
            .await
            .map_err(|e| AppError::request_failed(endpoint, e))?;
        Ok(value)
    }

    /// 把异常状态码映射为错误，401 同时把会话标记为过期
    fn classify_status(&self, endpoint: &str, status: StatusCode) -> AppError {
        if status == StatusCode::UNAUTHORIZED {
            self.mark_expired();
        }
        AppError::bad_status(endpoint, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;

    fn test_session() -> Arc<Session> {
        Arc::new(Session::new(&Config::default()).unwrap())
    }

    #[tokio::test]
    async fn concurrent_renewals_trigger_single_login() {
        let session = test_session();
        let logins = Arc::new(AtomicU32::new(0));

        session.mark_expired();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = session.clone();
            let logins = logins.clone();
            handles.push(tokio::spawn(async move {
                let counter = logins.clone();
                session
                    .renew_with(move || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        // 模拟登录耗时，让其他调用者都排到锁上
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(())
                    })
                    .await
            }));
        }

        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(logins.load(Ordering::SeqCst), 1);
        assert_eq!(session.generation(), 1);
        assert!(session.is_valid());
    }

    #[tokio::test]
    async fn failed_renewal_is_fatal_for_all_callers() {
        let session = test_session();

        let first = session
            .renew_with(|| async { Err(AppError::Auth(AuthError::InvalidCredentials)) })
            .await;
        assert!(matches!(first, Err(AppError::Auth(AuthError::RenewalFailed))));
        assert!(session.is_fatal());

        // 后续调用者不再尝试登录，直接收到致命错误
        let second = session
            .renew_with(|| async { panic!("致命标记后不应再触发登录") })
            .await;
        assert!(matches!(second, Err(AppError::Auth(AuthError::RenewalFailed))));
    }

    #[tokio::test]
    async fn renewal_bumps_generation_once_per_round() {
        let session = test_session();

        session.mark_expired();
        session.renew_with(|| async { Ok(()) }).await.unwrap();
        assert_eq!(session.generation(), 1);

        // 会话仍然有效时续期是空操作
        session.renew_with(|| async { Ok(()) }).await.unwrap();
        assert_eq!(session.generation(), 1);

        session.mark_expired();
        session.renew_with(|| async { Ok(()) }).await.unwrap();
        assert_eq!(session.generation(), 2);
    }
}
