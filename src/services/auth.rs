//! 认证服务 - 业务能力层
//!
//! 负责 SSO 登录握手、登录后校验（currentUser）、角色列举与选择，
//! 以及会话续期入口。
//!
//! 状态机：未登录 → 握手中 → 已登录 → 已选角色。
//! 终止条件：凭据错误不重试；SSO 不可达 / 限流在配置的次数内退避重试，
//! 超限后视为致命。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, AuthError};
use crate::infrastructure::Session;
use crate::models::{Profile, User};
use crate::services::markup;
use crate::utils::text::find_most_similar;

/// 会话校验结果的复用窗口
const VERIFY_INTERVAL: Duration = Duration::from_secs(300);

/// 会话续期能力
///
/// 工作流在任一阶段探测到会话过期时通过该接口续期；
/// 具体实现必须保证同一时刻至多一次续期在途。
#[async_trait]
pub trait SessionRenewer: Send + Sync {
    async fn renew(&self) -> AppResult<()>;
}

/// 认证服务
pub struct AuthService {
    session: Arc<Session>,
    sso_url: String,
    username: String,
    password: String,
    /// 登录后要选择的角色（可选）
    profile: Option<String>,
    max_attempts: u32,
    retry_base_delay: Duration,
}

impl AuthService {
    pub fn new(session: Arc<Session>, config: &Config) -> Self {
        Self {
            session,
            sso_url: config.sso_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            profile: config.profile.clone(),
            max_attempts: config.max_attempts,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// 登录（带有限次数的退避重试）
    ///
    /// 凭据错误立即失败；不可达 / 限流按次数退避后重试。
    pub async fn login(&self) -> AppResult<()> {
        let mut last_err = None;

        for attempt in 1..=self.max_attempts {
            match self.login_sequence().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if matches!(e, AppError::Auth(AuthError::InvalidCredentials)) {
                        return Err(e);
                    }
                    if !e.is_transient() {
                        return Err(e);
                    }

                    let cooldown = e
                        .retry_after_hint()
                        .unwrap_or(self.retry_base_delay * 2u32.pow(attempt - 1));
                    warn!(
                        "登录失败 (尝试 {}/{}), {:?} 后重试: {}",
                        attempt, self.max_attempts, cooldown, e
                    );
                    last_err = Some(e);

                    if attempt < self.max_attempts {
                        tokio::time::sleep(cooldown).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or(AppError::Auth(AuthError::Expired)))
    }

    /// 完整登录序列：SSO 握手 + 校验 + 选角色
    async fn login_sequence(&self) -> AppResult<()> {
        self.perform_login().await?;
        if let Some(profile) = self.profile.clone() {
            self.select_profile(&profile).await?;
        }
        Ok(())
    }

    /// 一次 SSO 登录握手
    async fn perform_login(&self) -> AppResult<()> {
        info!("🔐 开始登录: {}...", self.username);
        let http = self.session.http();

        // 第一步：访问门户登录页，期望被重定向到 SSO
        let login_url = format!("{}/pje/login.seam", self.session.base_url());
        let resp = http
            .get(&login_url)
            .send()
            .await
            .map_err(classify_login_error)?;

        let landed = resp.url().to_string();
        let sso_host = self
            .sso_url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        if !landed.contains(sso_host) {
            return Err(AppError::Auth(AuthError::SsoRedirectMissing { url: landed }));
        }

        let login_page = resp.text().await.map_err(classify_login_error)?;
        let action = markup::extract_form_action(&login_page)?;
        let auth_url = if action.starts_with("http") {
            action
        } else {
            format!("{}{}", self.sso_url, action)
        };

        // 第二步：提交凭据
        let resp = http
            .post(&auth_url)
            .header("Origin", self.sso_url.clone())
            .header("Referer", auth_url.clone())
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("credentialId", ""),
            ])
            .send()
            .await
            .map_err(classify_login_error)?;

        if resp.status().as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(AppError::Auth(AuthError::RateLimited { retry_after }));
        }

        // 第三步：SSO 无论成败都渲染 200 页面，以 currentUser 为准
        match self.fetch_current_user().await {
            Ok(user) => {
                info!("✓ 登录成功: {}", user.name);
                self.session.set_user(user);
                Ok(())
            }
            Err(e) => {
                debug!("登录后校验失败: {}", e);
                Err(AppError::Auth(AuthError::InvalidCredentials))
            }
        }
    }

    /// 查询当前登录用户
    async fn fetch_current_user(&self) -> AppResult<User> {
        let user: User = self.session.api_get("usuario/currentUser", &[]).await?;
        if user.id == 0 {
            return Err(AppError::empty_response("usuario/currentUser"));
        }
        Ok(user)
    }

    /// 确保处于已登录状态
    ///
    /// 近期刚向门户确认过的会话直接放行；否则先确认一次，
    /// 确认失败再走完整登录。
    pub async fn ensure_logged_in(&self) -> AppResult<()> {
        if self.session.is_valid() && self.session.recently_verified(VERIFY_INTERVAL) {
            return Ok(());
        }
        if self.verify_session().await {
            return Ok(());
        }
        self.login().await
    }

    /// 会话是否仍然有效（向门户确认一次）
    pub async fn verify_session(&self) -> bool {
        match self.fetch_current_user().await {
            Ok(user) => {
                self.session.set_user(user);
                true
            }
            Err(_) => {
                self.session.mark_expired();
                false
            }
        }
    }

    /// 列出可选角色
    pub async fn list_profiles(&self) -> AppResult<Vec<Profile>> {
        let url = format!("{}/pje/ng2/dev.seam", self.session.base_url());
        let resp = self.session.http().get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            if status.as_u16() == 401 {
                self.session.mark_expired();
            }
            return Err(AppError::bad_status("ng2/dev.seam", status.as_u16()));
        }

        let html = resp.text().await?;
        let profiles = markup::extract_profiles(&html)?;
        info!("找到 {} 个角色", profiles.len());
        Ok(profiles)
    }

    /// 按名称选择角色（精确 → 包含 → 相似度匹配）
    pub async fn select_profile(&self, name: &str) -> AppResult<()> {
        let profiles = self.list_profiles().await?;
        let full_names: Vec<String> = profiles.iter().map(|p| p.full_name()).collect();

        let index = find_most_similar(name, &full_names, 0.4).ok_or_else(|| {
            AppError::Auth(AuthError::ProfileNotFound {
                name: name.to_string(),
            })
        })?;

        let profile = &profiles[index];
        info!("角色匹配: {}", profile.full_name());
        self.select_profile_by_index(profile.index).await
    }

    /// 按表格行索引选择角色（收藏角色用 -1）
    pub async fn select_profile_by_index(&self, index: i32) -> AppResult<()> {
        let url = format!("{}/pje/ng2/dev.seam", self.session.base_url());
        let http = self.session.http();

        let resp = http.get(&url).send().await?;
        let html = resp.text().await?;
        let viewstate = markup::extract_viewstate(&html).unwrap_or_else(|_| "j_id1".to_string());

        let element_id = if index == -1 {
            "papeisUsuarioForm:dtPerfil:j_id66".to_string()
        } else {
            format!("papeisUsuarioForm:dtPerfil:{}:j_id70", index)
        };

        http.post(&url)
            .header("Origin", self.session.base_url().to_string())
            .form(&[
                ("papeisUsuarioForm", "papeisUsuarioForm"),
                ("papeisUsuarioForm:j_id60", ""),
                ("papeisUsuarioForm:j_id72", "papeisUsuarioForm:j_id72"),
                ("javax.faces.ViewState", viewstate.as_str()),
                (element_id.as_str(), element_id.as_str()),
            ])
            .send()
            .await?;

        // 选择角色后重新确认用户身份
        let user = self.fetch_current_user().await?;
        info!("✓ 角色已选择: {}", user.name);
        self.session.set_user(user);
        Ok(())
    }
}

#[async_trait]
impl SessionRenewer for AuthService {
    /// 单飞续期：并发探测到过期的工作者只触发一次重新登录
    async fn renew(&self) -> AppResult<()> {
        self.session.renew_with(|| self.login()).await
    }
}

/// 把 reqwest 错误归类为认证阶段错误
fn classify_login_error(err: reqwest::Error) -> AppError {
    if err.is_connect() || err.is_timeout() {
        AppError::Auth(AuthError::Unreachable {
            source: Box::new(err),
        })
    } else {
        AppError::from(err)
    }
}
