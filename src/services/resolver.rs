//! 案件解析器 - 业务能力层
//!
//! 把一条工作项（案件编号或任务/标签成员）解析成内部 ID + 访问密钥。
//! 解析路径按固定优先级排成一个策略列表，逐个尝试，首个成功即返回：
//!
//! 1. 成员路径：已知内部 ID，直接签发密钥（无验证码，常规情形）
//! 2. 公开查询路径：分解编号 + 验证码提交查询表单，从返回页面抠出 ID 与密钥
//! 3. 面板兜底路径：在自己的任务和标签里按编号扫描，命中后走路径 1
//!
//! 单条路径失败不影响其他路径。全部失败时：有瞬时错误先报瞬时错误
//! （让重试驱动再来一轮）；查询因缺求解器被跳过则报 CaptchaRequired；
//! 否则报 NotFound。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ErrorKind, ResolveError};
use crate::infrastructure::Session;
use crate::models::{CaseNumber, ProcessRef, WorkItem};
use crate::services::access_key::AccessKeyIssuer;
use crate::services::captcha::CaptchaSolver;
use crate::services::markup;
use crate::services::tags::TagService;
use crate::services::tasks::TaskService;

/// 解析能力（工作流依赖的接口）
#[async_trait]
pub trait ProcessResolver: Send + Sync {
    async fn resolve(&self, item: &WorkItem) -> AppResult<ProcessRef>;
}

/// 单条解析路径
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    /// 该路径是否适用于这条工作项
    fn applies_to(&self, item: &WorkItem) -> bool;
    async fn resolve(&self, item: &WorkItem) -> AppResult<ProcessRef>;
}

/// 按优先级顺序尝试各路径的解析器
pub struct Resolver {
    strategies: Vec<Arc<dyn ResolveStrategy>>,
}

impl Resolver {
    /// 用给定的路径列表构建（顺序即优先级）
    pub fn with_strategies(strategies: Vec<Arc<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// 标准三路径解析器
    pub fn standard(
        session: Arc<Session>,
        issuer: Arc<AccessKeyIssuer>,
        tasks: Arc<TaskService>,
        tags: Arc<TagService>,
        solver: Option<Arc<dyn CaptchaSolver>>,
        config: &Config,
    ) -> Self {
        Self::with_strategies(vec![
            Arc::new(MembershipStrategy {
                issuer: issuer.clone(),
            }),
            Arc::new(PublicSearchStrategy {
                session,
                issuer: issuer.clone(),
                solver,
            }),
            Arc::new(PanelScanStrategy {
                tasks,
                tags,
                issuer,
                task_limit: config.fallback_task_limit,
                tag_limit: config.fallback_tag_limit,
            }),
        ])
    }
}

#[async_trait]
impl ProcessResolver for Resolver {
    async fn resolve(&self, item: &WorkItem) -> AppResult<ProcessRef> {
        let number = item.number_display();
        let mut transient: Option<AppError> = None;
        let mut saw_captcha = false;

        for strategy in &self.strategies {
            if !strategy.applies_to(item) {
                continue;
            }

            match strategy.resolve(item).await {
                Ok(pref) => {
                    info!(
                        "案件 {} 解析成功 (路径: {}, ID: {})",
                        number,
                        strategy.name(),
                        pref.process_id
                    );
                    return Ok(pref);
                }
                Err(e) if e.kind() == ErrorKind::CaptchaRequired => {
                    debug!("路径 {} 需要验证码，跳过", strategy.name());
                    saw_captcha = true;
                }
                Err(e) if e.is_retryable() => {
                    warn!("路径 {} 瞬时失败: {}", strategy.name(), e);
                    transient = Some(e);
                }
                Err(e) => {
                    debug!("路径 {} 未命中: {}", strategy.name(), e);
                }
            }
        }

        // 瞬时错误优先向上抛，让重试驱动再来一轮完整解析
        if let Some(e) = transient {
            return Err(e);
        }
        if saw_captcha {
            return Err(AppError::Resolve(ResolveError::CaptchaRequired));
        }
        Err(AppError::not_found(number))
    }
}

// ========== 路径 1: 成员路径 ==========

/// 任务/标签成员已经带着内部 ID，只差一把访问密钥
struct MembershipStrategy {
    issuer: Arc<AccessKeyIssuer>,
}

#[async_trait]
impl ResolveStrategy for MembershipStrategy {
    fn name(&self) -> &'static str {
        "membro_painel"
    }

    fn applies_to(&self, item: &WorkItem) -> bool {
        item.known_process_id().is_some()
    }

    async fn resolve(&self, item: &WorkItem) -> AppResult<ProcessRef> {
        let process_id = item
            .known_process_id()
            .ok_or_else(|| AppError::not_found(item.number_display()))?;

        let access_key = self.issuer.issue(process_id).await?;
        let task_instance_id = match item {
            WorkItem::TaskEntry {
                task_instance_id, ..
            } => Some(*task_instance_id),
            _ => None,
        };

        Ok(ProcessRef {
            process_id,
            access_key,
            task_instance_id,
        })
    }
}

// ========== 路径 2: 公开查询路径 ==========

/// 分解编号提交公开查询表单，从返回标记里抠 ID，再模拟点击取密钥
struct PublicSearchStrategy {
    session: Arc<Session>,
    issuer: Arc<AccessKeyIssuer>,
    solver: Option<Arc<dyn CaptchaSolver>>,
}

impl PublicSearchStrategy {
    fn search_url(&self) -> String {
        format!(
            "{}/pje/Processo/ConsultaProcesso/listView.seam",
            self.session.base_url()
        )
    }

    /// 查询表单字段（遗留 JSF 页面的固定字段集）
    fn build_search_form(
        number: &CaseNumber,
        viewstate: &str,
        captcha_answer: Option<&str>,
    ) -> Vec<(String, String)> {
        let mut form = vec![
            ("AJAXREQUEST".to_string(), "_viewRoot".to_string()),
            ("fPP".to_string(), "fPP".to_string()),
            (
                "fPP:numeroProcesso:numeroSequencial".to_string(),
                number.sequential.clone(),
            ),
            (
                "fPP:numeroProcesso:numeroDigitoVerificador".to_string(),
                number.check_digit.clone(),
            ),
            ("fPP:numeroProcesso:Ano".to_string(), number.year.clone()),
            (
                "fPP:numeroProcesso:ramoJustica".to_string(),
                number.segment.clone(),
            ),
            (
                "fPP:numeroProcesso:respectivoTribunal".to_string(),
                number.court.clone(),
            ),
            (
                "fPP:numeroProcesso:NumeroOrgaoJustica".to_string(),
                number.origin.clone(),
            ),
            ("fPP:j_id150:nomeParte".to_string(), String::new()),
            (
                "fPP:processoReferenciaDecoration:habilitarMascaraProcessoReferencia".to_string(),
                "true".to_string(),
            ),
            ("tipoMascaraDocumento".to_string(), "on".to_string()),
            ("fPP:j_id455".to_string(), "fPP:j_id455".to_string()),
            ("javax.faces.ViewState".to_string(), viewstate.to_string()),
            ("AJAX:EVENTS_COUNT".to_string(), "1".to_string()),
        ];

        if let Some(answer) = captcha_answer {
            form.push(("fPP:captchaResposta".to_string(), answer.to_string()));
        }
        form
    }
}

#[async_trait]
impl ResolveStrategy for PublicSearchStrategy {
    fn name(&self) -> &'static str {
        "consulta_publica"
    }

    fn applies_to(&self, item: &WorkItem) -> bool {
        matches!(item, WorkItem::Number { .. })
    }

    async fn resolve(&self, item: &WorkItem) -> AppResult<ProcessRef> {
        let number = match item {
            WorkItem::Number { number } => number,
            _ => return Err(AppError::not_found(item.number_display())),
        };

        let http = self.session.http();
        let url = self.search_url();

        // 打开查询页，拿 ViewState 和验证码挑战
        let resp = http.get(&url).query(&[("iframe", "true")]).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::bad_status("ConsultaProcesso/listView.seam", status.as_u16()));
        }
        let html = resp.text().await?;
        let viewstate = markup::extract_viewstate(&html)?;

        let captcha_answer = match markup::extract_captcha_challenge(&html)? {
            Some(challenge) => match &self.solver {
                Some(solver) => Some(solver.solve(&challenge).await?),
                None => return Err(AppError::Resolve(ResolveError::CaptchaRequired)),
            },
            None => None,
        };

        // 提交查询表单
        let form = Self::build_search_form(number, &viewstate, captcha_answer.as_deref());
        let resp = http
            .post(&url)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Origin", self.session.base_url().to_string())
            .header("Referer", url.clone())
            .form(&form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::bad_status("ConsultaProcesso/listView.seam", status.as_u16()));
        }
        let result_html = resp.text().await?;

        let process_id = markup::extract_process_id(&result_html)?
            .ok_or_else(|| AppError::not_found(number.formatted()))?;

        // 模拟点击结果行，后续脚本里带访问密钥
        let access_key = match markup::extract_row_click_element(&result_html, process_id)? {
            Some(element_id) => {
                let click_form = vec![
                    ("AJAXREQUEST".to_string(), "_viewRoot".to_string()),
                    ("fPP".to_string(), "fPP".to_string()),
                    (element_id.clone(), element_id.clone()),
                    ("idProcessoSelecionado".to_string(), process_id.to_string()),
                    ("ajaxSingle".to_string(), element_id),
                    ("javax.faces.ViewState".to_string(), viewstate),
                ];

                let resp = http
                    .post(&url)
                    .header("X-Requested-With", "XMLHttpRequest")
                    .header("Origin", self.session.base_url().to_string())
                    .form(&click_form)
                    .send()
                    .await?;
                if resp.status().is_success() {
                    markup::extract_access_key(&resp.text().await?)?
                } else {
                    None
                }
            }
            None => None,
        };

        // 点击路径拿不到密钥时，退回已认证的签发接口
        let access_key = match access_key {
            Some(key) => key,
            None => self.issuer.issue(process_id).await?,
        };

        Ok(ProcessRef {
            process_id,
            access_key,
            task_instance_id: None,
        })
    }
}

// ========== 路径 3: 面板兜底路径 ==========

/// 在自己的任务和标签里按编号扫描（有界），命中后复用成员路径的签发
struct PanelScanStrategy {
    tasks: Arc<TaskService>,
    tags: Arc<TagService>,
    issuer: Arc<AccessKeyIssuer>,
    task_limit: usize,
    tag_limit: usize,
}

#[async_trait]
impl ResolveStrategy for PanelScanStrategy {
    fn name(&self) -> &'static str {
        "varredura_painel"
    }

    fn applies_to(&self, item: &WorkItem) -> bool {
        matches!(item, WorkItem::Number { .. })
    }

    async fn resolve(&self, item: &WorkItem) -> AppResult<ProcessRef> {
        let number = item.number_display();

        // 常规任务 + 收藏任务
        for favorites in [false, true] {
            let tasks = self.tasks.list_tasks(favorites).await?;
            for task in tasks.iter().take(self.task_limit) {
                if let Some(found) = self
                    .tasks
                    .search_task_process(&task.name, &number, favorites)
                    .await?
                {
                    debug!("兜底命中: 任务 '{}' 含 {}", task.name, number);
                    let access_key = self.issuer.issue(found.process_id).await?;
                    return Ok(ProcessRef {
                        process_id: found.process_id,
                        access_key,
                        task_instance_id: Some(found.task_instance_id),
                    });
                }
            }
        }

        // 标签
        let tags = self.tags.search_tags("").await?;
        for tag in tags.iter().take(self.tag_limit) {
            let processes = self.tags.list_tag_processes(tag.id, 500).await?;
            if let Some(found) = processes.into_iter().find(|p| p.number == number) {
                debug!("兜底命中: 标签 '{}' 含 {}", tag.name, number);
                let access_key = self.issuer.issue(found.process_id).await?;
                return Ok(ProcessRef {
                    process_id: found.process_id,
                    access_key,
                    task_instance_id: None,
                });
            }
        }

        Err(AppError::not_found(number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 计数用的假策略
    struct FakeStrategy {
        name: &'static str,
        only_numbers: bool,
        calls: Arc<AtomicU32>,
        result: fn() -> AppResult<ProcessRef>,
    }

    #[async_trait]
    impl ResolveStrategy for FakeStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        fn applies_to(&self, item: &WorkItem) -> bool {
            if self.only_numbers {
                matches!(item, WorkItem::Number { .. })
            } else {
                item.known_process_id().is_some()
            }
        }

        async fn resolve(&self, _item: &WorkItem) -> AppResult<ProcessRef> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn ok_ref() -> AppResult<ProcessRef> {
        Ok(ProcessRef {
            process_id: 42,
            access_key: "chave".into(),
            task_instance_id: None,
        })
    }

    fn task_item() -> WorkItem {
        WorkItem::TaskEntry {
            task: "Minutar".into(),
            process_id: 42,
            number: "8128688-83.2024.8.05.0001".into(),
            task_instance_id: 7,
        }
    }

    fn number_item() -> WorkItem {
        WorkItem::Number {
            number: CaseNumber::parse("81286888320248050001").unwrap(),
        }
    }

    #[tokio::test]
    async fn known_id_never_reaches_search_path() {
        let membership_calls = Arc::new(AtomicU32::new(0));
        let search_calls = Arc::new(AtomicU32::new(0));

        let resolver = Resolver::with_strategies(vec![
            Arc::new(FakeStrategy {
                name: "membro_painel",
                only_numbers: false,
                calls: membership_calls.clone(),
                result: ok_ref,
            }),
            Arc::new(FakeStrategy {
                name: "consulta_publica",
                only_numbers: true,
                calls: search_calls.clone(),
                result: ok_ref,
            }),
        ]);

        let pref = resolver.resolve(&task_item()).await.unwrap();
        assert_eq!(pref.process_id, 42);
        assert_eq!(membership_calls.load(Ordering::SeqCst), 1);
        assert_eq!(search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn captcha_failure_falls_through_to_next_path() {
        let scan_calls = Arc::new(AtomicU32::new(0));

        let resolver = Resolver::with_strategies(vec![
            Arc::new(FakeStrategy {
                name: "consulta_publica",
                only_numbers: true,
                calls: Arc::new(AtomicU32::new(0)),
                result: || Err(AppError::Resolve(ResolveError::CaptchaRequired)),
            }),
            Arc::new(FakeStrategy {
                name: "varredura_painel",
                only_numbers: true,
                calls: scan_calls.clone(),
                result: ok_ref,
            }),
        ]);

        let pref = resolver.resolve(&number_item()).await.unwrap();
        assert_eq!(pref.process_id, 42);
        assert_eq!(scan_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_paths_missing_yields_captcha_over_not_found() {
        let resolver = Resolver::with_strategies(vec![
            Arc::new(FakeStrategy {
                name: "consulta_publica",
                only_numbers: true,
                calls: Arc::new(AtomicU32::new(0)),
                result: || Err(AppError::Resolve(ResolveError::CaptchaRequired)),
            }),
            Arc::new(FakeStrategy {
                name: "varredura_painel",
                only_numbers: true,
                calls: Arc::new(AtomicU32::new(0)),
                result: || Err(AppError::not_found("x")),
            }),
        ]);

        let err = resolver.resolve(&number_item()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CaptchaRequired);
    }

    #[tokio::test]
    async fn transient_path_error_is_propagated_for_retry() {
        let resolver = Resolver::with_strategies(vec![
            Arc::new(FakeStrategy {
                name: "consulta_publica",
                only_numbers: true,
                calls: Arc::new(AtomicU32::new(0)),
                result: || Err(AppError::bad_status("listView.seam", 503)),
            }),
            Arc::new(FakeStrategy {
                name: "varredura_painel",
                only_numbers: true,
                calls: Arc::new(AtomicU32::new(0)),
                result: || Err(AppError::not_found("x")),
            }),
        ]);

        let err = resolver.resolve(&number_item()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::TransientNetworkError);
    }

    #[tokio::test]
    async fn no_applicable_path_is_not_found() {
        let resolver = Resolver::with_strategies(vec![Arc::new(FakeStrategy {
            name: "membro_painel",
            only_numbers: false,
            calls: Arc::new(AtomicU32::new(0)),
            result: ok_ref,
        })]);

        let err = resolver.resolve(&number_item()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResolutionNotFound);
    }
}
