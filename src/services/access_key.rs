//! 访问密钥签发 - 业务能力层
//!
//! 包装门户的 `gerarChaveAcessoProcesso` 接口。该接口无验证码、
//! 按次签发，密钥与会话绑定：会话续期后旧密钥全部作废。
//!
//! 并发不变式：同一个案件 ID 任何时刻最多一次在途签发请求；
//! 第二个并发调用者等待并复用第一个的结果，而不是再发一次网络调用。

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infrastructure::Session;

/// 访问密钥签发器
pub struct AccessKeyIssuer {
    session: Arc<Session>,
    /// 案件 ID → 本代会话内的单飞槽
    inflight: Mutex<HashMap<i64, Arc<OnceCell<String>>>>,
    /// 槽表对应的会话代数；代数前移时整表作废
    seen_generation: AtomicU64,
}

impl AccessKeyIssuer {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            inflight: Mutex::new(HashMap::new()),
            seen_generation: AtomicU64::new(0),
        }
    }

    /// 为案件签发访问密钥
    pub async fn issue(&self, process_id: i64) -> AppResult<String> {
        let session = self.session.clone();
        let generation = session.generation();
        self.issue_with(process_id, generation, move || {
            let session = session.clone();
            async move { fetch_access_key(&session, process_id).await }
        })
        .await
    }

    /// 单飞核心，签发动作可注入（测试用）
    pub(crate) async fn issue_with<F, Fut>(
        &self,
        process_id: i64,
        generation: u64,
        fetch: F,
    ) -> AppResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<String>>,
    {
        let cell = {
            let mut map = self.inflight.lock().await;

            // 会话换代后旧密钥全部失效，清掉整张表
            let seen = self.seen_generation.load(Ordering::Acquire);
            if seen != generation {
                map.clear();
                self.seen_generation.store(generation, Ordering::Release);
            }

            map.entry(process_id)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let key = cell
            .get_or_try_init(|| async {
                debug!("签发访问密钥: 案件 {}", process_id);
                fetch().await
            })
            .await?;

        Ok(key.clone())
    }
}

/// 实际调用门户接口取密钥
async fn fetch_access_key(session: &Session, process_id: i64) -> AppResult<String> {
    let endpoint = format!("painelUsuario/gerarChaveAcessoProcesso/{}", process_id);
    let body = session.api_get_text(&endpoint, &[]).await?;

    // 门户把密钥作为带引号的纯文本返回
    let key = body.trim().trim_matches('"').to_string();
    if key.is_empty() {
        return Err(AppError::empty_response(endpoint));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn issuer() -> Arc<AccessKeyIssuer> {
        let session = Arc::new(Session::new(&Config::default()).unwrap());
        Arc::new(AccessKeyIssuer::new(session))
    }

    #[tokio::test]
    async fn concurrent_requests_for_same_id_share_one_call() {
        let issuer = issuer();
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let issuer = issuer.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                let counter = calls.clone();
                issuer
                    .issue_with(42, 0, move || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok("chave-42".to_string())
                    })
                    .await
            }));
        }

        let mut keys = Vec::new();
        for h in handles {
            keys.push(h.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(keys.iter().all(|k| k == "chave-42"));
    }

    #[tokio::test]
    async fn different_ids_do_not_share_keys() {
        let issuer = issuer();
        let a = issuer
            .issue_with(1, 0, || async { Ok("chave-1".to_string()) })
            .await
            .unwrap();
        let b = issuer
            .issue_with(2, 0, || async { Ok("chave-2".to_string()) })
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn generation_bump_invalidates_cached_keys() {
        let issuer = issuer();
        let calls = Arc::new(AtomicU32::new(0));

        for generation in [0u64, 0, 1] {
            let counter = calls.clone();
            issuer
                .issue_with(7, generation, move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("chave-g{}", generation))
                })
                .await
                .unwrap();
        }

        // 同代第二次命中缓存，换代后重新签发
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_issue_is_not_cached() {
        let issuer = issuer();

        let first: AppResult<String> = issuer
            .issue_with(9, 0, || async {
                Err(AppError::bad_status("gerarChaveAcessoProcesso/9", 502))
            })
            .await;
        assert!(first.is_err());

        let second = issuer
            .issue_with(9, 0, || async { Ok("chave-9".to_string()) })
            .await
            .unwrap();
        assert_eq!(second, "chave-9");
    }
}
