//! 标签目录 - 业务能力层
//!
//! 标签查询支持部分名称匹配。只读幂等，可安全重试。

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::Session;
use crate::models::{Process, Tag, TagPage};

/// 标签目录服务
pub struct TagService {
    session: Arc<Session>,
    page_size: usize,
}

impl TagService {
    pub fn new(session: Arc<Session>, config: &Config) -> Self {
        Self {
            session,
            page_size: config.page_size,
        }
    }

    /// 按名称片段搜索标签
    pub async fn search_tags(&self, query: &str) -> AppResult<Vec<Tag>> {
        let body = json!({
            "page": 0,
            "maxResults": self.page_size,
            "tagsString": query,
        });

        let page: TagPage = self.session.api_post("painelUsuario/etiquetas", &body).await?;
        info!("找到 {} 个标签 (查询: '{}')", page.entities.len(), query);
        Ok(page.entities)
    }

    /// 按名称查找标签：精确命中优先，否则取第一个搜索结果
    pub async fn find_tag(&self, name: &str) -> AppResult<Option<Tag>> {
        let tags = self.search_tags(name).await?;
        if let Some(tag) = tags
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned()
        {
            return Ok(Some(tag));
        }
        Ok(tags.into_iter().next())
    }

    /// 标签下的案件总数
    pub async fn count_tag_processes(&self, tag_id: i64) -> AppResult<u64> {
        let endpoint = format!("painelUsuario/etiquetas/{}/processos/total", tag_id);
        let body = self.session.api_get_text(&endpoint, &[]).await?;
        Ok(body.trim().parse().unwrap_or(0))
    }

    /// 列出标签下的案件
    pub async fn list_tag_processes(&self, tag_id: i64, limit: usize) -> AppResult<Vec<Process>> {
        let endpoint = format!("painelUsuario/etiquetas/{}/processos", tag_id);
        let processes: Vec<Process> = self
            .session
            .api_get(&endpoint, &[("limit", limit.to_string())])
            .await?;

        info!("标签 {} 下共 {} 个案件", tag_id, processes.len());
        Ok(processes)
    }
}
