//! 任务目录 - 业务能力层
//!
//! 列举用户面板的任务及任务内的待办案件。全部为只读幂等操作，
//! 网络抖动时可安全重试。

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::config::Config;
use crate::infrastructure::Session;
use crate::error::AppResult;
use crate::models::{Task, TaskProcess, TaskProcessPage};
use crate::utils::text::normalize_key;

/// 任务目录服务
pub struct TaskService {
    session: Arc<Session>,
    page_size: usize,
}

impl TaskService {
    pub fn new(session: Arc<Session>, config: &Config) -> Self {
        Self {
            session,
            page_size: config.page_size,
        }
    }

    /// 列出有待办案件的任务
    ///
    /// # 参数
    /// - `favorites`: true 时列收藏任务
    pub async fn list_tasks(&self, favorites: bool) -> AppResult<Vec<Task>> {
        let endpoint = if favorites {
            "painelUsuario/tarefasFavoritas"
        } else {
            "painelUsuario/tarefas"
        };

        let body = json!({
            "numeroProcesso": "",
            "competencia": "",
            "etiquetas": [],
        });

        let mut tasks: Vec<Task> = self.session.api_post(endpoint, &body).await?;
        tasks.retain(|t| t.pending_count > 0);
        for t in &mut tasks {
            t.favorite = favorites;
        }

        info!("找到 {} 个任务 (favoritas: {})", tasks.len(), favorites);
        Ok(tasks)
    }

    /// 按名称查找任务（忽略重音和大小写，先精确后包含）
    pub async fn find_task(&self, name: &str, favorites: bool) -> AppResult<Option<Task>> {
        let tasks = self.list_tasks(favorites).await?;
        let key = normalize_key(name);

        if let Some(task) = tasks.iter().find(|t| normalize_key(&t.name) == key) {
            info!("任务匹配: {}", task.name);
            return Ok(Some(task.clone()));
        }
        if let Some(task) = tasks.iter().find(|t| normalize_key(&t.name).contains(&key)) {
            info!("任务匹配(包含): {}", task.name);
            return Ok(Some(task.clone()));
        }

        Ok(None)
    }

    /// 列出任务内一页案件
    pub async fn list_task_processes(
        &self,
        task_name: &str,
        page: usize,
        max_results: usize,
        favorites: bool,
    ) -> AppResult<TaskProcessPage> {
        let endpoint = format!(
            "painelUsuario/recuperarProcessosTarefaPendenteComCriterios/{}/{}",
            urlencode(task_name),
            favorites
        );

        let body = json!({
            "numeroProcesso": "",
            "classe": null,
            "tags": [],
            "page": page,
            "maxResults": max_results,
            "competencia": "",
        });

        let page: TaskProcessPage = self.session.api_post(&endpoint, &body).await?;
        Ok(page)
    }

    /// 列出任务内全部案件（调用方驱动分页，直到取满或返回空页）
    pub async fn list_all_task_processes(
        &self,
        task_name: &str,
        favorites: bool,
    ) -> AppResult<Vec<TaskProcess>> {
        let mut all = Vec::new();
        let mut page = 0usize;

        loop {
            let result = self
                .list_task_processes(task_name, page, self.page_size, favorites)
                .await?;

            if result.entities.is_empty() {
                break;
            }

            debug!(
                "任务 '{}' 第 {} 页: {} 个案件",
                task_name,
                page,
                result.entities.len()
            );
            all.extend(result.entities);

            if all.len() as u64 >= result.count {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// 在任务里按编号搜一条案件（兜底解析路径用）
    pub async fn search_task_process(
        &self,
        task_name: &str,
        number: &str,
        favorites: bool,
    ) -> AppResult<Option<TaskProcess>> {
        let endpoint = format!(
            "painelUsuario/recuperarProcessosTarefaPendenteComCriterios/{}/{}",
            urlencode(task_name),
            favorites
        );

        let body = json!({
            "numeroProcesso": number,
            "page": 0,
            "maxResults": 1,
        });

        let page: TaskProcessPage = self.session.api_post(&endpoint, &body).await?;
        Ok(page.entities.into_iter().find(|p| p.number == number))
    }
}

/// 任务名出现在路径段里，保守地转义非安全字符
fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencodes_path_segment() {
        assert_eq!(urlencode("Minutar sentença"), "Minutar%20senten%C3%A7a");
        assert_eq!(urlencode("simples"), "simples");
    }
}
