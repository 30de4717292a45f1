//! 门户实体模型
//!
//! 字段名通过 serde rename 对应门户 REST 接口的 camelCase 命名。

use serde::{Deserialize, Serialize};

use crate::models::case_number::CaseNumber;

/// 当前登录用户
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    #[serde(rename = "idUsuario", default)]
    pub id: i64,
    #[serde(rename = "nomeUsuario", default)]
    pub name: String,
    #[serde(default)]
    pub login: String,
    #[serde(rename = "idOrgaoJulgador", default)]
    pub court_unit_id: i64,
    #[serde(rename = "idPapel", default)]
    pub role_id: i64,
    #[serde(rename = "idUsuarioLocalizacaoMagistradoServidor", default)]
    pub location_id: i64,
}

/// 用户可选择的访问角色（从角色选择页的表格里提取）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// 表格行索引；收藏角色在表头展示，用 -1 表示
    pub index: i32,
    pub name: String,
    pub court_unit: String,
    pub position: String,
    pub favorite: bool,
}

impl Profile {
    /// 完整展示名（名称 / 单位 / 职位）
    pub fn full_name(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if !self.court_unit.is_empty() {
            parts.push(self.court_unit.as_str());
        }
        if !self.position.is_empty() {
            parts.push(self.position.as_str());
        }
        parts.join(" / ")
    }
}

/// 用户面板中的任务（待办队列）
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "nome", default)]
    pub name: String,
    #[serde(rename = "quantidadePendente", default)]
    pub pending_count: u64,
    #[serde(skip)]
    pub favorite: bool,
}

/// 任务里的一条待办案件
#[derive(Debug, Clone, Deserialize)]
pub struct TaskProcess {
    #[serde(rename = "idProcesso", default)]
    pub process_id: i64,
    #[serde(rename = "numeroProcesso", default)]
    pub number: String,
    #[serde(rename = "idTaskInstance", default)]
    pub task_instance_id: i64,
    #[serde(rename = "classeJudicial", default)]
    pub judicial_class: String,
}

/// 任务案件列表的分页响应
#[derive(Debug, Clone, Deserialize)]
pub struct TaskProcessPage {
    #[serde(default)]
    pub entities: Vec<TaskProcess>,
    #[serde(default)]
    pub count: u64,
}

/// 用户自定义标签
#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "nomeTag", default)]
    pub name: String,
    #[serde(rename = "nomeTagCompleto", default)]
    pub full_name: String,
    #[serde(rename = "favorita", default)]
    pub favorite: bool,
}

/// 标签列表响应
#[derive(Debug, Clone, Deserialize)]
pub struct TagPage {
    #[serde(default)]
    pub entities: Vec<Tag>,
}

/// 面板中的案件（标签列表返回的完整实体）
#[derive(Debug, Clone, Deserialize)]
pub struct Process {
    #[serde(rename = "idProcesso", default)]
    pub process_id: i64,
    #[serde(rename = "numeroProcesso", default)]
    pub number: String,
    #[serde(rename = "classeJudicial", default)]
    pub judicial_class: String,
    #[serde(rename = "orgaoJulgador", default)]
    pub court_unit: String,
    /// 保密案件标记
    #[serde(rename = "sigiloso", default)]
    pub restricted: bool,
}

/// 解析完成的案件引用：内部 ID + 短期访问密钥
///
/// 访问密钥与会话绑定且只对这一个案件有效，不跨案件复用、不落盘。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRef {
    pub process_id: i64,
    /// 门户的 "ca" 参数，约 100 位十六进制
    pub access_key: String,
    pub task_instance_id: Option<i64>,
}

/// 一条待处理的工作项
///
/// 三种来源各带不同的解析线索：任务/标签条目自带内部 ID，
/// 纯编号必须走查询路径。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "origin")]
pub enum WorkItem {
    /// 直接给出的案件编号
    Number { number: CaseNumber },
    /// 任务枚举出来的案件（已知内部 ID）
    TaskEntry {
        task: String,
        process_id: i64,
        number: String,
        task_instance_id: i64,
    },
    /// 标签枚举出来的案件（已知内部 ID）
    TagEntry {
        tag: String,
        process_id: i64,
        number: String,
        /// 面板已经标出保密的案件不必再发请求
        restricted: bool,
    },
}

impl WorkItem {
    /// 已知的内部 ID（任务/标签来源才有）
    pub fn known_process_id(&self) -> Option<i64> {
        match self {
            WorkItem::Number { .. } => None,
            WorkItem::TaskEntry { process_id, .. } | WorkItem::TagEntry { process_id, .. } => {
                Some(*process_id)
            }
        }
    }

    /// 案件编号的展示形式
    pub fn number_display(&self) -> String {
        match self {
            WorkItem::Number { number } => number.formatted(),
            WorkItem::TaskEntry { number, .. } | WorkItem::TagEntry { number, .. } => {
                number.clone()
            }
        }
    }
}

/// 文书列表里的一条文书
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub id: i64,
    pub name: String,
    /// 门户声明的字节数
    pub declared_size: u64,
    /// 门户附带的 sha256（并非所有列表都有）
    pub sha256: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_task_process_page() {
        let body = r#"{
            "entities": [
                {"idProcesso": 88001234, "numeroProcesso": "8128688-83.2024.8.05.0001",
                 "idTaskInstance": 555, "classeJudicial": "PROCEDIMENTO COMUM"}
            ],
            "count": 1
        }"#;
        let page: TaskProcessPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.entities[0].process_id, 88001234);
        assert_eq!(page.entities[0].task_instance_id, 555);
    }

    #[test]
    fn deserializes_restricted_process() {
        let body = r#"{"idProcesso": 1, "numeroProcesso": "n", "sigiloso": true}"#;
        let p: Process = serde_json::from_str(body).unwrap();
        assert!(p.restricted);
    }

    #[test]
    fn known_id_only_for_panel_items() {
        let item = WorkItem::Number {
            number: crate::models::case_number::CaseNumber::parse("81286888320248050001")
                .unwrap(),
        };
        assert_eq!(item.known_process_id(), None);

        let item = WorkItem::TaskEntry {
            task: "Minutar sentença".into(),
            process_id: 42,
            number: "8128688-83.2024.8.05.0001".into(),
            task_instance_id: 7,
        };
        assert_eq!(item.known_process_id(), Some(42));
    }
}
