pub mod case_number;
pub mod document_type;
pub mod loaders;
pub mod process;
pub mod report;

use serde::Deserialize;

pub use case_number::{CaseNumber, CaseNumberError};
pub use document_type::{code_for, DOCUMENT_TYPE_VALUES};
pub use loaders::{load_all_batches, load_toml_to_batch};
pub use process::{
    DocumentEntry, Process, ProcessRef, Profile, Tag, TagPage, Task, TaskProcess,
    TaskProcessPage, User, WorkItem,
};
pub use report::{Outcome, OutcomeCounts, ProcessResult, Report};

/// 一个 TOML 编号批次文件的内容
#[derive(Debug, Clone, Deserialize)]
pub struct NumberBatch {
    /// 批次名，缺省用文件名
    pub name: Option<String>,
    /// CNJ 案件编号列表
    pub numbers: Vec<String>,
    /// 来源文件路径（加载时填入）
    #[serde(skip)]
    pub file_path: Option<String>,
}
