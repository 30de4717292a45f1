//! 文书下载服务 - 业务能力层
//!
//! 对一个已解析的案件引用：取文书列表，按列表顺序流式落盘，
//! 每份文书核对字节数（列表带哈希时再核对 sha256）。
//! 保密案件在列表阶段即以 AccessDenied 报出。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult, DownloadError};
use crate::infrastructure::Session;
use crate::models::{document_type, DocumentEntry, ProcessRef};
use crate::services::markup;
use crate::utils::text::sanitize_folder_name;

/// 文书来源能力（工作流依赖的接口）
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// 案件的文书列表（按门户展示顺序）
    async fn list_documents(&self, pref: &ProcessRef) -> AppResult<Vec<DocumentEntry>>;

    /// 下载并校验一份文书，返回落盘路径
    async fn fetch_document(
        &self,
        pref: &ProcessRef,
        doc: &DocumentEntry,
        dest_dir: &Path,
    ) -> AppResult<PathBuf>;
}

/// 文书下载服务
pub struct DownloadService {
    session: Arc<Session>,
    /// 文书类型过滤代码（"0" 为不过滤）
    document_type_code: &'static str,
    verbose_logging: bool,
}

impl DownloadService {
    pub fn new(session: Arc<Session>, config: &Config) -> Self {
        Self {
            session,
            document_type_code: document_type::code_for(&config.document_type),
            verbose_logging: config.verbose_logging,
        }
    }

    fn listing_url(&self) -> String {
        format!(
            "{}/pje/Processo/ConsultaProcesso/Detalhe/listAutosDigitais.seam",
            self.session.base_url()
        )
    }

    fn base_query(&self, pref: &ProcessRef) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("idProcesso", pref.process_id.to_string()),
            ("ca", pref.access_key.clone()),
        ];
        if let Some(task_instance) = pref.task_instance_id {
            query.push(("idTaskInstance", task_instance.to_string()));
        }
        if self.document_type_code != "0" {
            query.push(("tipoDocumento", self.document_type_code.to_string()));
        }
        query
    }
}

#[async_trait]
impl DocumentSource for DownloadService {
    async fn list_documents(&self, pref: &ProcessRef) -> AppResult<Vec<DocumentEntry>> {
        let resp = self
            .session
            .http()
            .get(self.listing_url())
            .query(&self.base_query(pref))
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 403 {
            return Err(AppError::access_denied(pref.process_id));
        }
        if status.as_u16() == 401 {
            self.session.mark_expired();
            return Err(AppError::bad_status("listAutosDigitais.seam", 401));
        }
        if !status.is_success() {
            return Err(AppError::bad_status("listAutosDigitais.seam", status.as_u16()));
        }

        let html = resp.text().await?;
        if markup::is_restricted(&html) {
            return Err(AppError::access_denied(pref.process_id));
        }

        let documents = markup::extract_document_listing(&html)?;
        info!("案件 {} 共 {} 份文书", pref.process_id, documents.len());

        if self.verbose_logging {
            for (i, doc) in documents.iter().enumerate() {
                debug!(
                    "  {}. {} ({} 字节)",
                    i + 1,
                    doc.name,
                    doc.declared_size
                );
            }
        }
        Ok(documents)
    }

    async fn fetch_document(
        &self,
        pref: &ProcessRef,
        doc: &DocumentEntry,
        dest_dir: &Path,
    ) -> AppResult<PathBuf> {
        let mut query = self.base_query(pref);
        query.push(("idProcessoDocumento", doc.id.to_string()));

        let resp = self
            .session
            .http()
            .get(self.listing_url())
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 403 {
            return Err(AppError::access_denied(pref.process_id));
        }
        if status.as_u16() == 401 {
            self.session.mark_expired();
            return Err(AppError::bad_status("listAutosDigitais.seam", 401));
        }
        if !status.is_success() {
            return Err(AppError::bad_status("listAutosDigitais.seam", status.as_u16()));
        }

        // 列表未声明大小时退回 Content-Length
        let expected = if doc.declared_size > 0 {
            Some(doc.declared_size)
        } else {
            resp.content_length()
        };

        let extension = extension_for(
            resp.headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(""),
        );

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| AppError::file_write_failed(dest_dir.display().to_string(), e))?;
        let path = dest_dir.join(document_file_name(doc, extension));

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        let mut received: u64 = 0;
        let mut hasher = Sha256::new();
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AppError::request_failed("listAutosDigitais.seam", e))?;
            received += chunk.len() as u64;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        // 字节数核对
        if let Some(expected) = expected {
            if received != expected {
                return Err(AppError::Download(DownloadError::Integrity {
                    document_id: doc.id,
                    expected,
                    got: received,
                }));
            }
        }

        // 列表带哈希时再核对一次
        if let Some(declared) = &doc.sha256 {
            let digest = hex_digest(hasher.finalize().as_slice());
            if !digest.eq_ignore_ascii_case(declared) {
                return Err(AppError::Download(DownloadError::ChecksumMismatch {
                    document_id: doc.id,
                }));
            }
        }

        debug!("文书 {} 落盘: {} ({} 字节)", doc.id, path.display(), received);
        Ok(path)
    }
}

/// 按内容类型决定扩展名
fn extension_for(content_type: &str) -> &'static str {
    let main = content_type.split(';').next().unwrap_or("").trim();
    match main {
        "application/pdf" => "pdf",
        "application/zip" | "application/x-zip-compressed" => "zip",
        "text/html" => "html",
        _ => "bin",
    }
}

/// 文书落盘文件名：ID + 归一化名称
fn document_file_name(doc: &DocumentEntry, extension: &str) -> String {
    let name = sanitize_folder_name(&doc.name);
    if name.is_empty() {
        format!("{}.{}", doc.id, extension)
    } else {
        format!("{}_{}.{}", doc.id, name, extension)
    }
}

/// 小写十六进制摘要
fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_content_types_to_extensions() {
        assert_eq!(extension_for("application/pdf"), "pdf");
        assert_eq!(extension_for("application/pdf; charset=binary"), "pdf");
        assert_eq!(extension_for("application/zip"), "zip");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }

    #[test]
    fn builds_safe_file_names() {
        let doc = DocumentEntry {
            id: 101,
            name: "Petição / Inicial".into(),
            declared_size: 0,
            sha256: None,
        };
        assert_eq!(document_file_name(&doc, "pdf"), "101_Peticao _ Inicial.pdf");

        let unnamed = DocumentEntry {
            id: 7,
            name: String::new(),
            declared_size: 0,
            sha256: None,
        };
        assert_eq!(document_file_name(&unnamed, "bin"), "7.bin");
    }

    #[test]
    fn hex_digest_matches_known_vector() {
        // sha256 的空串摘要
        let digest = hex_digest(Sha256::new().finalize().as_slice());
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
