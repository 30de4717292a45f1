//! 页面结构解析 - 业务能力层
//!
//! 门户的查询页面是遗留 JSF 应用，内部 ID 和访问密钥都埋在返回的
//! 标记与内联脚本里。把所有"从 HTML 里抠字段"的逻辑集中在这里，
//! 当成一个有固定文法的解析器维护，请求逻辑不碰字符串。

use regex::Regex;

use crate::models::{DocumentEntry, Profile};
use crate::services::captcha::CaptchaChallenge;

/// 页面解析错误
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("正则表达式错误: {0}")]
    Pattern(#[from] regex::Error),
    #[error("页面中没有 ViewState")]
    ViewStateMissing,
    #[error("登录页中没有表单 action")]
    FormActionMissing,
}

/// 提取 JSF ViewState
pub fn extract_viewstate(html: &str) -> Result<String, ScrapeError> {
    let re = Regex::new(r#"name="javax\.faces\.ViewState"[^>]*value="([^"]*)""#)?;
    re.captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(ScrapeError::ViewStateMissing)
}

/// 提取 SSO 登录表单的 action 地址
pub fn extract_form_action(html: &str) -> Result<String, ScrapeError> {
    let re = Regex::new(r#"action="([^"]*)""#)?;
    re.captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().replace("&amp;", "&"))
        .ok_or(ScrapeError::FormActionMissing)
}

/// 从查询结果表中提取内部案件 ID
///
/// 已知两种形态：
/// - 结果表行元素 `processosTable:{id}:j_id...`
/// - 行选择脚本里的 `idProcessoSelecionado: {id}`
pub fn extract_process_id(html: &str) -> Result<Option<i64>, ScrapeError> {
    let re = Regex::new(r"processosTable:(\d+):j_id\d+")?;
    if let Some(cap) = re.captures(html) {
        if let Ok(id) = cap[1].parse() {
            return Ok(Some(id));
        }
    }

    let re = Regex::new(r#"idProcessoSelecionado['"]?\s*[:=]\s*(\d+)"#)?;
    if let Some(cap) = re.captures(html) {
        if let Ok(id) = cap[1].parse() {
            return Ok(Some(id));
        }
    }

    Ok(None)
}

/// 找到结果行的点击元素 ID（第二次 POST 需要回传）
pub fn extract_row_click_element(html: &str, process_id: i64) -> Result<Option<String>, ScrapeError> {
    let re = Regex::new(&format!(r"fPP:processosTable:{}:(j_id\d+)", process_id))?;
    Ok(re
        .captures(html)
        .map(|cap| format!("fPP:processosTable:{}:{}", process_id, &cap[1])))
}

/// 从行选择的响应脚本中提取访问密钥（"ca" 参数）
pub fn extract_access_key(html: &str) -> Result<Option<String>, ScrapeError> {
    let re = Regex::new(r"[&?]ca=([0-9a-f]+)")?;
    Ok(re
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string()))
}

/// 查询页是否带验证码挑战
pub fn extract_captcha_challenge(html: &str) -> Result<Option<CaptchaChallenge>, ScrapeError> {
    let re = Regex::new(r#"id="fPP:captcha[^"]*"[^>]*src="([^"]*)""#)?;
    Ok(re.captures(html).map(|cap| CaptchaChallenge {
        image_url: cap[1].replace("&amp;", "&"),
    }))
}

/// 文书列表页是否提示保密案件
pub fn is_restricted(html: &str) -> bool {
    let lower = html.to_lowercase();
    lower.contains("processo sigiloso")
        || lower.contains("segredo de justi")
        || lower.contains("acesso restrito")
        || lower.contains("sem permiss")
}

/// 解析文书列表
///
/// 列表页的文法是两段式的：表格行的锚点给出 ID 和名称，
/// 随后的内联脚本 `registrarDocumento(id, 'nome', bytes[, 'sha256'])`
/// 给出声明大小与可选校验和。两段按 ID 合并。
pub fn extract_document_listing(html: &str) -> Result<Vec<DocumentEntry>, ScrapeError> {
    let anchor_re = Regex::new(r#"id="docTable:(\d+):nomeDocumento"[^>]*>([^<]+)</a>"#)?;
    let script_re = Regex::new(
        r"registrarDocumento\((\d+),\s*'[^']*',\s*(\d+)(?:,\s*'([0-9a-f]{64})')?\)",
    )?;

    let mut entries = Vec::new();
    for cap in anchor_re.captures_iter(html) {
        let id: i64 = match cap[1].parse() {
            Ok(id) => id,
            Err(_) => continue,
        };
        entries.push(DocumentEntry {
            id,
            name: decode_html_entities(&cap[2]),
            declared_size: 0,
            sha256: None,
        });
    }

    for cap in script_re.captures_iter(html) {
        let id: i64 = match cap[1].parse() {
            Ok(id) => id,
            Err(_) => continue,
        };
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.declared_size = cap[2].parse().unwrap_or(0);
            entry.sha256 = cap.get(3).map(|m| m.as_str().to_string());
        }
    }

    Ok(entries)
}

/// 从角色选择页提取所有角色
///
/// 收藏角色展示在表头（favorite 图标未置灰时才有效），
/// 其余角色在编号行里。
pub fn extract_profiles(html: &str) -> Result<Vec<Profile>, ScrapeError> {
    let mut profiles = Vec::new();

    if let Some(favorite) = extract_favorite_profile(html)? {
        profiles.push(favorite);
    }

    let re = Regex::new(r"dtPerfil:(\d+):j_id\d+'[^>]*>([^<]+)</a>")?;
    let mut matches: Vec<(i32, String)> = re
        .captures_iter(html)
        .filter_map(|cap| {
            let index = cap[1].parse().ok()?;
            Some((index, cap[2].to_string()))
        })
        .collect();

    if matches.is_empty() {
        let re =
            Regex::new(r#"<a[^>]*onclick="[^"]*dtPerfil:(\d+)[^"]*j_id\d+[^"]*"[^>]*>([^<]+)</a>"#)?;
        matches = re
            .captures_iter(html)
            .filter_map(|cap| {
                let index = cap[1].parse().ok()?;
                Some((index, cap[2].to_string()))
            })
            .collect();
    }

    for (index, raw_name) in matches {
        profiles.push(split_profile_name(index, &raw_name, false));
    }

    Ok(profiles)
}

fn extract_favorite_profile(html: &str) -> Result<Option<Profile>, ScrapeError> {
    let thead_re = Regex::new(r"(?is)<thead[^>]*class=.rich-table-thead[^>]*>.*?</thead>")?;
    let thead = match thead_re.find(html) {
        Some(m) => m.as_str(),
        None => return Ok(None),
    };

    if !thead.contains("favorite-16x16.png") || thead.contains("favorite-16x16-disabled.png") {
        return Ok(None);
    }

    let name_re = Regex::new(r"dtPerfil:j_id\d+[^>]*>([^<]+)</a>")?;
    Ok(name_re
        .captures(thead)
        .map(|cap| split_profile_name(-1, &cap[1], true)))
}

fn split_profile_name(index: i32, raw: &str, favorite: bool) -> Profile {
    let decoded = decode_html_entities(raw);
    let mut parts = decoded.split(" / ").map(str::trim);
    Profile {
        index,
        name: parts.next().unwrap_or_default().to_string(),
        court_unit: parts.next().unwrap_or_default().to_string(),
        position: parts.next().unwrap_or_default().to_string(),
        favorite,
    }
}

/// 解码门户页面常见的 HTML 实体
pub fn decode_html_entities(text: &str) -> String {
    let mut out = text.to_string();
    for (entity, replacement) in [
        ("&ccedil;", "ç"),
        ("&Ccedil;", "Ç"),
        ("&atilde;", "ã"),
        ("&Atilde;", "Ã"),
        ("&aacute;", "á"),
        ("&Aacute;", "Á"),
        ("&eacute;", "é"),
        ("&Eacute;", "É"),
        ("&iacute;", "í"),
        ("&Iacute;", "Í"),
        ("&oacute;", "ó"),
        ("&Oacute;", "Ó"),
        ("&uacute;", "ú"),
        ("&Uacute;", "Ú"),
        ("&acirc;", "â"),
        ("&ecirc;", "ê"),
        ("&ocirc;", "ô"),
        ("&otilde;", "õ"),
        ("&agrave;", "à"),
        ("&amp;", "&"),
        ("&nbsp;", " "),
    ] {
        out = out.replace(entity, replacement);
    }
    out.trim().to_string()
}
