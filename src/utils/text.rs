//! 文本工具
//!
//! 门户返回的任务名、角色名带葡语重音，目录名与查找都需要统一归一。

/// 去掉葡语常见重音字符
pub fn strip_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// 查找用的归一化（去重音 + 小写 + 去首尾空白）
pub fn normalize_key(text: &str) -> String {
    strip_accents(text).to_lowercase().trim().to_string()
}

/// 归一化成可用作目录名的字符串
pub fn sanitize_folder_name(name: &str) -> String {
    let stripped = strip_accents(name);
    let cleaned: String = stripped
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();

    // 压缩连续空白
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 字符二元组 Dice 相似度（0.0 - 1.0）
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_key(a);
    let b = normalize_key(b);
    if a == b {
        return 1.0;
    }

    let bigrams = |s: &str| -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };

    let ba = bigrams(&a);
    let bb = bigrams(&b);
    if ba.is_empty() || bb.is_empty() {
        return 0.0;
    }

    let mut remaining = bb.clone();
    let mut shared = 0usize;
    for pair in &ba {
        if let Some(pos) = remaining.iter().position(|p| p == pair) {
            remaining.swap_remove(pos);
            shared += 1;
        }
    }

    (2.0 * shared as f64) / (ba.len() + bb.len()) as f64
}

/// 在候选列表中找最接近的项，返回索引
///
/// 依次尝试：精确匹配 → 包含匹配 → 相似度超过阈值的最佳项
pub fn find_most_similar(query: &str, candidates: &[String], threshold: f64) -> Option<usize> {
    let query_key = normalize_key(query);

    for (i, item) in candidates.iter().enumerate() {
        if normalize_key(item) == query_key {
            return Some(i);
        }
    }

    for (i, item) in candidates.iter().enumerate() {
        if normalize_key(item).contains(&query_key) {
            return Some(i);
        }
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, item) in candidates.iter().enumerate() {
        let score = similarity(query, item);
        if score >= threshold && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_portuguese_accents() {
        assert_eq!(strip_accents("Minutar sentença"), "Minutar sentenca");
        assert_eq!(strip_accents("Análise de petição"), "Analise de peticao");
    }

    #[test]
    fn sanitizes_folder_names() {
        assert_eq!(
            sanitize_folder_name("Caixa: entrada / saída?"),
            "Caixa_ entrada _ saida_"
        );
        assert_eq!(sanitize_folder_name("  nome   com    espaços "), "nome com espacos");
    }

    #[test]
    fn finds_exact_before_fuzzy() {
        let candidates = vec![
            "Minutar despacho".to_string(),
            "Minutar sentença".to_string(),
        ];
        assert_eq!(
            find_most_similar("minutar sentenca", &candidates, 0.4),
            Some(1)
        );
    }

    #[test]
    fn fuzzy_match_respects_threshold() {
        let candidates = vec!["Assinar expediente".to_string()];
        assert_eq!(find_most_similar("xyz", &candidates, 0.4), None);
        assert!(find_most_similar("Asinar expediente", &candidates, 0.4).is_some());
    }

    #[test]
    fn truncates_long_text() {
        assert_eq!(truncate_text("abcdef", 4), "abcd...");
        assert_eq!(truncate_text("abc", 4), "abc");
    }
}
