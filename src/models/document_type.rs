//! 文书类型静态对照表
//!
//! 门户的文书筛选下拉框用数字代码标识类型，这里按展示名建表。
//! "Selecione" 表示不过滤（全部类型）。

use phf::phf_map;

/// 展示名 → 门户代码
pub static DOCUMENT_TYPE_VALUES: phf::Map<&'static str, &'static str> = phf_map! {
    "Selecione" => "0",
    "Peticao Inicial" => "12",
    "Peticao" => "36",
    "Emenda a Inicial" => "40",
    "Contestacao" => "44",
    "Replica" => "45",
    "Impugnacao" => "46",
    "Documento de Identificacao" => "52",
    "Documento de Comprovacao" => "53",
    "Comprovante de Residencia" => "54",
    "Procuracao" => "161",
    "Substabelecimento" => "163",
    "Certidao" => "57",
    "Certidao de Publicacao" => "58",
    "Mandado" => "59",
    "Carta Precatoria" => "60",
    "Alvara" => "61",
    "Sentenca" => "62",
    "Despacho" => "63",
    "Decisao" => "64",
    "Ata de Audiencia" => "65",
    "Laudo Pericial" => "70",
    "Parecer" => "72",
    "Acordao" => "74",
    "Embargos de Declaracao" => "78",
    "Contrarrazoes" => "80",
    "Recurso de Apelacao" => "82",
    "Agravo de Instrumento" => "84",
    "Cumprimento de Sentenca" => "88",
    "Outros documentos" => "93",
};

/// 按展示名取门户代码；未知名称回落到不过滤
pub fn code_for(label: &str) -> &'static str {
    DOCUMENT_TYPE_VALUES.get(label).copied().unwrap_or("0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_resolve() {
        assert_eq!(code_for("Sentenca"), "62");
        assert_eq!(code_for("Peticao Inicial"), "12");
        assert_eq!(code_for("Selecione"), "0");
    }

    #[test]
    fn unknown_label_falls_back_to_unfiltered() {
        assert_eq!(code_for("Tipo Inexistente"), "0");
    }
}
