use csv::{ReaderBuilder, Trim};
use log::debug;

const BOM: char = '\u{FEFF}';

/// 区切り文字を判定したCSVの内容。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    /// ヘッダーと列数が揃っているとは限らない。
    pub rows: Vec<Vec<String>>,
}

/// CSVテキストをヘッダーと行に分割する。
///
/// 空行は捨てる。区切り文字は1行目の`,` `;` タブの出現数で決め、最多が1つに決まらない場合は`,`とする。
/// クォートの不整合はエラーにせず、閉じていないクォートは行末までを値とする。
/// クォートはフィールドの先頭にある場合だけ囲みとして扱う。
///
/// # Examples
///
/// ```
/// let parsed = parse("a;b\n\"x;y\";2");
/// assert_eq!(parsed.rows, vec![vec!["x;y".to_string(), "2".to_string()]]);
/// ```
pub fn parse(content: &str) -> ParsedCsv {
    let content = content.strip_prefix(BOM).unwrap_or(content);
    let mut lines = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return ParsedCsv::default();
    };
    let delimiter = detect_delimiter(header_line);

    ParsedCsv {
        headers: parse_row(header_line, delimiter),
        rows: lines.map(|line| parse_row(line, delimiter)).collect(),
    }
}

/// ヘッダー行から区切り文字を推定する。
fn detect_delimiter(header_line: &str) -> char {
    let count = |delimiter: char| header_line.chars().filter(|c| *c == delimiter).count();
    let commas = count(',');
    let semicolons = count(';');
    let tabs = count('\t');

    if semicolons > commas && semicolons > tabs {
        ';'
    } else if tabs > commas && tabs > semicolons {
        '\t'
    } else {
        ','
    }
}

/// 1行をクォートを考慮してフィールドに分割する。
///
/// 行ごとに読むため、閉じていないクォートはその行の終わりまでを値とする。
fn parse_row(line: &str, delimiter: char) -> Vec<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter as u8)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        Some(Err(e)) => {
            debug!("Failed to split CSV line {:?}: {}", line, e);
            vec![line.trim().to_string()]
        }
        None => Vec::new(),
    }
}
