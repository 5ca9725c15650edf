//! Prompts for VLM-based table extraction.
//!
//! Callers can override the default via
//! [`crate::config::ExtractionConfig::prompt`]; the constant here is used only
//! when no override is provided and the delimiter is the default pipe.

use std::borrow::Cow;

/// Default instruction sent alongside every chunk image.
///
/// The rules mirror what [`crate::pipeline::parse::parse_rows`] expects:
/// pipe-delimited rows, explicit empty cells, no prose, no separator lines.
pub const TABLE_EXTRACTION_PROMPT: &str = r#"Extract all table data meticulously from the provided image chunk.
Format the output STRICTLY as pipe-delimited text (|).
- Ensure every row has a consistent number of columns, matching the table's structure. Use pipes `|` as delimiters.
- Represent empty cells explicitly using consecutive pipes (e.g., `value1||value3`). If a row starts or ends with empty cells, include leading/trailing pipes accordingly (e.g., `|value1|value2||` or `||value1|value2`).
- Do NOT include any explanatory text, greetings, introductions, summaries, or markdown formatting like backticks (`). Only output the raw pipe-delimited table data.
- Preserve the original content within cells accurately, including spacing within the cell if relevant.
- Ignore any text clearly outside of table structures.
- Remove lines that are only visual separators like '----' or '===='."#;

/// Default instruction for a run using `delimiter` between cells.
///
/// The pipe delimiter gets [`TABLE_EXTRACTION_PROMPT`] unchanged.
pub fn table_extraction_prompt(delimiter: char) -> Cow<'static, str> {
    if delimiter == '|' {
        return Cow::Borrowed(TABLE_EXTRACTION_PROMPT);
    }
    let d = delimiter;
    Cow::Owned(format!(
        r#"Extract all table data meticulously from the provided image chunk.
Format the output STRICTLY as text delimited by `{d}`.
- Ensure every row has a consistent number of columns, matching the table's structure. Use `{d}` as the only cell delimiter.
- Represent empty cells explicitly using consecutive delimiters (e.g., `value1{d}{d}value3`). If a row starts or ends with empty cells, include leading/trailing delimiters accordingly (e.g., `{d}value1{d}value2{d}{d}` or `{d}{d}value1{d}value2`).
- Do NOT include any explanatory text, greetings, introductions, summaries, or markdown formatting like backticks (`). Only output the raw `{d}`-delimited table data.
- Preserve the original content within cells accurately, including spacing within the cell if relevant.
- Ignore any text clearly outside of table structures.
- Remove lines that are only visual separators like '----' or '===='."#
    ))
}
