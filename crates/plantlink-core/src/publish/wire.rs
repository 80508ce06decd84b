//! JSON bodies and REST endpoints for the two cloud sinks.

use core::fmt::{self, Write};

use heapless::String;

use super::batch::{CellValue, KvValue, SheetRow};

pub const KV_BODY_BYTES: usize = 48;
pub const ROW_BODY_BYTES: usize = 192;
pub const URL_BYTES: usize = 256;

pub type KvBody = String<KV_BODY_BYTES>;
pub type RowBody = String<ROW_BODY_BYTES>;
pub type Url = String<URL_BYTES>;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SERVER_TIMESTAMP_JSON: &str = r#"{".sv":"timestamp"}"#;

/// JSON value written at a key path.
pub fn kv_body(value: KvValue) -> Result<KvBody, fmt::Error> {
    let mut body = KvBody::new();
    match value {
        KvValue::Int(value) => write!(body, "{}", value)?,
        KvValue::Bool(value) => write!(body, "{}", value)?,
        KvValue::Number { value, decimals } => write_number(&mut body, value, decimals)?,
        KvValue::ServerTimestamp => body.write_str(SERVER_TIMESTAMP_JSON)?,
    }
    Ok(body)
}

/// `{"majorDimension":"COLUMNS","values":[[..],[],..]}`
pub fn row_body(row: &SheetRow) -> Result<RowBody, fmt::Error> {
    let mut body = RowBody::new();
    body.write_str(r#"{"majorDimension":"COLUMNS","values":["#)?;

    for (index, column) in row.columns().iter().enumerate() {
        if index > 0 {
            body.write_char(',')?;
        }
        body.write_char('[')?;
        match column {
            Some(CellValue::Int(value)) => write!(body, "{}", value)?,
            Some(CellValue::Number { value, decimals }) => {
                write_number(&mut body, *value, *decimals)?
            }
            None => {}
        }
        body.write_char(']')?;
    }

    body.write_str("]}")?;
    Ok(body)
}

/// `https://{host}{path}.json?auth={secret}`
pub fn kv_url(host: &str, path: &str, secret: &str) -> Result<Url, fmt::Error> {
    let host = host
        .trim_start_matches("https://")
        .trim_end_matches('/');
    let mut url = Url::new();
    write!(url, "https://{}{}.json", host, path)?;
    if !secret.is_empty() {
        write!(url, "?auth={}", secret)?;
    }
    Ok(url)
}

/// Sheets `values:append` endpoint for `range`.
pub fn append_url(sheet_id: &str, range: &str) -> Result<Url, fmt::Error> {
    let mut url = Url::new();
    write!(
        url,
        "{}/{}/values/{}:append?valueInputOption=USER_ENTERED",
        SHEETS_API_BASE, sheet_id, range
    )?;
    Ok(url)
}

fn write_number<W: Write>(out: &mut W, value: f32, decimals: u8) -> fmt::Result {
    // JSON has no NaN or infinity.
    if !value.is_finite() {
        return Err(fmt::Error);
    }
    write!(out, "{:.*}", usize::from(decimals), value)
}
