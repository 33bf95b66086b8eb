//! DOCX text extraction: read `word/document.xml` from the archive and keep run text.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::{LoaderError, read_file};

const BODY_PART: &str = "word/document.xml";

pub(super) async fn extract_text(path: &Path) -> Result<String, LoaderError> {
    let bytes = read_file(path).await?;
    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let xml = read_body(&bytes).map_err(|message| LoaderError::Docx {
            path: owned.clone(),
            message,
        })?;
        Ok::<_, LoaderError>(body_text(&xml))
    })
    .await
    .map_err(|error| LoaderError::Join(error.to_string()))?
}

fn read_body(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut part = archive
        .by_name(BODY_PART)
        .map_err(|e| format!("{BODY_PART}: {e}"))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml).map_err(|e| e.to_string())?;
    Ok(xml)
}

fn markup() -> &'static Regex {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    MARKUP.get_or_init(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|</w:p>|<w:tab\s*/>|<w:br\s*/>")
            .expect("static DOCX pattern compiles")
    })
}

/// Collect run text; paragraph ends and breaks become newlines, tabs become tabs.
fn body_text(xml: &str) -> String {
    let mut text = String::new();
    for capture in markup().captures_iter(xml) {
        match capture.get(1) {
            Some(run) => text.push_str(&unescape(run.as_str())),
            None => {
                let token = &capture[0];
                if token.starts_with("<w:tab") {
                    text.push('\t');
                } else {
                    text.push('\n');
                }
            }
        }
    }
    text.trim_end().to_string()
}

fn entity() -> &'static Regex {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    ENTITY.get_or_init(|| {
        Regex::new(r"&(lt|gt|quot|apos|amp|#[0-9]+|#[xX][0-9A-Fa-f]+);")
            .expect("static entity pattern compiles")
    })
}

/// Decode XML entities in one pass; references to invalid code points stay as written.
fn unescape(value: &str) -> String {
    entity()
        .replace_all(value, |capture: &regex::Captures<'_>| {
            let decoded = match &capture[1] {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                reference => {
                    let digits = &reference[1..];
                    let code = match digits.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => digits.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| capture[0].to_string(), String::from)
        })
        .into_owned()
}
