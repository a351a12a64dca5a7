use std::fs::File;
use std::io::Read;
use std::path::Path;

use content_inspector::ContentType;

/// 内容嗅探读取的最大字节数
pub const SNIFF_LEN: u64 = 512;

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// 文件内容分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// 文本文件
    Text,
    /// 二进制文件
    Binary,
    /// 无法打开或读取，附带失败原因
    Unreadable { reason: String },
}

impl Classification {
    pub fn is_text(&self) -> bool {
        matches!(self, Classification::Text)
    }
}

/// 判断文件是文本还是二进制
///
/// 只读取文件开头的 [`SNIFF_LEN`] 字节，根据嗅探出的 MIME 类型决定：
/// 只有 `text/...` 类型被视为文本。
pub fn classify(path: &Path) -> Classification {
    match read_prefix(path) {
        Ok(prefix) => classify_bytes(&prefix),
        Err(err) => Classification::Unreadable {
            reason: err.to_string(),
        },
    }
}

/// 对已读取的前缀字节进行分类
pub fn classify_bytes(prefix: &[u8]) -> Classification {
    if sniff_content_type(prefix).starts_with("text/") {
        Classification::Text
    } else {
        Classification::Binary
    }
}

fn read_prefix(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buffer = Vec::with_capacity(SNIFF_LEN as usize);
    file.take(SNIFF_LEN).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// 根据字节前缀推断 MIME 类型
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN as usize)];

    // 带 BOM 的文本优先，UTF-16 文本本身含有 NUL 字节
    match content_inspector::inspect(data) {
        ContentType::UTF_8_BOM => return TEXT_PLAIN,
        ContentType::UTF_16LE => return "text/plain; charset=utf-16le",
        ContentType::UTF_16BE => return "text/plain; charset=utf-16be",
        ContentType::UTF_32LE => return "text/plain; charset=utf-32le",
        ContentType::UTF_32BE => return "text/plain; charset=utf-32be",
        ContentType::BINARY | ContentType::UTF_8 => {}
    }

    if let Some(mime) = sniff_markup(data) {
        return mime;
    }

    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| data.starts_with(magic)) {
        return *mime;
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return "image/webp";
    }

    if data.iter().any(|&b| is_binary_data_byte(b)) {
        return OCTET_STREAM;
    }

    TEXT_PLAIN
}

/// 固定魔数签名
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"OggS\x00", "application/ogg"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    (b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
    (b"\x00asm", "application/wasm"),
];

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// HTML/XML 检测，允许前导空白，标签名不区分大小写
fn sniff_markup(data: &[u8]) -> Option<&'static str> {
    let start = data
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))?;
    let data = &data[start..];

    if data.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }

    for tag in HTML_TAGS {
        if data.len() <= tag.len() || !data[..tag.len()].eq_ignore_ascii_case(tag) {
            continue;
        }
        // 标签名后必须是空格或 '>'
        if matches!(data[tag.len()], b' ' | b'>') {
            return Some("text/html; charset=utf-8");
        }
    }

    None
}

/// 文本中不应出现的控制字节
fn is_binary_data_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
