//! Generation metadata extraction
//!
//! Image generators embed their parameters as text: PNG files carry a
//! `parameters` text chunk, JPEG and WebP files carry the same text in the
//! EXIF `UserComment` tag. When neither is present the filename is searched
//! for a `-lora <name>` marker instead.
//!
//! Extraction never fails. Unreadable files and malformed metadata produce an
//! empty (or partial) [`GenerationMetadata`].

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::LazyLock;

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use img_parts::png::Png;
use regex::Regex;
use tgsender_core::GenerationMetadata;

const PARAMETERS_KEYWORD: &[u8] = b"parameters";
const STEPS_MARKER: &str = "Steps:";
const NEGATIVE_PROMPT_MARKER: &str = "Negative prompt:";

static LORA_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<lora:([^:>]+)(?::[^>]*)?>").expect("LoRA tag pattern is valid")
});

static FILENAME_LORA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-lora\s+(\S+)").expect("filename pattern is valid"));

pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract generation metadata for the image at `path`.
    ///
    /// Embedded parameters are authoritative; the filename marker is only
    /// consulted when the image carries no parameter text at all.
    pub fn extract(path: &Path) -> GenerationMetadata {
        let embedded = match std::fs::read(path) {
            Ok(data) => Self::read_embedded_parameters(&data),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read image for metadata extraction"
                );
                None
            }
        };

        match embedded {
            Some(text) => Self::parse_parameters(&text),
            None => {
                let tag = Self::filename_tag(path);
                tracing::debug!(
                    path = %path.display(),
                    tag = ?tag,
                    "No embedded parameters, using filename marker"
                );
                GenerationMetadata::from_filename_tag(tag)
            }
        }
    }

    /// Split parameter text into prompt segments and LoRA tags.
    pub fn parse_parameters(text: &str) -> GenerationMetadata {
        let relevant = match text.find(STEPS_MARKER) {
            Some(idx) => &text[..idx],
            None => text,
        };

        let (positive, negative) = match relevant.split_once(NEGATIVE_PROMPT_MARKER) {
            Some((positive, negative)) => (positive.trim(), negative.trim()),
            None => (relevant.trim(), ""),
        };

        let mut lora_tags: Vec<String> = Vec::new();
        for captures in LORA_TAG.captures_iter(relevant) {
            let name = captures[1].trim();
            if !name.is_empty() && !lora_tags.iter().any(|t| t == name) {
                lora_tags.push(name.to_string());
            }
        }

        GenerationMetadata {
            raw_parameters: Some(text.to_string()),
            lora_tags,
            positive_prompt: positive.to_string(),
            negative_prompt: negative.to_string(),
        }
    }

    /// The `-lora <name>` marker from the file stem, first match only.
    pub fn filename_tag(path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_string_lossy();
        FILENAME_LORA
            .captures(&stem)
            .map(|captures| captures[1].trim().to_string())
            .filter(|tag| !tag.is_empty())
    }

    /// Parameter text embedded in an encoded image, if any.
    pub fn read_embedded_parameters(data: &[u8]) -> Option<String> {
        Self::read_png_parameters(data)
            .or_else(|| Self::read_exif_user_comment(data))
            .map(|text| text.trim_matches(char::from(0)).trim().to_string())
            .filter(|text| !text.is_empty())
    }

    fn read_png_parameters(data: &[u8]) -> Option<String> {
        let png = Png::from_bytes(Bytes::copy_from_slice(data)).ok()?;

        png.chunks().iter().find_map(|chunk| {
            let contents = chunk.contents();
            match &chunk.kind() {
                b"tEXt" => decode_text_chunk(contents),
                b"zTXt" => decode_compressed_text_chunk(contents),
                b"iTXt" => decode_international_text_chunk(contents),
                _ => None,
            }
        })
    }

    fn read_exif_user_comment(data: &[u8]) -> Option<String> {
        let exif = exif::Reader::new()
            .read_from_container(&mut Cursor::new(data))
            .ok()?;
        let field = exif.get_field(exif::Tag::UserComment, exif::In::PRIMARY)?;
        match &field.value {
            exif::Value::Undefined(bytes, _) => decode_user_comment(bytes),
            exif::Value::Ascii(parts) => parts
                .first()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

/// `keyword \0 text` in Latin-1.
fn decode_text_chunk(contents: &[u8]) -> Option<String> {
    let (keyword, rest) = split_keyword(contents)?;
    if keyword != PARAMETERS_KEYWORD {
        return None;
    }
    Some(rest.iter().map(|&b| char::from(b)).collect())
}

/// `keyword \0 method zlib-data`
fn decode_compressed_text_chunk(contents: &[u8]) -> Option<String> {
    let (keyword, rest) = split_keyword(contents)?;
    if keyword != PARAMETERS_KEYWORD {
        return None;
    }
    let (_method, compressed) = rest.split_first()?;
    let inflated = inflate(compressed)?;
    Some(inflated.iter().map(|&b| char::from(b)).collect())
}

/// `keyword \0 flag method language \0 translated \0 text` with UTF-8 text.
fn decode_international_text_chunk(contents: &[u8]) -> Option<String> {
    let (keyword, rest) = split_keyword(contents)?;
    if keyword != PARAMETERS_KEYWORD || rest.len() < 2 {
        return None;
    }
    let compressed = rest[0] == 1;
    let rest = &rest[2..];
    let (_language, rest) = split_keyword(rest)?;
    let (_translated, text) = split_keyword(rest)?;

    if compressed {
        inflate(text).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Some(String::from_utf8_lossy(text).into_owned())
    }
}

fn split_keyword(contents: &[u8]) -> Option<(&[u8], &[u8])> {
    let idx = contents.iter().position(|&b| b == 0)?;
    Some((&contents[..idx], &contents[idx + 1..]))
}

fn inflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out).ok()?;
    Some(out)
}

/// EXIF `UserComment`: an 8-byte character code followed by the payload.
fn decode_user_comment(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 8 {
        return None;
    }
    let (code, payload) = bytes.split_at(8);

    match code {
        b"UNICODE\0" => Some(decode_utf16(payload)),
        b"ASCII\0\0\0" => Some(String::from_utf8_lossy(payload).into_owned()),
        _ => Some(String::from_utf8_lossy(payload).into_owned()),
    }
}

/// Generators disagree on byte order; a leading zero byte means big-endian
/// for the ASCII-heavy text they write.
fn decode_utf16(payload: &[u8]) -> String {
    let big_endian = payload.len() >= 2 && payload[0] == 0 && payload[1] != 0;
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
