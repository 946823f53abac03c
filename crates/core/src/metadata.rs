//! Structural metadata read locally from the file itself, before any
//! external parsing service is involved.

use crate::{error::MetadataError, Metadata};
use chrono::{DateTime, Utc};
use exif::{Exif, In, Tag, Value as ExifValue};
use image::{ColorType, ImageReader};
use lopdf::{Dictionary, Document, Object};
use quick_xml::{events::Event, Reader};
use regex::Regex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};
use zip::{result::ZipError, ZipArchive};

/// First-page text shorter than this marks a PDF as a likely scan.
pub const SCANNED_FIRST_PAGE_CHARS: usize = 100;

const STATUS_KEYWORDS: [&str; 6] = ["final", "draft", "entwurf", "vorlage", "template", "korrektur"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatReader {
    Pdf,
    Image,
    Office,
    /// Pre-2007 .doc/.xls/.ppt compound files.
    LegacyOffice,
}

impl FormatReader {
    pub fn for_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(FormatReader::Pdf),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" => Some(FormatReader::Image),
            "docx" | "xlsx" | "pptx" => Some(FormatReader::Office),
            "doc" | "xls" | "ppt" => Some(FormatReader::LegacyOffice),
            _ => None,
        }
    }

    pub fn error_field(self) -> &'static str {
        match self {
            FormatReader::Pdf => "pdf_error",
            FormatReader::Image => "image_error",
            FormatReader::Office | FormatReader::LegacyOffice => "office_error",
        }
    }

    pub fn read(self, path: &Path) -> Result<Metadata, MetadataError> {
        match self {
            FormatReader::Pdf => read_pdf(path),
            FormatReader::Image => read_image(path),
            FormatReader::Office => read_office(path),
            FormatReader::LegacyOffice => read_ole(path),
        }
    }
}

/// Extracted fields plus the reader error, if the format reader failed.
/// A failed reader still leaves the file-level and filename fields in place.
#[derive(Debug, Default)]
pub struct StructuralMetadata {
    pub metadata: Metadata,
    pub failure: Option<MetadataError>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn extract(&self, path: &Path) -> StructuralMetadata {
        let mut out = StructuralMetadata::default();
        let metadata = &mut out.metadata;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = dotted_extension(path);

        metadata.insert("file_name".into(), json!(file_name));
        metadata.insert("file_extension".into(), json!(extension));
        metadata.insert(
            "mime_type".into(),
            mime_guess::from_path(path)
                .first()
                .map(|mime| json!(mime.to_string()))
                .unwrap_or(Value::Null),
        );

        match fs::metadata(path) {
            Ok(stat) => {
                metadata.insert("file_size".into(), json!(stat.len()));
                if let Ok(created) = stat.created() {
                    metadata.insert("created_date".into(), json!(DateTime::<Utc>::from(created).to_rfc3339()));
                }
                if let Ok(modified) = stat.modified() {
                    metadata.insert("modified_date".into(), json!(DateTime::<Utc>::from(modified).to_rfc3339()));
                }
            }
            Err(error) => {
                metadata.insert("extraction_error".into(), json!(error.to_string()));
                out.failure = Some(MetadataError::Io(error));
            }
        }

        if out.failure.is_none() {
            if let Some(reader) = FormatReader::for_extension(&extension) {
                match reader.read(path) {
                    Ok(fields) => metadata.extend(fields),
                    Err(error) => {
                        warn!(path = %path.display(), error = %error, "structural metadata reader failed");
                        let message = json!(error.to_string());
                        metadata.insert(reader.error_field().into(), message.clone());
                        metadata.insert("extraction_error".into(), message);
                        out.failure = Some(error);
                    }
                }
            }
        }

        metadata.extend(analyze_filename(&file_name));
        out
    }
}

/// Lowercase extension with its leading dot, or an empty string.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

fn read_pdf(path: &Path) -> Result<Metadata, MetadataError> {
    let document = Document::load(path).map_err(|error| MetadataError::Pdf(error.to_string()))?;
    let pages = document.get_pages();

    let mut metadata = Metadata::new();
    metadata.insert("page_count".into(), json!(pages.len()));
    metadata.insert(
        "pdf_encrypted".into(),
        json!(document.trailer.get(b"Encrypt").is_ok()),
    );

    if let Some(info) = info_dictionary(&document) {
        let text_fields: [(&[u8], &str); 6] = [
            (b"Title", "pdf_title"),
            (b"Author", "pdf_author"),
            (b"Subject", "pdf_subject"),
            (b"Creator", "pdf_creator"),
            (b"Producer", "pdf_producer"),
            (b"Keywords", "pdf_keywords"),
        ];
        for (key, field) in text_fields {
            if let Some(value) = info_string(info, key) {
                metadata.insert(field.into(), json!(value));
            }
        }
        let date_fields: [(&[u8], &str); 2] = [
            (b"CreationDate", "pdf_creation_date"),
            (b"ModDate", "pdf_modification_date"),
        ];
        for (key, field) in date_fields {
            if let Some(value) = info_string(info, key) {
                metadata.insert(field.into(), json!(parse_pdf_date(&value)));
            }
        }
    }

    if let Some(first_page) = pages.keys().next().copied() {
        let text = document
            .extract_text(&[first_page])
            .map_err(|error| MetadataError::Pdf(error.to_string()))?;
        metadata.insert("first_page_text_length".into(), json!(text.chars().count()));
        metadata.insert(
            "is_likely_scanned".into(),
            json!(text.trim().chars().count() < SCANNED_FIRST_PAGE_CHARS),
        );
    }

    Ok(metadata)
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_object(*id).and_then(Object::as_dict).ok(),
        Object::Dictionary(dictionary) => Some(dictionary),
        _ => None,
    }
}

fn info_string(info: &Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key).ok()? {
        Object::String(bytes, _) => {
            let value = decode_pdf_string(bytes);
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }
        _ => None,
    }
}

/// UTF-16BE when the string carries a byte-order mark, else UTF-8 or Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&byte| byte as char).collect(),
    }
}

/// `D:YYYYMMDDHHmmSS...` to `YYYY-MM-DD HH:mm:SS`; missing time parts become `00`.
pub fn parse_pdf_date(raw: &str) -> String {
    let value = raw.strip_prefix("D:").unwrap_or(raw);
    let (Some(year), Some(month), Some(day)) = (value.get(0..4), value.get(4..6), value.get(6..8)) else {
        return raw.to_string();
    };
    let hour = value.get(8..10).unwrap_or("00");
    let minute = value.get(10..12).unwrap_or("00");
    let second = value.get(12..14).unwrap_or("00");
    format!("{year}-{month}-{day} {hour}:{minute}:{second}")
}

fn read_image(path: &Path) -> Result<Metadata, MetadataError> {
    let bytes = fs::read(path)?;
    let reader = ImageReader::new(Cursor::new(&bytes)).with_guessed_format()?;
    let format = reader.format();
    let image = reader.decode()?;

    let (width, height) = (image.width(), image.height());
    let megapixels = round2(f64::from(width) * f64::from(height) / 1_000_000.0);

    let mut metadata = Metadata::new();
    metadata.insert("image_width".into(), json!(width));
    metadata.insert("image_height".into(), json!(height));
    metadata.insert(
        "image_format".into(),
        format
            .map(|format| json!(format!("{format:?}").to_uppercase()))
            .unwrap_or(Value::Null),
    );
    metadata.insert("image_mode".into(), json!(color_mode(image.color())));
    metadata.insert("image_megapixels".into(), json!(megapixels));

    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(&bytes)) {
        Ok(exif) => Some(exif),
        Err(error) => {
            debug!(path = %path.display(), %error, "no exif data");
            None
        }
    };
    if let Some(exif) = &exif {
        metadata.extend(exif_fields(exif));
    }

    let dpi = jfif_density(&bytes)
        .or_else(|| png_density(&bytes))
        .or_else(|| exif.as_ref().and_then(exif_density));
    if let Some((x, y)) = dpi {
        metadata.insert("image_dpi".into(), json!([x, y]));
    }
    Ok(metadata)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

const EXIF_TEXT_FIELDS: [(Tag, &str); 8] = [
    (Tag::DateTime, "exif_datetime"),
    (Tag::Make, "camera_make"),
    (Tag::Model, "camera_model"),
    (Tag::Software, "software"),
    (Tag::Artist, "artist"),
    (Tag::Copyright, "copyright"),
    (Tag::ImageDescription, "image_description"),
    (Tag::DateTimeOriginal, "photo_taken_date"),
];

fn exif_fields(exif: &Exif) -> Metadata {
    let mut metadata = Metadata::new();
    for (tag, field) in EXIF_TEXT_FIELDS {
        if let Some(value) = exif_text(exif, tag) {
            metadata.insert(field.into(), json!(value));
        }
    }
    let has_latitude = exif.get_field(Tag::GPSLatitude, In::PRIMARY).is_some();
    let has_longitude = exif.get_field(Tag::GPSLongitude, In::PRIMARY).is_some();
    if has_latitude && has_longitude {
        metadata.insert("has_gps".into(), json!(true));
    }
    metadata
}

fn exif_text(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let text = match &field.value {
        ExifValue::Ascii(parts) => String::from_utf8_lossy(parts.first()?).to_string(),
        _ => field.display_value().to_string(),
    };
    let text = text.trim_end_matches('\0').trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn exif_density(exif: &Exif) -> Option<(f64, f64)> {
    let resolution = |tag: Tag| match &exif.get_field(tag, In::PRIMARY)?.value {
        ExifValue::Rational(values) => values.first().map(|value| value.to_f64()),
        _ => None,
    };
    let (x, y) = (resolution(Tag::XResolution)?, resolution(Tag::YResolution)?);
    // 2 = inch (the default), 3 = centimeter
    let unit = exif
        .get_field(Tag::ResolutionUnit, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(2);
    match unit {
        2 => Some((round2(x), round2(y))),
        3 => Some((round2(x * 2.54), round2(y * 2.54))),
        _ => None,
    }
}

fn be_u16(bytes: &[u8]) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(0..2)?.try_into().ok()?))
}

fn be_u32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(0..4)?.try_into().ok()?))
}

/// Density from the JFIF APP0 segment of a JPEG.
fn jfif_density(bytes: &[u8]) -> Option<(f64, f64)> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut offset = 2;
    loop {
        let marker = bytes.get(offset..offset + 2)?;
        // 0xDA starts the scan; no headers follow
        if marker[0] != 0xFF || marker[1] == 0xDA {
            return None;
        }
        let length = usize::from(be_u16(bytes.get(offset + 2..)?)?);
        let data = bytes.get(offset + 4..offset + 2 + length)?;
        if marker[1] == 0xE0 && data.starts_with(b"JFIF\0") && data.len() >= 12 {
            let x = f64::from(be_u16(&data[8..])?);
            let y = f64::from(be_u16(&data[10..])?);
            return match data[7] {
                1 => Some((x, y)),
                2 => Some((round2(x * 2.54), round2(y * 2.54))),
                _ => None,
            };
        }
        offset += 2 + length;
    }
}

/// Density from the pHYs chunk of a PNG, in pixels per inch.
fn png_density(bytes: &[u8]) -> Option<(f64, f64)> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    if !bytes.starts_with(&SIGNATURE) {
        return None;
    }
    let mut offset = SIGNATURE.len();
    loop {
        let length = usize::try_from(be_u32(bytes.get(offset..)?)?).ok()?;
        let kind = bytes.get(offset + 4..offset + 8)?;
        if kind == b"IDAT" {
            return None;
        }
        let data = bytes.get(offset + 8..offset + 8 + length)?;
        if kind == b"pHYs" && data.len() >= 9 {
            // unit 1 = meter
            if data[8] != 1 {
                return None;
            }
            let x = f64::from(be_u32(data)?);
            let y = f64::from(be_u32(&data[4..])?);
            return Some((round2(x * 0.0254), round2(y * 0.0254)));
        }
        // chunk header, data and crc
        offset += 12 + length;
    }
}

fn color_mode(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L".to_string(),
        ColorType::La8 => "LA".to_string(),
        ColorType::Rgb8 => "RGB".to_string(),
        ColorType::Rgba8 => "RGBA".to_string(),
        ColorType::L16 => "I;16".to_string(),
        other => format!("{other:?}"),
    }
}

fn read_office(path: &Path) -> Result<Metadata, MetadataError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file).map_err(office_error)?;
    let mut metadata = Metadata::new();

    if let Some(core) = read_entry(&mut archive, "docProps/core.xml")? {
        let fields = [
            ("title", "office_title"),
            ("creator", "office_author"),
            ("subject", "office_subject"),
            ("keywords", "office_keywords"),
        ];
        for (element, value) in xml_leaf_texts(&core)? {
            if let Some((_, field)) = fields.iter().find(|(name, _)| *name == element) {
                metadata.insert((*field).into(), json!(value));
            }
        }
    }

    if let Some(app) = read_entry(&mut archive, "docProps/app.xml")? {
        for (element, value) in xml_leaf_texts(&app)? {
            let field = match element.as_str() {
                "Pages" => "page_count",
                "Words" => "word_count",
                _ => continue,
            };
            if let Ok(count) = value.parse::<u64>() {
                metadata.insert(field.into(), json!(count));
            }
        }
    }

    Ok(metadata)
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<String>, MetadataError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(error) => return Err(office_error(error)),
    };
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// `(local element name, text)` for every element that directly holds text.
fn xml_leaf_texts(xml: &str) -> Result<Vec<(String, String)>, MetadataError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<String> = None;
    let mut out = Vec::new();
    loop {
        match reader.read_event().map_err(office_error)? {
            Event::Start(start) => {
                current = Some(String::from_utf8_lossy(start.local_name().as_ref()).to_string());
            }
            Event::Text(text) => {
                if let Some(name) = &current {
                    let value = text.unescape().map_err(office_error)?;
                    out.push((name.clone(), value.to_string()));
                }
            }
            Event::End(_) => current = None,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const SUMMARY_STREAM: &str = "\u{5}SummaryInformation";

/// Summary information property ids.
const SUMMARY_FIELDS: [(u32, &str); 10] = [
    (2, "office_title"),
    (3, "office_subject"),
    (4, "office_author"),
    (5, "office_keywords"),
    (6, "office_comments"),
    (8, "office_last_author"),
    (9, "office_revision"),
    (12, "office_created"),
    (13, "office_modified"),
    (18, "office_application"),
];

const VT_I2: u16 = 0x0002;
const VT_I4: u16 = 0x0003;
const VT_LPSTR: u16 = 0x001E;
const VT_LPWSTR: u16 = 0x001F;
const VT_FILETIME: u16 = 0x0040;

/// Seconds between 1601-01-01 and the unix epoch.
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;

fn read_ole(path: &Path) -> Result<Metadata, MetadataError> {
    let mut signature = [0u8; 8];
    let is_ole = File::open(path)?.read_exact(&mut signature).is_ok() && signature == OLE_SIGNATURE;
    if !is_ole {
        debug!(path = %path.display(), "not an ole compound file");
        return Ok(Metadata::new());
    }

    let mut compound = cfb::open(path)?;
    if !compound.is_stream(SUMMARY_STREAM) {
        return Ok(Metadata::new());
    }
    let mut bytes = Vec::new();
    compound.open_stream(SUMMARY_STREAM)?.read_to_end(&mut bytes)?;

    let properties =
        summary_properties(&bytes).ok_or_else(|| office_error("malformed summary information stream"))?;
    let mut metadata = Metadata::new();
    for (id, field) in SUMMARY_FIELDS {
        if let Some(value) = properties.get(&id).filter(|value| !value.is_empty()) {
            metadata.insert(field.into(), json!(value));
        }
    }
    Ok(metadata)
}

fn le_u16(bytes: &[u8]) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(0..2)?.try_into().ok()?))
}

fn le_u32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(0..4)?.try_into().ok()?))
}

fn le_u64(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(bytes.get(0..8)?.try_into().ok()?))
}

/// Property id to rendered value for the first property set of the stream.
fn summary_properties(stream: &[u8]) -> Option<BTreeMap<u32, String>> {
    let set = usize::try_from(le_u32(stream.get(44..)?)?).ok()?;
    let count = usize::try_from(le_u32(stream.get(set + 4..)?)?).ok()?;

    let mut entries = Vec::new();
    for index in 0..count {
        let entry = stream.get(set + 8 + index * 8..)?;
        let offset = usize::try_from(le_u32(entry.get(4..)?)?).ok()?;
        entries.push((le_u32(entry)?, set + offset));
    }

    // property 1 holds the code page of the 8-bit strings
    let codepage = entries
        .iter()
        .find(|(id, _)| *id == 1)
        .and_then(|(_, offset)| stream.get(*offset..))
        .filter(|value| le_u16(value) == Some(VT_I2))
        .and_then(|value| le_u16(value.get(4..)?))
        .unwrap_or(1252);

    let mut properties = BTreeMap::new();
    for (id, offset) in entries {
        if let Some(value) = stream.get(offset..).and_then(|value| property_value(value, codepage)) {
            properties.insert(id, value);
        }
    }
    Some(properties)
}

fn property_value(value: &[u8], codepage: u16) -> Option<String> {
    let body = value.get(4..)?;
    let rendered = match le_u16(value)? {
        VT_I2 => (le_u16(body)? as i16).to_string(),
        VT_I4 => (le_u32(body)? as i32).to_string(),
        VT_LPSTR => {
            let length = usize::try_from(le_u32(body)?).ok()?;
            decode_code_page(body.get(4..4 + length)?, codepage)
        }
        VT_LPWSTR => {
            let length = usize::try_from(le_u32(body)?).ok()?;
            utf16_le(body.get(4..4 + length * 2)?)
        }
        VT_FILETIME => filetime(le_u64(body)?)?,
        _ => return None,
    };
    Some(rendered.trim_end_matches('\0').trim().to_string())
}

fn decode_code_page(bytes: &[u8], codepage: u16) -> String {
    match codepage {
        65001 => String::from_utf8_lossy(bytes).to_string(),
        1200 => utf16_le(bytes),
        // latin-1 covers the printable range of 1252
        _ => bytes.iter().map(|&byte| char::from(byte)).collect(),
    }
}

fn utf16_le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn filetime(ticks: u64) -> Option<String> {
    if ticks == 0 {
        return None;
    }
    let seconds = i64::try_from(ticks / 10_000_000).ok()? - FILETIME_EPOCH_OFFSET;
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|date| date.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn office_error(error: impl ToString) -> MetadataError {
    MetadataError::Office(error.to_string())
}

struct FilenamePatterns {
    dates: [Regex; 3],
    version: Regex,
    language: Regex,
}

impl FilenamePatterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            dates: [
                Regex::new(r"(\d{4})-(\d{2})-(\d{2})")?,
                Regex::new(r"(\d{2})\.(\d{2})\.(\d{4})")?,
                Regex::new(r"(\d{8})")?,
            ],
            version: Regex::new(r"(?i)v(\d+)")?,
            language: Regex::new(r"(?i)[_-](DE|EN|FR|ES|IT)[_.-]")?,
        })
    }

    fn get() -> Option<&'static Self> {
        static PATTERNS: OnceLock<Option<FilenamePatterns>> = OnceLock::new();
        PATTERNS.get_or_init(|| Self::compile().ok()).as_ref()
    }
}

/// Date, version, status keyword and language tag hints embedded in a file name.
pub fn analyze_filename(file_name: &str) -> Metadata {
    let mut metadata = Metadata::new();
    let Some(patterns) = FilenamePatterns::get() else {
        return metadata;
    };

    if let Some(found) = patterns.dates.iter().find_map(|pattern| pattern.find(file_name)) {
        metadata.insert("filename_contains_date".into(), json!(true));
        metadata.insert("filename_date".into(), json!(found.as_str()));
    }

    if let Some(version) = patterns.version.captures(file_name).and_then(|caps| caps.get(1)) {
        metadata.insert("filename_version".into(), json!(version.as_str()));
    }

    let lowered = file_name.to_lowercase();
    if let Some(status) = STATUS_KEYWORDS.iter().find(|keyword| lowered.contains(*keyword)) {
        metadata.insert("filename_status".into(), json!(status));
    }

    if let Some(language) = patterns.language.captures(file_name).and_then(|caps| caps.get(1)) {
        metadata.insert("filename_language".into(), json!(language.as_str().to_uppercase()));
    }

    metadata
}

/// Stop-word vote between German and English; `None` on a tie.
pub fn detect_language(text: &str) -> Option<&'static str> {
    const GERMAN: [&str; 10] = ["der", "die", "das", "und", "ist", "von", "zu", "den", "mit", "für"];
    const ENGLISH: [&str; 10] = ["the", "and", "is", "of", "to", "in", "for", "with", "on", "that"];

    let lowered = text.to_lowercase();
    let words: std::collections::HashSet<&str> = lowered.split_whitespace().collect();
    let german = GERMAN.iter().filter(|word| words.contains(*word)).count();
    let english = ENGLISH.iter().filter(|word| words.contains(*word)).count();

    match german.cmp(&english) {
        std::cmp::Ordering::Greater => Some("de"),
        std::cmp::Ordering::Less => Some("en"),
        std::cmp::Ordering::Equal => None,
    }
}

/// Size and shape counts of a text. Lines split on `\n`, paragraphs on
/// blank lines; word lengths count characters.
pub fn text_statistics(text: &str) -> Value {
    let words: Vec<&str> = text.split_whitespace().collect();
    let characters = text.chars().count();
    let average_word_length = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|word| word.chars().count()).sum::<usize>() as f64 / words.len() as f64
    };

    json!({
        "text_length": characters,
        "word_count": words.len(),
        "line_count": text.split('\n').count(),
        "character_count": characters,
        "paragraph_count": text.split("\n\n").filter(|paragraph| !paragraph.trim().is_empty()).count(),
        "average_word_length": average_word_length,
    })
}
