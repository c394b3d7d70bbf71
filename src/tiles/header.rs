//! Common binary header and the feature/batch table layout

use byteorder::{ByteOrder, LittleEndian};
use serde_json::{Map, Value};
use std::ops::Range;
use tracing::trace;

use crate::issues::{child_path, IssueType, ValidationContext, ValidationIssue};

/// Length of the header shared by all formats (magic, version, byte length)
pub const COMMON_HEADER_LENGTH: usize = 12;

/// Length of the header up to and including the four table lengths
pub const TABLE_HEADER_LENGTH: usize = 28;

/// Values at or above this in the batch table length slots indicate a
/// header written before the four table lengths were introduced
///
/// The first byte of a JSON object (`{`) or of the `glTF` magic lands in the
/// most significant byte when such data is misread as a little-endian length.
pub const LEGACY_HEADER_THRESHOLD: u32 = 570_425_344;

const SUPPORTED_VERSION: u32 = 1;
const TABLE_ALIGNMENT: u64 = 8;

/// Read a little-endian u32 at `offset`; the caller checks the bounds
pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes.get(offset..offset + 4).map(LittleEndian::read_u32)
}

/// Validate the common header of binary tile content
///
/// Checks that the content holds at least `header_length` bytes, that the
/// magic is `expected_magic`, that the version is 1 and that the declared
/// byte length equals the content length. Every mismatch is reported.
///
/// # Arguments
///
/// * `path` - Path of the content, used for issues
/// * `content` - The complete tile content
/// * `header_length` - Length of the format's header
/// * `expected_magic` - The format's magic
/// * `context` - Receives the issues
pub fn validate_header(
    path: &str,
    content: &[u8],
    header_length: usize,
    expected_magic: &[u8; 4],
    context: &mut ValidationContext,
) -> bool {
    if content.len() < header_length {
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalidLength,
            path,
            format!(
                "Content must have a length of at least {} bytes for the header, but has only {} bytes",
                header_length,
                content.len()
            ),
        ));
        return false;
    }

    let mut valid = true;
    let magic = &content[0..4];
    if magic != expected_magic {
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalid,
            path,
            format!(
                "Content has invalid magic '{}', expected '{}'",
                String::from_utf8_lossy(magic),
                String::from_utf8_lossy(expected_magic)
            ),
        ));
        valid = false;
    }

    let version = LittleEndian::read_u32(&content[4..8]);
    if version != SUPPORTED_VERSION {
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalidValue,
            path,
            format!(
                "Content has version {}, but only version {} is supported",
                version, SUPPORTED_VERSION
            ),
        ));
        valid = false;
    }

    let byte_length = LittleEndian::read_u32(&content[8..12]) as u64;
    if byte_length != content.len() as u64 {
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalidLength,
            path,
            format!(
                "Content declares a byteLength of {}, but has a length of {} bytes",
                byte_length,
                content.len()
            ),
        ));
        valid = false;
    }
    valid
}

/// How the tables of a format are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayoutOptions {
    /// Length of the format's header
    pub header_length: usize,
    /// Whether the bytes after the batch table are an embedded payload
    pub has_embedded_payload: bool,
    /// Whether headers with the pre-1.0 table length fields are detected
    pub detect_legacy_header: bool,
}

impl TableLayoutOptions {
    /// Layout for a format with the given header length and no legacy check
    pub fn new(header_length: usize, has_embedded_payload: bool) -> Self {
        Self {
            header_length,
            has_embedded_payload,
            detect_legacy_header: false,
        }
    }

    /// Enable detection of legacy headers
    pub fn with_legacy_header_detection(mut self) -> Self {
        self.detect_legacy_header = true;
        self
    }
}

/// Byte ranges of the tables, relative to the start of the content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    /// Feature table JSON
    pub feature_table_json: Range<usize>,
    /// Feature table binary
    pub feature_table_binary: Range<usize>,
    /// Batch table JSON
    pub batch_table_json: Range<usize>,
    /// Batch table binary
    pub batch_table_binary: Range<usize>,
    /// Trailing payload, empty for formats without one
    pub payload: Range<usize>,
}

/// The tables of binary tile content
#[derive(Debug, Clone)]
pub struct BinaryTableData<'a> {
    /// Where each table is located
    pub layout: TableLayout,
    /// Parsed feature table JSON (empty if the JSON has length zero)
    pub feature_table_json: Map<String, Value>,
    /// Feature table binary
    pub feature_table_binary: &'a [u8],
    /// Parsed batch table JSON, `None` if the tile has no batch table
    pub batch_table_json: Option<Map<String, Value>>,
    /// Batch table binary
    pub batch_table_binary: &'a [u8],
    /// The payload following the batch table
    pub payload: &'a [u8],
}

/// Split content into its feature table, batch table and payload
///
/// The content must have passed [`validate_header`]. The declared byte length
/// must be a multiple of 8, every table that follows the header must start at
/// a multiple of 8 and the tables must fit into the declared byte length.
/// Structural violations are reported and yield `None`; so does JSON that
/// cannot be parsed into an object.
pub fn extract_binary_table_data<'a>(
    path: &str,
    content: &'a [u8],
    options: &TableLayoutOptions,
    context: &mut ValidationContext,
) -> Option<BinaryTableData<'a>> {
    let header_length = options.header_length;
    let (Some(byte_length), Some(ft_json_length), Some(ft_binary_length)) = (
        read_u32(content, 8),
        read_u32(content, 12),
        read_u32(content, 16),
    ) else {
        context.add_issue(truncated_header(path, content.len()));
        return None;
    };
    let (Some(bt_json_length), Some(bt_binary_length)) =
        (read_u32(content, 20), read_u32(content, 24))
    else {
        context.add_issue(truncated_header(path, content.len()));
        return None;
    };

    let mut valid = true;
    if byte_length as u64 % TABLE_ALIGNMENT != 0 {
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalidAlignment,
            path,
            format!(
                "The byteLength of the content must be a multiple of {}, but is {}",
                TABLE_ALIGNMENT, byte_length
            ),
        ));
        valid = false;
    }

    if options.detect_legacy_header {
        if bt_json_length >= LEGACY_HEADER_THRESHOLD {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryLegacyHeader,
                path,
                format!(
                    "Header is using the legacy format [batchLength] [batchTableByteLength]. \
                     The batch table JSON byte length {} is not plausible. \
                     The new format is [featureTableJsonByteLength] [featureTableBinaryByteLength] \
                     [batchTableJsonByteLength] [batchTableBinaryByteLength].",
                    bt_json_length
                ),
            ));
            valid = false;
        } else if bt_binary_length >= LEGACY_HEADER_THRESHOLD {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryLegacyHeader,
                path,
                format!(
                    "Header is using the legacy format [batchTableJsonByteLength] \
                     [batchTableBinaryByteLength] [batchLength]. \
                     The batch table binary byte length {} is not plausible. \
                     The new format is [featureTableJsonByteLength] [featureTableBinaryByteLength] \
                     [batchTableJsonByteLength] [batchTableBinaryByteLength].",
                    bt_binary_length
                ),
            ));
            valid = false;
        }
    }
    if !valid {
        return None;
    }

    let byte_length = byte_length as u64;
    let ft_json_offset = header_length as u64;
    let ft_binary_offset = ft_json_offset + ft_json_length as u64;
    let bt_json_offset = ft_binary_offset + ft_binary_length as u64;
    let bt_binary_offset = bt_json_offset + bt_json_length as u64;
    let payload_offset = bt_binary_offset + bt_binary_length as u64;
    let payload_length = if options.has_embedded_payload {
        byte_length.saturating_sub(payload_offset)
    } else {
        0
    };
    trace!(
        path,
        ft_json_offset,
        ft_binary_offset,
        bt_json_offset,
        bt_binary_offset,
        payload_offset,
        payload_length,
        "table layout"
    );

    let mut aligned_offsets = vec![
        ("feature table binary", ft_binary_offset),
        ("batch table JSON", bt_json_offset),
        ("batch table binary", bt_binary_offset),
    ];
    if options.has_embedded_payload {
        aligned_offsets.push(("payload", payload_offset));
    }
    for (name, offset) in aligned_offsets {
        if offset % TABLE_ALIGNMENT != 0 {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalidAlignment,
                path,
                format!(
                    "The {} must be aligned to an {}-byte boundary, but starts at byte offset {}",
                    name, TABLE_ALIGNMENT, offset
                ),
            ));
            valid = false;
        }
    }

    let total_length = payload_offset + payload_length;
    if total_length > byte_length {
        context.add_issue(ValidationIssue::new(
            IssueType::BinaryInvalidLength,
            path,
            format!(
                "Feature table, batch table, and payload byte lengths exceed the tile's byte length: \
                 {} (header) + {} + {} + {} + {} + {} (payload) = {} > {}",
                header_length,
                ft_json_length,
                ft_binary_length,
                bt_json_length,
                bt_binary_length,
                payload_length,
                total_length,
                byte_length
            ),
        ));
        valid = false;
    }
    if !valid {
        return None;
    }

    // Every offset is now bounded by byte_length, which equals content.len()
    let range = |start: u64, end: u64| start as usize..end as usize;
    let layout = TableLayout {
        feature_table_json: range(ft_json_offset, ft_binary_offset),
        feature_table_binary: range(ft_binary_offset, bt_json_offset),
        batch_table_json: range(bt_json_offset, bt_binary_offset),
        batch_table_binary: range(bt_binary_offset, payload_offset),
        payload: range(payload_offset, payload_offset + payload_length),
    };
    if layout.payload.end > content.len() {
        context.add_issue(truncated_header(path, content.len()));
        return None;
    }

    let feature_table_json = parse_table_json(
        &child_path(path, "featureTable"),
        "Feature table",
        &content[layout.feature_table_json.clone()],
        context,
    )?;
    let batch_table_json = if layout.batch_table_json.is_empty() {
        None
    } else {
        Some(parse_table_json(
            &child_path(path, "batchTable"),
            "Batch table",
            &content[layout.batch_table_json.clone()],
            context,
        )?)
    };

    Some(BinaryTableData {
        feature_table_json,
        feature_table_binary: &content[layout.feature_table_binary.clone()],
        batch_table_json,
        batch_table_binary: &content[layout.batch_table_binary.clone()],
        payload: &content[layout.payload.clone()],
        layout,
    })
}

fn truncated_header(path: &str, length: usize) -> ValidationIssue {
    ValidationIssue::new(
        IssueType::BinaryInvalidLength,
        path,
        format!(
            "Content with a length of {} bytes is too short for the table layout",
            length
        ),
    )
}

fn parse_table_json(
    path: &str,
    name: &str,
    bytes: &[u8],
    context: &mut ValidationContext,
) -> Option<Map<String, Value>> {
    if bytes.is_empty() {
        return Some(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            context.add_issue(ValidationIssue::new(
                IssueType::JsonParseError,
                path,
                format!("{} JSON must be an object", name),
            ));
            None
        }
        Err(e) => {
            context.add_issue(ValidationIssue::new(
                IssueType::JsonParseError,
                path,
                format!("{} JSON could not be parsed: {}", name, e),
            ));
            None
        }
    }
}
