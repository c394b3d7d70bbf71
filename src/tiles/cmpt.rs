//! Composite tiles

use tracing::{debug, trace};

use super::header::{read_u32, validate_header, COMMON_HEADER_LENGTH};
use super::{validate_format, TileContentValidator, TileFormat};
use crate::issues::{IssueType, ValidationContext, ValidationIssue};

/// Header length of composites
pub const CMPT_HEADER_LENGTH: usize = 16;

const TILES_LENGTH_OFFSET: usize = 12;
const INNER_TILE_ALIGNMENT: usize = 8;

/// Validator for composite tiles (`cmpt`)
///
/// Inner tiles are validated in their stored order, each with the validator
/// for its magic. A failing inner tile does not stop the walk. Inner tiles
/// that are misaligned or do not fit into the composite abort it, since the
/// position of the following tiles is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmptValidator;

impl TileContentValidator for CmptValidator {
    fn format(&self) -> TileFormat {
        TileFormat::Composite
    }

    fn validate(&self, path: &str, content: &[u8], context: &mut ValidationContext) -> bool {
        debug!(path, length = content.len(), "validating composite");
        if !validate_header(path, content, CMPT_HEADER_LENGTH, self.format().magic(), context) {
            return false;
        }
        let byte_length = content.len();
        let tiles_length = read_u32(content, TILES_LENGTH_OFFSET).unwrap_or(0);

        let mut valid = true;
        let mut byte_offset = CMPT_HEADER_LENGTH;
        for index in 0..tiles_length {
            let inner_path = format!("{}/[{}]", path, index);
            if byte_offset + COMMON_HEADER_LENGTH > byte_length {
                context.add_issue(ValidationIssue::new(
                    IssueType::BinaryInvalidLength,
                    path,
                    format!(
                        "Cannot read the header of inner tile {} of {} at byte offset {}: \
                         the composite has a byteLength of {}",
                        index, tiles_length, byte_offset, byte_length
                    ),
                ));
                return false;
            }
            if byte_offset % INNER_TILE_ALIGNMENT != 0 {
                context.add_issue(ValidationIssue::new(
                    IssueType::BinaryInvalidAlignment,
                    path,
                    format!(
                        "Inner tile {} must be aligned to an {}-byte boundary, but starts at byte offset {}",
                        index, INNER_TILE_ALIGNMENT, byte_offset
                    ),
                ));
                return false;
            }

            let inner_length = read_u32(content, byte_offset + 8).unwrap_or(0) as usize;
            if inner_length < COMMON_HEADER_LENGTH
                || inner_length > byte_length - byte_offset
            {
                context.add_issue(ValidationIssue::new(
                    IssueType::BinaryInvalidLength,
                    path,
                    format!(
                        "Inner tile {} at byte offset {} declares a byteLength of {}, \
                         but only {} bytes of the composite remain",
                        index,
                        byte_offset,
                        inner_length,
                        byte_length - byte_offset
                    ),
                ));
                return false;
            }

            let inner = &content[byte_offset..byte_offset + inner_length];
            trace!(path, index, byte_offset, inner_length, "inner tile");
            let inner_valid = match TileFormat::from_magic(inner) {
                Some(format) => {
                    debug!(path = inner_path.as_str(), %format, "dispatching inner tile");
                    validate_format(format, &inner_path, inner, context)
                }
                None => {
                    context.add_issue(ValidationIssue::new(
                        IssueType::BinaryInvalid,
                        &inner_path,
                        format!(
                            "Inner tile {} has invalid magic '{}'",
                            index,
                            String::from_utf8_lossy(&inner[0..4])
                        ),
                    ));
                    false
                }
            };
            valid &= inner_valid;
            byte_offset += inner_length;
        }
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};

    fn composite(inner: &[Vec<u8>]) -> Vec<u8> {
        let total = CMPT_HEADER_LENGTH + inner.iter().map(Vec::len).sum::<usize>();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"cmpt");
        for value in [1, total, inner.len()] {
            bytes.write_u32::<LittleEndian>(value as u32).unwrap();
        }
        for tile in inner {
            bytes.extend_from_slice(tile);
        }
        bytes
    }

    fn unknown_tile() -> Vec<u8> {
        let mut bytes = b"xxxx".to_vec();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(16).unwrap();
        bytes.resize(16, 0);
        bytes
    }

    #[test]
    fn test_empty_composite() {
        let content = composite(&[]);
        let mut context = ValidationContext::default();
        assert!(CmptValidator.validate("c.cmpt", &content, &mut context));
    }

    #[test]
    fn test_unknown_inner_tiles_do_not_stop_the_walk() {
        let content = composite(&[unknown_tile(), unknown_tile()]);
        let mut context = ValidationContext::default();
        assert!(!CmptValidator.validate("c.cmpt", &content, &mut context));
        let paths: Vec<_> = context.issues().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["c.cmpt/[0]", "c.cmpt/[1]"]);
    }

    #[test]
    fn test_nested_composite() {
        let inner = composite(&[unknown_tile()]);
        let content = composite(&[inner]);
        let mut context = ValidationContext::default();
        assert!(!CmptValidator.validate("c.cmpt", &content, &mut context));
        assert_eq!(context.issues().len(), 1);
        assert_eq!(context.issues()[0].path, "c.cmpt/[0]/[0]");
    }

    #[test]
    fn test_truncated_inner_tile_aborts() {
        let mut content = composite(&[unknown_tile(), unknown_tile()]);
        content[CMPT_HEADER_LENGTH + 8..CMPT_HEADER_LENGTH + 12]
            .copy_from_slice(&64u32.to_le_bytes());
        let mut context = ValidationContext::default();
        assert!(!CmptValidator.validate("c.cmpt", &content, &mut context));
        assert_eq!(context.issues().len(), 1);
        assert_eq!(context.issues()[0].issue_type, IssueType::BinaryInvalidLength);
    }

    #[test]
    fn test_tile_count_beyond_content_aborts() {
        let mut content = composite(&[unknown_tile()]);
        content[12..16].copy_from_slice(&3u32.to_le_bytes());
        let mut context = ValidationContext::default();
        assert!(!CmptValidator.validate("c.cmpt", &content, &mut context));
        let types: Vec<_> = context.issues().iter().map(|i| i.issue_type).collect();
        assert_eq!(types, vec![IssueType::BinaryInvalid, IssueType::BinaryInvalidLength]);
    }

    #[test]
    fn test_misaligned_inner_tile_aborts() {
        let mut odd = unknown_tile();
        odd.truncate(12);
        odd[8..12].copy_from_slice(&12u32.to_le_bytes());
        let content = composite(&[odd, unknown_tile()]);
        let mut context = ValidationContext::default();
        assert!(!CmptValidator.validate("c.cmpt", &content, &mut context));
        assert_eq!(context.issues().last().unwrap().issue_type, IssueType::BinaryInvalidAlignment);
    }
}
