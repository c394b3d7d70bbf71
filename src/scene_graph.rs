//! Validation of glTF payloads embedded in or referenced by tile content
//!
//! Full glTF validation is the job of a dedicated validator, plugged in via
//! the [`SceneGraphValidator`] trait. The default [`GlbContainerValidator`]
//! only checks the binary glTF container layout.
//!
//! Payloads are always validated in a derived context; whatever the scene
//! graph validator reports ends up as the causes of a single issue on the
//! tile content.

use byteorder::{ByteOrder, LittleEndian};

use crate::issues::{IssueType, Severity, ValidationContext, ValidationIssue};

/// Magic of a binary glTF, `glTF` read as little-endian u32
pub const GLB_MAGIC: u32 = 0x4654_6C67;
/// The only supported binary glTF version
pub const GLB_VERSION: u32 = 2;
/// Chunk type of the JSON chunk, `JSON`
pub const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;
/// Chunk type of the binary chunk, `BIN\0`
pub const GLB_CHUNK_BIN: u32 = 0x004E_4942;
/// Length of the binary glTF header
pub const GLB_HEADER_LENGTH: usize = 12;
const GLB_CHUNK_HEADER_LENGTH: usize = 8;

/// Validator for glTF payloads
pub trait SceneGraphValidator: Send + Sync {
    /// Validate a binary glTF, adding issues to `context`
    ///
    /// Returns `true` if the payload is valid.
    fn validate(&self, path: &str, glb: &[u8], context: &mut ValidationContext) -> bool;
}

/// Accepts every payload
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSceneGraphValidator;

impl SceneGraphValidator for NoopSceneGraphValidator {
    fn validate(&self, _path: &str, _glb: &[u8], _context: &mut ValidationContext) -> bool {
        true
    }
}

/// Checks the container structure of a binary glTF 2.0 asset
///
/// Verifies the header, that the chunks tile the declared length, that the
/// first chunk is a JSON chunk that parses as a JSON object, and that at
/// most one binary chunk follows. The glTF JSON itself is not validated.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlbContainerValidator;

impl SceneGraphValidator for GlbContainerValidator {
    fn validate(&self, path: &str, glb: &[u8], context: &mut ValidationContext) -> bool {
        if glb.len() < GLB_HEADER_LENGTH {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalidLength,
                path,
                format!(
                    "The glTF must have at least {} bytes for its header, but has {}",
                    GLB_HEADER_LENGTH,
                    glb.len()
                ),
            ));
            return false;
        }

        let magic = LittleEndian::read_u32(&glb[0..4]);
        if magic != GLB_MAGIC {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalid,
                path,
                format!(
                    "The glTF magic must be 'glTF', but is '{}'",
                    String::from_utf8_lossy(&glb[0..4])
                ),
            ));
            return false;
        }

        let version = LittleEndian::read_u32(&glb[4..8]);
        if version != GLB_VERSION {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalidValue,
                path,
                format!("The glTF version must be {}, but is {}", GLB_VERSION, version),
            ));
            return false;
        }

        let length = LittleEndian::read_u32(&glb[8..12]) as usize;
        if length != glb.len() {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalidLength,
                path,
                format!(
                    "The glTF header declares a length of {} bytes, but the data has {} bytes",
                    length,
                    glb.len()
                ),
            ));
            return false;
        }

        let mut offset = GLB_HEADER_LENGTH;
        let mut chunk_index = 0usize;
        let mut seen_bin = false;
        while offset < length {
            if offset + GLB_CHUNK_HEADER_LENGTH > length {
                context.add_issue(ValidationIssue::new(
                    IssueType::BinaryInvalidLength,
                    path,
                    format!(
                        "Chunk {} header at offset {} exceeds the glTF length {}",
                        chunk_index, offset, length
                    ),
                ));
                return false;
            }
            let chunk_length = LittleEndian::read_u32(&glb[offset..offset + 4]) as usize;
            let chunk_type = LittleEndian::read_u32(&glb[offset + 4..offset + 8]);
            let data_start = offset + GLB_CHUNK_HEADER_LENGTH;
            let data_end = data_start + chunk_length;
            if data_end > length {
                context.add_issue(ValidationIssue::new(
                    IssueType::BinaryInvalidLength,
                    path,
                    format!(
                        "Chunk {} has a length of {} bytes starting at offset {}, which exceeds the glTF length {}",
                        chunk_index, chunk_length, data_start, length
                    ),
                ));
                return false;
            }
            if chunk_length % 4 != 0 {
                context.add_issue(ValidationIssue::new(
                    IssueType::BinaryInvalidAlignment,
                    path,
                    format!(
                        "Chunk {} has a length of {} bytes, which is not a multiple of 4",
                        chunk_index, chunk_length
                    ),
                ));
                return false;
            }

            match (chunk_index, chunk_type) {
                (0, GLB_CHUNK_JSON) => {
                    let json = &glb[data_start..data_end];
                    match serde_json::from_slice::<serde_json::Value>(json) {
                        Ok(value) if value.is_object() => {}
                        Ok(_) => {
                            context.add_issue(ValidationIssue::new(
                                IssueType::JsonParseError,
                                path,
                                "The glTF JSON chunk does not contain a JSON object",
                            ));
                            return false;
                        }
                        Err(e) => {
                            context.add_issue(ValidationIssue::new(
                                IssueType::JsonParseError,
                                path,
                                format!("The glTF JSON chunk could not be parsed: {}", e),
                            ));
                            return false;
                        }
                    }
                }
                (0, other) => {
                    context.add_issue(ValidationIssue::new(
                        IssueType::BinaryInvalid,
                        path,
                        format!(
                            "The first glTF chunk must be a JSON chunk, but has type 0x{:08X}",
                            other
                        ),
                    ));
                    return false;
                }
                (_, GLB_CHUNK_BIN) if !seen_bin => seen_bin = true,
                (_, GLB_CHUNK_BIN) | (_, GLB_CHUNK_JSON) => {
                    context.add_issue(ValidationIssue::new(
                        IssueType::BinaryInvalid,
                        path,
                        format!("Chunk {} repeats a chunk type that may appear only once", chunk_index),
                    ));
                    return false;
                }
                // Unknown chunk types are skipped by glTF loaders
                _ => {}
            }

            offset = data_end;
            chunk_index += 1;
        }

        if chunk_index == 0 {
            context.add_issue(ValidationIssue::new(
                IssueType::BinaryInvalid,
                path,
                "The glTF contains no JSON chunk",
            ));
            return false;
        }
        true
    }
}

/// Drop the padding that follows a binary glTF inside tile content
///
/// Tile formats pad the embedded glTF to an 8-byte boundary. When the glTF
/// header declares a length shorter than the slice, only that prefix is
/// returned.
pub fn strip_glb_padding(payload: &[u8]) -> &[u8] {
    if payload.len() < GLB_HEADER_LENGTH {
        return payload;
    }
    let declared = LittleEndian::read_u32(&payload[8..12]) as usize;
    if declared >= GLB_HEADER_LENGTH && declared < payload.len() {
        &payload[..declared]
    } else {
        payload
    }
}

/// Validate a binary glTF embedded in tile content
///
/// Returns `false` if the folded issue is an error.
pub fn validate_embedded_glb(path: &str, payload: &[u8], context: &mut ValidationContext) -> bool {
    if !context.options().validate_scene_graph() {
        tracing::debug!(path, "scene graph validation disabled");
        return true;
    }
    let glb = strip_glb_padding(payload);
    tracing::trace!(path, payload = payload.len(), glb = glb.len(), "validating embedded glTF");

    let validator = context.scene_graph_validator();
    let mut derived = context.derive_embedded();
    let payload_valid = validator.validate(path, glb, &mut derived);
    fold_payload_verdict(path, "The embedded glTF", payload_valid, derived, context)
}

/// Resolve a glTF referenced by URI and validate it in a derived context
///
/// An unresolvable URI is reported as an `IO_ERROR` on `path`.
pub fn validate_external_glb(path: &str, uri: &str, context: &mut ValidationContext) -> bool {
    let Some(data) = context.resolver().resolve_data(uri) else {
        context.add_issue(ValidationIssue::new(
            IssueType::IoError,
            path,
            format!("Could not resolve the glTF URI '{}'", uri),
        ));
        return false;
    };
    if !context.options().validate_scene_graph() {
        return true;
    }

    let validator = context.scene_graph_validator();
    let mut derived = context.derive(uri);
    let payload_valid = validator.validate(uri, strip_glb_padding(&data), &mut derived);
    let subject = format!("The external glTF '{}'", uri);
    fold_payload_verdict(path, &subject, payload_valid, derived, context)
}

/// Fold a derived context, keeping a rejection that came without any error
fn fold_payload_verdict(
    path: &str,
    subject: &str,
    payload_valid: bool,
    mut derived: ValidationContext,
    context: &mut ValidationContext,
) -> bool {
    if !payload_valid && derived.count(Severity::Error) == 0 {
        derived.add_issue(ValidationIssue::new(
            IssueType::ContentValidationError,
            path,
            format!("{} was rejected by the scene graph validator", subject),
        ));
    }
    let folded = context.add_derived(path, subject, derived);
    payload_valid && folded
}

/// Build a minimal valid binary glTF with the given JSON text
///
/// The JSON is padded with spaces to a 4-byte boundary.
pub fn build_glb(json: &str) -> Vec<u8> {
    let mut json_bytes = json.as_bytes().to_vec();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
    let length = GLB_HEADER_LENGTH + GLB_CHUNK_HEADER_LENGTH + json_bytes.len();
    let mut glb = Vec::with_capacity(length);
    glb.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&(length as u32).to_le_bytes());
    glb.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    glb.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(&json_bytes);
    glb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemoryResourceResolver;
    use std::sync::Arc;

    fn minimal_glb() -> Vec<u8> {
        build_glb(r#"{"asset":{"version":"2.0"}}"#)
    }

    #[test]
    fn test_valid_container() {
        let mut context = ValidationContext::default();
        assert!(GlbContainerValidator.validate("m.glb", &minimal_glb(), &mut context));
        assert!(context.issues().is_empty());
    }

    #[test]
    fn test_invalid_magic() {
        let mut glb = minimal_glb();
        glb[0] = b'x';
        let mut context = ValidationContext::default();
        assert!(!GlbContainerValidator.validate("m.glb", &glb, &mut context));
        assert_eq!(context.issues()[0].issue_type, IssueType::BinaryInvalid);
    }

    #[test]
    fn test_unparsable_json_chunk() {
        let glb = build_glb("{ not json");
        let mut context = ValidationContext::default();
        assert!(!GlbContainerValidator.validate("m.glb", &glb, &mut context));
        assert_eq!(context.issues()[0].issue_type, IssueType::JsonParseError);
    }

    #[test]
    fn test_strip_padding() {
        let mut padded = minimal_glb();
        let length = padded.len();
        padded.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(strip_glb_padding(&padded).len(), length);
        assert_eq!(strip_glb_padding(&padded[..length]).len(), length);
        assert_eq!(strip_glb_padding(&[1, 2, 3]).len(), 3);
    }

    #[test]
    fn test_embedded_glb_folds_issues() {
        let mut context = ValidationContext::default();
        assert!(!validate_embedded_glb("tile.b3dm", b"not a glb at all", &mut context));
        assert_eq!(context.issues().len(), 1);
        let issue = &context.issues()[0];
        assert_eq!(issue.issue_type, IssueType::ContentValidationError);
        assert_eq!(issue.causes.len(), 1);
    }

    struct RejectingValidator;

    impl SceneGraphValidator for RejectingValidator {
        fn validate(&self, _path: &str, _glb: &[u8], _context: &mut ValidationContext) -> bool {
            false
        }
    }

    #[test]
    fn test_silent_rejection_is_an_error() {
        let mut context =
            ValidationContext::default().with_scene_graph_validator(Arc::new(RejectingValidator));
        assert!(!validate_embedded_glb("tile.b3dm", &minimal_glb(), &mut context));
        assert_eq!(context.issues().len(), 1);
        assert_eq!(context.issues()[0].issue_type, IssueType::ContentValidationError);
        assert_eq!(context.issues()[0].causes.len(), 1);

        let resolver = MemoryResourceResolver::new().with_resource("m.glb", minimal_glb());
        let mut context = ValidationContext::new(Arc::new(resolver))
            .with_scene_graph_validator(Arc::new(RejectingValidator));
        assert!(!validate_external_glb("tile.i3dm", "m.glb", &mut context));
        assert_eq!(context.count(Severity::Error), 1);
    }

    #[test]
    fn test_external_glb_unresolvable() {
        let mut context = ValidationContext::default();
        assert!(!validate_external_glb("tile.i3dm", "missing.glb", &mut context));
        assert_eq!(context.issues()[0].issue_type, IssueType::IoError);
    }

    #[test]
    fn test_external_glb_resolved() {
        let resolver = MemoryResourceResolver::new().with_resource("models/m.glb", minimal_glb());
        let mut context = ValidationContext::new(Arc::new(resolver));
        assert!(validate_external_glb("tile.i3dm", "models/m.glb", &mut context));
        assert!(context.issues().is_empty());
    }
}
