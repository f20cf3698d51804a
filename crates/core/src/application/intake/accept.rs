// Upload Acceptance Use Case

use crate::domain::{dotted_extension, ImageFormat, MediaKind, Preset, SessionId};
use crate::error::{AppError, Result};
use std::path::Path;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// One uploaded file plus the form fields that came with it
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub session_id: SessionId,
    /// Client-supplied name, possibly carrying path components
    pub filename: String,
    pub content: Vec<u8>,
    pub preset: Option<String>,
    pub image_format: Option<String>,
}

/// Where uploads go and how big they may be
#[derive(Debug, Clone)]
pub struct IntakePolicy {
    pub upload_dir: std::path::PathBuf,
    pub max_file_size_mb: u64,
}

impl IntakePolicy {
    pub fn max_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }
}

/// Request after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUpload {
    /// Final path component of the client filename
    pub basename: String,
    pub kind: MediaKind,
    pub preset: Preset,
    pub image_format: ImageFormat,
}

/// Reject anything that must not become a job. Runs before anything touches disk.
pub fn validate_request(req: &UploadRequest, policy: &IntakePolicy) -> Result<ValidatedUpload> {
    let basename = sanitize_filename(&req.filename)
        .ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    let ext = dotted_extension(Path::new(&basename));
    let kind = MediaKind::from_extension(&ext).ok_or_else(|| {
        AppError::Validation(format!(
            "Unsupported file type: {}. Supported: images (jpg, png, heic, webp, gif) and videos (mp4, mov, avi, mkv, webm)",
            ext
        ))
    })?;

    if req.content.len() as u64 > policy.max_bytes() {
        return Err(AppError::Validation(format!(
            "File too large. Maximum size is {}MB",
            policy.max_file_size_mb
        )));
    }

    let preset = parse_or_default(req.preset.as_deref())?;
    let image_format = parse_or_default(req.image_format.as_deref())?;

    Ok(ValidatedUpload {
        basename,
        kind,
        preset,
        image_format,
    })
}

/// Strip directories (either separator style) from a client filename
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let normalized = raw.trim().replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Blank form fields fall back to the default
fn parse_or_default<T>(raw: Option<&str>) -> Result<T>
where
    T: std::str::FromStr<Err = crate::domain::DomainError> + Default,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|e: crate::domain::DomainError| AppError::Validation(e.to_string())),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> IntakePolicy {
        IntakePolicy {
            upload_dir: "/uploads".into(),
            max_file_size_mb: 1,
        }
    }

    fn request(filename: &str, len: usize) -> UploadRequest {
        UploadRequest {
            session_id: SessionId::parse(&"a".repeat(32)).unwrap(),
            filename: filename.to_string(),
            content: vec![0u8; len],
            preset: None,
            image_format: None,
        }
    }

    #[test]
    fn test_defaults_apply() {
        let valid = validate_request(&request("holiday.MOV", 10), &policy()).unwrap();
        assert_eq!(valid.basename, "holiday.MOV");
        assert_eq!(valid.kind, MediaKind::Video);
        assert_eq!(valid.preset, Preset::Facebook);
        assert_eq!(valid.image_format, ImageFormat::Jpg);
    }

    #[test]
    fn test_empty_filename() {
        let err = validate_request(&request("", 10), &policy()).unwrap_err();
        assert_eq!(err.to_string(), "No file provided");
    }

    #[test]
    fn test_unsupported_extension_names_it() {
        let err = validate_request(&request("notes.txt", 10), &policy()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().starts_with("Unsupported file type: .txt."));
    }

    #[test]
    fn test_oversize_is_rejected() {
        let at_cap = request("a.png", 1024 * 1024);
        assert!(validate_request(&at_cap, &policy()).is_ok());

        let over = request("a.png", 1024 * 1024 + 1);
        let err = validate_request(&over, &policy()).unwrap_err();
        assert_eq!(err.to_string(), "File too large. Maximum size is 1MB");
    }

    #[test]
    fn test_unknown_preset_is_client_error() {
        let mut req = request("a.png", 10);
        req.preset = Some("ultra".to_string());
        let err = validate_request(&req, &policy()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_blank_fields_fall_back() {
        let mut req = request("a.png", 10);
        req.preset = Some(" ".to_string());
        req.image_format = Some("webp".to_string());
        let valid = validate_request(&req, &policy()).unwrap();
        assert_eq!(valid.preset, Preset::Facebook);
        assert_eq!(valid.image_format, ImageFormat::Webp);
    }

    #[test]
    fn test_path_components_are_dropped() {
        assert_eq!(sanitize_filename("../../etc/x.jpg").as_deref(), Some("x.jpg"));
        assert_eq!(sanitize_filename(r"C:\Users\me\x.jpg").as_deref(), Some("x.jpg"));
        assert_eq!(sanitize_filename("dir/"), Some("dir".to_string()));
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("/"), None);
    }
}
