use rand::Rng;

use crate::error::BlobError;

/// Extensions accepted for form uploads when no policy is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "pdf", "doc", "docx"];

/// File-type filter and key generator for form uploads.
///
/// Generated keys look like `<field>-<unix millis>-<random>.<ext>`. The
/// millisecond timestamp plus a nine-digit random suffix keeps concurrent
/// uploads for the same field from colliding.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().copied())
    }
}

impl UploadPolicy {
    pub fn new<'a>(extensions: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            allowed: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Lower-cased extension of `filename` if the policy accepts it.
    pub fn check(&self, filename: &str) -> Result<String, BlobError> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .ok_or_else(|| {
                BlobError::Rejected(format!("file {filename:?} has no extension"))
            })?;
        if !self.allowed.iter().any(|a| *a == ext) {
            return Err(BlobError::Rejected(format!(
                "file type .{ext} not allowed; accepted: {}",
                self.allowed.join(", ")
            )));
        }
        Ok(ext)
    }

    /// Generate a storage key for an upload to form field `field`.
    pub fn key_for(&self, field: &str, filename: &str) -> Result<String, BlobError> {
        let ext = self.check(filename)?;
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
        Ok(format!("{}-{millis}-{suffix}.{ext}", sanitize_field(field)))
    }

    /// Whether `key` has the shape [`key_for`](Self::key_for) gives uploads
    /// to `field`.
    pub fn owns_key(&self, field: &str, key: &str) -> bool {
        let Some(rest) = key
            .strip_prefix(sanitize_field(field).as_str())
            .and_then(|r| r.strip_prefix('-'))
        else {
            return false;
        };
        let Some((stem, ext)) = rest.rsplit_once('.') else {
            return false;
        };
        if !self.allowed.iter().any(|a| *a == ext) {
            return false;
        }
        match stem.split_once('-') {
            Some((millis, suffix)) => {
                is_digits(millis) && is_digits(suffix) && suffix.len() <= 9
            }
            None => false,
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Field names are admin-defined labels ("Date of Birth"); keep keys URL-safe.
fn sanitize_field(field: &str) -> String {
    let cleaned: String = field
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
