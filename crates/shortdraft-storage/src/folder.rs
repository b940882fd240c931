//! Folder reference parsing.

use url::Url;

use crate::error::{StorageError, StorageResult};

const DRIVE_HOST: &str = "drive.google.com";

fn is_folder_id(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Resolve a Drive folder URL or bare folder id to the id.
///
/// Accepted forms:
/// - `https://drive.google.com/drive/folders/<id>`
/// - `https://drive.google.com/drive/u/<n>/folders/<id>`
/// - `<id>`
///
/// # Examples
/// ```
/// use shortdraft_storage::extract_folder_id;
/// assert_eq!(
///     extract_folder_id("https://drive.google.com/drive/folders/abc_123?usp=sharing").unwrap(),
///     "abc_123"
/// );
/// assert_eq!(extract_folder_id("abc-123").unwrap(), "abc-123");
/// ```
pub fn extract_folder_id(reference: &str) -> StorageResult<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(StorageError::InvalidFolderReference(
            "no folder URL or id given".to_string(),
        ));
    }

    if is_folder_id(reference) {
        return Ok(reference.to_string());
    }

    let invalid = || StorageError::InvalidFolderReference(reference.to_string());

    let url = Url::parse(reference).map_err(|_| invalid())?;
    if url.scheme() != "https" || url.host_str() != Some(DRIVE_HOST) {
        return Err(invalid());
    }

    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    let id = match segments.as_slice() {
        ["drive", "folders", id, ..] => *id,
        ["drive", "u", n, "folders", id, ..] if n.chars().all(|c| c.is_ascii_digit()) => *id,
        _ => return Err(invalid()),
    };

    if is_folder_id(id) {
        Ok(id.to_string())
    } else {
        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_folder_url() {
        assert_eq!(
            extract_folder_id("https://drive.google.com/drive/folders/1AbC-d_E").unwrap(),
            "1AbC-d_E"
        );
    }

    #[test]
    fn test_user_scoped_folder_url() {
        assert_eq!(
            extract_folder_id("https://drive.google.com/drive/u/2/folders/XYZ").unwrap(),
            "XYZ"
        );
    }

    #[test]
    fn test_query_string_ignored() {
        assert_eq!(
            extract_folder_id("https://drive.google.com/drive/folders/XYZ?usp=share_link").unwrap(),
            "XYZ"
        );
    }

    #[test]
    fn test_bare_id() {
        assert_eq!(extract_folder_id("  0Bx_y-Z  ").unwrap(), "0Bx_y-Z");
    }

    #[test]
    fn test_rejects_other_hosts_and_shapes() {
        assert!(extract_folder_id("").is_err());
        assert!(extract_folder_id("https://example.com/drive/folders/abc").is_err());
        assert!(extract_folder_id("https://drive.google.com/file/d/abc/view").is_err());
        assert!(extract_folder_id("not a url at all").is_err());
        assert!(matches!(
            extract_folder_id("http://drive.google.com/drive/folders/abc"),
            Err(StorageError::InvalidFolderReference(_))
        ));
    }
}
