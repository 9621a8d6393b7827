//! Identifier, filename and content-type rules shared by every backend.

use crate::errors::{CatalogError, CatalogResult};

const MAX_SANITIZED_STEM_LEN: usize = 50;

/// Image extensions, lowercase and dot-prefixed.
pub const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

/// Video extensions, lowercase and dot-prefixed.
pub const VIDEO_EXTENSIONS: [&str; 3] = [".mp4", ".webm", ".mov"];

/// Content types accepted for admin image uploads.
pub const UPLOAD_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// Returns true when `id` can be used as a namespace: non-empty, no path
/// separators, no `..`.
pub fn is_safe_id(id: &str) -> bool {
    is_single_segment(id)
}

/// Same predicate as [`is_safe_id`], applied to filenames inside a namespace.
pub fn is_safe_filename(filename: &str) -> bool {
    is_single_segment(filename)
}

fn is_single_segment(value: &str) -> bool {
    !value.is_empty() && !value.contains('/') && !value.contains('\\') && !value.contains("..")
}

pub fn ensure_safe_id(id: &str) -> CatalogResult<()> {
    if is_safe_id(id) {
        Ok(())
    } else {
        Err(CatalogError::validation("Invalid artwork id"))
    }
}

pub fn ensure_safe_filename(filename: &str) -> CatalogResult<()> {
    if is_safe_filename(filename) {
        Ok(())
    } else {
        Err(CatalogError::validation("Invalid filename"))
    }
}

/// Split `name` at its last dot into `(stem, extension)`. The extension keeps
/// its leading dot and is empty when there is no dot.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) => name.split_at(pos),
        None => (name, ""),
    }
}

/// Lowercased, dot-prefixed extension of `name`.
pub fn extension_lower(name: &str) -> String {
    split_extension(name).1.to_ascii_lowercase()
}

pub fn is_image(name: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&extension_lower(name).as_str())
}

pub fn is_video(name: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&extension_lower(name).as_str())
}

/// Humanize an identifier: dashes become spaces and each word gets an
/// uppercase first letter. `"blue-hour"` becomes `"Blue Hour"`.
pub fn humanize_title(id: &str) -> String {
    id.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Content type served or stored for `filename`, derived from its extension.
pub fn content_type_for(filename: &str) -> &'static str {
    match extension_lower(filename).as_str() {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".mp4" => "video/mp4",
        ".webm" => "video/webm",
        ".mov" => "video/quicktime",
        ".json" => "application/json",
        ".txt" => "text/plain; charset=utf-8",
        ".md" => "text/markdown; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// True for the upload whitelist (parameters such as `; charset` are ignored).
pub fn is_upload_image_type(content_type: &str) -> bool {
    UPLOAD_IMAGE_TYPES
        .iter()
        .any(|allowed| content_type.starts_with(allowed))
}

/// Extension to use for an upload whose original name carries none we know.
pub fn extension_for_image_type(content_type: &str) -> &'static str {
    if content_type.starts_with("image/png") {
        ".png"
    } else if content_type.starts_with("image/gif") {
        ".gif"
    } else {
        ".jpg"
    }
}

/// Reduce an uploaded filename to `[A-Za-z0-9_-]`, at most 50 characters,
/// with directory components and the extension removed. Falls back to
/// `"image"` when nothing survives.
pub fn sanitize_upload_stem(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let (stem, _) = split_extension(base);
    let cleaned: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_SANITIZED_STEM_LEN)
        .collect();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// Random 8-byte identifier rendered as 16 lowercase hex characters.
pub fn generate_artwork_id() -> String {
    let bytes: [u8; 8] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_and_separators() {
        for bad in ["", "../etc", "a/b", "a\\b", "..", "x..y"] {
            assert!(!is_safe_id(bad), "{bad:?} should be rejected");
            assert!(ensure_safe_id(bad).is_err());
        }
        assert!(is_safe_id("blue-hour"));
        assert!(is_safe_filename("a.jpg"));
        assert!(!is_safe_filename("../a.jpg"));
    }

    #[test]
    fn humanizes_dashed_ids() {
        assert_eq!(humanize_title("blue-hour"), "Blue Hour");
        assert_eq!(humanize_title("a--b"), "A  B");
        assert_eq!(humanize_title("árbol-rojo"), "Árbol Rojo");
    }

    #[test]
    fn splits_at_last_dot() {
        assert_eq!(split_extension("detalle.notes.TXT"), ("detalle.notes", ".TXT"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(extension_lower("Photo.JPEG"), ".jpeg");
        assert!(is_image("a.PNG"));
        assert!(is_video("clip.mov"));
        assert!(!is_image("meta.json"));
    }

    #[test]
    fn sanitizes_upload_names() {
        assert_eq!(sanitize_upload_stem("../../My Photo (1).jpg"), "MyPhoto1");
        assert_eq!(sanitize_upload_stem("C:\\tmp\\snap_shot-2.png"), "snap_shot-2");
        assert_eq!(sanitize_upload_stem("???.gif"), "image");
        let long = format!("{}.png", "x".repeat(80));
        assert_eq!(sanitize_upload_stem(&long).len(), 50);
    }

    #[test]
    fn upload_types_and_extensions() {
        assert!(is_upload_image_type("image/png"));
        assert!(is_upload_image_type("image/jpeg; charset=binary"));
        assert!(!is_upload_image_type("image/webp"));
        assert_eq!(extension_for_image_type("image/gif"), ".gif");
        assert_eq!(extension_for_image_type("image/jpeg"), ".jpg");
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("b.mov"), "video/quicktime");
        assert_eq!(content_type_for("bitacora.md"), "text/markdown; charset=utf-8");
        assert_eq!(content_type_for(".placeholder"), "application/octet-stream");
    }

    #[test]
    fn generated_ids_are_hex_and_safe() {
        let id = generate_artwork_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(is_safe_id(&id));
        assert_ne!(id, generate_artwork_id());
    }
}
