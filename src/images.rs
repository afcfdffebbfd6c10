//! Image naming helpers shared by the dashboard storage paths and the fill pass.

use url::Url;
use uuid::Uuid;

use crate::types::Product;

/// Extension and MIME type for an image, as the host page upload expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageKind {
    pub ext: &'static str,
    pub mime: &'static str,
}

pub const JPEG: ImageKind = ImageKind { ext: "jpg", mime: "image/jpeg" };

/// Infers the image kind from the last path segment of a URL. Unknown or
/// missing extensions, and unparsable URLs, default to JPEG.
pub fn kind_from_url(url: &str) -> ImageKind {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return JPEG;
    };
    let last = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => kind_from_ext(ext),
        _ => JPEG,
    }
}

pub fn kind_from_ext(ext: &str) -> ImageKind {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => JPEG,
        "png" => ImageKind { ext: "png", mime: "image/png" },
        "gif" => ImageKind { ext: "gif", mime: "image/gif" },
        "webp" => ImageKind { ext: "webp", mime: "image/webp" },
        _ => JPEG,
    }
}

/// Only `http(s)` URLs can be fetched; data URLs and local blob references are skipped.
pub fn is_network_url(url: &str) -> bool {
    Url::parse(url.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

/// Object path for a new upload: `{productId}/{uuid}.{ext}`.
pub fn storage_path(product_id: Uuid, filename: &str) -> (String, ImageKind) {
    let kind = match filename.rsplit_once('.') {
        Some((_, ext)) => kind_from_ext(ext),
        None => JPEG,
    };
    (format!("{product_id}/{}.{}", Uuid::new_v4(), kind.ext), kind)
}

/// Object path of a URL served from `base` under `prefix` (a path relative to
/// the base path, e.g. `images/`). URLs from another origin yield `None`.
pub fn object_path_under(url: &str, base: &Url, prefix: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    if parsed.origin() != base.origin() {
        return None;
    }
    let root = format!("{}/{prefix}", base.path().trim_end_matches('/'));
    parsed
        .path()
        .strip_prefix(root.as_str())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

/// Object path of a public storage URL
/// (`{base}/storage/v1/object/public/{bucket}/{path}`), when it belongs to `bucket`.
pub fn object_path_from_public_url(url: &str, base: &Url, bucket: &str) -> Option<String> {
    object_path_under(url, base, &format!("storage/v1/object/public/{bucket}/"))
}

/// Matching key of an uploaded file: basename without extension, up to the first `-` or `_`.
/// `椅子-1.jpg` and `椅子_front.png` both yield `椅子`.
pub fn filename_key(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let base = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let key = base.split(['-', '_']).next().unwrap_or("").trim();
    if key.is_empty() {
        base.to_string()
    } else {
        key.to_string()
    }
}

/// First product whose name contains the key, or is contained in it.
pub fn match_product<'a>(products: &'a [Product], key: &str) -> Option<&'a Product> {
    if key.is_empty() {
        return None;
    }
    products
        .iter()
        .find(|p| !p.name.is_empty() && (p.name.contains(key) || key.contains(p.name.as_str())))
}
