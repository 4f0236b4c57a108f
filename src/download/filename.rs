//! Local path derivation for remote exports.

use std::path::{Component, Path, PathBuf};

use url::Url;

use super::DownloadError;

/// Derives the destination of `url` inside `dir` from its last path segment.
///
/// The segment is percent-decoded and sanitized, so
/// `.../itunes%2020240101.tbz` lands at `dir/itunes 20240101.tbz`.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] when the URL does not parse or has no
/// usable final segment.
pub fn destination_for(url: &str, dir: &Path) -> Result<PathBuf, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| DownloadError::invalid_url(url))?;
    Ok(dir.join(decode_segment(segment)))
}

/// Derives the destination of `url` mirroring its path below `root`.
///
/// `root/current/itunes.tbz` under `dir` becomes `dir/current/itunes.tbz`.
/// URLs outside `root` fall back to [`destination_for`].
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] when the URL does not parse.
pub fn mirror_destination(root: &str, url: &str, dir: &Path) -> Result<PathBuf, DownloadError> {
    let Some(relative) = url.strip_prefix(root) else {
        return destination_for(url, dir);
    };
    let mut path = dir.to_path_buf();
    let segments: Vec<&str> = relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        return destination_for(url, dir);
    }
    for segment in segments {
        path.push(decode_segment(segment));
    }
    Ok(path)
}

fn decode_segment(segment: &str) -> String {
    let decoded = urlencoding::decode(segment)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| segment.to_string());
    sanitize_filename(&decoded)
}

/// Replaces characters that are invalid on common filesystems.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }
    if is_plain_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_plain_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
