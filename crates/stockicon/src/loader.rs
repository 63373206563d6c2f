//! Loading definition sources into images.
//!
//! Every image source may have a double-density companion located by file
//! name convention: `name@2x.ext` is tried first, then `name.ext@2x`. A
//! missing companion is not an error.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use stockicon_core::logging::targets;
use stockicon_render::ImageBuffer;

use crate::addin::Addin;
use crate::cache::ResolvedImage;
use crate::error::{IconError, Result};

/// Candidate names for the `@2x` companion of `name`, in lookup order.
pub fn hi_dpi_names(name: &str) -> [String; 2] {
    let (dir, file) = match name.rfind('/') {
        Some(idx) => name.split_at(idx + 1),
        None => ("", name),
    };
    let preferred = match file.rfind('.') {
        Some(dot) if dot > 0 => format!("{dir}{}@2x{}", &file[..dot], &file[dot..]),
        _ => format!("{name}@2x"),
    };
    [preferred, format!("{name}@2x")]
}

fn hi_dpi_paths(path: &Path) -> [PathBuf; 2] {
    let mut fallback = path.as_os_str().to_owned();
    fallback.push("@2x");
    let fallback = PathBuf::from(fallback);

    let preferred = match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            let mut name = stem.to_owned();
            name.push("@2x.");
            name.push(ext);
            path.with_file_name(name)
        }
        _ => fallback.clone(),
    };
    [preferred, fallback]
}

/// Decode image bytes, naming `source_name` in errors.
pub fn decode(source_name: &str, bytes: &[u8]) -> Result<ImageBuffer> {
    if bytes.is_empty() {
        return Err(IconError::EmptySource(source_name.to_string()));
    }
    ImageBuffer::from_bytes(bytes).map_err(|e| IconError::decode(source_name, e))
}

/// Load an embedded resource and its optional companion.
pub fn load_resource(addin: &dyn Addin, resource: &str) -> Result<ResolvedImage> {
    let bytes = addin
        .resource(resource)
        .ok_or_else(|| IconError::ResourceNotFound {
            addin: addin.id().to_string(),
            resource: resource.to_string(),
        })?;
    let base = decode(resource, &bytes)?;

    let hi_dpi = hi_dpi_names(resource)
        .iter()
        .find_map(|name| addin.resource(name).map(|bytes| (name.clone(), bytes)))
        .and_then(|(name, bytes)| companion(&name, &bytes));

    tracing::debug!(
        target: targets::LOADER,
        addin = addin.id(),
        resource,
        size = %base.size(),
        hi_dpi = hi_dpi.is_some(),
        "loaded resource image"
    );
    Ok(ResolvedImage::with_hi_dpi(base, hi_dpi))
}

/// Load an image file and its optional companion.
pub fn load_file(path: &Path) -> Result<ResolvedImage> {
    let bytes = std::fs::read(path).map_err(|e| IconError::io(path, e))?;
    let source_name = path.display().to_string();
    let base = decode(&source_name, &bytes)?;

    let mut hi_dpi = None;
    for candidate in hi_dpi_paths(path) {
        match std::fs::read(&candidate) {
            Ok(bytes) => {
                hi_dpi = companion(&candidate.display().to_string(), &bytes);
                break;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!(target: targets::LOADER, path = %candidate.display(), error = %e, "unreadable @2x companion");
                break;
            }
        }
    }

    tracing::debug!(
        target: targets::LOADER,
        path = %path.display(),
        size = %base.size(),
        hi_dpi = hi_dpi.is_some(),
        "loaded file image"
    );
    Ok(ResolvedImage::with_hi_dpi(base, hi_dpi))
}

fn companion(name: &str, bytes: &[u8]) -> Option<ImageBuffer> {
    match decode(name, bytes) {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::warn!(target: targets::LOADER, companion = name, error = %e, "ignoring broken @2x companion");
            None
        }
    }
}
