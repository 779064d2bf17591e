// src/output.rs
// Artifact naming, output path resolution and download-path safety

use std::path::{Component, Path, PathBuf};

use rand::Rng;
use thiserror::Error;

/// Marker inserted before the disambiguator of a refined artifact
const REFINED_MARKER: &str = "-refined-";
/// Extension used for auto-derived names
const DEFAULT_EXTENSION: &str = "png";
/// Significant words taken from the prompt for auto-derived names
const NAME_WORDS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "the", "of", "for", "to", "in", "on", "with", "my", "our", "your", "me",
    "create", "make", "draw", "generate", "show", "please", "diagram", "image", "picture", "that",
    "this", "is", "are", "how", "what", "from", "into", "using",
];

/// How far caller-supplied output hints are trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPolicy {
    /// Single local caller: absolute and nested paths are honoured
    Trusted,
    /// Multi-tenant: everything collapses to a flat name inside the output dir
    FlatOnly,
}

/// Reasons a download name is refused
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FileAccessError {
    #[error("invalid file name")]
    InvalidName,

    #[error("file not found")]
    NotFound,
}

/// Six lowercase hex characters
pub fn random_suffix() -> String {
    let value: u32 = rand::rng().random_range(0..0x0100_0000);
    format!("{:06x}", value)
}

/// Auto-derive a file name from the first significant prompt words
pub fn auto_filename(prompt: &str) -> String {
    let words: Vec<String> = prompt
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w))
        .take(NAME_WORDS)
        .map(String::from)
        .collect();

    let stem = if words.is_empty() {
        "diagram".to_string()
    } else {
        words.join("-")
    };
    format!("{}-{}.{}", stem, random_suffix(), DEFAULT_EXTENSION)
}

/// Reduce an arbitrary string to a flat, safe file name
pub fn sanitize_filename(name: &str) -> String {
    // Last path component only
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim_matches('-').to_string();
    if cleaned.is_empty() {
        format!("diagram-{}.{}", random_suffix(), DEFAULT_EXTENSION)
    } else if Path::new(&cleaned).extension().is_none() {
        format!("{}.{}", cleaned, DEFAULT_EXTENSION)
    } else {
        cleaned
    }
}

/// Resolve where a new artifact is written
pub fn resolve_output_path(
    output_dir: &Path,
    hint: Option<&str>,
    prompt: &str,
    policy: PathPolicy,
) -> PathBuf {
    let hint = hint.map(str::trim).filter(|h| !h.is_empty());
    match (hint, policy) {
        (None, _) => output_dir.join(auto_filename(prompt)),
        (Some(hint), PathPolicy::FlatOnly) => output_dir.join(sanitize_filename(hint)),
        (Some(hint), PathPolicy::Trusted) => {
            let path = PathBuf::from(hint);
            let path = if path.extension().is_none() {
                path.with_extension(DEFAULT_EXTENSION)
            } else {
                path
            };
            if path.is_absolute() {
                path
            } else {
                output_dir.join(path)
            }
        }
    }
}

/// Derive a fresh sibling path for a refinement of `previous`
pub fn refined_path(previous: &Path) -> PathBuf {
    let stem = previous
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("diagram");
    let base = strip_refined_suffix(stem);
    let ext = previous
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(DEFAULT_EXTENSION);
    let name = format!("{}{}{}.{}", base, REFINED_MARKER, random_suffix(), ext);
    previous.with_file_name(name)
}

fn strip_refined_suffix(stem: &str) -> &str {
    match stem.rfind(REFINED_MARKER) {
        Some(idx) => {
            let tail = &stem[idx + REFINED_MARKER.len()..];
            if tail.len() == 6 && tail.chars().all(|c| c.is_ascii_hexdigit()) {
                &stem[..idx]
            } else {
                stem
            }
        }
        None => stem,
    }
}

/// Resolve a requested download name to a file inside `dir`.
///
/// Anything that is not a plain flat name is refused before the filesystem is
/// consulted, so the answer never depends on whether the target exists.
pub fn resolve_download(dir: &Path, name: &str) -> Result<PathBuf, FileAccessError> {
    if name.is_empty()
        || name.contains(['/', '\\', '\0'])
        || name.starts_with('.')
        || name.contains("..")
    {
        return Err(FileAccessError::InvalidName);
    }
    let mut components = Path::new(name).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(FileAccessError::InvalidName);
    }

    let root = dir.canonicalize().map_err(|_| FileAccessError::NotFound)?;
    let candidate = root
        .join(name)
        .canonicalize()
        .map_err(|_| FileAccessError::NotFound)?;
    if !candidate.starts_with(&root) || !candidate.is_file() {
        return Err(FileAccessError::NotFound);
    }
    Ok(candidate)
}
