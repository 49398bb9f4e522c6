//! Path string manipulation: dirname/basename splitting and depth checks.

use crate::config::MAX_PATH_DEPTH;
use crate::error::FsError;
use crate::Result;

/// Both the root and the current-directory marker name the root directory.
pub fn is_root_marker(component: &str) -> bool {
    component == "/" || component == "."
}

/// Splits a path into (parent, base) with dirname/basename semantics:
/// trailing slashes are ignored, "/" splits into ("/", "/"), and a bare
/// name has parent ".".
pub fn split(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        if path.is_empty() {
            return (".".to_string(), ".".to_string());
        }
        return ("/".to_string(), "/".to_string());
    }

    match trimmed.rfind('/') {
        None => (".".to_string(), trimmed.to_string()),
        Some(0) => ("/".to_string(), trimmed[1..].to_string()),
        Some(i) => {
            let parent = trimmed[..i].trim_end_matches('/');
            let parent = if parent.is_empty() { "/" } else { parent };
            (parent.to_string(), trimmed[i + 1..].to_string())
        }
    }
}

/// Appends a name to a directory path.
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Number of real components in a path.
pub fn depth(path: &str) -> usize {
    path.split('/').filter(|c| !c.is_empty() && *c != ".").count()
}

/// Rejects pathologically deep paths before any recursive resolution.
pub fn check_depth(path: &str) -> Result<()> {
    if depth(path) > MAX_PATH_DEPTH {
        return Err(FsError::PathTooDeep);
    }
    Ok(())
}
