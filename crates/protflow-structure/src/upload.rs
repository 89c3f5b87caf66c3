//! Intake of user-uploaded structure and molecule files.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Structure,
    Molecule,
}

impl UploadKind {
    /// Parameter name downstream jobs read the file from.
    pub fn output_field(&self) -> &'static str {
        match self {
            UploadKind::Structure => "pdb_file",
            UploadKind::Molecule => "molecule_file",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Structure => "structure",
            UploadKind::Molecule => "molecule",
        }
    }
}

impl FromStr for UploadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structure" => Ok(UploadKind::Structure),
            "molecule" => Ok(UploadKind::Molecule),
            _ => Err("Invalid output type".to_string()),
        }
    }
}

/// Resolve a caller-supplied relative path inside `uploads_dir`.
/// Absolute paths and `..` components are refused.
pub fn resolve_upload(uploads_dir: &Path, file_path: &str) -> Option<PathBuf> {
    let relative = Path::new(file_path);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(uploads_dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("structure".parse::<UploadKind>(), Ok(UploadKind::Structure));
        assert_eq!(UploadKind::Molecule.output_field(), "molecule_file");
        assert_eq!("image".parse::<UploadKind>().unwrap_err(), "Invalid output type");
    }

    #[test]
    fn test_resolve_upload_stays_inside_dir() {
        let dir = Path::new("/srv/uploads");
        assert_eq!(resolve_upload(dir, "a/b.pdb"), Some(PathBuf::from("/srv/uploads/a/b.pdb")));
        assert_eq!(resolve_upload(dir, "../etc/passwd"), None);
        assert_eq!(resolve_upload(dir, "/etc/passwd"), None);
    }
}
