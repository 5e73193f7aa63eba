use std::{fmt, path::PathBuf};

pub use crate::error::IntoArcPathError;

/// Separator inside archive paths, on every platform.
pub const PATH_ARC_SEP: char = '/';

/// An archive path made safe to join onto an output directory: no root, no
/// `.` or `..` components, no control characters.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ArcPath(pub(crate) String);

pub fn sanitize(path: &str) -> Option<Vec<&str>> {
    use unic_ucd::GeneralCategory;

    let mut out = vec![];

    for component in path.split(PATH_ARC_SEP) {
        match component.trim() {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            x => {
                if x.chars().any(|c| {
                    let cat = GeneralCategory::of(c);
                    c == '\\' || cat == GeneralCategory::Control || (cat.is_separator() && c != ' ')
                }) {
                    return None;
                }
                out.push(x);
            }
        }
    }

    Some(out)
}

impl ArcPath {
    pub fn new(path: &str) -> Result<ArcPath, IntoArcPathError> {
        let out = sanitize(path).ok_or(IntoArcPathError::UnrepresentableStr)?;

        if out.is_empty() {
            return Err(IntoArcPathError::EmptyPath);
        }

        Ok(ArcPath(out.join("/")))
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.iter().collect()
    }

    pub fn parent(&self) -> Option<ArcPath> {
        self.0
            .rfind(PATH_ARC_SEP)
            .map(|i| ArcPath(self.0[..i].to_string()))
    }

    pub fn filename(&self) -> &str {
        self.iter().last().unwrap_or("")
    }

    pub fn join(&self, tail: &str) -> Result<ArcPath, IntoArcPathError> {
        Self::new(&format!("{}/{}", self.0, tail))
    }

    pub fn iter(&self) -> std::str::Split<'_, char> {
        self.0.split(PATH_ARC_SEP)
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArcPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
