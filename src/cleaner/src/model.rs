//! Repository data model as seen by the cleanup engine.

use std::fmt;
use std::str::FromStr;

/// Repository node identifier. Identifiers grow monotonically with insertion
/// order and are the pagination cursor for every candidate query.
pub type NodeId = i64;

/// Name of the container folder holding the preview folders of one content.
pub const PREVIEWS_FOLDER_NAME: &str = "Previews";

/// Content type of preview folders (the `Previews` root and its version
/// folders).
pub const FOLDER_TYPE_NAME: &str = "SystemFolder";

/// Content type of individual preview images.
pub const IMAGE_TYPE_NAME: &str = "PreviewImage";

/// A node selected for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateNode {
    pub id: NodeId,
    pub path: Option<String>,
}

impl CandidateNode {
    pub fn new(id: NodeId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: Some(path.into()),
        }
    }
}

/// Predicate family of a candidate page query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    /// `Previews` roots and every version folder below them.
    VersionFolders,
    /// Only the `Previews` roots.
    PreviewRoots,
    /// Version folders and roots that have no children.
    EmptyFolders,
    /// Individual preview images.
    PreviewImages,
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandidateKind::VersionFolders => "version_folders",
            CandidateKind::PreviewRoots => "preview_roots",
            CandidateKind::EmptyFolders => "empty_folders",
            CandidateKind::PreviewImages => "preview_images",
        };
        write!(f, "{s}")
    }
}

/// One bounded page request against the content repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    pub kind: CandidateKind,
    pub node_type_id: i64,
    /// Only nodes strictly below this path.
    pub path_prefix: Option<String>,
    /// Only nodes whose ordinal index is greater than this.
    pub index_threshold: Option<i32>,
    /// Only nodes with a greater identifier.
    pub min_id: NodeId,
    pub page_size: usize,
}

/// Identifiers of the two node types the engine filters on, resolved once
/// before a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeTypeIds {
    pub folder: i64,
    pub image: i64,
}

/// Publication status of a content version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionStatus {
    Approved,
    Locked,
    Draft,
    Rejected,
    Pending,
}

impl VersionStatus {
    /// Status code as persisted in the versions table.
    pub fn code(self) -> i32 {
        match self {
            VersionStatus::Approved => 1,
            VersionStatus::Locked => 2,
            VersionStatus::Draft => 4,
            VersionStatus::Rejected => 8,
            VersionStatus::Pending => 16,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(VersionStatus::Approved),
            2 => Some(VersionStatus::Locked),
            4 => Some(VersionStatus::Draft),
            8 => Some(VersionStatus::Rejected),
            16 => Some(VersionStatus::Pending),
            _ => None,
        }
    }

    fn letter(self) -> char {
        match self {
            VersionStatus::Approved => 'A',
            VersionStatus::Locked => 'L',
            VersionStatus::Draft => 'D',
            VersionStatus::Rejected => 'R',
            VersionStatus::Pending => 'P',
        }
    }

    fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "A" | "a" => Some(VersionStatus::Approved),
            "L" | "l" => Some(VersionStatus::Locked),
            "D" | "d" => Some(VersionStatus::Draft),
            "R" | "r" => Some(VersionStatus::Rejected),
            "P" | "p" => Some(VersionStatus::Pending),
            _ => None,
        }
    }
}

/// A content version, compared by value.
///
/// Preview version folders are named after the version they render, in the
/// form `V<major>.<minor>` optionally followed by `.<status letter>`
/// (`V2.0.A`, `V1.3.D`). A missing status letter means approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionNumber {
    pub major: i32,
    pub minor: i32,
    pub status: VersionStatus,
}

impl VersionNumber {
    pub fn new(major: i32, minor: i32, status: VersionStatus) -> Self {
        Self {
            major,
            minor,
            status,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.status == VersionStatus::Locked
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}.{}.{}", self.major, self.minor, self.status.letter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a version tag: {0:?}")]
pub struct ParseVersionError(String);

impl FromStr for VersionNumber {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError(s.to_string());

        let body = s.strip_prefix('V').ok_or_else(err)?;
        let mut parts = body.split('.');

        let major = parts
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .filter(|n| *n >= 0)
            .ok_or_else(err)?;
        let minor = parts
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .filter(|n| *n >= 0)
            .ok_or_else(err)?;
        let status = match parts.next() {
            Some(letter) => VersionStatus::from_letter(letter).ok_or_else(err)?,
            None => VersionStatus::Approved,
        };

        if parts.next().is_some() {
            return Err(err());
        }

        Ok(VersionNumber::new(major, minor, status))
    }
}

/// The last major and last minor version of a content, either of which may
/// be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastVersions {
    pub major: Option<VersionNumber>,
    pub minor: Option<VersionNumber>,
}

impl LastVersions {
    /// Whether `version` is one of the two current versions.
    pub fn is_current(&self, version: &VersionNumber) -> bool {
        self.major.as_ref() == Some(version) || self.minor.as_ref() == Some(version)
    }
}

/// Last segment of a repository path.
pub fn path_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Parent of a repository path, `None` for the root or a single segment.
pub fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&trimmed[..idx]),
    }
}

/// Path of the content a preview version folder belongs to:
/// `/Root/Docs/a.docx/Previews/V1.0.A` belongs to `/Root/Docs/a.docx`.
pub fn owning_content_path(version_folder_path: &str) -> Option<&str> {
    parent_path(version_folder_path).and_then(parent_path)
}
