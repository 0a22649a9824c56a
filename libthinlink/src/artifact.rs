//! Artifact handles and the collaborator that declares new ones.
//!
//! The planner never touches the file system. An `Artifact` is only a name for a file (or a
//! directory, for tree artifacts) that some action will read or write.

use crate::ordered_set::FixedIndexMap;
use crate::ordered_set::new_map;
use serde::Serialize;
use std::ffi::OsString;
use std::fmt::Debug;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

/// A handle to a file that's either a source file or the output of some action. Cloning is cheap.
/// Identity is the combination of root and root-relative path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Artifact(Arc<ArtifactData>);

#[derive(PartialEq, Eq, Hash, PartialOrd, Ord)]
struct ArtifactData {
    /// Directory, relative to the execution root, that `path` is relative to. Empty for source
    /// files.
    root: PathBuf,
    path: PathBuf,
    is_tree: bool,
}

/// Whether a declared artifact must live within the declaring target's own output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactSharing {
    OwnedByTarget,

    /// The artifact may be placed outside the target's directory, because several targets will
    /// reference the very same file. Needed for shared LTO backend objects.
    Shareable,
}

/// Declares derived artifacts. Implementations must be idempotent: declaring the same path twice
/// returns an equal artifact.
pub trait ArtifactFactory {
    /// The output root under which derived artifacts are placed, relative to the execution root.
    fn bin_directory(&self) -> &Path;

    fn derived(&self, root_relative_path: &Path, sharing: ArtifactSharing) -> Artifact;

    /// Declares a directory artifact whose contents are only known once the producing action has
    /// run.
    fn tree(&self, root_relative_path: &Path, sharing: ArtifactSharing) -> Artifact;
}

impl Artifact {
    pub fn source(path: impl Into<PathBuf>) -> Self {
        Self::new(PathBuf::new(), path.into(), false)
    }

    pub fn derived(root: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::new(root.into(), path.into(), false)
    }

    pub fn tree(root: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self::new(root.into(), path.into(), true)
    }

    fn new(root: PathBuf, path: PathBuf, is_tree: bool) -> Self {
        Self(Arc::new(ArtifactData {
            root,
            path,
            is_tree,
        }))
    }

    pub fn root(&self) -> &Path {
        &self.0.root
    }

    pub fn root_relative_path(&self) -> &Path {
        &self.0.path
    }

    pub fn exec_path(&self) -> PathBuf {
        self.0.root.join(&self.0.path)
    }

    pub fn filename(&self) -> &str {
        self.0
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    pub fn is_tree_artifact(&self) -> bool {
        self.0.is_tree
    }
}

impl Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.exec_path().display(), f)
    }
}

impl Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_tree {
            write!(f, "Tree({self})")
        } else {
            write!(f, "Artifact({self})")
        }
    }
}

impl Serialize for Artifact {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.exec_path().display())
    }
}

/// Returns `path` with `suffix` appended to its final component. Unlike `Path::with_extension`,
/// nothing is removed, so `foo.o` + `.lto` is `foo.o.lto`.
pub(crate) fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// An `ArtifactFactory` that remembers everything it was asked to declare.
pub struct DerivedArtifacts {
    bin_directory: PathBuf,
    declared: Mutex<FixedIndexMap<Artifact, ArtifactSharing>>,
}

impl DerivedArtifacts {
    pub fn new(bin_directory: impl Into<PathBuf>) -> Self {
        Self {
            bin_directory: bin_directory.into(),
            declared: Mutex::new(new_map()),
        }
    }

    /// All artifacts declared so far, in declaration order.
    pub fn declared(&self) -> Vec<(Artifact, ArtifactSharing)> {
        self.declared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(artifact, sharing)| (artifact.clone(), *sharing))
            .collect()
    }

    fn declare(&self, artifact: Artifact, sharing: ArtifactSharing) -> Artifact {
        let mut declared = self.declared.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = declared.entry(artifact.clone()).or_insert(sharing);
        // Once something has asked for a path to be shareable, it stays that way.
        if sharing == ArtifactSharing::Shareable {
            *entry = sharing;
        }
        artifact
    }
}

impl ArtifactFactory for DerivedArtifacts {
    fn bin_directory(&self) -> &Path {
        &self.bin_directory
    }

    fn derived(&self, root_relative_path: &Path, sharing: ArtifactSharing) -> Artifact {
        self.declare(
            Artifact::derived(&self.bin_directory, root_relative_path),
            sharing,
        )
    }

    fn tree(&self, root_relative_path: &Path, sharing: ArtifactSharing) -> Artifact {
        self.declare(
            Artifact::tree(&self.bin_directory, root_relative_path),
            sharing,
        )
    }
}

/// Filename checks for the different kinds of linker input.
pub(crate) mod file_types {
    const OBJECT: &[&str] = &[".o", ".obj"];
    const ARCHIVE: &[&str] = &[".a", ".lo", ".lib"];
    const SHARED: &[&str] = &[".so", ".dylib", ".dll"];
    const INTERFACE: &[&str] = &[".ifso", ".tbd", ".lib"];

    fn has_any_suffix(name: &str, suffixes: &[&str]) -> bool {
        suffixes
            .iter()
            .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix))
    }

    /// Covers `.pic.o` too.
    pub(crate) fn is_object_file(name: &str) -> bool {
        has_any_suffix(name, OBJECT)
    }

    /// Covers `.pic.a` and `.pic.lo` too.
    pub(crate) fn is_archive(name: &str) -> bool {
        has_any_suffix(name, ARCHIVE)
    }

    pub(crate) fn is_shared_library(name: &str) -> bool {
        has_any_suffix(name, SHARED)
            || has_any_suffix(name, INTERFACE)
            || is_versioned_shared_library(name)
    }

    /// Matches names like `libfoo.so.1` and `libfoo.so.1.2.3`.
    fn is_versioned_shared_library(name: &str) -> bool {
        let Some((stem, version)) = name.split_once(".so.") else {
            return false;
        };
        !stem.is_empty()
            && version
                .split('.')
                .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
    }
}
