//! Value types describing what goes into a link.

use crate::artifact::Artifact;
use crate::backend::BitcodeBackendArtifact;
use crate::error::Result;
use crate::ordered_set::FixedIndexMap;
use crate::ordered_set::OrderedSet;
use crate::ordered_set::new_map;
use crate::plan_bail;
use serde::Deserialize;
use serde::Serialize;
use std::hash::Hash;
use std::sync::Arc;

/// What a library file is, from the point of view of a link that consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibraryCategory {
    StaticLibrary,
    PicStaticLibrary,
    /// A static library whose every member must end up in the output, whether referenced or not.
    AlwaysLinkStaticLibrary,
    AlwaysLinkPicStaticLibrary,
    DynamicLibrary,
    InterfaceLibrary,
}

impl LibraryCategory {
    pub fn is_static(self) -> bool {
        matches!(
            self,
            LibraryCategory::StaticLibrary
                | LibraryCategory::PicStaticLibrary
                | LibraryCategory::AlwaysLinkStaticLibrary
                | LibraryCategory::AlwaysLinkPicStaticLibrary
        )
    }

    pub fn is_always_link(self) -> bool {
        matches!(
            self,
            LibraryCategory::AlwaysLinkStaticLibrary | LibraryCategory::AlwaysLinkPicStaticLibrary
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectCategory {
    ObjectFile,
    /// A directory of object files whose names aren't known until it's been produced.
    TreeArtifact,
}

/// An object file passed directly to the link. Two inputs are the same input if they refer to the
/// same artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectInput {
    pub artifact: Artifact,
    pub category: ObjectCategory,
    pub disable_whole_archive: bool,
    pub identifier: String,
    pub must_keep_debug: bool,
}

impl ObjectInput {
    pub fn new(artifact: Artifact) -> Self {
        let category = if artifact.is_tree_artifact() {
            ObjectCategory::TreeArtifact
        } else {
            ObjectCategory::ObjectFile
        };
        Self {
            identifier: artifact.root_relative_path().display().to_string(),
            artifact,
            category,
            disable_whole_archive: false,
            must_keep_debug: false,
        }
    }

    #[must_use]
    pub fn must_keep_debug(mut self, must_keep_debug: bool) -> Self {
        self.must_keep_debug = must_keep_debug;
        self
    }

    /// A copy of this input that refers to `artifact` instead.
    pub(crate) fn with_artifact(&self, artifact: Artifact) -> Self {
        Self {
            artifact,
            ..self.clone()
        }
    }
}

impl PartialEq for ObjectInput {
    fn eq(&self, other: &Self) -> bool {
        self.artifact == other.artifact
    }
}

impl Eq for ObjectInput {}

impl Hash for ObjectInput {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.artifact.hash(state);
    }
}

#[derive(Debug, Clone, Default)]
pub struct BitcodeInfo {
    /// A cut-down version of the bitcode that only contains what the indexer needs.
    pub minimized: Option<Artifact>,

    /// Extra compile flags for the backend compile of this bitcode file.
    pub copts: Vec<String>,
}

/// Records which of a compilation's outputs are LTO bitcode.
#[derive(Debug, Clone)]
pub struct LtoCompilationContext {
    bitcode: FixedIndexMap<Artifact, BitcodeInfo>,
}

impl Default for LtoCompilationContext {
    fn default() -> Self {
        Self {
            bitcode: new_map(),
        }
    }
}

impl LtoCompilationContext {
    #[must_use]
    pub fn with_bitcode(mut self, bitcode: Artifact, info: BitcodeInfo) -> Self {
        self.bitcode.insert(bitcode, info);
        self
    }

    pub fn contains_bitcode_file(&self, artifact: &Artifact) -> bool {
        self.bitcode.contains_key(artifact)
    }

    /// Returns the minimized bitcode for `artifact`, or `artifact` itself if it isn't bitcode or
    /// has no minimized form.
    pub fn minimized_bitcode_or_self(&self, artifact: &Artifact) -> Artifact {
        self.bitcode
            .get(artifact)
            .and_then(|info| info.minimized.clone())
            .unwrap_or_else(|| artifact.clone())
    }

    pub fn copts(&self, artifact: &Artifact) -> &[String] {
        self.bitcode
            .get(artifact)
            .map(|info| info.copts.as_slice())
            .unwrap_or_default()
    }

    pub fn bitcode_files(&self) -> impl Iterator<Item = &Artifact> {
        self.bitcode.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.bitcode.is_empty()
    }
}

/// Native objects compiled ahead of time from a library's bitcode, keyed by the bitcode file.
pub type SharedBackends = Arc<FixedIndexMap<Artifact, Arc<BitcodeBackendArtifact>>>;

/// A library passed to the link. Libraries are shared read-only between all the links that consume
/// them. Two inputs are the same input if they refer to the same artifact.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryInput {
    pub artifact: Artifact,
    pub category: LibraryCategory,
    pub identifier: String,

    /// The members of a static library. Empty if the library is opaque, in which case it's passed
    /// to the linker as a single file.
    pub objects: OrderedSet<Artifact>,

    #[serde(skip)]
    pub lto: Arc<LtoCompilationContext>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_shared_backends"
    )]
    shared_backends: Option<SharedBackends>,

    pub must_keep_debug: bool,

    /// Never wrap this library in `--whole-archive`. Set for toolchain runtime libraries.
    pub disable_whole_archive: bool,
}

impl LibraryInput {
    pub fn new(artifact: Artifact, category: LibraryCategory) -> Self {
        Self {
            identifier: artifact.root_relative_path().display().to_string(),
            artifact,
            category,
            objects: OrderedSet::new(),
            lto: Arc::default(),
            shared_backends: None,
            must_keep_debug: false,
            disable_whole_archive: false,
        }
    }

    #[must_use]
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    #[must_use]
    pub fn with_objects(
        mut self,
        objects: impl IntoIterator<Item = Artifact>,
        lto: Arc<LtoCompilationContext>,
    ) -> Self {
        self.objects = objects.into_iter().collect();
        self.lto = lto;
        self
    }

    /// Attaches the library's shared backends. There must be one for every bitcode file in the
    /// library's LTO context.
    pub fn with_shared_backends(mut self, shared_backends: SharedBackends) -> Result<Self> {
        if let Some(missing) = self
            .lto
            .bitcode_files()
            .find(|bitcode| !shared_backends.contains_key(*bitcode))
        {
            plan_bail!(
                Programming,
                "Library `{}` has no shared backend for bitcode file `{missing}`",
                self.artifact
            );
        }
        self.shared_backends = Some(shared_backends);
        Ok(self)
    }

    #[must_use]
    pub fn must_keep_debug(mut self, must_keep_debug: bool) -> Self {
        self.must_keep_debug = must_keep_debug;
        self
    }

    #[must_use]
    pub fn disable_whole_archive(mut self, disable: bool) -> Self {
        self.disable_whole_archive = disable;
        self
    }

    pub fn contains_object_files(&self) -> bool {
        !self.objects.is_empty()
    }

    pub fn shared_backends(&self) -> Option<&SharedBackends> {
        self.shared_backends.as_ref()
    }

    /// A copy of this library with different members and no shared backends. Used for the view
    /// that the indexer gets.
    pub(crate) fn with_replaced_objects(&self, objects: OrderedSet<Artifact>) -> Self {
        Self {
            objects,
            shared_backends: None,
            must_keep_debug: false,
            ..self.clone()
        }
    }
}

impl PartialEq for LibraryInput {
    fn eq(&self, other: &Self) -> bool {
        self.artifact == other.artifact
    }
}

impl Eq for LibraryInput {}

impl Hash for LibraryInput {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.artifact.hash(state);
    }
}

fn serialize_shared_backends<S: serde::Serializer>(
    shared_backends: &Option<SharedBackends>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap as _;
    let Some(shared_backends) = shared_backends else {
        return serializer.serialize_none();
    };
    let mut map = serializer.serialize_map(Some(shared_backends.len()))?;
    for (bitcode, backend) in shared_backends.iter() {
        map.serialize_entry(
            &bitcode.exec_path().display().to_string(),
            &backend.object_file,
        )?;
    }
    map.end()
}

/// A source file that's compiled fresh for every link that includes it, so that it can embed
/// information about the build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Linkstamp {
    pub source: Artifact,
    pub declared_includes: Vec<Artifact>,
}

impl Linkstamp {
    pub fn new(source: Artifact) -> Self {
        Self {
            source,
            declared_includes: Vec::new(),
        }
    }
}

/// Anything that ends up on the linker command line as a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkerInput {
    Object(ObjectInput),
    Library(LibraryInput),
}

impl LinkerInput {
    pub fn artifact(&self) -> &Artifact {
        match self {
            LinkerInput::Object(o) => &o.artifact,
            LinkerInput::Library(l) => &l.artifact,
        }
    }
}
