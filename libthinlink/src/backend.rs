//! LTO backend artifacts: the native object compiled from each bitcode file, together with the
//! files its compile reads and writes.

use crate::artifact::Artifact;
use crate::artifact::ArtifactSharing;
use crate::artifact::append_to_file_name;
use crate::bitcode::BitcodeFiles;
use crate::env::LinkEnv;
use crate::features::Feature;
use crate::features::FeatureConfiguration;
use crate::features::FeatureConfigurationExt as _;
use crate::inputs::LtoCompilationContext;
use crate::inputs::SharedBackends;
use crate::options::CppOptions;
use crate::ordered_set::OrderedSet;
use crate::ordered_set::new_map;
use serde::Serialize;
use std::hash::Hash;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the shared backends of all libraries go.
pub const SHARED_NONLTO_BACKEND_ROOT_PREFIX: &str = "shared.nonlto";

/// Directories, relative to the bin directory, that backend outputs are placed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LtoRoots {
    /// Index, imports and debug files.
    pub output_root: PathBuf,
    /// Native objects.
    pub object_root: PathBuf,
}

impl LtoRoots {
    /// Roots for the unique backends of a link producing `output`.
    pub fn for_indexing(output: &Artifact, features: &dyn FeatureConfiguration) -> Self {
        Self::new(
            append_to_file_name(output.root_relative_path(), ".lto"),
            features,
        )
    }

    pub fn shared(features: &dyn FeatureConfiguration) -> Self {
        Self::new(PathBuf::from(SHARED_NONLTO_BACKEND_ROOT_PREFIX), features)
    }

    fn new(output_root: PathBuf, features: &dyn FeatureConfiguration) -> Self {
        let object_root = if features.enabled(Feature::UseLtoNativeObjectDirectory) {
            append_to_file_name(&output_root, "-obj")
        } else {
            output_root.clone()
        };
        Self {
            output_root,
            object_root,
        }
    }
}

/// Whether a backend belongs to one link or is shared by every link of a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "sharing", rename_all = "kebab-case")]
pub enum BackendSharing {
    /// Compiled using the results of this target's LTO indexing.
    Unique {
        index_file: Artifact,
        imports_file: Artifact,
    },
    /// Compiled from the bitcode alone, without any cross-module information.
    Shared,
}

/// What the backend compile action reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendCompile {
    pub inputs: OrderedSet<Artifact>,
    pub outputs: OrderedSet<Artifact>,

    /// Bitcode files that the compile may read when importing functions. Only set for unique
    /// backends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_inputs: Option<Arc<BitcodeFiles>>,

    pub user_compile_flags: Vec<String>,
    pub use_pic: bool,
}

/// The native object produced from one bitcode file, plus how it's produced. Two backends are the
/// same if they compile the same bitcode into the same output root.
#[derive(Debug, Clone, Serialize)]
pub struct BitcodeBackendArtifact {
    pub bitcode_file: Artifact,
    pub object_file: Artifact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwo_file: Option<Artifact>,
    #[serde(flatten)]
    pub sharing: BackendSharing,
    pub roots: LtoRoots,
    pub compile: BackendCompile,
}

impl BitcodeBackendArtifact {
    pub fn is_shared(&self) -> bool {
        self.sharing == BackendSharing::Shared
    }

    /// Outputs of the indexing step that this backend's compile reads.
    pub fn indexing_outputs(&self) -> impl Iterator<Item = &Artifact> {
        match &self.sharing {
            BackendSharing::Unique {
                index_file,
                imports_file,
            } => Some([index_file, imports_file]),
            BackendSharing::Shared => None,
        }
        .into_iter()
        .flatten()
    }
}

impl PartialEq for BitcodeBackendArtifact {
    fn eq(&self, other: &Self) -> bool {
        self.bitcode_file == other.bitcode_file && self.roots.output_root == other.roots.output_root
    }
}

impl Eq for BitcodeBackendArtifact {}

impl Hash for BitcodeBackendArtifact {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bitcode_file.hash(state);
        self.roots.output_root.hash(state);
    }
}

/// Flags for compiling `bitcode`: the global link options, the file's own copts, the global backend
/// options and finally any per-file backend options, in that order.
pub(crate) fn backend_user_compile_flags(
    options: &CppOptions,
    bitcode: &Artifact,
    copts: &[String],
) -> Vec<String> {
    options
        .linkopts
        .iter()
        .chain(copts)
        .chain(&options.lto_backend_options)
        .cloned()
        .chain(options.per_file_lto_backend_opts(bitcode).map(str::to_owned))
        .collect()
}

/// Declares the artifacts of a backend for `bitcode`. The backend is unique when `allowed_inputs`
/// is given, otherwise it's shared and its outputs are declared shareable.
pub(crate) fn create_backend(
    env: &LinkEnv,
    bitcode: &Artifact,
    copts: &[String],
    roots: &LtoRoots,
    allowed_inputs: Option<Arc<BitcodeFiles>>,
    use_pic: bool,
) -> Arc<BitcodeBackendArtifact> {
    let artifact_sharing = if allowed_inputs.is_some() {
        ArtifactSharing::OwnedByTarget
    } else {
        ArtifactSharing::Shareable
    };
    let declare = |root: &Path, suffix: &str| {
        let path = append_to_file_name(&root.join(bitcode.root_relative_path()), suffix);
        if bitcode.is_tree_artifact() {
            env.artifacts.tree(&path, artifact_sharing)
        } else {
            env.artifacts.derived(&path, artifact_sharing)
        }
    };

    let object_file = declare(&roots.object_root, "");
    let dwo_file = (env.features.enabled(Feature::PerObjectDebugInfo) && env.options.fission)
        .then(|| {
            let path = roots
                .output_root
                .join(bitcode.root_relative_path())
                .with_extension("dwo");
            env.artifacts.derived(&path, artifact_sharing)
        });
    let sharing = if allowed_inputs.is_some() {
        BackendSharing::Unique {
            index_file: declare(&roots.output_root, ".thinlto.bc"),
            imports_file: declare(&roots.output_root, ".imports"),
        }
    } else {
        BackendSharing::Shared
    };

    let mut inputs = OrderedSet::new();
    inputs.insert(bitcode.clone());
    if let BackendSharing::Unique {
        index_file,
        imports_file,
    } = &sharing
    {
        inputs.insert(index_file.clone());
        inputs.insert(imports_file.clone());
    }
    let outputs = std::iter::once(object_file.clone())
        .chain(dwo_file.clone())
        .collect();

    tracing::trace!(%bitcode, %object_file, shared = allowed_inputs.is_none(), "LTO backend");

    Arc::new(BitcodeBackendArtifact {
        bitcode_file: bitcode.clone(),
        object_file,
        dwo_file,
        sharing,
        roots: roots.clone(),
        compile: BackendCompile {
            inputs,
            outputs,
            allowed_inputs,
            user_compile_flags: backend_user_compile_flags(env.options, bitcode, copts),
            use_pic,
        },
    })
}

/// Creates a shared backend for each of `objects` that's bitcode. A static library does this once,
/// so that links which don't index its members can use the same native objects.
#[tracing::instrument(skip_all, name = "Create shared LTO backends")]
pub fn create_shared_backends<'a>(
    env: &LinkEnv,
    lto: &LtoCompilationContext,
    objects: impl IntoIterator<Item = &'a Artifact>,
    use_pic: bool,
) -> SharedBackends {
    let roots = LtoRoots::shared(env.features);
    let mut backends = new_map();
    for object in objects {
        if lto.contains_bitcode_file(object) {
            let backend = create_backend(env, object, lto.copts(object), &roots, None, use_pic);
            backends.insert(object.clone(), backend);
        }
    }
    Arc::new(backends)
}
