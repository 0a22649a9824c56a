//! The collaborators that link planning calls out to.

use crate::artifact::ArtifactFactory;
use crate::artifact::DerivedArtifacts;
use crate::collector::DefaultLibrariesToLink;
use crate::collector::LibrariesToLinkCollector;
use crate::features::FeatureConfiguration;
use crate::features::StaticFeatures;
use crate::linkstamp::LinkstampCompiler;
use crate::linkstamp::RecordingLinkstampCompiler;
use crate::options::CppOptions;
use crate::options::Toolchain;

/// Everything a link planner needs that isn't specific to one link target. Cheap to copy, since
/// it's just references. Several targets can be planned against the same environment at once.
#[derive(Clone, Copy)]
pub struct LinkEnv<'a> {
    pub toolchain: &'a Toolchain,
    pub options: &'a CppOptions,
    pub features: &'a dyn FeatureConfiguration,
    pub artifacts: &'a dyn ArtifactFactory,
    pub libraries_to_link: &'a dyn LibrariesToLinkCollector,
    pub linkstamp_compiler: &'a dyn LinkstampCompiler,
}

/// Owns a set of in-memory collaborators that record what they're asked to do.
pub struct InMemoryEnv {
    pub toolchain: Toolchain,
    pub options: CppOptions,
    pub features: StaticFeatures,
    pub artifacts: DerivedArtifacts,
    pub libraries_to_link: DefaultLibrariesToLink,
    pub linkstamp_compiler: RecordingLinkstampCompiler,
}

impl Default for InMemoryEnv {
    fn default() -> Self {
        Self {
            toolchain: Toolchain::default(),
            options: CppOptions::default(),
            features: StaticFeatures::with_all_actions(),
            artifacts: DerivedArtifacts::new("bin"),
            libraries_to_link: DefaultLibrariesToLink,
            linkstamp_compiler: RecordingLinkstampCompiler::default(),
        }
    }
}

impl InMemoryEnv {
    pub fn env(&self) -> LinkEnv<'_> {
        LinkEnv {
            toolchain: &self.toolchain,
            options: &self.options,
            features: &self.features,
            artifacts: &self.artifacts,
            libraries_to_link: &self.libraries_to_link,
            linkstamp_compiler: &self.linkstamp_compiler,
        }
    }
}
