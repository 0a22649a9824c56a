//! Link requests read from TOML. A request describes one link target together with the toolchain,
//! options and features to plan it against.

use crate::artifact::Artifact;
use crate::artifact::ArtifactSharing;
use crate::artifact::DerivedArtifacts;
use crate::assemble::LinkPlan;
use crate::backend::create_shared_backends;
use crate::builder::LinkActionBuilder;
use crate::env::InMemoryEnv;
use crate::env::LinkEnv;
use crate::error::Context as _;
use crate::error::Result;
use crate::features::StaticFeatures;
use crate::inputs::BitcodeInfo;
use crate::inputs::LibraryCategory;
use crate::inputs::LibraryInput;
use crate::inputs::Linkstamp;
use crate::inputs::LtoCompilationContext;
use crate::inputs::ObjectInput;
use crate::link_type::LinkTargetType;
use crate::link_type::LinkingMode;
use crate::options::CppOptions;
use crate::options::Toolchain;
use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LinkRequest {
    #[serde(default = "default_bin_directory")]
    pub bin_directory: PathBuf,

    pub target: TargetConfig,

    #[serde(default)]
    pub options: CppOptions,

    #[serde(default)]
    pub toolchain: Toolchain,

    #[serde(default = "StaticFeatures::with_all_actions")]
    pub features: StaticFeatures,

    #[serde(default)]
    pub objects: Vec<ObjectConfig>,

    #[serde(default)]
    pub libraries: Vec<LibraryConfig>,

    #[serde(default)]
    pub linkstamps: Vec<LinkstampConfig>,
}

fn default_bin_directory() -> PathBuf {
    PathBuf::from("bin")
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub owner: String,

    /// Relative to the bin directory.
    pub output: PathBuf,

    pub link_type: LinkTargetType,

    #[serde(default)]
    pub linking_mode: LinkingMode,

    pub identifier: Option<String>,
    pub interface_output: Option<PathBuf>,
    pub mnemonic: Option<String>,

    #[serde(default)]
    pub test_only: bool,

    #[serde(default)]
    pub use_test_only_flags: bool,

    #[serde(default)]
    pub stamping: bool,

    #[serde(default)]
    pub native_deps: bool,

    #[serde(default)]
    pub whole_archive: bool,

    #[serde(default)]
    pub use_pic_for_lto_backends: bool,

    #[serde(default)]
    pub linkopts: Vec<String>,

    #[serde(default)]
    pub linkstamp_defines: Vec<String>,
}

/// An object file, either passed to the link directly or as a member of a library.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ObjectConfig {
    /// Relative to the bin directory.
    pub path: PathBuf,

    #[serde(default)]
    pub tree: bool,

    #[serde(default)]
    pub bitcode: bool,

    /// Minimized form of the bitcode, for the indexer.
    pub minimized: Option<PathBuf>,

    #[serde(default)]
    pub copts: Vec<String>,

    #[serde(default)]
    pub must_keep_debug: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LibraryConfig {
    /// Relative to the bin directory.
    pub path: PathBuf,

    pub category: LibraryCategory,
    pub identifier: Option<String>,

    #[serde(default)]
    pub objects: Vec<ObjectConfig>,

    /// Give the library shared backends for its bitcode members, as the link that produced it
    /// would have.
    #[serde(default)]
    pub shared_backends: bool,

    #[serde(default)]
    pub disable_whole_archive: bool,

    #[serde(default)]
    pub must_keep_debug: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct LinkstampConfig {
    /// A source file, relative to the workspace root.
    pub source: PathBuf,

    #[serde(default)]
    pub includes: Vec<PathBuf>,
}

impl LinkRequest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read `{}`", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse `{}`", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Plans the link against in-memory collaborators. Links with bitcode inputs go through LTO
    /// backend planning and, where allowed, indexing. Archives are never indexed; their bitcode
    /// gets shared backends on the output library instead.
    #[tracing::instrument(skip_all, name = "Plan request")]
    pub fn plan(&self) -> Result<LinkPlan> {
        let in_memory = InMemoryEnv {
            toolchain: self.toolchain.clone(),
            options: self.options.clone(),
            features: self.features.clone(),
            artifacts: DerivedArtifacts::new(&self.bin_directory),
            ..Default::default()
        };
        let builder = self
            .builder(in_memory.env())
            .with_context(|| format!("Failed to set up link for `{}`", self.target.owner))?;
        if builder.has_lto_bitcode_inputs() && !self.target.link_type.is_archiver() {
            builder.plan_lto_backends()?.plan_lto_indexing()?.build()
        } else {
            builder.build()
        }
    }

    fn builder<'a>(&self, env: LinkEnv<'a>) -> Result<LinkActionBuilder<'a>> {
        let bin = env.artifacts.bin_directory().to_owned();
        let target = &self.target;
        let output = env
            .artifacts
            .derived(&target.output, ArtifactSharing::OwnedByTarget);

        let mut builder = LinkActionBuilder::new(env, target.owner.clone(), output);
        builder
            .link_type(target.link_type)
            .linking_mode(target.linking_mode)
            .test_or_test_only(target.test_only)
            .use_test_only_flags(target.use_test_only_flags)
            .stamping(target.stamping)
            .native_deps(target.native_deps)
            .whole_archive(target.whole_archive)
            .use_pic_for_lto_backends(target.use_pic_for_lto_backends)
            .add_linkopts(target.linkopts.iter().cloned())
            .additional_linkstamp_defines(target.linkstamp_defines.clone());
        if let Some(identifier) = &target.identifier {
            builder.library_identifier(identifier.clone());
        }
        if let Some(interface_output) = &target.interface_output {
            builder.interface_output(
                env.artifacts
                    .derived(interface_output, ArtifactSharing::OwnedByTarget),
            );
        }
        if let Some(mnemonic) = &target.mnemonic {
            builder.mnemonic(mnemonic.clone());
        }

        let lto = lto_context(&bin, &self.objects);
        for object in &self.objects {
            builder.add_object(
                ObjectInput::new(object.artifact(&bin)).must_keep_debug(object.must_keep_debug),
            )?;
        }
        builder.lto_compilation_context(Arc::new(lto));

        for library in &self.libraries {
            builder.add_library(library.input(&env, &bin, target.use_pic_for_lto_backends)?)?;
        }

        for linkstamp in &self.linkstamps {
            builder.add_linkstamp(Linkstamp {
                source: Artifact::source(&linkstamp.source),
                declared_includes: linkstamp.includes.iter().map(Artifact::source).collect(),
            });
        }
        Ok(builder)
    }
}

impl ObjectConfig {
    fn artifact(&self, bin: &Path) -> Artifact {
        if self.tree {
            Artifact::tree(bin, &self.path)
        } else {
            Artifact::derived(bin, &self.path)
        }
    }
}

fn lto_context(bin: &Path, objects: &[ObjectConfig]) -> LtoCompilationContext {
    objects
        .iter()
        .filter(|object| object.bitcode)
        .fold(LtoCompilationContext::default(), |lto, object| {
            lto.with_bitcode(
                object.artifact(bin),
                BitcodeInfo {
                    minimized: object
                        .minimized
                        .as_ref()
                        .map(|path| Artifact::derived(bin, path)),
                    copts: object.copts.clone(),
                },
            )
        })
}

impl LibraryConfig {
    fn input(&self, env: &LinkEnv, bin: &Path, use_pic: bool) -> Result<LibraryInput> {
        let lto = Arc::new(lto_context(bin, &self.objects));
        let objects: Vec<Artifact> = self.objects.iter().map(|o| o.artifact(bin)).collect();

        let mut input = LibraryInput::new(Artifact::derived(bin, &self.path), self.category)
            .with_objects(objects.iter().cloned(), lto.clone())
            .disable_whole_archive(self.disable_whole_archive)
            .must_keep_debug(self.must_keep_debug);
        if let Some(identifier) = &self.identifier {
            input = input.identifier(identifier.clone());
        }
        if self.shared_backends {
            input =
                input.with_shared_backends(create_shared_backends(env, &lto, &objects, use_pic))?;
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str = r#"
        [target]
        owner = "//pkg:bin"
        output = "pkg/bin"
        link_type = "executable"

        [[objects]]
        path = "pkg/main.o"
        bitcode = true
        minimized = "pkg/main.o.min"

        [[libraries]]
        path = "lib/libdep.a"
        category = "static-library"
        objects = [{ path = "lib/dep.o" }]
    "#;

    #[test]
    fn parse_and_plan() {
        let request = LinkRequest::parse(REQUEST).unwrap();
        assert_eq!(request.bin_directory, Path::new("bin"));
        assert_eq!(request.target.linking_mode, LinkingMode::Static);

        let plan = request.plan().unwrap();
        let decision = plan.lto_decision.unwrap();
        assert!(decision.allow_lto_indexing);
        assert!(plan.lto_indexing.is_some());
        assert_eq!(plan.lto_backends.len(), 1);
        assert!(plan.to_toml().unwrap().contains("owner = \"//pkg:bin\""));
    }

    #[test]
    fn archive_with_bitcode() {
        let request = LinkRequest::parse(
            r#"
            [target]
            owner = "//dep:dep"
            output = "dep/libdep.a"
            link_type = "static-library"
            identifier = "dep/dep"

            [[objects]]
            path = "dep/dep.o"
            bitcode = true
            "#,
        )
        .unwrap();

        let plan = request.plan().unwrap();
        assert!(plan.lto_decision.is_none());
        assert!(plan.lto_indexing.is_none());
        let library = plan.output_library.unwrap();
        let shared = library.shared_backends().unwrap();
        assert_eq!(
            shared[&Artifact::derived("bin", "dep/dep.o")].object_file,
            Artifact::derived("bin", "shared.nonlto/dep/dep.o")
        );
    }

    #[test]
    fn unknown_fields_rejected() {
        let error = LinkRequest::parse("[target]\nowner = \"x\"\nbogus = 1\n").unwrap_err();
        assert!(format!("{error:?}").contains("bogus"));
    }
}
