//! Accumulates the inputs of one link. Once a phase method is called, the builder is consumed and
//! nothing more can be added.

use crate::artifact::Artifact;
use crate::artifact::file_types;
use crate::env::LinkEnv;
use crate::error::Context as _;
use crate::error::Result;
use crate::features::Feature;
use crate::features::FeatureConfigurationExt as _;
use crate::inputs::LibraryCategory;
use crate::inputs::LibraryInput;
use crate::inputs::Linkstamp;
use crate::inputs::LtoCompilationContext;
use crate::inputs::ObjectInput;
use crate::link_type::LinkTargetType;
use crate::link_type::LinkingMode;
use crate::ordered_set::FixedIndexMap;
use crate::ordered_set::OrderedSet;
use crate::ordered_set::new_map;
use crate::plan_bail;
use crate::plan_ensure;
use crate::whole_archive::WholeArchiveInputs;
use crate::whole_archive::need_whole_archive;
use std::path::PathBuf;
use std::sync::Arc;

pub struct LinkActionBuilder<'a> {
    pub(crate) env: LinkEnv<'a>,

    /// Label of the target that owns the link, for diagnostics and linkstamps.
    pub(crate) owner: String,

    pub(crate) output: Artifact,
    pub(crate) interface_output: Option<Artifact>,
    pub(crate) link_type: LinkTargetType,
    pub(crate) linking_mode: LinkingMode,
    pub(crate) library_identifier: Option<String>,
    pub(crate) mnemonic: Option<String>,

    pub(crate) objects: OrderedSet<ObjectInput>,
    pub(crate) non_code_inputs: OrderedSet<Artifact>,
    pub(crate) libraries: OrderedSet<LibraryInput>,
    pub(crate) linkstamps: OrderedSet<Linkstamp>,
    pub(crate) additional_linkstamp_defines: Vec<String>,
    pub(crate) linkopts: Vec<String>,
    pub(crate) lto: Arc<LtoCompilationContext>,

    pub(crate) runtime_library_category: LibraryCategory,
    pub(crate) runtime_libraries: Vec<Artifact>,
    pub(crate) linker_files: Vec<Artifact>,

    /// Where the dynamic language runtime libraries live, if the runtime search path should
    /// include them.
    pub(crate) toolchain_libraries_solib_dir: Option<PathBuf>,

    pub(crate) native_deps: bool,
    pub(crate) whole_archive: bool,
    pub(crate) must_keep_debug: bool,
    pub(crate) use_test_only_flags: bool,
    pub(crate) test_or_test_only: bool,
    pub(crate) stamping: bool,
    pub(crate) use_pic_for_lto_backends: bool,

    pub(crate) action_inputs: OrderedSet<Artifact>,
    pub(crate) action_outputs: OrderedSet<Artifact>,
    pub(crate) execution_info: FixedIndexMap<String, String>,
}

impl<'a> LinkActionBuilder<'a> {
    pub fn new(env: LinkEnv<'a>, owner: impl Into<String>, output: Artifact) -> Self {
        let toolchain_libraries_solib_dir = if env.features.enabled(Feature::StaticLinkCppRuntimes)
        {
            env.toolchain.dynamic_runtime_solib_dir.clone()
        } else {
            None
        };
        Self {
            owner: owner.into(),
            output,
            interface_output: None,
            link_type: LinkTargetType::StaticLibrary,
            linking_mode: LinkingMode::Static,
            library_identifier: None,
            mnemonic: None,
            objects: OrderedSet::new(),
            non_code_inputs: OrderedSet::new(),
            libraries: OrderedSet::new(),
            linkstamps: OrderedSet::new(),
            additional_linkstamp_defines: Vec::new(),
            linkopts: Vec::new(),
            lto: Arc::default(),
            runtime_library_category: env.toolchain.runtime_library_category,
            runtime_libraries: env.toolchain.runtime_library_artifacts(),
            linker_files: env.toolchain.linker_file_artifacts(),
            toolchain_libraries_solib_dir,
            native_deps: false,
            whole_archive: false,
            must_keep_debug: false,
            use_test_only_flags: false,
            test_or_test_only: false,
            stamping: false,
            use_pic_for_lto_backends: false,
            action_inputs: OrderedSet::new(),
            action_outputs: OrderedSet::new(),
            execution_info: new_map(),
            env,
        }
    }

    pub fn link_type(&mut self, link_type: LinkTargetType) -> &mut Self {
        self.link_type = link_type;
        self
    }

    pub fn linking_mode(&mut self, linking_mode: LinkingMode) -> &mut Self {
        self.linking_mode = linking_mode;
        self
    }

    pub fn library_identifier(&mut self, identifier: impl Into<String>) -> &mut Self {
        self.library_identifier = Some(identifier.into());
        self
    }

    pub fn interface_output(&mut self, interface_output: Artifact) -> &mut Self {
        self.interface_output = Some(interface_output);
        self
    }

    pub fn mnemonic(&mut self, mnemonic: impl Into<String>) -> &mut Self {
        self.mnemonic = Some(mnemonic.into());
        self
    }

    pub fn add_object(&mut self, input: ObjectInput) -> Result<&mut Self> {
        let name = input.artifact.filename();
        plan_ensure!(
            input.artifact.is_tree_artifact() || file_types::is_object_file(name),
            Programming,
            "`{}` is not an object file",
            input.artifact
        );
        self.must_keep_debug |= input.must_keep_debug;
        self.objects.insert(input);
        Ok(self)
    }

    pub fn add_object_file(&mut self, artifact: Artifact) -> Result<&mut Self> {
        self.add_object(ObjectInput::new(artifact))
    }

    pub fn add_object_files(
        &mut self,
        artifacts: impl IntoIterator<Item = Artifact>,
    ) -> Result<&mut Self> {
        for artifact in artifacts {
            self.add_object_file(artifact)?;
        }
        Ok(self)
    }

    pub fn add_non_code_input(&mut self, artifact: Artifact) -> &mut Self {
        self.non_code_inputs.insert(artifact);
        self
    }

    pub fn add_library(&mut self, input: LibraryInput) -> Result<&mut Self> {
        let name = input.artifact.filename();
        plan_ensure!(
            file_types::is_archive(name) || file_types::is_shared_library(name),
            Programming,
            "`{}` is not a library file",
            input.artifact
        );
        self.must_keep_debug |= input.must_keep_debug;
        self.libraries.insert(input);
        Ok(self)
    }

    pub fn add_libraries(
        &mut self,
        inputs: impl IntoIterator<Item = LibraryInput>,
    ) -> Result<&mut Self> {
        for input in inputs {
            self.add_library(input)?;
        }
        Ok(self)
    }

    pub fn add_linkstamp(&mut self, linkstamp: Linkstamp) -> &mut Self {
        self.linkstamps.insert(linkstamp);
        self
    }

    pub fn additional_linkstamp_defines(&mut self, defines: Vec<String>) -> &mut Self {
        self.additional_linkstamp_defines = defines;
        self
    }

    pub fn add_linkopts(&mut self, linkopts: impl IntoIterator<Item = String>) -> &mut Self {
        self.linkopts.extend(linkopts);
        self
    }

    pub fn lto_compilation_context(&mut self, lto: Arc<LtoCompilationContext>) -> &mut Self {
        self.lto = lto;
        self
    }

    /// Replaces the toolchain's runtime libraries.
    pub fn runtime_inputs(
        &mut self,
        category: LibraryCategory,
        libraries: impl IntoIterator<Item = Artifact>,
    ) -> &mut Self {
        self.runtime_library_category = category;
        self.runtime_libraries = libraries.into_iter().collect();
        self
    }

    pub fn linker_files(&mut self, files: impl IntoIterator<Item = Artifact>) -> &mut Self {
        self.linker_files = files.into_iter().collect();
        self
    }

    pub fn toolchain_libraries_solib_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.toolchain_libraries_solib_dir = Some(dir.into());
        self
    }

    /// Marks the output as a library that bundles a target's native dependencies.
    pub fn native_deps(&mut self, native_deps: bool) -> &mut Self {
        self.native_deps = native_deps;
        self
    }

    pub fn whole_archive(&mut self, whole_archive: bool) -> &mut Self {
        self.whole_archive = whole_archive;
        self
    }

    pub fn use_test_only_flags(&mut self, value: bool) -> &mut Self {
        self.use_test_only_flags = value;
        self
    }

    pub fn test_or_test_only(&mut self, value: bool) -> &mut Self {
        self.test_or_test_only = value;
        self
    }

    pub fn stamping(&mut self, stamping: bool) -> &mut Self {
        self.stamping = stamping;
        self
    }

    pub fn use_pic_for_lto_backends(&mut self, use_pic: bool) -> &mut Self {
        self.use_pic_for_lto_backends = use_pic;
        self
    }

    pub fn add_action_input(&mut self, artifact: Artifact) -> &mut Self {
        self.action_inputs.insert(artifact);
        self
    }

    pub fn add_action_output(&mut self, artifact: Artifact) -> &mut Self {
        self.action_outputs.insert(artifact);
        self
    }

    pub fn add_execution_info(
        &mut self,
        info: impl IntoIterator<Item = (String, String)>,
    ) -> &mut Self {
        self.execution_info.extend(info);
        self
    }

    /// The default whole-archive decision combined with the caller's explicit request.
    pub(crate) fn need_whole_archive(&self) -> bool {
        need_whole_archive(
            self.whole_archive,
            &WholeArchiveInputs::new(
                self.link_type,
                &self.linkopts,
                self.linking_mode,
                self.env.options,
                self.env.features,
            ),
        )
    }

    /// Whether the toolchain's interface library builder replaces the linker for this link.
    pub(crate) fn use_link_dynamic_library_tool(&self) -> bool {
        self.link_type.is_dynamic_library()
            && self
                .env
                .features
                .enabled(Feature::SupportsInterfaceSharedLibraries)
            && !self
                .env
                .features
                .has_configured_linker_path(self.link_type.action_name().as_str())
    }

    /// Checks everything about the link that can be checked before any artifact is declared.
    pub(crate) fn validate(&self) -> Result {
        self.validate_inner()
            .with_context(|| format!("Invalid link of `{}` for `{}`", self.output, self.owner))
    }

    fn validate_inner(&self) -> Result {
        let is_executable = self.link_type.is_executable();
        plan_ensure!(
            self.library_identifier.is_some() != is_executable,
            Programming,
            "Executables must not have a library identifier and everything else must"
        );
        if self.interface_output.is_some() && !self.link_type.is_dynamic_library() {
            plan_bail!(
                Usage,
                "Interface output can only be used with dynamic library targets, not {:?}",
                self.link_type
            );
        }
        plan_ensure!(
            self.link_type != LinkTargetType::InterfaceDynamicLibrary,
            Programming,
            "Interface dynamic libraries can't be linked directly"
        );
        let action_name = self.link_type.action_name();
        plan_ensure!(
            self.env.features.configured(action_name),
            Configuration,
            "Expected action_config for '{action_name}' to be configured"
        );
        if self.link_type.is_archiver() {
            plan_ensure!(
                self.linking_mode == LinkingMode::Static,
                Programming,
                "Static library link must be static"
            );
            plan_ensure!(
                !self.native_deps,
                Programming,
                "The native deps flag must be false for static links"
            );
            plan_ensure!(
                !self.need_whole_archive(),
                Programming,
                "Whole-archive must be off for static links"
            );
        }
        if self.use_link_dynamic_library_tool() {
            plan_ensure!(
                self.env.toolchain.link_dynamic_library_tool.is_some(),
                Configuration,
                "Feature supports_interface_shared_libraries is enabled, but the toolchain has no \
                 link_dynamic_library_tool"
            );
        }
        Ok(())
    }
}
