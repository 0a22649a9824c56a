//! Assembling link actions. The same assembler builds the final link and the cut-down link that
//! the LTO indexer runs.

use crate::artifact::Artifact;
use crate::backend::BitcodeBackendArtifact;
use crate::backend::create_shared_backends;
use crate::bitcode::BitcodeMapping;
use crate::builder::LinkActionBuilder;
use crate::collector::LibrariesToLinkRequest;
use crate::collector::LibraryToLink;
use crate::error::Context as _;
use crate::error::Result;
use crate::features::Feature;
use crate::features::FeatureConfigurationExt as _;
use crate::inputs::LibraryCategory;
use crate::inputs::LibraryInput;
use crate::inputs::LinkerInput;
use crate::inputs::Linkstamp;
use crate::inputs::ObjectInput;
use crate::link_type::ActionName;
use crate::link_type::LinkTargetType;
use crate::linkstamp::LinkstampCompile;
use crate::linkstamp::LinkstampCompileTemplate;
use crate::linkstamp::compile_linkstamps;
use crate::linkstamp::map_linkstamps_to_outputs;
use crate::lto_plan::LtoDecision;
use crate::ordered_set::FixedIndexMap;
use crate::ordered_set::OrderedSet;
use crate::ordered_set::new_map;
use serde::Serialize;
use std::sync::Arc;

/// Stands in for the path of the parameter file on the command line. Whoever runs the action
/// replaces it.
pub const LINKER_PARAM_FILE_PLACEHOLDER: &str = "LINKER_PARAM_FILE_PLACEHOLDER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterFileType {
    Unquoted,
    GccQuoted,
    Windows,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceLibraryVariables {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<Artifact>,
    pub input: Artifact,
    pub output: Artifact,
}

/// The values that the toolchain's command line templates get expanded with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkVariables {
    pub output_execpath: String,
    pub is_linker: bool,
    pub is_transitive_dynamic_library: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_solib_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_library: Option<InterfaceLibraryVariables>,

    /// Final link of an indexed build: the objects that the indexer selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinlto_param_file: Option<Artifact>,

    /// Indexing link: where the indexer writes the selected objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinlto_indexing_param_file: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinlto_merged_object_file: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinlto_prefix_replace: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub linker_param_file: Option<String>,
    pub must_keep_debug: bool,
    pub use_test_only_flags: bool,
    pub user_link_flags: Vec<String>,
    pub libraries_to_link: Vec<LibraryToLink>,
    pub runtime_library_search_directories: OrderedSet<String>,
    pub library_search_directories: OrderedSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkCommandLine {
    pub action_name: ActionName,

    /// Whether arguments may be moved into a parameter file.
    pub split_command_line: bool,
    pub parameter_file_type: ParameterFileType,

    /// Runs this tool instead of the one in the toolchain's action config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_tool_path: Option<Artifact>,

    pub variables: LinkVariables,
}

/// A fully described link or indexing action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkAction {
    pub mnemonic: String,
    pub progress_message: String,

    /// In a stable order. The first input is the action's primary input.
    pub inputs: OrderedSet<Artifact>,
    pub outputs: OrderedSet<Artifact>,
    pub command_line: LinkCommandLine,
    pub environment: FixedIndexMap<String, String>,
    pub execution_info: FixedIndexMap<String, String>,
}

/// Everything that planning produced for one link target.
#[derive(Debug, Clone, Serialize)]
pub struct LinkPlan {
    pub owner: String,
    pub action: LinkAction,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lto_decision: Option<LtoDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lto_indexing: Option<LinkAction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lto_backends: Vec<Arc<BitcodeBackendArtifact>>,
    #[serde(skip_serializing_if = "BitcodeMapping::is_empty")]
    pub bitcode_mapping: BitcodeMapping,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub linkstamp_compiles: Vec<LinkstampCompile>,

    /// The output as seen by links that consume it. `None` for executables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_library: Option<LibraryInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_output_library: Option<LibraryInput>,
}

impl LinkPlan {
    pub fn inputs(&self) -> &OrderedSet<Artifact> {
        &self.action.inputs
    }

    pub fn outputs(&self) -> &OrderedSet<Artifact> {
        &self.action.outputs
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render link plan")
    }
}

/// What the indexing step hands to the final link.
pub(crate) struct IndexingOutputs {
    pub(crate) action: LinkAction,
    pub(crate) param_file: Artifact,
    pub(crate) merged_object: Artifact,
}

/// The parts of a link action that differ between the final link and the indexing link.
pub(crate) struct ActionRequest<'r> {
    pub(crate) action_name: ActionName,
    pub(crate) mnemonic: String,
    pub(crate) progress_message: String,
    pub(crate) objects: &'r OrderedSet<ObjectInput>,
    pub(crate) libraries: &'r OrderedSet<LibraryInput>,
    pub(crate) non_code_inputs: &'r OrderedSet<Artifact>,
    pub(crate) mapping: &'r BitcodeMapping,
    pub(crate) allow_lto_indexing: bool,
    pub(crate) linkstamp_outputs: &'r FixedIndexMap<Linkstamp, Artifact>,
    pub(crate) outputs: OrderedSet<Artifact>,

    /// Variables specific to this kind of action. Common variables get filled in by the assembler.
    pub(crate) variables: LinkVariables,
    pub(crate) user_link_flags: Vec<String>,
}

impl LinkActionBuilder<'_> {
    /// Plans a link without LTO. Bitcode inputs, if any, are passed to the linker as they are.
    #[tracing::instrument(skip_all, name = "Plan link")]
    pub fn build(self) -> Result<LinkPlan> {
        self.validate()?;
        self.build_final_link(None, BitcodeMapping::default(), Vec::new(), None)
    }

    #[tracing::instrument(skip_all, name = "Plan final link")]
    pub(crate) fn build_final_link(
        self,
        lto_decision: Option<LtoDecision>,
        mapping: BitcodeMapping,
        lto_backends: Vec<Arc<BitcodeBackendArtifact>>,
        indexing: Option<IndexingOutputs>,
    ) -> Result<LinkPlan> {
        let mut objects = self.objects.clone();
        let mut non_code_inputs = self.non_code_inputs.clone();
        let mut variables = LinkVariables {
            runtime_solib_name: self.soname(),
            interface_library: self.interface_output.as_ref().map(|interface| {
                InterfaceLibraryVariables {
                    builder: self.env.toolchain.link_dynamic_library_tool_artifact(),
                    input: self.output.clone(),
                    output: interface.clone(),
                }
            }),
            ..Default::default()
        };
        if let Some(indexing) = &indexing {
            objects.insert(ObjectInput::new(indexing.merged_object.clone()));
            non_code_inputs.insert(indexing.param_file.clone());
            variables.thinlto_param_file = Some(indexing.param_file.clone());
        }

        let linkstamp_outputs =
            map_linkstamps_to_outputs(&self.linkstamps, self.env.artifacts, &self.output);

        let combined_objects: OrderedSet<Artifact> = objects
            .iter()
            .map(|input| &input.artifact)
            .chain(linkstamp_outputs.values())
            .map(|artifact| mapping.map(artifact).clone())
            .collect();
        let (output_library, interface_output_library) =
            self.output_libraries(&combined_objects)?;

        let mut outputs = OrderedSet::new();
        outputs.insert(self.output.clone());
        outputs.extend(self.action_outputs.iter().cloned());
        outputs.extend(self.interface_output.iter().cloned());

        let user_link_flags = self
            .linkopts
            .iter()
            .chain(&self.env.options.linkopts)
            .cloned()
            .collect();

        let (action, linkstamp_compiles) = self
            .build_link_action(ActionRequest {
                action_name: self.link_type.action_name(),
                mnemonic: self.mnemonic.clone().unwrap_or_else(|| "CppLink".to_owned()),
                progress_message: format!("Linking {}", self.output),
                objects: &objects,
                libraries: &self.libraries,
                non_code_inputs: &non_code_inputs,
                mapping: &mapping,
                allow_lto_indexing: lto_decision.is_some_and(|d| d.allow_lto_indexing),
                linkstamp_outputs: &linkstamp_outputs,
                outputs,
                variables,
                user_link_flags,
            })
            .with_context(|| format!("Failed to plan link of `{}`", self.owner))?;

        tracing::debug!(
            output = %self.output,
            inputs = action.inputs.len(),
            backends = lto_backends.len(),
            "Planned link"
        );

        Ok(LinkPlan {
            owner: self.owner,
            action,
            lto_decision,
            lto_indexing: indexing.map(|indexing| indexing.action),
            lto_backends,
            bitcode_mapping: mapping,
            linkstamp_compiles,
            output_library,
            interface_output_library,
        })
    }

    /// How other links see what this link produces. Only archives carry their members, together
    /// with shared backends for the members that are bitcode.
    fn output_libraries(
        &self,
        combined_objects: &OrderedSet<Artifact>,
    ) -> Result<(Option<LibraryInput>, Option<LibraryInput>)> {
        let Some(category) = self.link_type.capabilities().output_category else {
            return Ok((None, None));
        };
        let identifier = self.library_identifier.clone().unwrap_or_default();

        let mut output_library =
            LibraryInput::new(self.output.clone(), category).identifier(identifier.clone());
        if self.link_type.is_archiver() {
            output_library =
                output_library.with_objects(combined_objects.iter().cloned(), self.lto.clone());
            if !self.lto.is_empty() {
                let shared_backends = create_shared_backends(
                    &self.env,
                    &self.lto,
                    self.objects.iter().map(|input| &input.artifact),
                    self.use_pic_for_lto_backends,
                );
                output_library = output_library.with_shared_backends(shared_backends)?;
            }
        }

        let interface_output_library = self.interface_output.as_ref().map(|interface| {
            LibraryInput::new(interface.clone(), LibraryCategory::DynamicLibrary)
                .identifier(identifier)
                .with_objects(combined_objects.iter().cloned(), self.lto.clone())
        });

        Ok((Some(output_library), interface_output_library))
    }

    /// The name the dynamic loader knows the output by. Nodeps libraries get a name derived from
    /// their whole path, since their base names aren't unique.
    fn soname(&self) -> Option<String> {
        if !self.link_type.is_dynamic_library() {
            return None;
        }
        let path = self.output.root_relative_path();
        if self.link_type == LinkTargetType::NodepsDynamicLibrary {
            Some(format!(
                "lib{}",
                escape_path(&format!("_{}", path.display()))
            ))
        } else {
            Some(self.output.filename().to_owned())
        }
    }

    fn can_split_command_line(&self) -> bool {
        if !self.env.toolchain.supports_param_files {
            return false;
        }
        let features = self.env.features;
        match self.link_type {
            // Dynamic libraries with interface outputs can't be split, except on Windows.
            LinkTargetType::DynamicLibrary | LinkTargetType::NodepsDynamicLibrary => {
                self.interface_output.is_none() || features.enabled(Feature::TargetsWindows)
            }
            LinkTargetType::Executable | LinkTargetType::ObjcExecutable => true,
            LinkTargetType::StaticLibrary
            | LinkTargetType::PicStaticLibrary
            | LinkTargetType::AlwaysLinkStaticLibrary
            | LinkTargetType::AlwaysLinkPicStaticLibrary
            | LinkTargetType::ObjcFullyLinkedArchive => features.enabled(Feature::ArchiveParamFile),
            LinkTargetType::InterfaceDynamicLibrary => false,
        }
    }

    fn parameter_file_type(&self) -> ParameterFileType {
        let features = self.env.features;
        if features.enabled(Feature::GccQuotingForParamFiles) {
            ParameterFileType::GccQuoted
        } else if features.enabled(Feature::WindowsQuotingForParamFiles) {
            ParameterFileType::Windows
        } else {
            ParameterFileType::Unquoted
        }
    }

    /// Builds one link action and registers the link's linkstamp compiles.
    pub(crate) fn build_link_action(
        &self,
        request: ActionRequest,
    ) -> Result<(LinkAction, Vec<LinkstampCompile>)> {
        let need_whole_archive = self.need_whole_archive();

        // Linkstamps sharing a source share an object, which must only be linked once.
        let linkstamp_objects: OrderedSet<Artifact> =
            request.linkstamp_outputs.values().cloned().collect();
        let linkstamp_objects = linkstamp_objects
            .into_iter()
            .map(|output| LinkerInput::Object(ObjectInput::new(output)));
        // Runtime libraries go last and are never whole-archived.
        let runtime_libraries = self.runtime_libraries.iter().map(|artifact| {
            LinkerInput::Library(
                LibraryInput::new(artifact.clone(), self.runtime_library_category)
                    .disable_whole_archive(true),
            )
        });
        let non_expanded_inputs: Vec<LinkerInput> = request
            .objects
            .iter()
            .cloned()
            .map(LinkerInput::Object)
            .chain(linkstamp_objects)
            .chain(request.libraries.iter().cloned().map(LinkerInput::Library))
            .chain(runtime_libraries)
            .collect();

        let solib_dir = self
            .env
            .artifacts
            .bin_directory()
            .join(&self.env.toolchain.solib_directory);
        let toolchain_libraries_solib_dir = if self.link_type.is_archiver() {
            None
        } else {
            self.toolchain_libraries_solib_dir.as_deref()
        };
        let collected = self
            .env
            .libraries_to_link
            .collect(&LibrariesToLinkRequest {
                inputs: &non_expanded_inputs,
                need_whole_archive,
                lto_mapping: request.mapping,
                allow_lto_indexing: request.allow_lto_indexing,
                native_deps: self.native_deps,
                link_type: self.link_type,
                linking_mode: self.linking_mode,
                output: &self.output,
                solib_dir: &solib_dir,
                toolchain_libraries_solib_dir,
                features: self.env.features,
            })
            .context("Failed to collect libraries to link")?;

        let split_command_line = self.can_split_command_line();
        let use_tool = self.use_link_dynamic_library_tool();
        let forced_tool_path = if use_tool {
            self.env.toolchain.link_dynamic_library_tool_artifact()
        } else {
            None
        };
        tracing::debug!(split_command_line, use_tool, "Command line");

        let mut variables = request.variables;
        variables.output_execpath = self.output.exec_path().display().to_string();
        variables.is_linker = !self.link_type.is_archiver();
        variables.is_transitive_dynamic_library = self.link_type == LinkTargetType::DynamicLibrary;
        variables.linker_param_file =
            split_command_line.then(|| LINKER_PARAM_FILE_PLACEHOLDER.to_owned());
        variables.must_keep_debug = self.must_keep_debug;
        variables.use_test_only_flags = self.use_test_only_flags;
        variables.user_link_flags = request.user_link_flags;
        variables.libraries_to_link = collected.libraries_to_link;
        variables.runtime_library_search_directories = collected.runtime_library_search_directories;
        variables.library_search_directories = collected.library_search_directories;

        let mut inputs: OrderedSet<Artifact> = collected
            .expanded_linker_inputs
            .iter()
            .map(|input| request.mapping.map(input.artifact()).clone())
            .collect();
        inputs.extend(request.non_code_inputs.iter().cloned());
        inputs.extend(self.linker_files.iter().cloned());
        inputs.extend(self.action_inputs.iter().cloned());
        inputs.extend(forced_tool_path.iter().cloned());

        let action_name = request.action_name.as_str();
        let mut environment = new_map();
        environment.extend(self.env.features.environment(action_name));
        let mut execution_info = self.execution_info.clone();
        if self.env.features.configured(request.action_name) {
            for requirement in self.env.features.tool_requirements(action_name) {
                execution_info.insert(requirement, String::new());
            }
        }

        let mut linkstamp_compiles = Vec::new();
        if !request.linkstamp_outputs.is_empty() {
            let template = LinkstampCompileTemplate {
                build_info_headers: self.env.toolchain.build_info_artifacts(self.stamping),
                inputs: inputs.iter().cloned().collect(),
                additional_defines: self.additional_linkstamp_defines.clone(),
                use_pic: self.env.options.force_pic
                    || (self.link_type.is_dynamic_library()
                        && self.env.features.enabled(Feature::SupportsPic)),
                label_replacement: if self.native_deps && self.env.options.share_native_deps {
                    self.output.exec_path().display().to_string()
                } else {
                    self.owner.clone()
                },
                output_replacement: self.output.exec_path().display().to_string(),
            };
            linkstamp_compiles = compile_linkstamps(
                self.env.linkstamp_compiler,
                request.linkstamp_outputs,
                &template,
            )?;
            inputs.extend(request.linkstamp_outputs.values().cloned());
            inputs.extend(
                request
                    .linkstamp_outputs
                    .values()
                    .map(|output| request.mapping.map(output).clone()),
            );
        }

        let action = LinkAction {
            mnemonic: request.mnemonic,
            progress_message: request.progress_message,
            inputs,
            outputs: request.outputs,
            command_line: LinkCommandLine {
                action_name: request.action_name,
                split_command_line,
                parameter_file_type: self.parameter_file_type(),
                forced_tool_path,
                variables,
            },
            environment,
            execution_info,
        };
        Ok((action, linkstamp_compiles))
    }
}

/// Makes a path usable as a single file name without losing information.
fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '_' => escaped.push_str("_U"),
            '/' => escaped.push_str("_S"),
            '\\' => escaped.push_str("_B"),
            ':' => escaped.push_str("_C"),
            '@' => escaped.push_str("_A"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::InMemoryEnv;
    use crate::features::StaticFeatures;
    use rstest::rstest;

    fn a(path: &str) -> Artifact {
        Artifact::derived("bin", path)
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_path("_pkg/lib_x.so"), "_Upkg_Slib_Ux.so");
        assert_eq!(escape_path("@repo//a:b\\c"), "_Arepo_S_Sa_Cb_Bc");
    }

    #[test]
    fn soname() {
        let in_memory = InMemoryEnv::default();
        let mut builder = LinkActionBuilder::new(in_memory.env(), "//pkg:x", a("pkg/libx.so"));
        builder.link_type(LinkTargetType::DynamicLibrary);
        assert_eq!(builder.soname().as_deref(), Some("libx.so"));
        builder.link_type(LinkTargetType::NodepsDynamicLibrary);
        assert_eq!(builder.soname().as_deref(), Some("lib_Upkg_Slibx.so"));
        builder.link_type(LinkTargetType::StaticLibrary);
        assert_eq!(builder.soname(), None);
    }

    #[rstest]
    #[case::executable(LinkTargetType::Executable, false, StaticFeatures::default(), true)]
    #[case::dynamic(LinkTargetType::DynamicLibrary, false, StaticFeatures::default(), true)]
    #[case::dynamic_with_interface(
        LinkTargetType::DynamicLibrary,
        true,
        StaticFeatures::default(),
        false
    )]
    #[case::dynamic_with_interface_on_windows(
        LinkTargetType::NodepsDynamicLibrary,
        true,
        StaticFeatures::default().enable(Feature::TargetsWindows),
        true
    )]
    #[case::archive(LinkTargetType::StaticLibrary, false, StaticFeatures::default(), false)]
    #[case::archive_with_param_file(
        LinkTargetType::PicStaticLibrary,
        false,
        StaticFeatures::default().enable(Feature::ArchiveParamFile),
        true
    )]
    fn split_command_line(
        #[case] link_type: LinkTargetType,
        #[case] interface: bool,
        #[case] features: StaticFeatures,
        #[case] expected: bool,
    ) {
        let in_memory = InMemoryEnv {
            features,
            ..Default::default()
        };
        let mut builder = LinkActionBuilder::new(in_memory.env(), "//pkg:x", a("pkg/x"));
        builder.link_type(link_type);
        if interface {
            builder.interface_output(a("pkg/libx.ifso"));
        }
        assert_eq!(builder.can_split_command_line(), expected);
    }

    #[test]
    fn no_split_without_param_file_support() {
        let mut in_memory = InMemoryEnv::default();
        in_memory.toolchain.supports_param_files = false;
        let mut builder = LinkActionBuilder::new(in_memory.env(), "//pkg:x", a("pkg/x"));
        builder.link_type(LinkTargetType::Executable);
        assert!(!builder.can_split_command_line());
    }

    #[rstest]
    #[case(StaticFeatures::default(), ParameterFileType::Unquoted)]
    #[case(
        StaticFeatures::default().enable(Feature::WindowsQuotingForParamFiles),
        ParameterFileType::Windows
    )]
    #[case(
        StaticFeatures::default()
            .enable(Feature::WindowsQuotingForParamFiles)
            .enable(Feature::GccQuotingForParamFiles),
        ParameterFileType::GccQuoted
    )]
    fn quoting(#[case] features: StaticFeatures, #[case] expected: ParameterFileType) {
        let in_memory = InMemoryEnv {
            features,
            ..Default::default()
        };
        let builder = LinkActionBuilder::new(in_memory.env(), "//pkg:x", a("pkg/x"));
        assert_eq!(builder.parameter_file_type(), expected);
    }

    #[test]
    fn execution_info_includes_tool_requirements() {
        let mut features = StaticFeatures::with_all_actions();
        features.tool_requirements.insert(
            "c++-link-executable".to_owned(),
            vec!["requires-darwin".to_owned()],
        );
        features.environment.insert(
            "c++-link-executable".to_owned(),
            [("PATH".to_owned(), "/usr/bin".to_owned())].into(),
        );
        let in_memory = InMemoryEnv {
            features,
            ..Default::default()
        };
        let mut builder = LinkActionBuilder::new(in_memory.env(), "//pkg:bin", a("pkg/bin"));
        builder
            .link_type(LinkTargetType::Executable)
            .add_execution_info([("no-remote".to_owned(), "1".to_owned())]);
        builder.add_object_file(a("pkg/main.o")).unwrap();
        let plan = builder.build().unwrap();
        assert_eq!(
            plan.action.execution_info.iter().collect::<Vec<_>>(),
            [
                (&"no-remote".to_owned(), &"1".to_owned()),
                (&"requires-darwin".to_owned(), &String::new()),
            ]
        );
        assert_eq!(
            plan.action.environment.get("PATH").map(String::as_str),
            Some("/usr/bin")
        );
    }

    #[test]
    fn interface_library_tool_replaces_linker() {
        let mut in_memory = InMemoryEnv {
            features: StaticFeatures::with_all_actions()
                .enable(Feature::SupportsInterfaceSharedLibraries),
            ..Default::default()
        };
        in_memory.toolchain.link_dynamic_library_tool =
            Some("tools/link_dynamic_library.sh".into());
        let mut builder = LinkActionBuilder::new(in_memory.env(), "//pkg:x", a("pkg/libx.so"));
        builder
            .link_type(LinkTargetType::DynamicLibrary)
            .library_identifier("pkg/x")
            .interface_output(a("pkg/libx.ifso"));
        builder.add_object_file(a("pkg/x.o")).unwrap();
        let plan = builder.build().unwrap();

        let tool = Artifact::source("tools/link_dynamic_library.sh");
        assert_eq!(plan.action.command_line.forced_tool_path.as_ref(), Some(&tool));
        assert!(plan.inputs().contains(&tool));
        assert!(!plan.action.command_line.split_command_line);
        assert!(plan.outputs().contains(&a("pkg/libx.ifso")));
        let interface = plan.interface_output_library.unwrap();
        assert_eq!(interface.category, LibraryCategory::DynamicLibrary);
        assert_eq!(
            interface.objects.iter().collect::<Vec<_>>(),
            [&a("pkg/x.o")]
        );
        assert_eq!(
            plan.action.command_line.variables.interface_library,
            Some(InterfaceLibraryVariables {
                builder: Some(tool),
                input: a("pkg/libx.so"),
                output: a("pkg/libx.ifso"),
            })
        );
    }

    #[test]
    fn archive_output_carries_members() {
        let in_memory = InMemoryEnv::default();
        let mut builder = LinkActionBuilder::new(in_memory.env(), "//pkg:x", a("pkg/libx.a"));
        builder.library_identifier("pkg/x");
        builder
            .add_object_files([a("pkg/x.o"), a("pkg/y.o")])
            .unwrap();
        let plan = builder.build().unwrap();
        let library = plan.output_library.unwrap();
        assert_eq!(library.category, LibraryCategory::StaticLibrary);
        assert_eq!(library.identifier, "pkg/x");
        assert_eq!(library.objects.len(), 2);
        assert!(library.shared_backends().is_none());
        assert!(!plan.action.command_line.variables.is_linker);
        assert_eq!(plan.action.mnemonic, "CppLink");
        assert_eq!(plan.action.progress_message, "Linking bin/pkg/libx.a");
    }
}
