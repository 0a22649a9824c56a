//! Turning the raw linker inputs into what the command line lists, in link order.

use crate::artifact::Artifact;
use crate::bitcode::BitcodeMapping;
use crate::error::Result;
use crate::features::Feature;
use crate::features::FeatureConfiguration;
use crate::features::FeatureConfigurationExt as _;
use crate::inputs::LibraryCategory;
use crate::inputs::LibraryInput;
use crate::inputs::LinkerInput;
use crate::inputs::ObjectInput;
use crate::link_type::LinkTargetType;
use crate::link_type::LinkingMode;
use crate::ordered_set::OrderedSet;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Everything the collector is given for one link.
pub struct LibrariesToLinkRequest<'a> {
    /// Objects, linkstamp objects, libraries and toolchain runtime libraries, in that order.
    pub inputs: &'a [LinkerInput],
    pub need_whole_archive: bool,
    pub lto_mapping: &'a BitcodeMapping,

    /// Whether the link is the final link of an indexed ThinLTO build. The indexer lists the
    /// unique backend objects that it selected in a parameter file, so they don't get listed
    /// again. Shared backend objects are still listed.
    pub allow_lto_indexing: bool,

    pub native_deps: bool,
    pub link_type: LinkTargetType,
    pub linking_mode: LinkingMode,
    pub output: &'a Artifact,
    pub solib_dir: &'a Path,
    pub toolchain_libraries_solib_dir: Option<&'a Path>,
    pub features: &'a dyn FeatureConfiguration,
}

/// One entry of the library list that the command line is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LibraryToLink {
    ObjectFile {
        path: Artifact,
    },
    /// The members of a static library, listed individually between `--start-lib` and
    /// `--end-lib`.
    ObjectFileGroup {
        paths: Vec<Artifact>,
        whole_archive: bool,
    },
    StaticLibrary {
        path: Artifact,
        whole_archive: bool,
    },
    /// A dynamic library that can be found via the library search path, passed as `-l<name>`.
    DynamicLibrary {
        name: String,
    },
    /// A dynamic library whose name doesn't follow the `lib<name>.so` pattern, passed by path.
    VersionedDynamicLibrary {
        path: Artifact,
    },
    InterfaceLibrary {
        path: Artifact,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectedLibrariesToLink {
    /// The inputs after static libraries have been expanded into their members where the linker
    /// sees them individually.
    #[serde(skip)]
    pub expanded_linker_inputs: Vec<LinkerInput>,
    pub libraries_to_link: Vec<LibraryToLink>,
    pub runtime_library_search_directories: OrderedSet<String>,
    pub library_search_directories: OrderedSet<String>,
}

pub trait LibrariesToLinkCollector {
    fn collect(&self, request: &LibrariesToLinkRequest<'_>) -> Result<CollectedLibrariesToLink>;
}

/// Lists inputs directly, without the solib symlink tree that a full build system would set up.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLibrariesToLink;

impl LibrariesToLinkCollector for DefaultLibrariesToLink {
    #[tracing::instrument(skip_all, name = "Collect libraries to link")]
    fn collect(&self, request: &LibrariesToLinkRequest<'_>) -> Result<CollectedLibrariesToLink> {
        let mut collected = CollectedLibrariesToLink::default();
        let start_end_lib = request.features.enabled(Feature::SupportsStartEndLib);
        let output_dir = request
            .output
            .exec_path()
            .parent()
            .map(Path::to_owned)
            .unwrap_or_default();

        // Archives just contain objects, so there's nothing to search for at runtime.
        if !request.link_type.is_archiver() {
            if let Some(dir) = request.toolchain_libraries_solib_dir {
                collected
                    .runtime_library_search_directories
                    .insert(origin_relative(&output_dir, dir));
            }
            if request.linking_mode == LinkingMode::Dynamic || request.native_deps {
                collected
                    .runtime_library_search_directories
                    .insert(origin_relative(&output_dir, request.solib_dir));
            }
        }

        for input in request.inputs {
            match input {
                LinkerInput::Object(object) => {
                    collected
                        .expanded_linker_inputs
                        .push(LinkerInput::Object(object.clone()));
                    if let Some(path) = command_line_object(request, &object.artifact) {
                        collected
                            .libraries_to_link
                            .push(LibraryToLink::ObjectFile { path });
                    }
                }
                LinkerInput::Library(lib) if lib.category.is_static() => {
                    add_static_library(request, lib, start_end_lib, &mut collected);
                }
                LinkerInput::Library(lib) => {
                    collected
                        .expanded_linker_inputs
                        .push(LinkerInput::Library(lib.clone()));
                    add_dynamic_library(request, lib, &output_dir, &mut collected);
                }
            }
        }
        Ok(collected)
    }
}

/// Where the command line should refer to `artifact`, if anywhere.
fn command_line_object(request: &LibrariesToLinkRequest, artifact: &Artifact) -> Option<Artifact> {
    if request.allow_lto_indexing && request.lto_mapping.is_indexed(artifact) {
        return None;
    }
    Some(request.lto_mapping.map(artifact).clone())
}

fn add_static_library(
    request: &LibrariesToLinkRequest,
    lib: &LibraryInput,
    start_end_lib: bool,
    collected: &mut CollectedLibrariesToLink,
) {
    let whole_archive = !lib.disable_whole_archive
        && (request.need_whole_archive || lib.category.is_always_link());
    let has_mapped_members = lib
        .objects
        .iter()
        .any(|object| request.lto_mapping.contains(object));

    if lib.contains_object_files() && (start_end_lib || has_mapped_members) {
        for object in &lib.objects {
            collected
                .expanded_linker_inputs
                .push(LinkerInput::Object(ObjectInput::new(object.clone())));
        }
        let paths: Vec<Artifact> = lib
            .objects
            .iter()
            .filter_map(|object| command_line_object(request, object))
            .collect();
        if !paths.is_empty() {
            collected
                .libraries_to_link
                .push(LibraryToLink::ObjectFileGroup {
                    paths,
                    whole_archive,
                });
        }
    } else {
        collected
            .expanded_linker_inputs
            .push(LinkerInput::Library(lib.clone()));
        collected
            .libraries_to_link
            .push(LibraryToLink::StaticLibrary {
                path: lib.artifact.clone(),
                whole_archive,
            });
    }
}

static SHARED_LIBRARY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^lib(.+)\.(so|dylib)$").unwrap());

fn add_dynamic_library(
    request: &LibrariesToLinkRequest,
    lib: &LibraryInput,
    output_dir: &Path,
    collected: &mut CollectedLibrariesToLink,
) {
    let lib_dir = lib
        .artifact
        .exec_path()
        .parent()
        .map(Path::to_owned)
        .unwrap_or_default();
    if !request.link_type.is_archiver() {
        collected
            .runtime_library_search_directories
            .insert(origin_relative(output_dir, &lib_dir));
    }

    if lib.category == LibraryCategory::InterfaceLibrary {
        collected
            .libraries_to_link
            .push(LibraryToLink::InterfaceLibrary {
                path: lib.artifact.clone(),
            });
        return;
    }

    let name = SHARED_LIBRARY_NAME
        .captures(lib.artifact.filename())
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_owned());
    match name {
        Some(name) => {
            collected
                .library_search_directories
                .insert(lib_dir.display().to_string());
            collected
                .libraries_to_link
                .push(LibraryToLink::DynamicLibrary { name });
        }
        None => collected
            .libraries_to_link
            .push(LibraryToLink::VersionedDynamicLibrary {
                path: lib.artifact.clone(),
            }),
    }
}

/// A runtime search path for `dir` that works wherever the output ends up, as long as the
/// directory layout is kept.
fn origin_relative(output_dir: &Path, dir: &Path) -> String {
    let relative = pathdiff::diff_paths(dir, output_dir).unwrap_or_else(|| PathBuf::from(dir));
    if relative.as_os_str().is_empty() {
        "$ORIGIN".to_owned()
    } else {
        format!("$ORIGIN/{}", relative.display())
    }
}
