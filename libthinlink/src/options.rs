//! Build-wide configuration that link planning reads but never changes.

use crate::artifact::Artifact;
use crate::error::Context as _;
use crate::error::Result;
use crate::inputs::LibraryCategory;
use anyhow::bail;
use regex::Regex;
use serde::Deserialize;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Build-wide C++ options that affect linking.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CppOptions {
    /// Flags passed to every link, after the target's own link options.
    pub linkopts: Vec<String>,

    /// Flags passed to every LTO backend compile.
    pub lto_backend_options: Vec<String>,

    /// Flags passed to every LTO indexing link.
    pub lto_index_options: Vec<String>,

    /// Backend flags that only apply to some bitcode files.
    pub per_file_lto_backend_opts: Vec<PerFileOptions>,

    /// Use `--whole-archive` for static libraries in links that produce something shared.
    pub legacy_whole_archive: bool,

    /// Never use legacy whole-archive, regardless of features and `legacy_whole_archive`.
    pub incompatible_remove_legacy_whole_archive: bool,

    pub force_pic: bool,

    /// Whether native-deps libraries are shared between the targets that need them.
    pub share_native_deps: bool,

    /// Whether debug info is split into per-object `.dwo` files.
    pub fission: bool,
}

impl CppOptions {
    pub fn has_shared_link_option(&self) -> bool {
        self.linkopts.iter().any(|opt| opt == "-shared")
    }

    /// Options from `per_file_lto_backend_opts` that apply to `artifact`, in declaration order.
    pub fn per_file_lto_backend_opts(&self, artifact: &Artifact) -> impl Iterator<Item = &str> {
        let exec_path = artifact.exec_path();
        let exec_path = exec_path.to_string_lossy().into_owned();
        self.per_file_lto_backend_opts
            .iter()
            .filter(move |opts| opts.is_included(&exec_path))
            .flat_map(|opts| opts.options.iter().map(String::as_str))
    }
}

/// A set of options together with the files they apply to. Parsed from
/// `<filter>[,<filter>...]@<option>[,<option>...]`. Each filter is a regular expression that's
/// searched for in the file's exec path. Filters starting with `-` exclude. A file is included if
/// it matches any inclusion (or there are none) and no exclusion.
#[derive(Debug, Clone)]
pub struct PerFileOptions {
    inclusions: Vec<Regex>,
    exclusions: Vec<Regex>,
    pub options: Vec<String>,
}

impl PerFileOptions {
    pub fn is_included(&self, path: &str) -> bool {
        (self.inclusions.is_empty() || self.inclusions.iter().any(|r| r.is_match(path)))
            && !self.exclusions.iter().any(|r| r.is_match(path))
    }
}

impl FromStr for PerFileOptions {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((filters, options)) = s.split_once('@') else {
            bail!("Expected `<filters>@<options>`, got `{s}`");
        };
        let mut inclusions = Vec::new();
        let mut exclusions = Vec::new();
        for filter in filters.split(',').filter(|f| !f.is_empty()) {
            let (list, pattern) = match filter.strip_prefix('-') {
                Some(pattern) => (&mut exclusions, pattern),
                None => (&mut inclusions, filter),
            };
            list.push(
                Regex::new(pattern)
                    .with_context(|| format!("Invalid file filter `{pattern}` in `{s}`"))?,
            );
        }
        Ok(Self {
            inclusions,
            exclusions,
            options: options
                .split(',')
                .filter(|o| !o.is_empty())
                .map(str::to_owned)
                .collect(),
        })
    }
}

impl<'de> Deserialize<'de> for PerFileOptions {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Display for PerFileOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let filters = self
            .inclusions
            .iter()
            .map(|r| r.as_str().to_owned())
            .chain(self.exclusions.iter().map(|r| format!("-{}", r.as_str())));
        write!(
            f,
            "{}@{}",
            itertools::join(filters, ","),
            self.options.join(",")
        )
    }
}

/// The parts of the C++ toolchain that link planning needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Toolchain {
    /// Whether the linker accepts `@file` arguments.
    pub supports_param_files: bool,

    /// Directory, relative to the bin directory, where dynamic libraries are symlinked for
    /// runtime lookup.
    pub solib_directory: PathBuf,

    /// Where the dynamic language runtime libraries live. Only used when the runtimes are linked
    /// statically, which seems backwards, but that's when the runtime search path needs to point at
    /// them for the dynamic parts of the link.
    pub dynamic_runtime_solib_dir: Option<PathBuf>,

    /// Language runtime libraries (libstdc++ etc). Added after everything else and never
    /// whole-archived.
    pub runtime_libraries: Vec<PathBuf>,
    pub runtime_library_category: LibraryCategory,

    /// Files the linker itself needs (the linker binary, its scripts, ...).
    pub linker_files: Vec<PathBuf>,

    pub build_info_files: Vec<PathBuf>,
    pub redacted_build_info_files: Vec<PathBuf>,

    /// Tool used to build interface libraries alongside dynamic libraries.
    pub link_dynamic_library_tool: Option<PathBuf>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            supports_param_files: true,
            solib_directory: PathBuf::from("_solib_k8"),
            dynamic_runtime_solib_dir: None,
            runtime_libraries: Vec::new(),
            runtime_library_category: LibraryCategory::StaticLibrary,
            linker_files: Vec::new(),
            build_info_files: Vec::new(),
            redacted_build_info_files: Vec::new(),
            link_dynamic_library_tool: None,
        }
    }
}

fn source_artifacts(paths: &[PathBuf]) -> Vec<Artifact> {
    paths.iter().map(Artifact::source).collect()
}

impl Toolchain {
    pub(crate) fn runtime_library_artifacts(&self) -> Vec<Artifact> {
        source_artifacts(&self.runtime_libraries)
    }

    pub(crate) fn linker_file_artifacts(&self) -> Vec<Artifact> {
        source_artifacts(&self.linker_files)
    }

    pub(crate) fn build_info_artifacts(&self, stamping: bool) -> Vec<Artifact> {
        if stamping {
            source_artifacts(&self.build_info_files)
        } else {
            source_artifacts(&self.redacted_build_info_files)
        }
    }

    pub(crate) fn link_dynamic_library_tool_artifact(&self) -> Option<Artifact> {
        self.link_dynamic_library_tool.as_ref().map(Artifact::source)
    }
}
