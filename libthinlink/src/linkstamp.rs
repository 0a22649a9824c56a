//! Linkstamp compiles. Each distinct linkstamp source gets compiled once per link, into an object
//! that's private to that link.

use crate::artifact::Artifact;
use crate::artifact::ArtifactFactory;
use crate::artifact::ArtifactSharing;
use crate::error::Context as _;
use crate::error::Result;
use crate::inputs::Linkstamp;
use crate::ordered_set::FixedIndexMap;
use crate::ordered_set::OrderedSet;
use crate::ordered_set::new_map;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

/// Scratch directory, next to the output, that linkstamp objects go in.
const OBJS_DIR: &str = "_objs";

/// A request to compile one linkstamp source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkstampCompile {
    pub source: Artifact,
    pub output: Artifact,
    pub declared_includes: Vec<Artifact>,
    pub build_info_headers: Vec<Artifact>,

    /// Inputs of the link that the compile may also need, e.g. headers generated by the link's
    /// dependencies.
    pub inputs: Vec<Artifact>,

    pub additional_defines: Vec<String>,
    pub use_pic: bool,

    /// What the compiled linkstamp reports as the target being built.
    pub label_replacement: String,

    /// What the compiled linkstamp reports as the output being built.
    pub output_replacement: String,
}

pub trait LinkstampCompiler {
    /// Registers a compile action. Called at most once per linkstamp source per link.
    fn compile(&self, request: &LinkstampCompile) -> Result;
}

/// A `LinkstampCompiler` that just remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingLinkstampCompiler {
    compiles: Mutex<Vec<LinkstampCompile>>,
}

impl RecordingLinkstampCompiler {
    pub fn compiles(&self) -> Vec<LinkstampCompile> {
        self.compiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LinkstampCompiler for RecordingLinkstampCompiler {
    fn compile(&self, request: &LinkstampCompile) -> Result {
        self.compiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        Ok(())
    }
}

/// `<output dir>/_objs/<output name>/<source path>` with the source's extension replaced by `.o`.
fn linkstamp_output_path(output: &Path, source: &Path) -> PathBuf {
    let mut dir = output.parent().map(Path::to_owned).unwrap_or_default();
    dir.push(OBJS_DIR);
    if let Some(name) = output.file_name() {
        dir.push(name);
    }
    dir.join(source.with_extension("o"))
}

/// Declares the object each linkstamp compiles into. Linkstamps with the same source get the same
/// object.
pub(crate) fn map_linkstamps_to_outputs(
    linkstamps: &OrderedSet<Linkstamp>,
    artifacts: &dyn ArtifactFactory,
    output: &Artifact,
) -> FixedIndexMap<Linkstamp, Artifact> {
    let mut map = new_map();
    for linkstamp in linkstamps {
        let path = linkstamp_output_path(
            output.root_relative_path(),
            linkstamp.source.root_relative_path(),
        );
        map.insert(
            linkstamp.clone(),
            artifacts.derived(&path, ArtifactSharing::OwnedByTarget),
        );
    }
    map
}

/// Settings shared by every linkstamp compile of a link.
pub(crate) struct LinkstampCompileTemplate {
    pub(crate) build_info_headers: Vec<Artifact>,
    pub(crate) inputs: Vec<Artifact>,
    pub(crate) additional_defines: Vec<String>,
    pub(crate) use_pic: bool,
    pub(crate) label_replacement: String,
    pub(crate) output_replacement: String,
}

/// Asks `compiler` to compile each distinct linkstamp source once. Returns the requests made, in
/// linkstamp order. A compile sees the declared includes of every linkstamp with its source.
#[tracing::instrument(skip_all, name = "Compile linkstamps")]
pub(crate) fn compile_linkstamps(
    compiler: &dyn LinkstampCompiler,
    linkstamp_outputs: &FixedIndexMap<Linkstamp, Artifact>,
    template: &LinkstampCompileTemplate,
) -> Result<Vec<LinkstampCompile>> {
    let mut by_source: FixedIndexMap<PathBuf, (&Artifact, &Artifact, OrderedSet<Artifact>)> =
        new_map();
    for (linkstamp, output) in linkstamp_outputs {
        let source = linkstamp.source.exec_path();
        if by_source.contains_key(&source) {
            tracing::debug!(source = %linkstamp.source, "Merging duplicate linkstamp");
        }
        let (_, _, includes) = by_source
            .entry(source)
            .or_insert_with(|| (&linkstamp.source, output, OrderedSet::new()));
        includes.extend(linkstamp.declared_includes.iter().cloned());
    }

    let mut requests = Vec::new();
    for (source, output, includes) in by_source.into_values() {
        let request = LinkstampCompile {
            source: source.clone(),
            output: output.clone(),
            declared_includes: includes.into_iter().collect(),
            build_info_headers: template.build_info_headers.clone(),
            inputs: template.inputs.clone(),
            additional_defines: template.additional_defines.clone(),
            use_pic: template.use_pic,
            label_replacement: template.label_replacement.clone(),
            output_replacement: template.output_replacement.clone(),
        };
        compiler
            .compile(&request)
            .with_context(|| format!("Failed to compile linkstamp `{source}`"))?;
        requests.push(request);
    }
    Ok(requests)
}
