//! The ThinLTO indexing step. The indexer is a link over minimized bitcode that decides what each
//! backend imports and which objects the final link needs.

use crate::artifact::Artifact;
use crate::artifact::ArtifactSharing;
use crate::artifact::append_to_file_name;
use crate::assemble::ActionRequest;
use crate::assemble::IndexingOutputs;
use crate::assemble::LinkAction;
use crate::assemble::LinkPlan;
use crate::assemble::LinkVariables;
use crate::bitcode::BitcodeMapping;
use crate::builder::LinkActionBuilder;
use crate::error::Context as _;
use crate::error::Result;
use crate::inputs::LibraryInput;
use crate::inputs::ObjectInput;
use crate::lto_plan::BackendPlan;
use crate::ordered_set::OrderedSet;
use crate::ordered_set::new_map;
use crate::plan_bail;
use crate::plan_ensure;
use std::path::Path;

/// Backend planning plus the indexing action.
pub struct IndexPlan<'a> {
    backends: BackendPlan<'a>,
    outputs: IndexingOutputs,
}

impl<'a> IndexPlan<'a> {
    #[tracing::instrument(skip_all, name = "Plan LTO indexing")]
    pub(crate) fn new(backends: BackendPlan<'a>) -> Result<Self> {
        let outputs = plan_indexing(&backends).with_context(|| {
            format!("Failed to plan LTO indexing of `{}`", backends.target.owner)
        })?;
        Ok(Self { backends, outputs })
    }

    pub fn backend_plan(&self) -> &BackendPlan<'a> {
        &self.backends
    }

    pub fn indexing_action(&self) -> &LinkAction {
        &self.outputs.action
    }

    /// The file in which the indexer lists the objects that the final link needs.
    pub fn param_file(&self) -> &Artifact {
        &self.outputs.param_file
    }

    /// An object that the indexer produces and that goes into the final link.
    pub fn merged_object(&self) -> &Artifact {
        &self.outputs.merged_object
    }

    /// Plans the final link.
    pub fn build(self) -> Result<LinkPlan> {
        let BackendPlan {
            target,
            decision,
            backends,
            mapping,
            ..
        } = self.backends;
        target.build_final_link(
            Some(decision),
            mapping,
            backends.into_iter().collect(),
            Some(self.outputs),
        )
    }
}

fn plan_indexing(plan: &BackendPlan) -> Result<IndexingOutputs> {
    let target = &plan.target;
    let Some(action_name) = target.link_type.lto_index_action_name() else {
        plan_bail!(
            Usage,
            "LTO indexing is only possible for executables and dynamic libraries, not {:?}",
            target.link_type
        );
    };

    let objects = lto_indexing_objects(target);
    let libraries =
        lto_indexing_libraries(target, plan.decision.include_link_static_in_lto_indexing)?;

    let output_path = target.output.root_relative_path();
    let param_file = target.env.artifacts.derived(
        &append_to_file_name(output_path, "-lto-final.params"),
        ArtifactSharing::OwnedByTarget,
    );
    let merged_object = target.env.artifacts.derived(
        &append_to_file_name(output_path, ".lto.merged.o"),
        ArtifactSharing::OwnedByTarget,
    );

    let mut outputs = OrderedSet::new();
    for backend in &plan.backends {
        outputs.extend(backend.indexing_outputs().cloned());
    }
    outputs.insert(param_file.clone());
    outputs.insert(merged_object.clone());

    let variables = LinkVariables {
        thinlto_indexing_param_file: Some(param_file.clone()),
        thinlto_merged_object_file: Some(merged_object.clone()),
        thinlto_prefix_replace: Some(prefix_replace(
            target.env.artifacts.bin_directory(),
            &plan.roots.output_root,
            &plan.roots.object_root,
        )),
        ..Default::default()
    };

    let user_link_flags = target
        .linkopts
        .iter()
        .chain(&target.env.options.linkopts)
        .chain(&target.env.options.lto_index_options)
        .cloned()
        .collect();

    let (action, _) = target.build_link_action(ActionRequest {
        action_name,
        mnemonic: target
            .mnemonic
            .clone()
            .unwrap_or_else(|| "CppLTOIndexing".to_owned()),
        progress_message: format!("LTO indexing {}", target.output),
        objects: &objects,
        libraries: &libraries,
        non_code_inputs: &target.non_code_inputs,
        mapping: &BitcodeMapping::default(),
        allow_lto_indexing: plan.decision.allow_lto_indexing,
        linkstamp_outputs: &new_map(),
        outputs,
        variables,
        user_link_flags,
    })?;

    tracing::debug!(%param_file, %merged_object, "Planned LTO indexing");

    Ok(IndexingOutputs {
        action,
        param_file,
        merged_object,
    })
}

/// Tells the indexer how to turn the path of a bitcode file into the paths of its backend's index
/// and object.
fn prefix_replace(bin_directory: &Path, output_root: &Path, object_root: &Path) -> String {
    let bin = bin_directory.display();
    let mut replace = format!("{bin};{}", bin_directory.join(output_root).display());
    if object_root != output_root {
        replace.push(';');
        replace.push_str(&bin_directory.join(object_root).display().to_string());
    }
    replace
}

/// The target's own objects, with bitcode replaced by its minimized form.
fn lto_indexing_objects(target: &LinkActionBuilder) -> OrderedSet<ObjectInput> {
    target
        .objects
        .iter()
        .map(|input| input.with_artifact(target.lto.minimized_bitcode_or_self(&input.artifact)))
        .collect()
}

/// The libraries as the indexer sees them. Bitcode members become their minimized form if they
/// take part in indexing, otherwise the native object that their shared backend produces.
fn lto_indexing_libraries(
    target: &LinkActionBuilder,
    include_link_static: bool,
) -> Result<OrderedSet<LibraryInput>> {
    let mut libraries = OrderedSet::new();
    for lib in &target.libraries {
        if !lib.contains_object_files() {
            libraries.insert(lib.clone());
            continue;
        }
        let mut objects = OrderedSet::new();
        for object in &lib.objects {
            if !include_link_static {
                let shared = lib.shared_backends().and_then(|s| s.get(object));
                plan_ensure!(
                    shared.is_some() || !lib.lto.contains_bitcode_file(object),
                    Programming,
                    "Bitcode member `{object}` of `{}` has no shared backend",
                    lib.artifact
                );
                if let Some(backend) = shared {
                    // The indexer invokes the linker, which must see every object of the final
                    // link.
                    objects.insert(backend.object_file.clone());
                    continue;
                }
            }
            objects.insert(lib.lto.minimized_bitcode_or_self(object));
        }
        libraries.insert(lib.with_replaced_objects(objects));
    }
    Ok(libraries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_replace_with_and_without_object_root() {
        assert_eq!(
            prefix_replace(Path::new("bin"), Path::new("pkg/x.lto"), Path::new("pkg/x.lto")),
            "bin;bin/pkg/x.lto"
        );
        assert_eq!(
            prefix_replace(
                Path::new("bin"),
                Path::new("pkg/x.lto"),
                Path::new("pkg/x.lto-obj")
            ),
            "bin;bin/pkg/x.lto;bin/pkg/x.lto-obj"
        );
    }
}
