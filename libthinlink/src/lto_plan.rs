//! Deciding whether a link runs LTO indexing, and creating the backend for every bitcode file that
//! the link ends up using.

use crate::artifact::Artifact;
use crate::assemble::LinkPlan;
use crate::backend::BitcodeBackendArtifact;
use crate::backend::LtoRoots;
use crate::backend::create_backend;
use crate::bitcode::BitcodeFiles;
use crate::bitcode::BitcodeMapping;
use crate::bitcode::has_lto_bitcode_inputs;
use crate::bitcode::library_bitcode;
use crate::builder::LinkActionBuilder;
use crate::error::Context as _;
use crate::error::Result;
use crate::features::Feature;
use crate::features::FeatureConfigurationExt as _;
use crate::indexing::IndexPlan;
use crate::link_type::LinkingMode;
use crate::ordered_set::OrderedSet;
use crate::plan_bail;
use serde::Serialize;
use std::sync::Arc;

/// Everything the indexing decision looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LtoFlags {
    pub all_linkstatic_use_shared_backends: bool,
    pub linkstatic_tests_use_shared_backends: bool,
    pub test_or_test_only: bool,
    pub linking_mode: LinkingMode,
    pub has_own_bitcode: bool,
    pub has_any_bitcode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LtoDecision {
    /// Whether members of statically linked libraries take part in this link's indexing. If not,
    /// the libraries' shared backends are used for them.
    pub include_link_static_in_lto_indexing: bool,

    pub allow_lto_indexing: bool,
}

impl LtoFlags {
    /// Statically linked tests would each need their own backend for every library member, which
    /// multiplies the number of actions. The features let those links use shared backends instead.
    pub fn decide(&self) -> LtoDecision {
        let include = !self.all_linkstatic_use_shared_backends
            && (!self.linkstatic_tests_use_shared_backends || !self.test_or_test_only);
        let allow = self.has_any_bitcode
            && (include || (self.linking_mode == LinkingMode::Dynamic && self.has_own_bitcode));
        LtoDecision {
            include_link_static_in_lto_indexing: include,
            allow_lto_indexing: allow,
        }
    }
}

/// The result of backend planning. Holds the link's inputs, now frozen.
pub struct BackendPlan<'a> {
    pub(crate) target: LinkActionBuilder<'a>,
    pub(crate) decision: LtoDecision,
    pub(crate) roots: LtoRoots,
    pub(crate) backends: OrderedSet<Arc<BitcodeBackendArtifact>>,
    pub(crate) mapping: BitcodeMapping,
}

/// What comes after backend planning.
pub enum LtoPhase<'a> {
    /// Indexing has been planned. The final link uses unique backends.
    Indexed(IndexPlan<'a>),

    /// Indexing isn't allowed for this link, so the final link uses the shared backends directly.
    SharedBackends(BackendPlan<'a>),
}

impl LtoPhase<'_> {
    /// Plans the final link.
    pub fn build(self) -> Result<LinkPlan> {
        match self {
            LtoPhase::Indexed(plan) => plan.build(),
            LtoPhase::SharedBackends(plan) => plan.build_final(),
        }
    }
}

impl<'a> LinkActionBuilder<'a> {
    pub(crate) fn lto_flags(&self) -> LtoFlags {
        LtoFlags {
            all_linkstatic_use_shared_backends: self
                .env
                .features
                .enabled(Feature::ThinLtoAllLinkstaticUseSharedNonltoBackends),
            linkstatic_tests_use_shared_backends: self
                .env
                .features
                .enabled(Feature::ThinLtoLinkstaticTestsUseSharedNonltoBackends),
            test_or_test_only: self.test_or_test_only,
            linking_mode: self.linking_mode,
            has_own_bitcode: !self.lto.is_empty(),
            has_any_bitcode: self.has_lto_bitcode_inputs(),
        }
    }

    pub fn has_lto_bitcode_inputs(&self) -> bool {
        has_lto_bitcode_inputs(&self.lto, &self.libraries)
    }

    /// Plans the LTO backends of the link. Nothing can be added to the link after this.
    #[tracing::instrument(skip_all, name = "Plan LTO backends")]
    pub fn plan_lto_backends(self) -> Result<BackendPlan<'a>> {
        self.validate()?;
        let decision = self.lto_flags().decide();
        tracing::debug!(?decision, output = %self.output, "LTO decision");
        let roots = if decision.allow_lto_indexing {
            LtoRoots::for_indexing(&self.output, self.env.features)
        } else {
            LtoRoots::shared(self.env.features)
        };
        let backends = self
            .create_lto_backends(decision, &roots)
            .with_context(|| format!("Failed to plan LTO backends for `{}`", self.owner))?;
        let mut mapping = BitcodeMapping::default();
        for backend in &backends {
            mapping.insert(
                backend.bitcode_file.clone(),
                backend.object_file.clone(),
                backend.is_shared(),
            );
        }
        Ok(BackendPlan {
            target: self,
            decision,
            roots,
            backends,
            mapping,
        })
    }

    fn create_lto_backends(
        &self,
        decision: LtoDecision,
        roots: &LtoRoots,
    ) -> Result<OrderedSet<Arc<BitcodeBackendArtifact>>> {
        let include = decision.include_link_static_in_lto_indexing;
        let compiled = library_bitcode(&self.libraries);
        let bitcode_files = Arc::new(BitcodeFiles::collect(
            &self.lto,
            &self.objects,
            &self.libraries,
            include,
        ));
        bitcode_files.check_output_roots(&roots.output_root, &roots.object_root)?;

        let mut backends = OrderedSet::new();
        for lib in &self.libraries {
            for object in lib.objects.iter().filter(|o| compiled.contains(o)) {
                if include {
                    backends.insert(create_backend(
                        &self.env,
                        object,
                        lib.lto.copts(object),
                        roots,
                        Some(bitcode_files.clone()),
                        self.use_pic_for_lto_backends,
                    ));
                } else {
                    backends.insert(shared_backend_of(lib, object)?);
                }
            }
        }

        let allowed = decision
            .allow_lto_indexing
            .then(|| bitcode_files.clone());
        for input in &self.objects {
            if self.lto.contains_bitcode_file(&input.artifact) {
                backends.insert(create_backend(
                    &self.env,
                    &input.artifact,
                    self.lto.copts(&input.artifact),
                    roots,
                    allowed.clone(),
                    self.use_pic_for_lto_backends,
                ));
            }
        }
        Ok(backends)
    }
}

fn shared_backend_of(
    lib: &crate::inputs::LibraryInput,
    object: &Artifact,
) -> Result<Arc<BitcodeBackendArtifact>> {
    let Some(shared) = lib.shared_backends() else {
        plan_bail!(
            Usage,
            "Statically linked test target requires non-LTO backends for its library inputs, but \
             library input `{}` does not specify shared non-LTO backends",
            lib.artifact
        );
    };
    match shared.get(object) {
        Some(backend) => Ok(backend.clone()),
        None => plan_bail!(
            Programming,
            "Library `{}` has no shared backend for `{object}`",
            lib.artifact
        ),
    }
}

impl<'a> BackendPlan<'a> {
    pub fn decision(&self) -> LtoDecision {
        self.decision
    }

    pub fn roots(&self) -> &LtoRoots {
        &self.roots
    }

    pub fn backends(&self) -> impl Iterator<Item = &Arc<BitcodeBackendArtifact>> {
        self.backends.iter()
    }

    pub fn mapping(&self) -> &BitcodeMapping {
        &self.mapping
    }

    /// Plans the indexing step if the link allows it. Otherwise hands back the backend plan so the
    /// final link can be built directly from the shared backends.
    pub fn plan_lto_indexing(self) -> Result<LtoPhase<'a>> {
        if !self.decision.allow_lto_indexing {
            return Ok(LtoPhase::SharedBackends(self));
        }
        Ok(LtoPhase::Indexed(IndexPlan::new(self)?))
    }

    pub(crate) fn build_final(self) -> Result<LinkPlan> {
        self.target.build_final_link(
            Some(self.decision),
            self.mapping,
            self.backends.into_iter().collect(),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use rstest::rstest;

    fn flags(all: bool, tests: bool, test_only: bool, mode: LinkingMode, own: bool) -> LtoFlags {
        LtoFlags {
            all_linkstatic_use_shared_backends: all,
            linkstatic_tests_use_shared_backends: tests,
            test_or_test_only: test_only,
            linking_mode: mode,
            has_own_bitcode: own,
            has_any_bitcode: true,
        }
    }

    #[rstest]
    #[case::defaults(flags(false, false, false, LinkingMode::Static, false), true, true)]
    #[case::test_with_feature(flags(false, true, true, LinkingMode::Static, true), false, false)]
    #[case::non_test_with_feature(
        flags(false, true, false, LinkingMode::Static, false),
        true,
        true
    )]
    #[case::all_static(flags(true, false, false, LinkingMode::Static, true), false, false)]
    #[case::all_static_dynamic(flags(true, false, false, LinkingMode::Dynamic, true), false, true)]
    #[case::dynamic_no_own(flags(true, false, false, LinkingMode::Dynamic, false), false, false)]
    fn decision(#[case] flags: LtoFlags, #[case] include: bool, #[case] allow: bool) {
        assert_eq!(
            flags.decide(),
            LtoDecision {
                include_link_static_in_lto_indexing: include,
                allow_lto_indexing: allow,
            }
        );
    }

    #[test]
    fn nothing_to_index_without_bitcode() {
        for bits in std::iter::repeat_n([false, true], 4).multi_cartesian_product() {
            let mut flags = flags(
                bits[0],
                bits[1],
                bits[2],
                if bits[3] {
                    LinkingMode::Dynamic
                } else {
                    LinkingMode::Static
                },
                false,
            );
            flags.has_any_bitcode = false;
            assert!(!flags.decide().allow_lto_indexing);
        }
    }
}
