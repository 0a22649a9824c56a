//! The default decision on whether static libraries get wrapped in `--whole-archive`.
//!
//! The rules below aren't principled, but existing builds depend on exactly this behaviour, so the
//! order in which they're checked must not change.

use crate::features::Feature;
use crate::features::FeatureConfiguration;
use crate::features::FeatureConfigurationExt as _;
use crate::link_type::LinkTargetType;
use crate::link_type::LinkingMode;
use crate::options::CppOptions;

/// Everything the whole-archive decision looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WholeArchiveInputs {
    /// The output is shared, or the link options ask for a shared output.
    pub shared_link_options: bool,
    pub force_no_whole_archive_requested: bool,
    pub remove_legacy_whole_archive: bool,
    pub linking_mode: LinkingMode,
    pub legacy_whole_archive_requested: bool,
    pub legacy_whole_archive: bool,
}

/// Which rule decided. Rules are listed in the order they're checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum WholeArchiveRule {
    NotShared,
    ForceNoWholeArchive,
    LegacyRemoved,
    NotStaticLinking,
    LegacyFeatureRequested,
    LegacyOption,
    Default,
}

impl WholeArchiveRule {
    pub fn enabled(self) -> bool {
        matches!(
            self,
            WholeArchiveRule::LegacyFeatureRequested | WholeArchiveRule::LegacyOption
        )
    }
}

impl WholeArchiveInputs {
    pub fn new(
        link_type: LinkTargetType,
        linkopts: &[String],
        linking_mode: LinkingMode,
        options: &CppOptions,
        features: &dyn FeatureConfiguration,
    ) -> Self {
        Self {
            shared_link_options: link_type.is_dynamic_library()
                || linkopts.iter().any(|opt| opt == "-shared")
                || options.has_shared_link_option(),
            force_no_whole_archive_requested: features.requested(Feature::ForceNoWholeArchive),
            remove_legacy_whole_archive: options.incompatible_remove_legacy_whole_archive,
            linking_mode,
            legacy_whole_archive_requested: features.requested(Feature::LegacyWholeArchive),
            legacy_whole_archive: options.legacy_whole_archive,
        }
    }

    pub fn decide(&self) -> WholeArchiveRule {
        if !self.shared_link_options {
            // If an executable doesn't use a symbol, nothing else will.
            WholeArchiveRule::NotShared
        } else if self.force_no_whole_archive_requested {
            WholeArchiveRule::ForceNoWholeArchive
        } else if self.remove_legacy_whole_archive {
            WholeArchiveRule::LegacyRemoved
        } else if self.linking_mode != LinkingMode::Static {
            WholeArchiveRule::NotStaticLinking
        } else if self.legacy_whole_archive_requested {
            WholeArchiveRule::LegacyFeatureRequested
        } else if self.legacy_whole_archive {
            WholeArchiveRule::LegacyOption
        } else {
            WholeArchiveRule::Default
        }
    }
}

/// Whether the link needs whole-archive. `explicit` is the caller's own request, which can turn
/// whole-archive on but never off.
pub fn need_whole_archive(explicit: bool, inputs: &WholeArchiveInputs) -> bool {
    let rule = inputs.decide();
    tracing::debug!(?rule, explicit, "Whole-archive decision");
    explicit || rule.enabled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use rstest::rstest;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    fn inputs(bits: &[bool]) -> WholeArchiveInputs {
        WholeArchiveInputs {
            shared_link_options: bits[0],
            force_no_whole_archive_requested: bits[1],
            remove_legacy_whole_archive: bits[2],
            linking_mode: if bits[3] {
                LinkingMode::Static
            } else {
                LinkingMode::Dynamic
            },
            legacy_whole_archive_requested: bits[4],
            legacy_whole_archive: bits[5],
        }
    }

    #[test]
    fn every_combination_reaches_exactly_one_rule() {
        let mut fired = HashSet::new();
        for bits in std::iter::repeat_n([false, true], 6).multi_cartesian_product() {
            fired.insert(inputs(&bits).decide());
        }
        // Every rule is reachable, so none of them is dead.
        assert_eq!(fired, WholeArchiveRule::iter().collect());
    }

    #[rstest]
    #[case::executable([false, false, false, true, true, true], WholeArchiveRule::NotShared)]
    #[case::force_no([true, true, false, true, true, true], WholeArchiveRule::ForceNoWholeArchive)]
    #[case::removed([true, false, true, true, true, true], WholeArchiveRule::LegacyRemoved)]
    #[case::dynamic([true, false, false, false, true, true], WholeArchiveRule::NotStaticLinking)]
    #[case::feature(
        [true, false, false, true, true, false],
        WholeArchiveRule::LegacyFeatureRequested
    )]
    #[case::option([true, false, false, true, false, true], WholeArchiveRule::LegacyOption)]
    #[case::neither([true, false, false, true, false, false], WholeArchiveRule::Default)]
    fn rule_order(#[case] bits: [bool; 6], #[case] expected: WholeArchiveRule) {
        assert_eq!(inputs(&bits).decide(), expected);
    }

    #[test]
    fn explicit_request_wins() {
        let not_shared = inputs(&[false; 6]);
        assert!(!need_whole_archive(false, &not_shared));
        assert!(need_whole_archive(true, &not_shared));
    }

    #[test]
    fn shared_option_from_any_source() {
        use crate::features::StaticFeatures;
        let features = StaticFeatures::default();
        let mut options = CppOptions::default();
        let executable = |linkopts: &[String], options: &CppOptions| {
            WholeArchiveInputs::new(
                LinkTargetType::Executable,
                linkopts,
                LinkingMode::Static,
                options,
                &features,
            )
            .shared_link_options
        };
        assert!(!executable(&[], &options));
        assert!(executable(&["-shared".to_owned()], &options));
        options.linkopts.push("-shared".to_owned());
        assert!(executable(&[], &options));
        assert!(
            WholeArchiveInputs::new(
                LinkTargetType::NodepsDynamicLibrary,
                &[],
                LinkingMode::Static,
                &CppOptions::default(),
                &features,
            )
            .shared_link_options
        );
    }
}
