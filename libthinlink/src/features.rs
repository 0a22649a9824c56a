//! Querying which toolchain features are active.
//!
//! Resolving features from a toolchain configuration happens elsewhere. The planner only asks
//! questions through `FeatureConfiguration`.

use crate::link_type::ActionName;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Toolchain features that influence link planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    /// Statically linked libraries don't take part in any target's LTO indexing. They use shared
    /// backends instead.
    ThinLtoAllLinkstaticUseSharedNonltoBackends,
    /// Like `ThinLtoAllLinkstaticUseSharedNonltoBackends`, but only for tests and test-only
    /// targets.
    ThinLtoLinkstaticTestsUseSharedNonltoBackends,
    UseLtoNativeObjectDirectory,
    TargetsWindows,
    ArchiveParamFile,
    GccQuotingForParamFiles,
    WindowsQuotingForParamFiles,
    ForceNoWholeArchive,
    LegacyWholeArchive,
    StaticLinkCppRuntimes,
    SupportsInterfaceSharedLibraries,
    SupportsStartEndLib,
    SupportsPic,
    PerObjectDebugInfo,
}

impl Feature {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

pub trait FeatureConfiguration {
    fn is_enabled(&self, feature: &str) -> bool;

    /// Whether the toolchain has an action config for `action`.
    fn action_is_configured(&self, action: &str) -> bool;

    /// Features that the target asked for, regardless of whether they ended up enabled.
    fn requested_features(&self) -> BTreeSet<String>;

    /// Execution requirements of the tool that runs `action`.
    fn tool_requirements(&self, action: &str) -> Vec<String>;

    /// Environment variables that the toolchain sets for `action`.
    fn environment(&self, _action: &str) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Whether the action config for `action` specifies the tool to run.
    fn has_configured_linker_path(&self, _action: &str) -> bool {
        false
    }
}

/// Convenience methods over `FeatureConfiguration` taking typed names.
pub(crate) trait FeatureConfigurationExt {
    fn enabled(&self, feature: Feature) -> bool;
    fn requested(&self, feature: Feature) -> bool;
    fn configured(&self, action: ActionName) -> bool;
}

impl<F: FeatureConfiguration + ?Sized> FeatureConfigurationExt for F {
    fn enabled(&self, feature: Feature) -> bool {
        self.is_enabled(feature.name())
    }

    fn requested(&self, feature: Feature) -> bool {
        self.requested_features().contains(feature.name())
    }

    fn configured(&self, action: ActionName) -> bool {
        self.action_is_configured(action.as_str())
    }
}

/// A fixed, already-resolved feature configuration. When deserialized, every action counts as
/// configured unless `configured_actions` says otherwise.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default = "StaticFeatures::with_all_actions", deny_unknown_fields)]
pub struct StaticFeatures {
    pub enabled: BTreeSet<String>,
    pub requested: BTreeSet<String>,
    pub configured_actions: BTreeSet<String>,
    pub tool_requirements: BTreeMap<String, Vec<String>>,
    pub environment: BTreeMap<String, BTreeMap<String, String>>,
    /// Actions whose action config names the linker binary.
    pub actions_with_tool_path: BTreeSet<String>,
}

impl StaticFeatures {
    /// A configuration in which every action that the planner can emit is configured and nothing
    /// else is set.
    #[must_use]
    pub fn with_all_actions() -> Self {
        use strum::IntoEnumIterator as _;
        Self {
            configured_actions: ActionName::iter()
                .map(|a| a.as_str().to_owned())
                .collect(),
            ..Default::default()
        }
    }

    /// Enables `feature`. An enabled feature is also a requested one.
    #[must_use]
    pub fn enable(mut self, feature: Feature) -> Self {
        self.enabled.insert(feature.name().to_owned());
        self.requested.insert(feature.name().to_owned());
        self
    }

    /// Marks `feature` as requested without enabling it.
    #[must_use]
    pub fn request(mut self, feature: Feature) -> Self {
        self.requested.insert(feature.name().to_owned());
        self
    }
}

impl FeatureConfiguration for StaticFeatures {
    fn is_enabled(&self, feature: &str) -> bool {
        self.enabled.contains(feature)
    }

    fn action_is_configured(&self, action: &str) -> bool {
        self.configured_actions.contains(action)
    }

    fn requested_features(&self) -> BTreeSet<String> {
        self.requested.clone()
    }

    fn tool_requirements(&self, action: &str) -> Vec<String> {
        self.tool_requirements
            .get(action)
            .cloned()
            .unwrap_or_default()
    }

    fn environment(&self, action: &str) -> Vec<(String, String)> {
        self.environment
            .get(action)
            .map(|env| {
                env.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn has_configured_linker_path(&self, action: &str) -> bool {
        self.actions_with_tool_path.contains(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_names_are_snake_case() {
        assert_eq!(
            Feature::ThinLtoLinkstaticTestsUseSharedNonltoBackends.name(),
            "thin_lto_linkstatic_tests_use_shared_nonlto_backends"
        );
        assert_eq!(Feature::ForceNoWholeArchive.name(), "force_no_whole_archive");
    }

    #[test]
    fn requested_is_not_enabled() {
        let features = StaticFeatures::default().request(Feature::LegacyWholeArchive);
        assert!(features.requested(Feature::LegacyWholeArchive));
        assert!(!features.enabled(Feature::LegacyWholeArchive));
    }

    #[test]
    fn all_actions_configured() {
        let features = StaticFeatures::with_all_actions();
        assert!(features.configured(ActionName::CppLinkExecutable));
        assert!(features.configured(ActionName::LtoIndexNodepsDynamicLibrary));
    }
}
