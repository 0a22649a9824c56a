use crate::inputs::LibraryCategory;
use serde::Deserialize;
use serde::Serialize;

/// What kind of file a link produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
#[serde(rename_all = "kebab-case")]
pub enum LinkTargetType {
    Executable,
    ObjcExecutable,
    StaticLibrary,
    PicStaticLibrary,
    AlwaysLinkStaticLibrary,
    AlwaysLinkPicStaticLibrary,
    ObjcFullyLinkedArchive,
    /// A dynamic library that contains its transitive dependencies.
    DynamicLibrary,
    /// A dynamic library containing only the target's own objects.
    NodepsDynamicLibrary,
    /// Stub library that other targets link against in place of a dynamic library. Never linked
    /// directly.
    InterfaceDynamicLibrary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkerOrArchiver {
    Linker,
    Archiver,
}

/// How symbols get bound. Under `Static`, everything that can be linked statically is.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkingMode {
    #[default]
    Static,
    Dynamic,
}

/// Names of the toolchain actions that the planner emits. These must match the action configs of
/// the toolchain.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::IntoStaticStr,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(into = "&'static str")]
pub enum ActionName {
    #[strum(serialize = "c++-link-executable")]
    CppLinkExecutable,
    #[strum(serialize = "objc-executable")]
    ObjcExecutable,
    #[strum(serialize = "c++-link-static-library")]
    CppLinkStaticLibrary,
    #[strum(serialize = "objc-fully-link")]
    ObjcFullyLink,
    #[strum(serialize = "c++-link-dynamic-library")]
    CppLinkDynamicLibrary,
    #[strum(serialize = "c++-link-nodeps-dynamic-library")]
    CppLinkNodepsDynamicLibrary,
    #[strum(serialize = "lto-index-for-executable")]
    LtoIndexExecutable,
    #[strum(serialize = "lto-index-for-dynamic-library")]
    LtoIndexDynamicLibrary,
    #[strum(serialize = "lto-index-for-nodeps-dynamic-library")]
    LtoIndexNodepsDynamicLibrary,
    #[strum(serialize = "lto-backend")]
    LtoBackend,
    #[strum(serialize = "linkstamp-compile")]
    LinkstampCompile,
}

impl ActionName {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// One row of the capability table.
#[derive(Debug, Clone, Copy)]
pub struct TargetCapabilities {
    pub linker_or_archiver: LinkerOrArchiver,
    pub executable: bool,
    pub dynamic_library: bool,
    pub transitive_dynamic_library: bool,
    /// What the produced file is when another link consumes it. `None` for executables.
    pub output_category: Option<LibraryCategory>,
    pub action_name: ActionName,
}

impl LinkTargetType {
    pub const fn capabilities(self) -> TargetCapabilities {
        use LinkerOrArchiver::Archiver;
        use LinkerOrArchiver::Linker;

        const fn row(
            linker_or_archiver: LinkerOrArchiver,
            executable: bool,
            dynamic_library: bool,
            transitive_dynamic_library: bool,
            output_category: Option<LibraryCategory>,
            action_name: ActionName,
        ) -> TargetCapabilities {
            TargetCapabilities {
                linker_or_archiver,
                executable,
                dynamic_library,
                transitive_dynamic_library,
                output_category,
                action_name,
            }
        }

        match self {
            LinkTargetType::Executable => row(
                Linker,
                true,
                false,
                false,
                None,
                ActionName::CppLinkExecutable,
            ),
            LinkTargetType::ObjcExecutable => row(
                Linker,
                true,
                false,
                false,
                None,
                ActionName::ObjcExecutable,
            ),
            LinkTargetType::StaticLibrary => row(
                Archiver,
                false,
                false,
                false,
                Some(LibraryCategory::StaticLibrary),
                ActionName::CppLinkStaticLibrary,
            ),
            LinkTargetType::PicStaticLibrary => row(
                Archiver,
                false,
                false,
                false,
                Some(LibraryCategory::PicStaticLibrary),
                ActionName::CppLinkStaticLibrary,
            ),
            LinkTargetType::AlwaysLinkStaticLibrary => row(
                Archiver,
                false,
                false,
                false,
                Some(LibraryCategory::AlwaysLinkStaticLibrary),
                ActionName::CppLinkStaticLibrary,
            ),
            LinkTargetType::AlwaysLinkPicStaticLibrary => row(
                Archiver,
                false,
                false,
                false,
                Some(LibraryCategory::AlwaysLinkPicStaticLibrary),
                ActionName::CppLinkStaticLibrary,
            ),
            LinkTargetType::ObjcFullyLinkedArchive => row(
                Archiver,
                false,
                false,
                false,
                Some(LibraryCategory::StaticLibrary),
                ActionName::ObjcFullyLink,
            ),
            LinkTargetType::DynamicLibrary => row(
                Linker,
                false,
                true,
                true,
                Some(LibraryCategory::DynamicLibrary),
                ActionName::CppLinkDynamicLibrary,
            ),
            LinkTargetType::NodepsDynamicLibrary => row(
                Linker,
                false,
                true,
                false,
                Some(LibraryCategory::DynamicLibrary),
                ActionName::CppLinkNodepsDynamicLibrary,
            ),
            LinkTargetType::InterfaceDynamicLibrary => row(
                Linker,
                false,
                false,
                false,
                Some(LibraryCategory::InterfaceLibrary),
                ActionName::CppLinkDynamicLibrary,
            ),
        }
    }

    pub fn is_executable(self) -> bool {
        self.capabilities().executable
    }

    pub fn is_dynamic_library(self) -> bool {
        self.capabilities().dynamic_library
    }

    pub fn is_transitive_dynamic_library(self) -> bool {
        self.capabilities().transitive_dynamic_library
    }

    pub fn linker_or_archiver(self) -> LinkerOrArchiver {
        self.capabilities().linker_or_archiver
    }

    pub fn is_archiver(self) -> bool {
        self.linker_or_archiver() == LinkerOrArchiver::Archiver
    }

    pub fn action_name(self) -> ActionName {
        self.capabilities().action_name
    }

    /// The action used for the indexing step of a ThinLTO link producing this kind of target.
    /// `None` for targets that can't be LTO indexed, i.e. archives and interface libraries.
    pub fn lto_index_action_name(self) -> Option<ActionName> {
        if self.is_executable() {
            Some(ActionName::LtoIndexExecutable)
        } else if self.is_transitive_dynamic_library() {
            Some(ActionName::LtoIndexDynamicLibrary)
        } else if self.is_dynamic_library() {
            Some(ActionName::LtoIndexNodepsDynamicLibrary)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn executable_and_dynamic_are_exclusive() {
        for t in LinkTargetType::iter() {
            let c = t.capabilities();
            assert!(!(c.executable && c.dynamic_library), "{t:?}");
            assert!(!c.transitive_dynamic_library || c.dynamic_library, "{t:?}");
            assert_eq!(c.executable, c.output_category.is_none(), "{t:?}");
            if c.linker_or_archiver == LinkerOrArchiver::Archiver {
                assert!(!c.executable && !c.dynamic_library, "{t:?}");
            }
        }
    }

    #[test]
    fn lto_index_action_only_for_linked_outputs() {
        assert_eq!(
            LinkTargetType::Executable.lto_index_action_name(),
            Some(ActionName::LtoIndexExecutable)
        );
        assert_eq!(
            LinkTargetType::DynamicLibrary.lto_index_action_name(),
            Some(ActionName::LtoIndexDynamicLibrary)
        );
        assert_eq!(
            LinkTargetType::NodepsDynamicLibrary.lto_index_action_name(),
            Some(ActionName::LtoIndexNodepsDynamicLibrary)
        );
        assert_eq!(LinkTargetType::StaticLibrary.lto_index_action_name(), None);
        assert_eq!(
            LinkTargetType::InterfaceDynamicLibrary.lto_index_action_name(),
            None
        );
    }

    #[test]
    fn action_names_round_trip_through_strings() {
        for name in ActionName::iter() {
            assert_eq!(ActionName::from_str(name.as_str()).unwrap(), name);
        }
        assert_eq!(ActionName::CppLinkExecutable.to_string(), "c++-link-executable");
    }
}
