//! Finding the bitcode among a link's inputs.

use crate::artifact::Artifact;
use crate::error::Result;
use crate::inputs::LibraryInput;
use crate::inputs::LtoCompilationContext;
use crate::inputs::ObjectInput;
use crate::ordered_set::FixedIndexMap;
use crate::ordered_set::OrderedSet;
use crate::ordered_set::new_map;
use crate::plan_ensure;
use serde::Serialize;
use std::path::Path;

/// Whether the target's own objects or any of its libraries contain bitcode.
pub fn has_lto_bitcode_inputs<'a>(
    lto: &LtoCompilationContext,
    libraries: impl IntoIterator<Item = &'a LibraryInput>,
) -> bool {
    !lto.is_empty() || libraries.into_iter().any(|lib| !lib.lto.is_empty())
}

/// All the bitcode files that take part in a link's LTO indexing. This bounds what a unique
/// backend compile is allowed to read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BitcodeFiles {
    files: OrderedSet<Artifact>,
}

impl BitcodeFiles {
    /// Collects the bitcode reachable from a link. Library members only count when
    /// `include_link_static` is set, since otherwise the libraries' shared backends are used.
    /// Library bitcode comes first, then the target's own.
    pub(crate) fn collect(
        lto: &LtoCompilationContext,
        objects: &OrderedSet<ObjectInput>,
        libraries: &OrderedSet<LibraryInput>,
        include_link_static: bool,
    ) -> Self {
        let mut files = OrderedSet::new();
        if include_link_static {
            let library_bitcode = library_bitcode(libraries);
            for lib in libraries {
                files.extend(
                    lib.objects
                        .iter()
                        .filter(|object| library_bitcode.contains(object))
                        .cloned(),
                );
            }
        }
        files.extend(
            objects
                .iter()
                .filter(|input| lto.contains_bitcode_file(&input.artifact))
                .map(|input| input.artifact.clone()),
        );
        Self { files }
    }

    pub fn files(&self) -> &OrderedSet<Artifact> {
        &self.files
    }

    pub fn contains(&self, artifact: &Artifact) -> bool {
        self.files.contains(artifact)
    }

    /// Tree artifacts expand to files named after the tree, so the native objects produced from
    /// them would collide with the index files unless the two live in different directories.
    pub(crate) fn check_output_roots(&self, output_root: &Path, object_root: &Path) -> Result {
        if let Some(tree) = self.files.iter().find(|a| a.is_tree_artifact()) {
            plan_ensure!(
                output_root != object_root,
                Usage,
                "ThinLTO with tree artifacts requires feature use_lto_native_object_directory \
                 (bitcode tree `{tree}`)"
            );
        }
        Ok(())
    }
}

/// Maps each bitcode file to the native object that its backend produces. Every reference to a
/// bitcode file in a link that has been through backend planning goes through this mapping.
#[derive(Debug, Clone)]
pub struct BitcodeMapping {
    objects: FixedIndexMap<Artifact, Artifact>,

    /// Bitcode files whose object comes from a shared backend. The indexer doesn't list these.
    shared: OrderedSet<Artifact>,
}

impl Default for BitcodeMapping {
    fn default() -> Self {
        Self {
            objects: new_map(),
            shared: OrderedSet::new(),
        }
    }
}

impl BitcodeMapping {
    pub(crate) fn insert(&mut self, bitcode: Artifact, object: Artifact, shared: bool) {
        if shared {
            self.shared.insert(bitcode.clone());
        }
        self.objects.insert(bitcode, object);
    }

    /// Whether `artifact` is compiled by a backend that this link's indexing step feeds, in which
    /// case the indexer's parameter file lists its object.
    pub fn is_indexed(&self, artifact: &Artifact) -> bool {
        self.objects.contains_key(artifact) && !self.shared.contains(artifact)
    }

    /// Returns the native object for `artifact`, or `artifact` itself if it isn't mapped.
    pub fn map<'a>(&'a self, artifact: &'a Artifact) -> &'a Artifact {
        self.objects.get(artifact).unwrap_or(artifact)
    }

    pub fn contains(&self, artifact: &Artifact) -> bool {
        self.objects.contains_key(artifact)
    }

    pub fn get(&self, artifact: &Artifact) -> Option<&Artifact> {
        self.objects.get(artifact)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Artifact, &Artifact)> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Serialize for BitcodeMapping {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.objects
                .iter()
                .map(|(bitcode, object)| (bitcode.to_string(), object)),
        )
    }
}

/// The union of the bitcode files of all `libraries`' LTO contexts.
pub(crate) fn library_bitcode(libraries: &OrderedSet<LibraryInput>) -> OrderedSet<Artifact> {
    libraries
        .iter()
        .flat_map(|lib| lib.lto.bitcode_files().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::error::error_kind;
    use crate::inputs::BitcodeInfo;
    use crate::inputs::LibraryCategory;
    use itertools::Itertools;
    use std::sync::Arc;

    fn a(path: &str) -> Artifact {
        Artifact::derived("bin", path)
    }

    fn setup() -> (
        LtoCompilationContext,
        OrderedSet<ObjectInput>,
        OrderedSet<LibraryInput>,
    ) {
        let own =
            LtoCompilationContext::default().with_bitcode(a("main.o"), BitcodeInfo::default());
        let objects = [ObjectInput::new(a("main.o")), ObjectInput::new(a("plain.o"))]
            .into_iter()
            .collect();
        let lib_lto =
            LtoCompilationContext::default().with_bitcode(a("lib/x.o"), BitcodeInfo::default());
        let lib = LibraryInput::new(a("lib/libx.a"), LibraryCategory::StaticLibrary)
            .with_objects([a("lib/x.o"), a("lib/native.o")], Arc::new(lib_lto));
        (own, objects, [lib].into_iter().collect())
    }

    #[test]
    fn libraries_first_then_own_objects() {
        let (own, objects, libraries) = setup();
        let files = BitcodeFiles::collect(&own, &objects, &libraries, true);
        assert_eq!(
            files.files().iter().cloned().collect_vec(),
            [a("lib/x.o"), a("main.o")]
        );
    }

    #[test]
    fn library_members_excluded_when_not_indexed() {
        let (own, objects, libraries) = setup();
        let files = BitcodeFiles::collect(&own, &objects, &libraries, false);
        assert_eq!(files.files().iter().cloned().collect_vec(), [a("main.o")]);
    }

    #[test]
    fn detects_bitcode_anywhere() {
        let (own, _, libraries) = setup();
        assert!(has_lto_bitcode_inputs(&own, &libraries));
        assert!(has_lto_bitcode_inputs(
            &LtoCompilationContext::default(),
            &libraries
        ));
        assert!(!has_lto_bitcode_inputs(
            &LtoCompilationContext::default(),
            &OrderedSet::<LibraryInput>::new()
        ));
    }

    #[test]
    fn unmapped_artifacts_map_to_themselves() {
        let mut mapping = BitcodeMapping::default();
        mapping.insert(a("x.o"), a("x.lto/x.o"), false);
        mapping.insert(a("z.o"), a("shared.nonlto/z.o"), true);
        assert_eq!(mapping.map(&a("x.o")), &a("x.lto/x.o"));
        assert_eq!(mapping.map(&a("y.o")), &a("y.o"));
        assert!(!mapping.contains(&a("y.o")));
        assert!(mapping.is_indexed(&a("x.o")));
        assert!(!mapping.is_indexed(&a("y.o")));
        assert!(!mapping.is_indexed(&a("z.o")));
    }

    #[test]
    fn tree_bitcode_needs_separate_object_root() {
        let tree = Artifact::tree("bin", "pkg/objs");
        let lto =
            LtoCompilationContext::default().with_bitcode(tree.clone(), BitcodeInfo::default());
        let objects = [ObjectInput::new(tree)].into_iter().collect();
        let files = BitcodeFiles::collect(&lto, &objects, &OrderedSet::new(), true);
        let root = Path::new("pkg/bin.lto");
        let error = files.check_output_roots(root, root).unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::Usage));
        files
            .check_output_roots(root, Path::new("pkg/bin.lto-obj"))
            .unwrap();
    }
}
