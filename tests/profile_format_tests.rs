//! Integration tests for the profile file format
//!
//! These tests verify:
//! - Canonical layout of written profiles
//! - Write/parse round trips, including a property test over generated documents
//! - Lenient recovery of hand-edited files

use camino::{Utf8Path, Utf8PathBuf};
use me3_manager::models::{
    Dependency, Initializer, NativeEntry, PackageEntry, ProfileDocument, SupportEntry,
};
use me3_manager::{ProfileStore, ProfileWriter};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

const CONFIG_ROOT: &str = "/cfg/profiles";
const PROFILE: &str = "/cfg/profiles/eldenring-default.me3";

fn writer() -> ProfileWriter {
    ProfileWriter::new(CONFIG_ROOT, vec!["eldenring-mods".to_string()])
}

#[test]
fn test_empty_document_roundtrip() {
    let rendered = writer().render(Utf8Path::new(PROFILE), &ProfileDocument::default());
    assert!(rendered.contains("natives = []"));
    assert!(rendered.contains("supports = []"));
    assert!(rendered.contains("packages = []"));

    let parsed = ProfileStore::new().parse_str(&rendered);
    assert_eq!(parsed, ProfileDocument::default());
}

#[test]
fn test_write_then_parse_from_disk() {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let profile_path = root.join("eldenring-default.me3");
    let writer = ProfileWriter::new(&root, vec!["eldenring-mods".to_string()]);

    let mut doc = ProfileDocument::default();
    doc.natives.push(NativeEntry::new("eldenring-mods\\Foo.dll"));
    doc.supports.push(SupportEntry::new("eldenring"));
    let mut package = PackageEntry::new("cool", root.join("eldenring-mods").join("cool").as_str());
    package.load_after.push(Dependency::new("base", true));
    doc.packages.push(package);

    writer.write(&profile_path, &doc).unwrap();
    let content = fs::read_to_string(&profile_path).unwrap();
    assert!(content.contains("{path = 'eldenring-mods\\Foo.dll'}"));
    assert!(content.contains(
        "{ id = \"cool\", source = 'eldenring-mods/cool', load_after = [{id = \"base\", optional = true}], load_before = [] }"
    ));

    let parsed = ProfileStore::new().parse(&profile_path);
    assert_eq!(parsed.natives, doc.natives);
    assert_eq!(parsed.supports, doc.supports);
    assert_eq!(parsed.packages[0].source.as_deref(), Some("eldenring-mods/cool"));
    assert_eq!(parsed.packages[0].load_after, vec![Dependency::new("base", true)]);
}

#[test]
fn test_hand_edited_file_is_recovered() {
    let content = r#"profileVersion = "v1"
# added by hand
natives = [
    {path = 'eldenring-mods\Seamless.dll', optional = false},
]
natives = [ {path = 'eldenring-mods\Dup.dll'} ]
supports = [ {name = "ELDEN RING", id = "ER"} ]
packages = []
"#;
    let doc = ProfileStore::new().parse_str(content);

    assert_eq!(doc.natives.len(), 2);
    assert_eq!(doc.natives[0].optional, Some(false));
    assert_eq!(doc.supports, vec![SupportEntry::new("eldenring")]);
}

fn dependency() -> impl Strategy<Value = Dependency> {
    ("[a-z][a-z0-9.]{0,7}", any::<bool>()).prop_map(|(id, optional)| Dependency::new(id, optional))
}

fn initializer() -> impl Strategy<Value = Initializer> {
    prop_oneof![
        "[a-z_]{1,10}".prop_map(Initializer::Function),
        (0u64..100_000).prop_map(|ms| Initializer::Delay { ms }),
    ]
}

fn native() -> impl Strategy<Value = NativeEntry> {
    (
        "[A-Za-z0-9_]{1,10}",
        proptest::option::of(any::<bool>()),
        proptest::option::of(initializer()),
        proptest::option::of("[a-z_]{1,10}"),
        proptest::collection::vec(dependency(), 0..3),
        proptest::collection::vec(dependency(), 0..3),
    )
        .prop_map(|(stem, optional, initializer, finalizer, load_before, load_after)| {
            NativeEntry {
                path: format!("eldenring-mods\\{}.dll", stem),
                optional,
                initializer,
                finalizer,
                load_before,
                load_after,
            }
        })
}

fn package() -> impl Strategy<Value = PackageEntry> {
    (
        "[a-z][a-z0-9-]{0,8}",
        proptest::option::of("[a-z]{1,8}"),
        proptest::collection::vec(dependency(), 0..3),
        proptest::collection::vec(dependency(), 0..3),
    )
        .prop_map(|(id, folder, load_before, load_after)| PackageEntry {
            source: folder.map(|folder| format!("eldenring-mods/{}", folder)),
            id,
            load_before,
            load_after,
        })
}

fn document() -> impl Strategy<Value = ProfileDocument> {
    (
        proptest::collection::vec(native(), 0..5),
        proptest::collection::vec("[a-z]{3,10}".prop_map(SupportEntry::new), 0..3),
        proptest::collection::vec(package(), 0..4),
    )
        .prop_map(|(natives, supports, packages)| ProfileDocument {
            natives,
            supports,
            packages,
            ..ProfileDocument::default()
        })
}

proptest! {
    #[test]
    fn prop_parse_of_write_preserves_document(doc in document()) {
        let rendered = writer().render(Utf8Path::new(PROFILE), &doc);
        let parsed = ProfileStore::new().parse_str(&rendered);
        prop_assert_eq!(parsed, doc);
    }
}
