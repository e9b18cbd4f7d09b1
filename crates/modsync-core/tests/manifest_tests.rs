//! Manifest codec properties

use std::path::{Path, PathBuf};

use modsync_core::manifest::{MANIFEST_HEADER, ParseErrorKind};
use modsync_core::{Manifest, ModuleDescriptor, OriginId};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

const SYNC_ROOT: &str = "/work/project/synced_modules";
const CACHE_ROOT: &str = "/home/user/.cache/modsync/modules";

fn ident() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,8}"
}

fn descriptor() -> impl Strategy<Value = ModuleDescriptor> {
    (
        "[a-z0-9_]{1,8}",
        ident(),
        prop_oneof![Just(None), "[0-9a-f]{40}".prop_map(Some)],
        "[A-Za-z0-9_]{1,10}",
        "/src/[a-z]([a-z ]{0,10}[a-z])?",
        proptest::option::of(ident()),
    )
        .prop_map(|(ns, name, fp, label, local_path, prefix)| {
            let origin = OriginId::parse(&format!("{ns}/{name}")).unwrap();
            let destination = match prefix {
                Some(prefix) => format!("{prefix}/{name}"),
                None => format!("{ns}/{name}"),
            };
            let sync_location = Path::new(SYNC_ROOT).join(destination);
            match fp {
                Some(fp) => ModuleDescriptor::remote(
                    origin,
                    label,
                    fp,
                    Path::new(CACHE_ROOT),
                    sync_location,
                ),
                None => ModuleDescriptor::local(origin, local_path, sync_location),
            }
        })
}

fn manifest() -> impl Strategy<Value = Manifest> {
    proptest::collection::vec(descriptor(), 0..6).prop_map(|descriptors| {
        let mut manifest = Manifest::new(SYNC_ROOT, CACHE_ROOT);
        for descriptor in descriptors {
            manifest.insert(descriptor);
        }
        manifest
    })
}

proptest! {
    #[test]
    fn parse_inverts_serialize(m in manifest()) {
        let parsed = Manifest::parse(&m.serialize()).unwrap();
        prop_assert_eq!(parsed, m);
    }

    #[test]
    fn serialize_is_stable(m in manifest()) {
        let once = m.serialize();
        let twice = Manifest::parse(&once).unwrap().serialize();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn at_most_one_entry_per_origin(descriptors in proptest::collection::vec(descriptor(), 0..12)) {
        let mut manifest = Manifest::new(SYNC_ROOT, CACHE_ROOT);
        for descriptor in descriptors {
            manifest.insert(descriptor);
        }
        let mut origins: Vec<_> = manifest.modules().iter().map(|m| m.origin().clone()).collect();
        let total = origins.len();
        origins.sort();
        origins.dedup();
        prop_assert_eq!(origins.len(), total);
    }
}

#[rstest]
#[case::extra_header_hash("#########################################\n", 1)]
#[case::missing_sync_root("", 4)]
fn header_and_roots_are_checked(#[case] first_line: &str, #[case] line: usize) {
    let text = if first_line.is_empty() {
        format!("{MANIFEST_HEADER}\ncache_root: {CACHE_ROOT}\n")
    } else {
        format!("{first_line}{}\nsync_root: {SYNC_ROOT}\ncache_root: {CACHE_ROOT}\n", &MANIFEST_HEADER[MANIFEST_HEADER.find('\n').unwrap() + 1..])
    };
    let err = Manifest::parse(&text).unwrap_err();
    assert_eq!(err.line, line);
}

#[test]
fn missing_cache_root_line_names_expected_form() {
    let text = format!("{MANIFEST_HEADER}\nsync_root: {SYNC_ROOT}\n");
    let err = Manifest::parse(&text).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::MissingCacheRoot);
    assert!(err.to_string().contains("cache_root"));
}

#[test]
fn entries_without_relative_marker_are_malformed() {
    let text = format!(
        "{MANIFEST_HEADER}\nsync_root: {SYNC_ROOT}\ncache_root: {CACHE_ROOT}\nacme/widgets main abc -> acme/widgets\n"
    );
    let err = Manifest::parse(&text).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::MalformedEntry);
    assert_eq!(err.line, 6);
}

#[test]
fn save_then_load_round_trips() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("modules.mod");
    let mut manifest = Manifest::new(SYNC_ROOT, CACHE_ROOT);
    manifest.insert(ModuleDescriptor::remote(
        OriginId::parse("acme/widgets").unwrap(),
        "main",
        "abc123",
        Path::new(CACHE_ROOT),
        PathBuf::from(SYNC_ROOT).join("acme/widgets"),
    ));

    manifest.save(&path).unwrap();
    assert_eq!(Manifest::load(&path).unwrap(), Some(manifest));
}
