//! Dictionary Tests
//!
//! Tests for attribute lookup and tag overrides.

use std::collections::HashSet;

use prosafe::attribute::{resolve, standard_attributes, Access, Dictionary, DISCOVERY_ATTRIBUTES};
use prosafe::protocol::Tag;
use prosafe::NsdpError;

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_resolve_known_tags() {
    let expected = [
        ("model", 0x0001),
        ("name", 0x0003),
        ("mac", 0x0004),
        ("ip", 0x0006),
        ("new_password", 0x0009),
        ("password", 0x000a),
        ("dhcp", 0x000b),
        ("vlan_pvid", 0x3000),
        ("port_mirror", 0x5c00),
        ("igmp_snooping", 0x6800),
    ];
    for (name, tag) in expected {
        assert_eq!(resolve(name).unwrap().tag, Tag(tag), "{}", name);
    }
}

#[test]
fn test_resolve_is_case_insensitive() {
    assert_eq!(resolve("NetMask").unwrap().name, "netmask");
}

#[test]
fn test_resolve_unknown() {
    match resolve("colour") {
        Err(NsdpError::UnknownAttribute(name)) => assert_eq!(name, "colour"),
        other => panic!("Expected UnknownAttribute, got {:?}", other),
    }
}

#[test]
fn test_names_and_tags_are_unique() {
    let names: HashSet<_> = standard_attributes().iter().map(|a| a.name).collect();
    let tags: HashSet<_> = standard_attributes().iter().map(|a| a.tag).collect();

    assert_eq!(names.len(), standard_attributes().len());
    assert_eq!(tags.len(), standard_attributes().len());
}

#[test]
fn test_discovery_attributes_resolve() {
    for name in DISCOVERY_ATTRIBUTES {
        assert!(resolve(name).unwrap().is_queryable());
    }
}

// =============================================================================
// Access Tests
// =============================================================================

#[test]
fn test_settable_attributes_require_auth() {
    for attribute in standard_attributes().iter().filter(|a| a.is_settable()) {
        assert!(attribute.requires_auth, "{}", attribute.name);
    }
}

#[test]
fn test_access_rules() {
    let model = resolve("model").unwrap();
    assert!(model.is_queryable());
    assert!(!model.is_settable());

    let password = resolve("password").unwrap();
    assert_eq!(password.access, Access::Internal);
    assert!(!password.is_queryable());
    assert!(!password.is_settable());

    let reboot = resolve("reboot").unwrap();
    assert!(reboot.is_settable());
    assert!(!reboot.is_queryable());
}

#[test]
fn test_only_vlan_tables_are_unbatched() {
    let unbatched: Vec<&str> = standard_attributes()
        .iter()
        .filter(|a| !a.batchable)
        .map(|a| a.name)
        .collect();
    assert_eq!(unbatched, vec!["vlan_id", "vlan802_id"]);
}

// =============================================================================
// Dictionary Tests
// =============================================================================

#[test]
fn test_dictionary_by_tag() {
    let dictionary = Dictionary::standard();
    assert_eq!(dictionary.by_tag(Tag(0x0003)).unwrap().name, "name");
    assert!(dictionary.by_tag(Tag(0x7777)).is_none());
    assert_eq!(dictionary.password().unwrap().tag, Tag(0x000a));
}

#[test]
fn test_tag_override() {
    let dictionary = Dictionary::standard()
        .with_tag_override("loop_detection", Tag(0x9400))
        .unwrap();

    assert_eq!(dictionary.resolve("loop_detection").unwrap().tag, Tag(0x9400));
    assert_eq!(dictionary.by_tag(Tag(0x9400)).unwrap().name, "loop_detection");
    assert!(dictionary.by_tag(Tag(0x9000)).is_none());
}

#[test]
fn test_tag_override_collision() {
    let result = Dictionary::standard().with_tag_override("location", Tag(0x0003));
    assert!(matches!(result, Err(NsdpError::Config(_))));
}

#[test]
fn test_tag_override_unknown_name() {
    let result = Dictionary::standard().with_tag_override("colour", Tag(0x0100));
    assert!(matches!(result, Err(NsdpError::UnknownAttribute(_))));
}

#[test]
fn test_queryable_excludes_write_only() {
    let dictionary = Dictionary::standard();
    let names: Vec<&str> = dictionary.queryable().map(|a| a.name).collect();

    assert!(names.contains(&"vlan_id"));
    assert!(!names.contains(&"reboot"));
    assert!(!names.contains(&"new_password"));
    assert!(!names.contains(&"password"));
}
