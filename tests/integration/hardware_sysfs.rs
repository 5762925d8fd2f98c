// Fingerprinting and accelerator discovery against fake sysfs trees

use crate::common::FakeSysfs;
use ffcaps::engine::Accelerator;
use ffcaps::engine::hardware::{self, HardwareFingerprint};

#[test]
fn test_single_intel_card() {
    let sys = FakeSysfs::new();
    sys.add_card("card0", "0x8086", "0x56a0");

    let fp = hardware::fingerprint_from_sysfs(sys.root());
    assert_eq!(fp.canonical(), "linux|8086:56a0");
    assert_eq!(fp.platform(), "linux");
}

#[test]
fn test_enumeration_order_does_not_matter() {
    let a = FakeSysfs::new();
    a.add_card("card0", "0x10de", "0x2684")
        .add_card("card1", "0x8086", "0x56a0");

    let b = FakeSysfs::new();
    b.add_card("card0", "0x8086", "0x56a0")
        .add_card("card1", "0x10de", "0x2684");

    assert_eq!(
        hardware::fingerprint_from_sysfs(a.root()),
        hardware::fingerprint_from_sysfs(b.root())
    );
}

#[test]
fn test_connectors_and_render_nodes_ignored() {
    let sys = FakeSysfs::new();
    sys.add_card("card0", "0x1002", "0x73bf")
        .add_bare_node("card0-DP-1")
        .add_bare_node("renderD128")
        .add_bare_node("card1");

    let fp = hardware::fingerprint_from_sysfs(sys.root());
    assert_eq!(fp.devices().len(), 1);
    assert_eq!(fp.canonical(), "linux|1002:73bf");
}

#[test]
fn test_no_drm_is_software_sentinel() {
    let sys = FakeSysfs::new();
    let fp = hardware::fingerprint_from_sysfs(sys.root());
    assert!(fp.is_software());
    assert_eq!(fp, HardwareFingerprint::software());
}

#[test]
fn test_swapped_gpu_changes_fingerprint() {
    let before = FakeSysfs::new();
    before.add_card("card0", "0x8086", "0x56a0");
    let after = FakeSysfs::new();
    after.add_card("card0", "0x8086", "0x56a5");

    assert_ne!(
        hardware::fingerprint_from_sysfs(before.root()).canonical(),
        hardware::fingerprint_from_sysfs(after.root()).canonical()
    );
}

#[test]
fn test_m2m_detection() {
    let sys = FakeSysfs::new();
    sys.add_video4linux("video0", "UVC Camera");
    assert!(!hardware::has_m2m_device(sys.root()));

    sys.add_video4linux("video10", "bcm2835-codec-decode");
    assert!(hardware::has_m2m_device(sys.root()));
}

#[test]
fn test_shortlist_from_sysfs() {
    let sys = FakeSysfs::new();
    sys.add_card("card0", "0x8086", "0x56a0")
        .add_video4linux("video11", "rpivid-m2m");

    let fp = hardware::fingerprint_from_sysfs(sys.root());
    let shortlist = hardware::accelerator_shortlist(&fp, hardware::has_m2m_device(sys.root()));
    assert_eq!(
        shortlist,
        vec![
            Accelerator::Qsv,
            Accelerator::Vaapi,
            Accelerator::V4l2m2m,
            Accelerator::Software
        ]
    );
}
