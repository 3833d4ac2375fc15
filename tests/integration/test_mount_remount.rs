//! Integration tests for mount orchestration through the facade
//!
//! The mount table comes from a temp fixture file that the fake shell
//! rewrites when it "executes" a remount, so the verify-by-refresh
//! behavior is exercised end to end.

#[path = "../test_utils/fake_shell.rs"]
mod fake_shell;

use std::fs;
use std::time::Duration;

use fake_shell::{start_session, Reply};
use propctl::{MountTable, PrivilegedShell};

const WAIT: Duration = Duration::from_secs(5);

const RO_TABLE: &str = "\
/dev/block/mmcblk0p24 /system ext4 ro,noatime 0 0
/dev/block/mmcblk0p25 /data ext4 rw,nosuid 0 0
";

const RW_TABLE: &str = "\
/dev/block/mmcblk0p24 /system ext4 rw,noatime 0 0
/dev/block/mmcblk0p25 /data ext4 rw,nosuid 0 0
";

#[tokio::test]
async fn test_check_mount_flags() {
    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join("mounts");
    fs::write(&table_path, RO_TABLE).unwrap();

    let (session, _shell) = start_session(true, |_, _| Reply::Answer(vec![], 0)).await;
    let shell =
        PrivilegedShell::with_session(session, MountTable::new(&table_path), WAIT).await;

    assert!(shell.check_mount_flags("/system", "ro").await);
    assert!(!shell.check_mount_flags("/system", "rw").await);
    assert!(shell.check_mount_flags("/data", "rw").await);
    assert!(!shell.check_mount_flags("/nowhere", "rw").await);
}

#[tokio::test]
async fn test_remount_issues_all_variants_and_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join("mounts");
    fs::write(&table_path, RO_TABLE).unwrap();

    let rewrite = table_path.clone();
    let (session, shell_task) = start_session(true, move |_, commands| {
        // The remount unit "takes effect" once its last variant arrives.
        if commands.iter().any(|c| c.contains("rw,remount")) {
            fs::write(&rewrite, RW_TABLE).unwrap();
        }
        Reply::Answer(vec![], 0)
    })
    .await;
    let shell =
        PrivilegedShell::with_session(session, MountTable::new(&table_path), WAIT).await;

    assert!(shell.mount_partition("/system", "rw").await);
    assert!(shell.check_mount_flags("/system", "rw").await);

    // Second call is idempotent: no further shell interaction.
    assert!(shell.mount_partition("/system", "rw").await);

    let mut shell = shell;
    shell.close().await;
    let report = shell_task.await.unwrap();
    assert_eq!(report.markers.len(), 1);
    assert_eq!(
        report.commands,
        vec![
            "mount -o rw,remount /dev/block/mmcblk0p24 /system".to_string(),
            "busybox mount -o rw,remount /dev/block/mmcblk0p24 /system".to_string(),
            "toolbox mount -o rw,remount /dev/block/mmcblk0p24 /system".to_string(),
            "/system/bin/toolbox mount -o rw,remount /dev/block/mmcblk0p24 /system"
                .to_string(),
        ]
    );
}

#[tokio::test]
async fn test_remount_success_judged_by_table_not_exit_code() {
    // The echoed status belongs to the last variant; an earlier variant
    // can have done the work even when that status is nonzero.
    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join("mounts");
    fs::write(&table_path, RO_TABLE).unwrap();

    let rewrite = table_path.clone();
    let (session, _shell_task) = start_session(true, move |_, commands| {
        if commands.iter().any(|c| c.contains("rw,remount")) {
            fs::write(&rewrite, RW_TABLE).unwrap();
        }
        // toolbox missing: the last variant reports 127.
        Reply::Answer(vec!["toolbox: not found".to_string()], 127)
    })
    .await;
    let shell =
        PrivilegedShell::with_session(session, MountTable::new(&table_path), WAIT).await;

    assert!(shell.mount_partition("/system", "rw").await);
}

#[tokio::test]
async fn test_remount_fails_when_nothing_changes() {
    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join("mounts");
    fs::write(&table_path, RO_TABLE).unwrap();

    let (session, _shell_task) = start_session(true, |_, _| {
        Reply::Answer(vec!["mount: permission denied".to_string()], 1)
    })
    .await;
    let shell =
        PrivilegedShell::with_session(session, MountTable::new(&table_path), WAIT).await;

    assert!(!shell.mount_partition("/system", "rw").await);
    assert!(!shell.mount_partition("/unknown", "rw").await);
}

#[tokio::test]
async fn test_unmount_reports_shell_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join("mounts");
    fs::write(&table_path, RO_TABLE).unwrap();

    let (session, shell_task) = start_session(true, |_, _| Reply::Answer(vec![], 0)).await;
    let shell =
        PrivilegedShell::with_session(session, MountTable::new(&table_path), WAIT).await;

    assert!(shell.unmount_partition("/data").await);
    assert!(!shell.unmount_partition("/nowhere").await);

    let mut shell = shell;
    shell.close().await;
    let report = shell_task.await.unwrap();
    assert_eq!(report.commands[0], "umount /data");
    assert_eq!(report.commands.len(), 4);
}

#[tokio::test]
async fn test_run_command_requires_zero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join("mounts");
    fs::write(&table_path, RO_TABLE).unwrap();

    let (session, _shell_task) = start_session(true, |index, _| {
        Reply::Answer(vec![], if index == 0 { 0 } else { 1 })
    })
    .await;
    let shell =
        PrivilegedShell::with_session(session, MountTable::new(&table_path), WAIT).await;

    assert!(shell.run_command("true").await);
    assert!(!shell.run_command("false").await);
}
