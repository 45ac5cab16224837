//! End-to-end CLI exercises: invoke the `kisc` binary against a temporary
//! configuration file and check its exit codes and stdout, per
//! `Cli/host_status.py`/`Cli/resource_status.py`'s
//! `"{id} {STATUS} {extra}"` output contract.
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use kisc::runtime::local_hostname;

fn write_config(dir: &Path, hostname: &str) -> std::path::PathBuf {
    let path = dir.join("kisc.cfg");
    fs::write(
        &path,
        format!(
            "[KiSC]\n\
             cache_dir={cache}\n\
             local_runtime_dir={local}\n\
             global_runtime_dir={global}\n\
             \n\
             [host1]\n\
             TYPE=cluster_host\n\
             hostname={hostname}\n\
             \n\
             [infra1]\n\
             TYPE=service_dummy\n",
            cache = dir.join("cache").display(),
            local = dir.join("local-runtime").display(),
            global = dir.join("global-runtime").display(),
        ),
    )
    .unwrap();
    path
}

#[test]
fn host_status_reports_stopped_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    let config_path = write_config(dir.path(), &hostname);

    Command::cargo_bin("kisc")
        .unwrap()
        .args(["-C", config_path.to_str().unwrap(), "host", "status", "host1"])
        .assert()
        .code(2)
        .stdout("host1 Stopped -\n");
}

#[test]
fn host_start_then_status_reports_started() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    let config_path = write_config(dir.path(), &hostname);

    Command::cargo_bin("kisc")
        .unwrap()
        .args(["-C", config_path.to_str().unwrap(), "host", "start", "host1"])
        .assert()
        .code(0)
        .stdout("host1 Started -\n");

    Command::cargo_bin("kisc")
        .unwrap()
        .args(["-C", config_path.to_str().unwrap(), "host", "status", "host1"])
        .assert()
        .code(0)
        .stdout("host1 Started -\n");
}

#[test]
fn silent_suppresses_all_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    let config_path = write_config(dir.path(), &hostname);

    Command::cargo_bin("kisc")
        .unwrap()
        .args(["-S", "-C", config_path.to_str().unwrap(), "host", "status", "host1"])
        .assert()
        .code(2)
        .stdout("");
}

#[test]
fn config_list_hosts_prints_sorted_ids() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    let config_path = write_config(dir.path(), &hostname);

    Command::cargo_bin("kisc")
        .unwrap()
        .args(["-C", config_path.to_str().unwrap(), "config", "list", "hosts"])
        .assert()
        .code(0)
        .stdout("host1\n");
}

#[test]
fn unknown_config_file_is_an_operational_failure() {
    let dir = tempfile::tempdir().unwrap();

    Command::cargo_bin("kisc")
        .unwrap()
        .args(["-C", dir.path().join("missing.cfg").to_str().unwrap(), "host", "list"])
        .assert()
        .code(255);
}

#[test]
fn resource_status_reports_not_started() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    let config_path = write_config(dir.path(), &hostname);

    Command::cargo_bin("kisc")
        .unwrap()
        .args(["-C", config_path.to_str().unwrap(), "resource", "status", "infra1", "--bootstrap"])
        .assert()
        .code(2)
        .stdout("infra1 Stopped -\n");
}
