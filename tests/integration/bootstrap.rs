//! Host bootstrap lifecycle: starting a host starts its bootstrap
//! resources, stopping it tears them back down in reverse order, and a
//! `PERSISTENT` bootstrap resource survives a host stop.
//!
//! Grounded on `original_source/python/KiSC/Cluster/host.py`'s
//! `start()`/`stop()`.
use std::fs;
use std::io::Write;
use std::path::Path;

use kisc::cluster::host;
use kisc::config::Configuration;
use kisc::runtime::local_hostname;
use kisc::status::Status;

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("kisc.cfg");
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn load(dir: &Path, contents: &str) -> Configuration {
    let path = write_config(dir, contents);
    let (config, errors) = Configuration::load(&path);
    assert!(errors.is_empty(), "unexpected load errors: {errors:?}");
    config
}

#[test]
fn starting_host_starts_its_bootstrap_resources() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    let mut config = load(
        dir.path(),
        &format!(
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
            cache = dir.path().join("cache").display(),
            local = dir.path().join("local-runtime").display(),
            global = dir.path().join("global-runtime").display(),
        ),
    );

    let errors = host::start(&mut config, "host1");
    assert!(errors.is_empty(), "host start failed: {errors:?}");
    assert_eq!(host::status(&mut config, "host1", false, None), Status::Started);
    assert!(host::exists_runtime(&config, "host1"));

    let bootstrap_status = kisc::cluster::resource::status(&mut config, "infra1", true, false, None);
    assert_eq!(bootstrap_status, Status::Started);
}

#[test]
fn stopping_host_stops_bootstrap_resources_unless_persistent() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    let mut config = load(
        dir.path(),
        &format!(
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
             TYPE=service_dummy\n\
             \n\
             [infra2]\n\
             TYPE=service_dummy\n\
             PERSISTENT=yes\n",
            cache = dir.path().join("cache").display(),
            local = dir.path().join("local-runtime").display(),
            global = dir.path().join("global-runtime").display(),
        ),
    );

    assert!(host::start(&mut config, "host1").is_empty());
    assert!(host::stop(&mut config, "host1", false).is_empty());

    assert_eq!(host::status(&mut config, "host1", false, None), Status::Stopped);
    assert!(!host::exists_runtime(&config, "host1"));
    assert_eq!(kisc::cluster::resource::status(&mut config, "infra1", true, false, None), Status::Stopped);
    assert_eq!(kisc::cluster::resource::status(&mut config, "infra2", true, false, None), Status::Started);
}

#[test]
fn starting_an_already_started_host_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    let mut config = load(
        dir.path(),
        &format!(
            "[KiSC]\n\
             cache_dir={cache}\n\
             local_runtime_dir={local}\n\
             global_runtime_dir={global}\n\
             \n\
             [host1]\n\
             TYPE=cluster_host\n\
             hostname={hostname}\n",
            cache = dir.path().join("cache").display(),
            local = dir.path().join("local-runtime").display(),
            global = dir.path().join("global-runtime").display(),
        ),
    );

    assert!(host::start(&mut config, "host1").is_empty());
    assert!(host::start(&mut config, "host1").is_empty());
    assert_eq!(host::status(&mut config, "host1", false, None), Status::Started);
}

#[test]
fn stopping_a_never_started_host_requires_force() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    let mut config = load(
        dir.path(),
        &format!(
            "[KiSC]\n\
             cache_dir={cache}\n\
             local_runtime_dir={local}\n\
             global_runtime_dir={global}\n\
             \n\
             [host1]\n\
             TYPE=cluster_host\n\
             hostname={hostname}\n",
            cache = dir.path().join("cache").display(),
            local = dir.path().join("local-runtime").display(),
            global = dir.path().join("global-runtime").display(),
        ),
    );

    let errors = host::stop(&mut config, "host1", false);
    assert_eq!(errors, vec!["Host not started".to_string()]);

    let errors = host::stop(&mut config, "host1", true);
    assert!(errors.is_empty(), "forced stop should succeed even with no runtime: {errors:?}");
}
