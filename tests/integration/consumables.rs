//! Consumables admission control: a host's `CONSUMABLES` caps how many
//! resources wanting the same `CONSUMES` id can start concurrently,
//! unless overridden with `--force`.
//!
//! Grounded on `original_source/python/KiSC/Resource/cluster_host.py`'s
//! `registerResource()`.
use std::fs;
use std::io::Write;
use std::path::Path;

use kisc::cluster::{host, resource};
use kisc::config::Configuration;
use kisc::runtime::local_hostname;
use kisc::status::Status;

fn load(dir: &Path, contents: &str) -> Configuration {
    let path = dir.join("kisc.cfg");
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    let (config, errors) = Configuration::load(&path);
    assert!(errors.is_empty(), "unexpected load errors: {errors:?}");
    config
}

fn single_host_config(dir: &Path, hostname: &str) -> String {
    format!(
        "[KiSC]\n\
         cache_dir={cache}\n\
         local_runtime_dir={local}\n\
         global_runtime_dir={global}\n\
         \n\
         [host1]\n\
         TYPE=cluster_host\n\
         hostname={hostname}\n\
         CONSUMABLES=gpu:1\n\
         \n\
         [r1]\n\
         TYPE=include\n\
         BOOTSTRAP=no\n\
         file=regular.cfg\n",
        cache = dir.join("cache").display(),
        local = dir.join("local-runtime").display(),
        global = dir.join("global-runtime").display(),
    )
}

fn write_regular(dir: &Path, contents: &str) {
    let path = dir.join("regular.cfg");
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
}

#[test]
fn second_resource_is_refused_once_consumable_is_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    write_regular(
        dir.path(),
        "[gpu-job-1]\nTYPE=service_dummy\nCONSUMES=gpu:1\n\n\
         [gpu-job-2]\nTYPE=service_dummy\nCONSUMES=gpu:1\n",
    );
    let mut config = load(dir.path(), &single_host_config(dir.path(), &hostname));

    assert!(host::start(&mut config, "host1").is_empty());
    assert!(resource::start(&mut config, "host1", "gpu-job-1", false, false).is_empty());
    assert_eq!(resource::status(&mut config, "gpu-job-1", false, false, None), Status::Started);

    let errors = resource::start(&mut config, "host1", "gpu-job-2", false, false);
    assert!(!errors.is_empty(), "second job should be refused: consumable exhausted");
    assert!(errors.iter().any(|e| e.contains("Consumable exhausted")));
    assert_eq!(resource::status(&mut config, "gpu-job-2", false, false, None), Status::Stopped);
}

#[test]
fn force_overrides_exhausted_consumable() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    write_regular(
        dir.path(),
        "[gpu-job-1]\nTYPE=service_dummy\nCONSUMES=gpu:1\n\n\
         [gpu-job-2]\nTYPE=service_dummy\nCONSUMES=gpu:1\n",
    );
    let mut config = load(dir.path(), &single_host_config(dir.path(), &hostname));

    assert!(host::start(&mut config, "host1").is_empty());
    assert!(resource::start(&mut config, "host1", "gpu-job-1", false, false).is_empty());

    let errors = resource::start(&mut config, "host1", "gpu-job-2", false, true);
    assert!(errors.is_empty(), "forced start should oversubscribe: {errors:?}");
    assert_eq!(resource::status(&mut config, "gpu-job-2", false, false, None), Status::Started);
}

#[test]
fn stopping_a_resource_releases_its_consumable() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    write_regular(
        dir.path(),
        "[gpu-job-1]\nTYPE=service_dummy\nCONSUMES=gpu:1\n\n\
         [gpu-job-2]\nTYPE=service_dummy\nCONSUMES=gpu:1\n",
    );
    let mut config = load(dir.path(), &single_host_config(dir.path(), &hostname));

    assert!(host::start(&mut config, "host1").is_empty());
    assert!(resource::start(&mut config, "host1", "gpu-job-1", false, false).is_empty());
    assert!(resource::stop(&mut config, "host1", "gpu-job-1", false, false).is_empty());

    let errors = resource::start(&mut config, "host1", "gpu-job-2", false, false);
    assert!(errors.is_empty(), "consumable should be free again: {errors:?}");
}

#[test]
fn unlimited_consumable_never_refuses_admission() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    write_regular(
        dir.path(),
        "[slots-job-1]\nTYPE=service_dummy\nCONSUMES=slots:5\n\n\
         [slots-job-2]\nTYPE=service_dummy\nCONSUMES=slots:5\n",
    );
    let config_body = format!(
        "[KiSC]\n\
         cache_dir={cache}\n\
         local_runtime_dir={local}\n\
         global_runtime_dir={global}\n\
         \n\
         [host1]\n\
         TYPE=cluster_host\n\
         hostname={hostname}\n\
         CONSUMABLES=slots:-1\n\
         \n\
         [r1]\n\
         TYPE=include\n\
         BOOTSTRAP=no\n\
         file=regular.cfg\n",
        cache = dir.path().join("cache").display(),
        local = dir.path().join("local-runtime").display(),
        global = dir.path().join("global-runtime").display(),
    );
    let mut config = load(dir.path(), &config_body);

    assert!(host::start(&mut config, "host1").is_empty());
    assert!(resource::start(&mut config, "host1", "slots-job-1", false, false).is_empty());
    assert!(resource::start(&mut config, "host1", "slots-job-2", false, false).is_empty());
}
