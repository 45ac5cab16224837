//! Resource migration: rejecting a migration target that isn't started
//! or isn't allowed, and rolling back (forced stop, unregistration) when
//! the plugin itself can't complete the move.
//!
//! Grounded on `original_source/python/KiSC/Cluster/resource.py`'s
//! `migrate()`.
use std::fs;
use std::io::Write;
use std::path::Path;

use kisc::cluster::{host, resource};
use kisc::config::Configuration;
use kisc::resource::ResourcePlugin;
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

fn two_host_config(dir: &Path, hostname: &str) -> String {
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
         [host2]\n\
         TYPE=cluster_host\n\
         hostname=host2.example.com\n\
         \n\
         [job1]\n\
         TYPE=include\n\
         BOOTSTRAP=no\n\
         file=regular.cfg\n",
        cache = dir.join("cache").display(),
        local = dir.join("local-runtime").display(),
        global = dir.join("global-runtime").display(),
    )
}

#[test]
fn migrate_to_unstarted_host_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    fs::write(dir.path().join("regular.cfg"), "[job]\nTYPE=service_dummy\n").unwrap();
    let mut config = load(dir.path(), &two_host_config(dir.path(), &hostname));

    assert!(host::start(&mut config, "host1").is_empty());
    assert!(resource::start(&mut config, "host1", "job", false, false).is_empty());

    let errors = resource::migrate(&mut config, "host1", "host2", "job", false);
    assert_eq!(errors, vec!["Remote host not started".to_string()]);
    assert_eq!(resource::status(&mut config, "job", false, false, None), Status::Started);
}

#[test]
fn migrate_rolls_back_when_plugin_cannot_migrate() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    fs::write(dir.path().join("regular.cfg"), "[job]\nTYPE=service_dummy\n").unwrap();
    let mut config = load(dir.path(), &two_host_config(dir.path(), &hostname));

    assert!(host::start(&mut config, "host1").is_empty());
    assert!(resource::start(&mut config, "host1", "job", false, false).is_empty());

    // host2 is remote in this test process, so it can only be "started"
    // by directly poking its cached status and runtime file into existence.
    config.host_mut("host2").unwrap().set_cached_status(Status::Started);
    assert!(host::save_runtime(&mut config, "host2").is_ok());

    let errors = resource::migrate(&mut config, "host1", "host2", "job", false);
    assert!(errors.iter().any(|e| e.contains("not implemented")), "expected a migrate-unsupported error: {errors:?}");
    assert!(errors.iter().any(|e| e.contains("Failed to migrate resource")));

    // Rolled back: the resource was force-stopped on the local host.
    assert_eq!(resource::status(&mut config, "job", false, false, None), Status::Stopped);
    let hosts = config.resource("job", false).unwrap().hosts_ids();
    assert!(hosts.is_empty(), "resource should be unregistered after rollback: {hosts:?}");
}

#[test]
fn migrate_to_disallowed_host_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    fs::write(dir.path().join("regular.cfg"), "[job]\nTYPE=service_dummy\nHOSTS=host1\n").unwrap();
    let mut config = load(dir.path(), &two_host_config(dir.path(), &hostname));

    assert!(host::start(&mut config, "host1").is_empty());
    assert!(resource::start(&mut config, "host1", "job", false, false).is_empty());
    assert!(host::save_runtime(&mut config, "host2").is_ok());

    let errors = resource::migrate(&mut config, "host1", "host2", "job", false);
    assert_eq!(errors, vec!["Resource is not allowed to run on remote host".to_string()]);
}

#[test]
fn migrate_from_remote_host_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let hostname = local_hostname().unwrap();
    fs::write(dir.path().join("regular.cfg"), "[job]\nTYPE=service_dummy\n").unwrap();
    let mut config = load(dir.path(), &two_host_config(dir.path(), &hostname));

    let errors = resource::migrate(&mut config, "host2", "host1", "job", false);
    assert_eq!(errors, vec!["Cannot migrate resource from remote host".to_string()]);
}
