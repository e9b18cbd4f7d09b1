//! Requirements hook wired into a full sync

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use modsync_core::{
    AutoConfirm, DependencyRequest, Error, PackageEnvironment, RequirementsInstaller, Result,
    SyncEngine,
};
use modsync_git::GitRegistry;
use modsync_test_utils::git::OriginRepo;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Package environment that records install calls instead of running pip.
#[derive(Clone, Default)]
struct RecordingEnvironment {
    installed: HashMap<String, String>,
    installs: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl RecordingEnvironment {
    fn with(packages: &[(&str, &str)]) -> Self {
        Self {
            installed: packages
                .iter()
                .map(|(name, version)| (name.to_string(), version.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    fn installs(&self) -> Vec<(String, PathBuf)> {
        self.installs.lock().unwrap().clone()
    }
}

impl PackageEnvironment for RecordingEnvironment {
    fn installed_packages(&self) -> Result<HashMap<String, String>> {
        Ok(self.installed.clone())
    }

    fn install(&self, origin: &str, requirements_file: &Path) -> Result<()> {
        self.installs
            .lock()
            .unwrap()
            .push((origin.to_string(), requirements_file.to_path_buf()));
        Ok(())
    }
}

fn setup(requirements: Option<&str>) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let origins = temp.path().join("origins");
    let mut files = vec![("plot.py", "def plot(): pass\n")];
    if let Some(text) = requirements {
        files.push(("pip_requirements.txt", text));
    }
    OriginRepo::create(&origins, "acme/plots", &files);
    (temp, origins)
}

fn engine(temp: &TempDir, origins: &Path, env: RecordingEnvironment, answer: bool) -> SyncEngine {
    SyncEngine::builder(GitRegistry::new(origins.display().to_string()))
        .sync_root(temp.path().join("project/synced_modules"))
        .cache_root(temp.path().join("cache"))
        .confirm(AutoConfirm(answer))
        .post_sync_hook(RequirementsInstaller::new(env))
        .build()
        .unwrap()
}

#[test]
fn unsatisfied_requirements_are_installed_after_confirmation() {
    let (temp, origins) = setup(Some("# plotting\nnumpy>=1.20\nMatplotlib ~= 3.5\n"));
    let env = RecordingEnvironment::with(&[("numpy", "1.26.4"), ("matplotlib", "3.1.0")]);

    engine(&temp, &origins, env.clone(), true)
        .sync(&[DependencyRequest::new("acme/plots")], false, "e2e")
        .unwrap();

    let installs = env.installs();
    assert_eq!(installs.len(), 1);
    assert_eq!(installs[0].0, "acme/plots");
    assert_eq!(
        installs[0].1,
        temp.path()
            .join("project/synced_modules/acme/plots/pip_requirements.txt")
    );
}

#[test]
fn declined_install_still_syncs() {
    let (temp, origins) = setup(Some("requests==2.31.0\n"));
    let env = RecordingEnvironment::default();

    let manifest = engine(&temp, &origins, env.clone(), false)
        .sync(&[DependencyRequest::new("acme/plots")], false, "e2e")
        .unwrap();

    assert_eq!(manifest.len(), 1);
    assert!(env.installs().is_empty());
}

#[test]
fn satisfied_requirements_install_nothing() {
    let (temp, origins) = setup(Some("requests>=2\n"));
    let env = RecordingEnvironment::with(&[("requests", "2.31.0")]);

    engine(&temp, &origins, env.clone(), true)
        .sync(&[DependencyRequest::new("acme/plots")], false, "e2e")
        .unwrap();

    assert!(env.installs().is_empty());
}

#[test]
fn module_without_requirements_file_fails_the_sync() {
    let (temp, origins) = setup(None);

    let err = engine(&temp, &origins, RecordingEnvironment::default(), true)
        .sync(&[DependencyRequest::new("acme/plots")], false, "e2e")
        .unwrap_err();

    assert!(matches!(err, Error::MissingRequirementsFile { ref origin, .. } if origin == "acme/plots"));
}
