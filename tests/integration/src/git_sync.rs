//! End-to-end synchronization against git origins
//!
//! Exercises the complete flow: config loading -> validation ->
//! reconciliation -> git snapshot -> manifest write-back.

use std::fs;
use std::path::{Path, PathBuf};

use modsync_core::{
    AutoConfirm, DependencyRequest, Manifest, ModuleState, ProjectConfig, Reason, SyncEngine,
    cache,
};
use modsync_git::GitRegistry;
use modsync_test_utils::git::OriginRepo;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Project {
    temp: TempDir,
    widgets: OriginRepo,
}

impl Project {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let widgets = OriginRepo::create(
            &temp.path().join("origins"),
            "acme/widgets",
            &[("__init__.py", ""), ("widget.py", "SIZE = 1\n")],
        );
        OriginRepo::create(
            &temp.path().join("origins"),
            "acme/gears",
            &[("gear.py", "TEETH = 12\n")],
        );
        Self { temp, widgets }
    }

    fn origins(&self) -> PathBuf {
        self.temp.path().join("origins")
    }

    fn cache_root(&self) -> PathBuf {
        self.temp.path().join("cache")
    }

    fn sync_root(&self) -> PathBuf {
        self.temp.path().join("project/synced_modules")
    }

    fn engine(&self, answer: bool) -> SyncEngine {
        let registry = GitRegistry::new(self.origins().display().to_string())
            .with_cache_root(self.cache_root());
        SyncEngine::builder(registry)
            .sync_root(self.sync_root())
            .cache_root(self.cache_root())
            .confirm(AutoConfirm(answer))
            .build()
            .unwrap()
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.sync_root().join(relative)).unwrap()
    }
}

fn requests() -> Vec<DependencyRequest> {
    vec![
        DependencyRequest::new("acme/widgets"),
        DependencyRequest::new("acme/gears").destination("vendor/gears"),
    ]
}

#[test]
fn fresh_sync_materializes_commits_and_writes_manifest() {
    let project = Project::new();
    let manifest = project.engine(false).sync(&requests(), false, "e2e").unwrap();

    assert_eq!(manifest.len(), 2);
    let widgets = &manifest.modules()[0];
    assert_eq!(widgets.fingerprint().as_str(), project.widgets.head());
    assert_eq!(
        widgets.cache_location(),
        cache::snapshot_path(&project.cache_root(), widgets.origin(), &project.widgets.head())
    );

    assert_eq!(project.read("acme/widgets/widget.py"), "SIZE = 1\n");
    assert_eq!(project.read("vendor/gears/gear.py"), "TEETH = 12\n");
    // Package markers for the root and each namespace
    for marker in ["__init__.py", "acme/__init__.py", "vendor/__init__.py"] {
        assert!(project.sync_root().join(marker).is_file(), "{marker}");
    }
    assert!(project.read(".gitignore").lines().any(|l| l == "*"));

    let reread = Manifest::load(&project.sync_root().join("modules.mod"))
        .unwrap()
        .unwrap();
    assert_eq!(reread, manifest);
}

#[test]
fn new_upstream_commit_is_pulled_in() {
    let project = Project::new();
    let engine = project.engine(false);
    engine.sync(&requests(), false, "e2e").unwrap();

    let advanced = project
        .widgets
        .commit(&[("widget.py", "SIZE = 2\n")], "Grow widgets");
    let report = engine.sync_report(&requests(), false, "e2e").unwrap();

    assert_eq!(report.entries[0].decision, Reason::UpstreamAdvanced);
    assert_eq!(report.entries[1].decision, Reason::InSync);
    assert_eq!(report.entries[0].fingerprint, advanced);
    assert_eq!(project.read("acme/widgets/widget.py"), "SIZE = 2\n");
}

#[test]
fn local_edits_survive_upstream_commits() {
    let project = Project::new();
    let engine = project.engine(true);
    engine.sync(&requests(), false, "e2e").unwrap();

    fs::write(project.sync_root().join("acme/widgets/widget.py"), "SIZE = 99\n").unwrap();
    project
        .widgets
        .commit(&[("widget.py", "SIZE = 2\n")], "Grow widgets");
    let report = engine.sync_report(&requests(), false, "e2e").unwrap();

    assert_eq!(report.entries[0].decision, Reason::LocalEditsPreserved);
    assert_eq!(project.read("acme/widgets/widget.py"), "SIZE = 99\n");

    let status = engine.status().unwrap();
    assert_eq!(status[0].state, ModuleState::Modified);
    assert_eq!(status[1].state, ModuleState::Clean);
}

#[test]
fn switching_branches_asks_before_replacing() {
    let project = Project::new();
    project.widgets.branch("stable");
    project
        .widgets
        .commit(&[("widget.py", "SIZE = 2\n")], "Grow widgets");

    let widgets = |revision: &str| vec![DependencyRequest::new("acme/widgets").revision(revision)];
    project.engine(false).sync(&widgets("main"), false, "e2e").unwrap();

    let declined = project
        .engine(false)
        .sync_report(&widgets("stable"), false, "e2e")
        .unwrap();
    assert_eq!(declined.entries[0].decision, Reason::ReplaceDeclined);
    assert_eq!(declined.manifest.modules()[0].revision(), "main");

    let accepted = project
        .engine(true)
        .sync_report(&widgets("stable"), false, "e2e")
        .unwrap();
    assert_eq!(accepted.entries[0].decision, Reason::ReplaceConfirmed);
    assert_eq!(accepted.manifest.modules()[0].revision(), "stable");
    assert_eq!(project.read("acme/widgets/widget.py"), "SIZE = 1\n");
}

#[test]
fn abbreviated_commit_id_stays_in_sync() {
    let project = Project::new();
    let pinned = project.widgets.head();
    let widgets = vec![DependencyRequest::new("acme/widgets").revision(&pinned[..12])];
    let engine = project.engine(false);

    let first = engine.sync_report(&widgets, false, "e2e").unwrap();
    assert_eq!(first.entries[0].decision, Reason::New);
    assert_eq!(first.entries[0].fingerprint, pinned);

    // The pinned commit is no longer a branch tip
    project
        .widgets
        .commit(&[("widget.py", "SIZE = 2\n")], "Grow widgets");
    let second = engine.sync_report(&widgets, false, "e2e").unwrap();
    assert_eq!(second.entries[0].decision, Reason::InSync);
    assert_eq!(project.read("acme/widgets/widget.py"), "SIZE = 1\n");
}

#[test]
fn deleted_working_copy_is_refetched() {
    let project = Project::new();
    let engine = project.engine(false);
    engine.sync(&requests(), false, "e2e").unwrap();

    fs::remove_dir_all(project.sync_root().join("vendor/gears")).unwrap();
    assert_eq!(engine.status().unwrap()[1].state, ModuleState::Missing);

    let report = engine.sync_report(&requests(), false, "e2e").unwrap();
    assert_eq!(report.entries[1].decision, Reason::WorkingCopyMissing);
    assert_eq!(project.read("vendor/gears/gear.py"), "TEETH = 12\n");
}

#[test]
fn project_config_drives_a_git_sync() {
    let project = Project::new();
    let project_dir = project.temp.path().join("project");
    fs::create_dir_all(&project_dir).unwrap();
    let config_path = project_dir.join("modsync.toml");
    fs::write(
        &config_path,
        format!(
            r#"[[dependencies]]
origin = "acme/widgets"
revision = "main"

[sync]
cache_root = "{cache}"

[registry]
kind = "git"
location = "{origins}"
"#,
            cache = project.cache_root().display(),
            origins = project.origins().display(),
        ),
    )
    .unwrap();

    let config = ProjectConfig::load(&config_path).unwrap();
    let location = config.registry_location().unwrap();
    let engine = SyncEngine::builder(GitRegistry::new(location))
        .sync_root(config.sync_root())
        .cache_root(config.cache_root())
        .build()
        .unwrap();
    let paths = engine.sync_paths(&config.dependencies, config.sync.overwrite).unwrap();

    assert_eq!(paths, vec![project.sync_root().join("acme/widgets")]);
    assert!(mirror_exists(&project.cache_root()));
}

fn mirror_exists(cache_root: &Path) -> bool {
    let origin = modsync_core::OriginId::parse("acme/widgets").unwrap();
    cache::origin_dir(cache_root, &origin).join("mirror.git").is_dir()
}
