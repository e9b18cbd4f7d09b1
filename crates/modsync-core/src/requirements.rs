//! Post-sync requirements hook
//!
//! Every synced module ships a `pip_requirements.txt`. After a module is
//! synced its entries are checked against the installed packages and the
//! missing ones are installed once the user agrees.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::confirm::Confirm;
use crate::descriptor::ModuleDescriptor;
use crate::version::VersionSpec;
use crate::{Error, Result};

/// Requirements file every module must ship at its root.
pub const REQUIREMENTS_FILE: &str = "pip_requirements.txt";

static REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[[^\]]*\])?\s*(.*)$").unwrap()
});

/// Runs after each dependency is synced.
pub trait PostSyncHook: Send + Sync {
    fn after_sync(&self, module: &ModuleDescriptor, confirm: &dyn Confirm) -> Result<()>;
}

/// The package environment modules install into.
pub trait PackageEnvironment: Send + Sync {
    /// Installed packages keyed by normalized name, mapped to their version.
    fn installed_packages(&self) -> Result<HashMap<String, String>>;

    /// Install everything listed in `requirements_file`. `origin` labels errors.
    fn install(&self, origin: &str, requirements_file: &Path) -> Result<()>;
}

/// One parsed requirements entry.
#[derive(Debug, Clone)]
pub struct Requirement {
    /// Normalized package name
    pub name: String,
    pub spec: VersionSpec,
    /// The entry as written
    pub line: String,
}

impl Requirement {
    pub fn is_satisfied_by(&self, installed: &HashMap<String, String>) -> bool {
        installed
            .get(&self.name)
            .is_some_and(|version| self.spec.satisfies(version))
    }
}

/// Lowercase, with runs of `-`, `_` and `.` folded to a single `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('-');
        }
        pending_sep = false;
        out.extend(c.to_lowercase());
    }
    out
}

/// Parse requirements text. Blank lines, comments and option lines
/// (`-r other.txt`, `--index-url ...`) are skipped.
pub fn parse_requirements(text: &str, path: &Path) -> Result<Vec<Requirement>> {
    let mut requirements = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('-') {
            tracing::debug!(path = %path.display(), line = %line, "Skipping requirements option");
            continue;
        }
        // Environment markers are not evaluated
        let entry = line.split(';').next().unwrap_or_default().trim();

        let invalid = |reason: String| Error::InvalidRequirement {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        };
        let captures = REQUIREMENT_RE
            .captures(entry)
            .ok_or_else(|| invalid(format!("'{entry}' is not a package requirement")))?;
        let rest = captures[2].trim();
        // Direct references (`name @ url`) only check that the package exists
        let spec = if rest.starts_with('@') {
            VersionSpec::default()
        } else {
            VersionSpec::parse(rest).map_err(invalid)?
        };

        requirements.push(Requirement {
            name: normalize_name(&captures[1]),
            spec,
            line: entry.to_string(),
        });
    }
    Ok(requirements)
}

/// Installs a module's unsatisfied requirements into `E`.
pub struct RequirementsInstaller<E> {
    environment: E,
}

impl<E: PackageEnvironment> RequirementsInstaller<E> {
    pub fn new(environment: E) -> Self {
        Self { environment }
    }

    pub fn environment(&self) -> &E {
        &self.environment
    }

    /// Entries of `module`'s requirements file not satisfied by the environment.
    pub fn unsatisfied(&self, module: &ModuleDescriptor) -> Result<(PathBuf, Vec<Requirement>)> {
        let path = module.sync_location().join(REQUIREMENTS_FILE);
        if !path.is_file() {
            return Err(Error::MissingRequirementsFile {
                origin: module.origin().to_string(),
                path,
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|e| modsync_fs::Error::io(&path, e))?;
        let requirements = parse_requirements(&text, &path)?;
        if requirements.is_empty() {
            return Ok((path, requirements));
        }

        let installed = self.environment.installed_packages()?;
        let missing = requirements
            .into_iter()
            .filter(|r| !r.is_satisfied_by(&installed))
            .collect();
        Ok((path, missing))
    }
}

impl<E: PackageEnvironment> PostSyncHook for RequirementsInstaller<E> {
    fn after_sync(&self, module: &ModuleDescriptor, confirm: &dyn Confirm) -> Result<()> {
        let (path, missing) = self.unsatisfied(module)?;
        let module_id = module.module_id();
        if missing.is_empty() {
            tracing::debug!(module = %module_id, "All requirements satisfied");
            return Ok(());
        }

        let listing = missing
            .iter()
            .map(|r| r.line.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let approved = confirm.confirm(
            &format!("{module_id} requires packages that are not installed: {listing}. Install them now?"),
            &format!("Installing requirements of {module_id}"),
            &format!(
                "Skipped installing requirements of {module_id}; install them from {} before use",
                path.display()
            ),
        );
        if approved {
            self.environment.install(&module.origin().to_string(), &path)?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct PipPackage {
    name: String,
    version: String,
}

/// `pip` driven through a Python interpreter.
#[derive(Debug, Clone)]
pub struct PipEnvironment {
    python: PathBuf,
}

impl Default for PipEnvironment {
    fn default() -> Self {
        #[cfg(windows)]
        let python = "python";
        #[cfg(not(windows))]
        let python = "python3";
        Self::new(python)
    }
}

impl PipEnvironment {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    fn pip(&self) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.args(["-m", "pip"]);
        cmd
    }
}

impl PackageEnvironment for PipEnvironment {
    fn installed_packages(&self) -> Result<HashMap<String, String>> {
        let output = self
            .pip()
            .args(["list", "--format=json", "--disable-pip-version-check"])
            .stderr(Stdio::inherit())
            .output()?;
        if !output.status.success() {
            return Err(Error::Io(std::io::Error::other(format!(
                "'{} -m pip list' exited with {}",
                self.python.display(),
                output.status
            ))));
        }
        let packages: Vec<PipPackage> = serde_json::from_slice(&output.stdout)?;
        Ok(packages
            .into_iter()
            .map(|p| (normalize_name(&p.name), p.version))
            .collect())
    }

    fn install(&self, origin: &str, requirements_file: &Path) -> Result<()> {
        let status = self
            .pip()
            .arg("install")
            .arg("-r")
            .arg(requirements_file)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|_| Error::InstallFailed {
                origin: origin.to_string(),
                exit_code: None,
            })?;

        if !status.success() {
            return Err(Error::InstallFailed {
                origin: origin.to_string(),
                exit_code: status.code(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::AutoConfirm;
    use crate::descriptor::OriginId;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeEnvironment {
        installed: HashMap<String, String>,
        installs: Mutex<Vec<PathBuf>>,
    }

    impl PackageEnvironment for FakeEnvironment {
        fn installed_packages(&self) -> Result<HashMap<String, String>> {
            Ok(self.installed.clone())
        }

        fn install(&self, _origin: &str, requirements_file: &Path) -> Result<()> {
            self.installs.lock().unwrap().push(requirements_file.to_path_buf());
            Ok(())
        }
    }

    fn module_with(requirements: Option<&str>) -> (TempDir, ModuleDescriptor) {
        let temp = TempDir::new().unwrap();
        let location = temp.path().join("acme/widgets");
        std::fs::create_dir_all(&location).unwrap();
        if let Some(text) = requirements {
            std::fs::write(location.join(REQUIREMENTS_FILE), text).unwrap();
        }
        let module = ModuleDescriptor::local(
            OriginId::parse("acme/widgets").unwrap(),
            "/src/widgets",
            location,
        );
        (temp, module)
    }

    fn installer(installed: &[(&str, &str)]) -> RequirementsInstaller<FakeEnvironment> {
        RequirementsInstaller::new(FakeEnvironment {
            installed: installed
                .iter()
                .map(|(n, v)| (normalize_name(n), v.to_string()))
                .collect(),
            ..FakeEnvironment::default()
        })
    }

    #[rstest]
    #[case("Requests", "requests")]
    #[case("zope.interface", "zope-interface")]
    #[case("typing__extensions", "typing-extensions")]
    fn names_are_normalized(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(normalize_name(name), expected);
    }

    #[test]
    fn parses_entries_and_skips_noise() {
        let text = "# deps\n\nrequests[socks]>=2.0 ; python_version >= '3.8'\n-r base.txt\nnumpy\nlocalpkg @ file:///tmp/pkg\n";
        let parsed = parse_requirements(text, Path::new("pip_requirements.txt")).unwrap();
        let names: Vec<_> = parsed.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["requests", "numpy", "localpkg"]);
        assert_eq!(parsed[0].spec.as_str(), ">=2.0");
        assert!(parsed[2].spec.is_any());
    }

    #[test]
    fn malformed_entry_reports_line() {
        let err = parse_requirements("numpy\n>=1.0\n", Path::new("r.txt")).unwrap_err();
        assert!(matches!(err, Error::InvalidRequirement { line: 2, .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let (_temp, module) = module_with(None);
        let err = installer(&[]).after_sync(&module, &AutoConfirm(true)).unwrap_err();
        assert!(matches!(err, Error::MissingRequirementsFile { .. }));
    }

    #[test]
    fn satisfied_requirements_do_not_install() {
        let (_temp, module) = module_with(Some("requests>=2.0\n"));
        let installer = installer(&[("requests", "2.31.0")]);
        installer.after_sync(&module, &AutoConfirm(true)).unwrap();
        assert!(installer.environment().installs.lock().unwrap().is_empty());
    }

    #[test]
    fn unsatisfied_requirements_install_when_approved() {
        let (_temp, module) = module_with(Some("requests>=2.0\nnumpy\n"));
        let installer = installer(&[("requests", "1.9")]);

        let (_, missing) = installer.unsatisfied(&module).unwrap();
        assert_eq!(missing.len(), 2);

        installer.after_sync(&module, &AutoConfirm(false)).unwrap();
        assert!(installer.environment().installs.lock().unwrap().is_empty());

        installer.after_sync(&module, &AutoConfirm(true)).unwrap();
        assert_eq!(
            installer.environment().installs.lock().unwrap().as_slice(),
            &[module.sync_location().join(REQUIREMENTS_FILE)]
        );
    }
}
