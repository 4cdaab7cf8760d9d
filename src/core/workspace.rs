//! Workspace - every build file under a root.
//!
//! The workspace root is a directory whose build file carries a
//! `[workspace]` table. Every other directory below it with a build file
//! is a package, named by its path relative to the root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::core::build_file::{find_build_file, BuildFile, LoadError};
use crate::core::target::{Target, TargetLabel};
use crate::util::config::Config;
use crate::util::fs::{relative_path, to_package_path};

/// All evaluated build files of a workspace.
#[derive(Debug)]
pub struct Workspace {
    /// Workspace root directory
    root: PathBuf,

    /// Output directory for generated files
    out_dir: PathBuf,

    /// Build files ordered by package path (root first)
    build_files: Vec<BuildFile>,

    /// Package path -> index into `build_files`
    by_package: HashMap<String, usize>,
}

impl Workspace {
    /// Discover and evaluate every build file under `root`.
    ///
    /// Files are evaluated independently, in parallel. The first file that
    /// fails to load aborts the whole load.
    pub fn load(root: &Path, config: &Config) -> Result<Self> {
        let root_file = find_build_file(root)?;
        let root_build = BuildFile::load(&root_file, "")?;

        let mut excludes = Vec::new();
        let from_file = root_build
            .workspace()
            .map(|w| w.exclude.as_slice())
            .unwrap_or_default();
        for pattern in from_file.iter().chain(&config.workspace.exclude) {
            excludes.extend(
                exclude_patterns(pattern)
                    .with_context(|| format!("invalid exclude pattern: {}", pattern))?,
            );
        }

        let out_dir = config.out_dir(root);
        let found = discover_build_files(root, &excludes, &out_dir)?;
        tracing::debug!("found {} package build file(s) under {}", found.len(), root.display());

        let mut build_files = found
            .par_iter()
            .map(|(package, path)| BuildFile::load(path, package.clone()))
            .collect::<Result<Vec<_>, LoadError>>()?;
        build_files.push(root_build);

        Ok(Self::from_build_files(root.to_path_buf(), out_dir, build_files))
    }

    /// Assemble a workspace from already evaluated build files.
    pub fn from_build_files(root: PathBuf, out_dir: PathBuf, mut build_files: Vec<BuildFile>) -> Self {
        build_files.sort_by(|a, b| a.package().cmp(b.package()));

        let by_package = build_files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.package().to_string(), i))
            .collect();

        Workspace {
            root,
            out_dir,
            build_files,
            by_package,
        }
    }

    /// Get the workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the output directory.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Package paths, root first then lexical.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.build_files.iter().map(|f| f.package())
    }

    /// All build files in package order.
    pub fn build_files(&self) -> &[BuildFile] {
        &self.build_files
    }

    /// The build file of a package.
    pub fn build_file(&self, package: &str) -> Option<&BuildFile> {
        self.by_package.get(package).map(|&i| &self.build_files[i])
    }

    /// Look up a target by label.
    pub fn target(&self, label: &TargetLabel) -> Option<&Target> {
        self.build_file(label.package())?.target(label.name())
    }

    /// All targets: packages in order, targets in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = (TargetLabel, &Target)> {
        self.build_files.iter().flat_map(|file| {
            file.targets()
                .map(move |t| (TargetLabel::new(file.package(), t.name()), t))
        })
    }

    /// Number of declared targets across all packages.
    pub fn target_count(&self) -> usize {
        self.build_files.iter().map(|f| f.registry().len()).sum()
    }
}

/// Compile an exclude pattern. `dir/**` also matches `dir` itself, so the
/// directory is pruned before its own build file is read.
fn exclude_patterns(pattern: &str) -> Result<Vec<Pattern>, glob::PatternError> {
    let pattern = pattern.trim_end_matches('/');
    let mut patterns = vec![Pattern::new(pattern)?];
    if let Some(dir) = pattern.strip_suffix("/**") {
        if !dir.is_empty() {
            patterns.push(Pattern::new(dir)?);
        }
    }
    Ok(patterns)
}

/// Find build files below `root` (the root's own file excluded).
///
/// Hidden directories, the output directory, and directories matching an
/// exclude pattern are pruned along with everything beneath them.
fn discover_build_files(
    root: &Path,
    excludes: &[Pattern],
    out_dir: &Path,
) -> Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if !entry.file_type().is_dir() {
                return false;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                return false;
            }
            if entry.path() == out_dir {
                return false;
            }
            let package = to_package_path(&relative_path(root, entry.path()));
            !excludes.iter().any(|p| p.matches(&package))
        });

    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        match find_build_file(entry.path()) {
            Ok(path) => {
                let package = to_package_path(&relative_path(root, entry.path()));
                found.push((package, path));
            }
            Err(LoadError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn create_test_workspace(root: &Path) {
        write(root, "Keel.toml", "[workspace]\nexclude = [\"third_party\"]\n");
        write(
            root,
            "lib/Keel.toml",
            r#"
[[target]]
kind = "proto"
name = "common_proto"
srcs = ["common.proto"]

[[target]]
kind = "protocc"
name = "common_proto_lib"
srcs = ["+common_proto"]
"#,
        );
        write(
            root,
            "lib/imagereader/Keel.toml",
            r#"
[[target]]
kind = "proto"
name = "proto"
srcs = ["./imagereader.proto"]
deps = ["lib+common_proto"]

[[target]]
kind = "protocc"
name = "proto_lib"
srcs = ["+proto"]
deps = ["lib+common_proto_lib"]
"#,
        );
        write(root, "third_party/broken/Keel.toml", "this is not toml [");
        write(root, ".git/Keel.toml", "also not toml [");
    }

    #[test]
    fn test_workspace_load() {
        let tmp = TempDir::new().unwrap();
        create_test_workspace(tmp.path());

        let ws = Workspace::load(tmp.path(), &Config::default()).unwrap();
        let packages: Vec<_> = ws.packages().collect();
        assert_eq!(packages, ["", "lib", "lib/imagereader"]);
        assert_eq!(ws.target_count(), 4);
        assert!(ws.out_dir().ends_with(".keel/out"));

        let label = TargetLabel::new("lib/imagereader", "proto_lib");
        assert_eq!(ws.target(&label).unwrap().sources(), ["+proto"]);

        let labels: Vec<_> = ws.targets().map(|(l, _)| l.to_string()).collect();
        assert_eq!(
            labels,
            [
                "lib+common_proto",
                "lib+common_proto_lib",
                "lib/imagereader+proto",
                "lib/imagereader+proto_lib"
            ]
        );
    }

    #[test]
    fn test_workspace_load_reports_failing_file() {
        let tmp = TempDir::new().unwrap();
        create_test_workspace(tmp.path());
        write(
            tmp.path(),
            "app/Keel.toml",
            r#"
[[target]]
kind = "proto"
name = "p"
srcs = ["a.proto"]

[[target]]
kind = "proto"
name = "p"
srcs = ["b.proto"]
"#,
        );

        let err = Workspace::load(tmp.path(), &Config::default()).unwrap_err();
        let load = err.downcast_ref::<LoadError>().unwrap();
        assert!(matches!(load, LoadError::Declare { path, .. } if path.ends_with("app/Keel.toml")));
    }

    #[test]
    fn test_config_excludes() {
        let tmp = TempDir::new().unwrap();
        create_test_workspace(tmp.path());

        let mut config = Config::default();
        config.workspace.exclude = vec!["lib/imagereader".to_string()];

        let ws = Workspace::load(tmp.path(), &config).unwrap();
        assert!(ws.build_file("lib/imagereader").is_none());
        assert!(ws.build_file("lib").is_some());
    }

    #[test]
    fn test_recursive_exclude_prunes_directory_itself() {
        let tmp = TempDir::new().unwrap();
        create_test_workspace(tmp.path());
        write(tmp.path(), "Keel.toml", "[workspace]\nexclude = [\"third_party/**\"]\n");
        write(tmp.path(), "third_party/Keel.toml", "broken [");

        let ws = Workspace::load(tmp.path(), &Config::default()).unwrap();
        let packages: Vec<_> = ws.packages().collect();
        assert_eq!(packages, ["", "lib", "lib/imagereader"]);
    }

    #[test]
    fn test_exclude_patterns() {
        let patterns = exclude_patterns("vendor/**").unwrap();
        assert!(patterns.iter().any(|p| p.matches("vendor")));
        assert!(patterns.iter().any(|p| p.matches("vendor/protobuf")));
        assert!(!patterns.iter().any(|p| p.matches("vendored")));

        let patterns = exclude_patterns("third_party/").unwrap();
        assert!(patterns.iter().any(|p| p.matches("third_party")));

        assert!(exclude_patterns("[").is_err());
    }
}
