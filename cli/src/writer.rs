use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use generator::Extraction;

#[derive(Debug, Default)]
pub struct WriteSummary {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

/// Write every output of `extraction`, creating directories as needed.
/// Files whose content is already up to date are not touched.
pub fn write_outputs(extraction: &Extraction) -> io::Result<WriteSummary> {
    let mut summary = WriteSummary::default();
    for (path, content) in extraction.all_outputs() {
        if fs::read_to_string(&path).is_ok_and(|existing| existing == content) {
            summary.unchanged.push(path);
            continue;
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&path, content)?;
        tracing::debug!(path = %path.display(), "wrote output");
        summary.written.push(path);
    }
    Ok(summary)
}

/// A difference between what a document generates and what is on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    Missing(PathBuf),
    Outdated(PathBuf),
    /// A file under an output directory that nothing generates any more.
    Stale(PathBuf),
}

impl Mismatch {
    pub fn path(&self) -> &Path {
        match self {
            Mismatch::Missing(path) | Mismatch::Outdated(path) | Mismatch::Stale(path) => path,
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Mismatch::Missing(_) => "missing",
            Mismatch::Outdated(_) => "outdated",
            Mismatch::Stale(_) => "stale",
        };
        write!(f, "{}: {}", label, self.path().display())
    }
}

/// Compare the outputs of `extraction` with the file system.
///
/// Stale files are only looked for in output directories that are strictly
/// below the source's directory, so an `outDir` of `.` never reports the
/// document itself and an absolute `outDir` is never scanned.
pub fn check_outputs(extraction: &Extraction) -> io::Result<Vec<Mismatch>> {
    let outputs = extraction.all_outputs();
    let mut mismatches = Vec::new();

    for (path, content) in &outputs {
        match fs::read_to_string(path) {
            Ok(existing) if existing == *content => {}
            Ok(_) => mismatches.push(Mismatch::Outdated(path.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                mismatches.push(Mismatch::Missing(path.clone()))
            }
            Err(e) => return Err(e),
        }
    }

    let expected: BTreeSet<&Path> = outputs.iter().map(|(path, _)| path.as_path()).collect();
    let mut on_disk = BTreeSet::new();
    for stage in extraction.stages() {
        if owns_directory(&stage.generation.out_dir) {
            collect_files(&stage.output_dir(), &mut on_disk);
        }
    }
    mismatches.extend(
        on_disk
            .into_iter()
            .filter(|path| !expected.contains(path.as_path()))
            .map(Mismatch::Stale),
    );

    Ok(mismatches)
}

fn owns_directory(out_dir: &str) -> bool {
    let mut depth = 0usize;
    for component in Path::new(out_dir).components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir if depth == 0 => return false,
            Component::ParentDir => depth -= 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    depth > 0
}

fn collect_files(dir: &Path, out: &mut BTreeSet<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else {
            out.insert(path);
        }
    }
}
