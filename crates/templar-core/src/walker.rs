//! Directory mode: mirror an input tree into an output tree, rendering as we go.
//!
//! Every directory under the input root gets a counterpart under the output root with the
//! same permission bits. Every file is read, classified and rendered immediately to the
//! mirrored path; partials are parsed (so later files can include them) but produce no
//! output file.
//!
//! Entries are visited in byte order of their names, so runs are reproducible and a
//! `_partial` sorts ahead of lowercase siblings that include it. The first error from any
//! step stops the walk.

use std::fs::{self, DirEntry, Permissions};
use std::path::Path;

use crate::engine::TemplateEngine;
use crate::error::{Result, TemplarError};
use crate::input::read_input;
use crate::output::Destination;
use crate::render::render_input;

/// Recursively render `input` into `output`.
pub fn process_input_dir(input: &Path, output: &Path, engine: &mut TemplateEngine) -> Result<()> {
    let meta = fs::metadata(input).map_err(|source| TemplarError::NotFound {
        path: input.to_path_buf(),
        source,
    })?;

    let entries = read_sorted(input)?;
    ensure_dir(output, meta.permissions())?;

    for entry in entries {
        let name = entry.file_name();
        let next_in = input.join(&name);
        let next_out = output.join(&name);

        // Follow symlinks so a linked directory is walked rather than read as a file.
        let is_dir = fs::metadata(&next_in)
            .map_err(|source| TemplarError::NotFound {
                path: next_in.clone(),
                source,
            })?
            .is_dir();

        if is_dir {
            process_input_dir(&next_in, &next_out, engine)?;
            continue;
        }

        let input = read_input(&next_in)?;
        let destination = if input.is_partial() {
            Destination::Discard
        } else {
            Destination::File(next_out)
        };
        render_input(engine, &input, &destination)?;
    }
    Ok(())
}

fn read_sorted(dir: &Path) -> Result<Vec<DirEntry>> {
    let read_dir_err = |source| TemplarError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(read_dir_err)?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(read_dir_err)?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// Create `dir` (and parents) if it is missing, giving it `permissions`.
fn ensure_dir(dir: &Path, permissions: Permissions) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let create_err = |source| TemplarError::CreateDir {
        path: dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(create_err)?;
    fs::set_permissions(dir, permissions).map_err(create_err)?;
    tracing::debug!("created output directory {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Delimiters;
    use crate::namespace::FunctionNamespace;

    fn engine() -> TemplateEngine {
        TemplateEngine::new(&FunctionNamespace::builtin(), Delimiters::default()).unwrap()
    }

    #[test]
    fn test_mirrors_tree_and_skips_partials() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("in");
        let output = root.path().join("out");
        fs::create_dir_all(input.join("sub")).unwrap();
        fs::write(input.join("a.tmpl"), "a={{> _b}}").unwrap();
        fs::write(input.join("_b.tmpl"), "{{toUpper \"b\"}}").unwrap();
        fs::write(input.join("sub/c.tmpl"), "c={{toLower \"C\"}}").unwrap();

        process_input_dir(&input, &output, &mut engine()).unwrap();

        assert_eq!(fs::read_to_string(output.join("a.tmpl")).unwrap(), "a=B");
        assert_eq!(fs::read_to_string(output.join("sub/c.tmpl")).unwrap(), "c=c");
        assert!(!output.join("_b.tmpl").exists());
        assert!(output.join("sub").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_output_dirs_copy_input_mode() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("in");
        let output = root.path().join("out");
        fs::create_dir_all(input.join("sub")).unwrap();
        fs::set_permissions(input.join("sub"), Permissions::from_mode(0o750)).unwrap();
        fs::write(input.join("sub/c.tmpl"), "c").unwrap();

        process_input_dir(&input, &output, &mut engine()).unwrap();

        let mode = fs::metadata(output.join("sub")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn test_missing_input_dir_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("missing");
        let err = process_input_dir(&missing, &root.path().join("out"), &mut engine()).unwrap_err();

        assert!(matches!(err, TemplarError::NotFound { ref path, .. } if *path == missing));
        assert!(!root.path().join("out").exists());
    }

    #[test]
    fn test_parse_error_aborts_before_writing() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("in");
        let output = root.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("bad.tmpl"), "{{#if x}}never closed").unwrap();
        fs::write(input.join("good.tmpl"), "fine").unwrap();

        let err = process_input_dir(&input, &output, &mut engine()).unwrap_err();

        assert!(matches!(err, TemplarError::TemplateParse { .. }));
        assert!(!output.join("bad.tmpl").exists());
        assert!(!output.join("good.tmpl").exists());
    }

    #[test]
    fn test_execution_error_aborts_walk() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("in");
        let output = root.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a.tmpl"), "ok").unwrap();
        fs::write(input.join("b.tmpl"), "{{nope}}").unwrap();
        fs::write(input.join("c.tmpl"), "never").unwrap();

        let err = process_input_dir(&input, &output, &mut engine()).unwrap_err();

        assert!(matches!(err, TemplarError::TemplateRender { .. }));
        assert_eq!(fs::read_to_string(output.join("a.tmpl")).unwrap(), "ok");
        assert!(!output.join("c.tmpl").exists());
    }

    #[test]
    fn test_unreadable_file_aborts_walk() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("in");
        let output = root.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a.bin"), [0xc3, 0x28, 0xff]).unwrap();
        fs::write(input.join("b.tmpl"), "never").unwrap();

        let err = process_input_dir(&input, &output, &mut engine()).unwrap_err();

        assert!(matches!(err, TemplarError::Read { ref path, .. } if *path == input.join("a.bin")));
        assert!(!output.join("a.bin").exists());
        assert!(!output.join("b.tmpl").exists());
    }
}
