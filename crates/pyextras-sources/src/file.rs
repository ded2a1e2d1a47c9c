//! The `file` source: a requirements file named by the user, relative to the
//! package root.

use std::path::Path;

use fs_err as fs;

use crate::{Context, Options, SourceError};

/// Reads the file named by the `file` option and returns its requirement
/// lines, with comment lines (leading `#`) and blank lines dropped.
///
/// The file must exist and must be text: valid UTF-8 without NUL bytes. The
/// check is content-based rather than an extension-based MIME guess, which a
/// binary file with a `.txt` name would fool.
pub(crate) fn requirements_from_file(
    package_root: &Path,
    options: &Options,
    _context: &Context,
    _extra: &str,
) -> Result<Vec<String>, SourceError> {
    let Some(relative) = options.get("file") else {
        return Err(SourceError::MissingOptionValue { option: "file" });
    };
    let path = package_root.join(relative);
    if !path.is_file() {
        return Err(SourceError::NotFound {
            name: format!("requirements file '{relative}'"),
            dir: package_root.to_path_buf(),
        });
    }
    let bytes = fs::read(&path)?;
    let Ok(text) = String::from_utf8(bytes) else {
        return Err(SourceError::NotText { path });
    };
    if text.contains('\0') {
        return Err(SourceError::NotText { path });
    }
    Ok(text
        .lines()
        .filter(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(ToString::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{Context, Options, SourceError};

    use super::requirements_from_file;

    fn file_options(relative: &str) -> Options {
        Options::from([("file".to_string(), relative.to_string())])
    }

    fn context() -> Context {
        Context::new("docs")
    }

    #[test]
    fn reads_requirement_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a_subdirectory").join("another_subdir");
        fs::create_dir_all(&nested).unwrap();
        // The filename does not matter, only the option value does.
        fs::write(
            nested.join("requirements_list.txt"),
            "numpy>=1.18.4\nscipy==1.4.1\n# comment\n\npandas>=0.25.0, !=1.0.0\n",
        )
        .unwrap();

        let requirements = requirements_from_file(
            tmp.path(),
            &file_options("a_subdirectory/another_subdir/requirements_list.txt"),
            &context(),
            "extra_a",
        )
        .unwrap();
        assert_eq!(
            requirements,
            ["numpy>=1.18.4", "scipy==1.4.1", "pandas>=0.25.0, !=1.0.0"]
        );
    }

    #[test]
    fn missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = requirements_from_file(
            tmp.path(),
            &file_options("nonexistent_file.txt"),
            &context(),
            "extra",
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
        assert!(err
            .to_string()
            .starts_with("Cannot find requirements file 'nonexistent_file.txt'"));
    }

    #[test]
    fn binary_file_is_not_text() {
        let tmp = tempfile::tempdir().unwrap();
        // A PNG header: neither valid UTF-8 nor NUL-free.
        fs::write(
            tmp.path().join("requirements.txt"),
            [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0xFF],
        )
        .unwrap();
        let err = requirements_from_file(
            tmp.path(),
            &file_options("requirements.txt"),
            &context(),
            "extra",
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::NotText { .. }));
        assert!(err.to_string().ends_with("is not a text file."));
    }

    #[test]
    fn package_root_is_the_base_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let package_root = tmp.path().join("src");
        fs::create_dir_all(&package_root).unwrap();
        fs::write(package_root.join("requirements.txt"), "faker\npytest\ntox").unwrap();
        let requirements = requirements_from_file(
            &package_root,
            &file_options("requirements.txt"),
            &context(),
            "extra_c",
        )
        .unwrap();
        assert_eq!(requirements, ["faker", "pytest", "tox"]);
    }
}
