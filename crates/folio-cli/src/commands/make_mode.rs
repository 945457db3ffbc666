//! Make mode: `-M TARGET SOURCE_DIR BUILD_DIR [OPTIONS...]`.
//!
//! Makefile-style targets on top of the plain build. `clean` and `help`
//! are handled here; any other target builds with the builder of the same
//! name into `BUILD_DIR/TARGET`, sharing `BUILD_DIR/doctrees`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use folio_engine::{BuilderFactory, Interrupt};

use crate::commands::build;
use crate::ui::bold;

/// Targets listed by `help`, with a short description.
pub const TARGETS: &[(&str, &str)] = &[
    ("clean", "to remove everything in the build directory"),
    ("dummy", "to check syntax errors of document sources"),
    ("html", "to make standalone HTML files"),
];

/// Run a make-mode invocation. `args` excludes the `-M` token.
pub fn execute(args: &[String], factory: &dyn BuilderFactory, interrupt: &Interrupt) -> u8 {
    let [target, source_dir, build_dir, opts @ ..] = args else {
        eprintln!("Error: at least 3 arguments (builder, source dir, build dir) are required.");
        return 1;
    };

    let make = Make {
        source_dir: PathBuf::from(source_dir),
        build_dir: PathBuf::from(build_dir),
        opts,
    };
    match target.as_str() {
        "clean" => make.clean(interrupt),
        "help" => {
            make.help();
            0
        }
        builder => make.generic_build(builder, factory, interrupt),
    }
}

struct Make<'a> {
    source_dir: PathBuf,
    build_dir: PathBuf,
    opts: &'a [String],
}

impl Make<'_> {
    /// Remove the contents of the build directory, keeping the directory.
    /// Stops between entries once `interrupt` is triggered.
    fn clean(&self, interrupt: &Interrupt) -> u8 {
        let display = self.build_dir.display();
        if !self.build_dir.exists() {
            return 0;
        }
        if !self.build_dir.is_dir() {
            println!("Error: '{display}' is not a directory!");
            return 1;
        }

        let source_dir = absolute(&self.source_dir);
        let build_dir = absolute(&self.build_dir);
        if source_dir == build_dir {
            println!("Error: '{display}' is same as source directory!");
            return 1;
        }
        if source_dir.starts_with(&build_dir) {
            println!("Error: '{display}' directory contains source directory!");
            return 1;
        }

        println!("Removing everything under '{display}'...");
        match remove_contents(&self.build_dir, interrupt) {
            Ok(()) => 0,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                eprintln!("Interrupted!");
                2
            }
            Err(err) => {
                eprintln!("Error: cannot clean '{display}': {err}");
                1
            }
        }
    }

    fn help(&self) {
        println!("{}", bold(&format!("folio v{}", env!("CARGO_PKG_VERSION"))));
        println!("Please use `make target' where target is one of");
        for (name, description) in TARGETS {
            println!("  {}  {description}", bold(&format!("{name:<10}")));
        }
    }

    fn generic_build(&self, builder: &str, factory: &dyn BuilderFactory, interrupt: &Interrupt) -> u8 {
        let argv = self.build_argv(builder);
        build::execute(&argv, factory, interrupt)
    }

    fn build_argv(&self, builder: &str) -> Vec<String> {
        let mut argv = vec![
            "--builder".to_string(),
            builder.to_string(),
            "--doctree-dir".to_string(),
            self.build_dir.join("doctrees").to_string_lossy().into_owned(),
            self.source_dir.to_string_lossy().into_owned(),
            self.build_dir.join(builder).to_string_lossy().into_owned(),
        ];
        argv.extend(self.opts.iter().cloned());
        argv
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn remove_contents(dir: &Path, interrupt: &Interrupt) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        if interrupt.is_triggered() {
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_engine::BUILDERS;
    use tempfile::TempDir;

    fn make<'a>(source: &Path, build: &Path, opts: &'a [String]) -> Make<'a> {
        Make {
            source_dir: source.to_path_buf(),
            build_dir: build.to_path_buf(),
            opts,
        }
    }

    #[test]
    fn test_every_builder_is_a_target() {
        for builder in BUILDERS {
            assert!(TARGETS.iter().any(|(name, _)| name == builder), "{builder}");
        }
    }

    #[test]
    fn test_build_argv() {
        let opts = vec!["-W".to_string(), "-j".to_string(), "auto".to_string()];
        let argv = make(Path::new("docs"), Path::new("_build"), &opts).build_argv("dummy");
        let doctrees = Path::new("_build").join("doctrees").to_string_lossy().into_owned();
        let out = Path::new("_build").join("dummy").to_string_lossy().into_owned();
        assert_eq!(
            argv,
            vec!["--builder", "dummy", "--doctree-dir", doctrees.as_str(), "docs", out.as_str(), "-W", "-j", "auto"]
        );
    }

    #[test]
    fn test_user_options_follow_injected_ones() {
        let opts = vec!["-d".to_string(), "other".to_string(), "-b".to_string(), "dummy".to_string()];
        let argv = make(Path::new("docs"), Path::new("_build"), &opts).build_argv("html");
        let args = crate::cli::parse_args(&argv).unwrap();
        assert_eq!(args.doctree_dir, Some(PathBuf::from("other")));
        assert_eq!(args.builder, "dummy");
        assert_eq!(args.output_dir, Path::new("_build").join("html"));
    }

    #[test]
    fn test_interrupted_clean_stops() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("docs");
        let build = temp.path().join("_build");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(build.join("html")).unwrap();
        fs::write(build.join("stamp"), "x").unwrap();

        let interrupt = Interrupt::new();
        interrupt.trigger();
        assert_eq!(make(&source, &build, &[]).clean(&interrupt), 2);
        assert_eq!(fs::read_dir(&build).unwrap().count(), 2);
    }

    #[test]
    fn test_clean_removes_contents_only() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("docs");
        let build = temp.path().join("_build");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(build.join("dummy").join("nested")).unwrap();
        fs::write(build.join("stamp"), "x").unwrap();

        assert_eq!(make(&source, &build, &[]).clean(&Interrupt::new()), 0);
        assert!(build.is_dir());
        assert_eq!(fs::read_dir(&build).unwrap().count(), 0);
        assert!(source.is_dir());
    }

    #[test]
    fn test_clean_missing_build_dir_is_fine() {
        let temp = TempDir::new().unwrap();
        let build = temp.path().join("missing");
        assert_eq!(make(temp.path(), &build, &[]).clean(&Interrupt::new()), 0);
    }

    #[test]
    fn test_clean_refuses_source_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.rst"), "").unwrap();

        assert_eq!(make(temp.path(), temp.path(), &[]).clean(&Interrupt::new()), 1);
        assert!(temp.path().join("index.rst").exists());
    }

    #[test]
    fn test_clean_refuses_parent_of_source_dir() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("docs");
        fs::create_dir_all(&source).unwrap();

        assert_eq!(make(&source, temp.path(), &[]).clean(&Interrupt::new()), 1);
        assert!(source.exists());
    }

    #[test]
    fn test_clean_refuses_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("build.txt");
        fs::write(&file, "").unwrap();
        assert_eq!(make(temp.path(), &file, &[]).clean(&Interrupt::new()), 1);
    }

    #[test]
    fn test_too_few_arguments() {
        let args = vec!["dummy".to_string(), "docs".to_string()];
        assert_eq!(execute(&args, &folio_engine::Engine::new(), &Interrupt::new()), 1);
    }
}
