#[cfg(test)]
mod tests {
    use crate::cli::parse_args;
    use crate::config::{BuildRequest, resolve_overrides};
    use crate::error::CliError;
    use crate::ui::ColorMode;
    use folio_engine::ConfigValue;
    use std::path::PathBuf;

    fn resolve(argv: &[&str]) -> Result<BuildRequest, CliError> {
        BuildRequest::resolve_with(parse_args(argv).unwrap(), || 8)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_conf_dir_defaults_to_source_dir() {
        let request = resolve(&["docs", "out"]).unwrap();
        assert_eq!(request.conf_dir, Some(PathBuf::from("docs")));
        assert_eq!(request.doctree_dir, PathBuf::from("out").join(".doctrees"));
    }

    #[test]
    fn test_explicit_dirs() {
        let request = resolve(&["-c", "conf", "-d", "trees", "docs", "out"]).unwrap();
        assert_eq!(request.conf_dir, Some(PathBuf::from("conf")));
        assert_eq!(request.doctree_dir, PathBuf::from("trees"));
    }

    #[test]
    fn test_isolated_overrides_conf_dir() {
        let request = resolve(&["--isolated", "-c", "conf", "-D", "project=Foo", "docs", "out"]).unwrap();
        assert_eq!(request.conf_dir, None);
        assert_eq!(request.overrides.len(), 1);
        assert_eq!(request.overrides["project"], ConfigValue::from("Foo"));
    }

    #[test]
    fn test_write_all_with_filenames_is_rejected() {
        let err = resolve(&["-a", "docs", "out", "index.rst"]).unwrap_err();
        assert!(matches!(err, CliError::WriteAllWithFilenames));
        assert_eq!(err.to_string(), "cannot combine -a option and filenames");
    }

    #[test]
    fn test_jobs_auto_write_all_scenario() {
        let request = resolve(&["--jobs", "auto", "--write-all", "./docs", "./out"]).unwrap();
        assert_eq!(request.jobs.get(), 8);
        assert!(request.force_all);
        assert!(request.filenames.is_empty());
    }

    #[test]
    fn test_invalid_jobs_is_rejected() {
        assert!(matches!(resolve(&["-j", "0", "docs", "out"]), Err(CliError::Jobs(_))));
    }

    #[test]
    fn test_keep_going_is_never_forwarded() {
        let request = resolve(&["--keep-going", "docs", "out"]).unwrap();
        assert!(!request.keep_going);
    }

    #[test]
    fn test_output_options() {
        let request = resolve(&["-Q", "-w", "warn.log", "--no-color", "docs", "out"]).unwrap();
        assert!(request.output.really_quiet);
        assert!(!request.output.quiet);
        assert_eq!(request.output.warning_file, Some(PathBuf::from("warn.log")));
        assert_eq!(request.output.color, ColorMode::Never);
    }

    #[test]
    fn test_tags_are_deduplicated_in_order() {
        let request = resolve(&["-t", "b", "-t", "a", "-t", "b", "docs", "out"]).unwrap();
        let tags: Vec<&str> = request.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["b", "a"]);
    }

    #[test]
    fn test_define_last_write_wins() {
        let overrides = resolve_overrides(&strings(&["a=1", "a=2"]), &[], false).unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides["a"], ConfigValue::from("2"));
    }

    #[test]
    fn test_define_splits_on_first_equals() {
        let overrides = resolve_overrides(&strings(&["expr=a=b"]), &[], false).unwrap();
        assert_eq!(overrides["expr"], ConfigValue::from("a=b"));
    }

    #[test]
    fn test_define_without_equals_fails() {
        let err = resolve_overrides(&strings(&["a"]), &[], false).unwrap_err();
        assert!(matches!(err, CliError::Define(ref token) if token == "a"));
    }

    #[test]
    fn test_html_define_values() {
        let overrides =
            resolve_overrides(&[], &strings(&["x=42", "y=foo", "z=-7"]), false).unwrap();
        assert_eq!(overrides["html_context.x"], ConfigValue::Int(42));
        assert_eq!(overrides["html_context.y"], ConfigValue::from("foo"));
        assert_eq!(overrides["html_context.z"], ConfigValue::Int(-7));
    }

    #[test]
    fn test_html_define_needs_exactly_one_equals() {
        for token in ["x", "x=1=2"] {
            let err = resolve_overrides(&[], &strings(&[token]), false).unwrap_err();
            assert!(matches!(err, CliError::HtmlDefine(_)), "{token}");
        }
    }

    #[test]
    fn test_nitpicky_wins_over_define() {
        let overrides = resolve_overrides(&strings(&["nitpicky=0"]), &[], true).unwrap();
        assert_eq!(overrides["nitpicky"], ConfigValue::Bool(true));
    }
}
