//! End-to-end CLI tests against the fixture survey.

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn hlb_core() -> Command {
    let mut cmd = cargo_bin_cmd!("hlb-core");
    cmd.env_remove("HLB_CONFIG")
        .env_remove("HLB_CONFIG_DIR")
        .env("XDG_CONFIG_HOME", fixture("no-such-config-home"))
        .env("HLB_LOG", "error");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn survey() -> String {
    fixture("hair_loss_small.csv").display().to_string()
}

fn fast_config() -> String {
    fixture("fast_analysis.json").display().to_string()
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("command runs");
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

mod inspect {
    use super::*;

    #[test]
    fn reports_shape_and_sentinels() {
        let v = stdout_json(hlb_core().args(["inspect", &survey()]));
        assert_eq!(v["command"], "inspect");
        assert_eq!(v["result"]["rows"], 91);
        assert_eq!(v["result"]["columns"], 13);
        let sentinel: u64 = v["result"]["sentinel"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["missing"].as_u64().unwrap())
            .sum();
        assert_eq!(sentinel, 4);
    }

    #[test]
    fn summary_format_is_one_line() {
        hlb_core()
            .args(["-f", "summary", "inspect", &survey()])
            .assert()
            .success()
            .stdout(predicate::str::contains("91 rows, 13 columns"));
    }

    #[test]
    fn missing_file_exits_with_file_error() {
        hlb_core()
            .args(["inspect", "does-not-exist.csv"])
            .assert()
            .code(11)
            .stderr(predicate::str::contains("\"code\": 20"));
    }
}

mod clean {
    use super::*;

    #[test]
    fn drops_sentinel_and_duplicate_rows() {
        let v = stdout_json(hlb_core().args(["clean", &survey()]));
        let report = &v["result"]["report"];
        assert_eq!(report["rows_in"], 91);
        assert_eq!(report["dropped_sentinel"], 4);
        assert_eq!(report["dropped_duplicates"], 1);
        assert_eq!(report["rows_out"], 86);
    }

    #[test]
    fn writes_cleaned_csv() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("clean.csv");
        hlb_core()
            .args(["clean", &survey(), "--out", out.to_str().unwrap()])
            .assert()
            .success();
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text.lines().count(), 87);
        assert!(!text.contains("No Data"));
    }

    #[test]
    fn markdown_lists_issues() {
        hlb_core()
            .args(["-f", "md", "clean", &survey()])
            .assert()
            .success()
            .stdout(predicate::str::contains("# Cleaning"))
            .stdout(predicate::str::contains("### Issues"));
    }
}

mod prior {
    use super::*;

    #[test]
    fn default_base_rate() {
        let v = stdout_json(hlb_core().arg("prior"));
        let mean = v["result"]["intercept"]["mean"].as_f64().unwrap();
        let scale = v["result"]["intercept"]["scale"].as_f64().unwrap();
        assert!((mean - -0.830).abs() < 0.005, "mean {mean}");
        assert!((scale - 0.415).abs() < 0.005, "scale {scale}");
    }

    #[test]
    fn custom_range_is_centered() {
        let v = stdout_json(hlb_core().args(["prior", "--low", "0.2", "--high", "0.8"]));
        let mean = v["result"]["intercept"]["mean"].as_f64().unwrap();
        assert!(mean.abs() < 1e-9);
    }

    #[test]
    fn inverted_range_is_a_config_error() {
        hlb_core()
            .args(["prior", "--low", "0.6", "--high", "0.3"])
            .assert()
            .code(14);
    }
}

mod fit {
    use super::*;

    #[test]
    fn fits_configured_model_and_writes_draws() {
        let dir = tempfile::tempdir().unwrap();
        let draws = dir.path().join("draws.csv");
        let output = hlb_core()
            .args([
                "--config",
                &fast_config(),
                "fit",
                &survey(),
                "--model",
                "genetics",
                "--draws-out",
                draws.to_str().unwrap(),
            ])
            .output()
            .unwrap();
        let code = output.status.code().unwrap();
        assert!(code == 0 || code == 1, "exit {code}");

        let v: Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(v["result"]["model"], "genetics");
        let coefficients = v["result"]["summary"]["coefficients"].as_array().unwrap();
        assert_eq!(coefficients.len(), 2);
        assert_eq!(coefficients[1]["term"], "GeneticsYes");
        assert!(v["config"]["hash"].is_string());

        let header = std::fs::read_to_string(&draws).unwrap();
        assert!(header.starts_with("chain,iteration,(Intercept),GeneticsYes"));
    }

    #[test]
    fn unknown_column_is_a_formula_error() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("narrow.csv");
        std::fs::write(&csv, "Id,Age,Hair Loss\n1,20,1\n2,30,0\n3,41,1\n").unwrap();
        hlb_core()
            .args(["fit", csv.to_str().unwrap(), "--model", "model1"])
            .assert()
            .code(13);
    }

    #[test]
    fn unknown_model_name_fails() {
        hlb_core()
            .args(["fit", &survey(), "--model", "model9"])
            .assert()
            .code(14)
            .stderr(predicate::str::contains("model9"));
    }
}

mod analyze {
    use super::*;

    #[test]
    fn compares_models_with_cross_validation() {
        let output = hlb_core()
            .args(["--config", &fast_config(), "analyze", &survey()])
            .output()
            .unwrap();
        let code = output.status.code().unwrap();
        assert!(code == 0 || code == 1, "exit {code}");

        let v: Value = serde_json::from_slice(&output.stdout).unwrap();
        let result = &v["result"];
        assert_eq!(result["models"].as_array().unwrap().len(), 2);
        assert_eq!(result["comparison"]["ranked_by"], "cv_accuracy");
        let rows = result["comparison"]["rows"].as_array().unwrap();
        assert_eq!(rows[0]["rank"], 1);
        for model in result["models"].as_array().unwrap() {
            assert_eq!(model["cv"]["fold_results"].as_array().unwrap().len(), 3);
        }
        assert!(result["events"].as_array().unwrap().len() >= 5);
    }

    #[test]
    fn no_cv_ranks_in_sample() {
        let v = stdout_json(hlb_core().args([
            "--config",
            &fast_config(),
            "analyze",
            &survey(),
            "--no-cv",
        ]));
        assert_eq!(v["result"]["comparison"]["ranked_by"], "in_sample_accuracy");
        assert!(v["result"]["models"][0]["cv"].is_null());
    }

    #[test]
    fn markdown_report_has_plots() {
        hlb_core()
            .args([
                "--config",
                &fast_config(),
                "-f",
                "md",
                "analyze",
                &survey(),
                "--no-cv",
            ])
            .assert()
            .stdout(predicate::str::contains("# Comparison"))
            .stdout(predicate::str::contains("autocorrelation"))
            .stdout(predicate::str::contains("Posterior predictive check"));
    }

    #[test]
    fn single_fold_is_rejected() {
        hlb_core()
            .args(["--config", &fast_config(), "analyze", &survey(), "--folds", "1"])
            .assert()
            .code(14);
    }
}

mod config {
    use super::*;

    #[test]
    fn show_defaults() {
        let v = stdout_json(hlb_core().args(["config", "show"]));
        assert_eq!(v["source"]["source"], "builtin_default");
        assert_eq!(v["config"]["models"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn validate_accepts_fixture() {
        hlb_core()
            .args(["config", "validate", &fast_config()])
            .assert()
            .success()
            .stdout(predicate::str::contains("valid"));
    }

    #[test]
    fn validate_rejects_bad_level() {
        hlb_core()
            .args([
                "config",
                "validate",
                fixture("invalid_analysis.json").to_str().unwrap(),
            ])
            .assert()
            .code(14)
            .stderr(predicate::str::contains("credible_level"));
    }

    #[test]
    fn schema_is_json() {
        let v = stdout_json(hlb_core().args(["config", "schema"]));
        assert!(v["properties"]["models"].is_object());
    }

    #[test]
    fn missing_config_file_is_an_args_error() {
        hlb_core()
            .args(["config", "show", "--config", "/nonexistent/analysis.json"])
            .assert()
            .code(10);
    }
}
