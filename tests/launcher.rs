use std::io::Write;

use ollawv::{ApplicationLauncher, Configuration, SvmError};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn write_dataset(classes: usize, per_class: usize, seed: u64) -> tempfile::NamedTempFile {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    for i in 0..per_class {
        for class in 0..classes {
            let x = class as f64 * 3.0 + rng.gen_range(-0.5..0.5);
            let y = (class as f64).sin() + rng.gen_range(-0.5..0.5);
            // an occasional sparse row keeps the parser honest
            if i % 7 == 0 {
                writeln!(file, "label{class} 0:{x:.6}").unwrap();
            } else {
                writeln!(file, "label{class} 0:{x:.6} 1:{y:.6}").unwrap();
            }
        }
    }
    file.flush().unwrap();
    file
}

fn configuration(file: &tempfile::NamedTempFile) -> Configuration {
    let mut conf = Configuration {
        input: file.path().to_owned(),
        inner_folds: 3,
        ..Configuration::default()
    };
    conf.search.c_resolution = 1;
    conf.search.gamma_resolution = 1;
    conf.search.c_low = 10.0;
    conf.search.gamma_low = 1.0;
    conf.train.epochs = 1.0;
    conf
}

#[test]
fn cross_validation_run_produces_a_model() {
    let file = write_dataset(3, 30, 5);
    let launcher = ApplicationLauncher::new(configuration(&file)).unwrap();
    let (report, document) = launcher.run().unwrap();

    assert_eq!(document.models.len(), 3);
    assert_eq!(document.label_names.len(), 3);
    assert!(document.max_sv_count > 0);
    for entry in &document.models {
        assert_eq!(entry.alphas.len(), document.max_sv_count);
        assert_eq!(entry.samples.len(), document.max_sv_count);
        assert!(entry.size <= document.max_sv_count);
    }
    assert!(report.accuracy > 0.8, "accuracy {}", report.accuracy);
    assert_eq!(report.sv_count, document.max_sv_count);

    let json = serde_json::to_string(&document).unwrap();
    let parsed: ollawv::ModelDocument = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.max_sv_count, document.max_sv_count);
}

#[test]
fn single_training_run_reports_resubstitution_accuracy() {
    let file = write_dataset(2, 40, 8);
    let mut conf = configuration(&file);
    conf.inner_folds = 1;
    let launcher = ApplicationLauncher::new(conf).unwrap();
    let (report, document) = launcher.run().unwrap();

    assert_eq!(document.models.len(), 1);
    assert!(report.accuracy > 0.9, "accuracy {}", report.accuracy);
}

#[test]
fn missing_input_surfaces_before_training() {
    let mut conf = Configuration::default();
    conf.input = "does-not-exist.libsvm".into();
    let launcher = ApplicationLauncher::new(conf).unwrap();
    match launcher.run() {
        Err(SvmError::InputMissing { path, .. }) => {
            assert_eq!(path, std::path::PathBuf::from("does-not-exist.libsvm"));
        }
        other => panic!("expected InputMissing, got {other:?}"),
    }
}

#[test]
fn invalid_options_are_rejected_up_front() {
    let file = write_dataset(2, 10, 2);
    let mut conf = configuration(&file);
    conf.train.epochs = -1.0;
    assert!(matches!(
        ApplicationLauncher::new(conf),
        Err(SvmError::InvalidConfiguration(_))
    ));
}

#[test]
fn single_label_input_is_degenerate() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..10 {
        writeln!(file, "only 0:{}", i).unwrap();
    }
    file.flush().unwrap();

    let launcher = ApplicationLauncher::new(configuration(&file)).unwrap();
    assert!(matches!(
        launcher.run(),
        Err(SvmError::DegenerateProblem { labels: 1, .. })
    ));
}
