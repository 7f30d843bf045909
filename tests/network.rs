mod common;

use common::{conv_network, dense_network, rbm_network, temp_path, two_class_data};
use ferrite_dbn::{Error, Matrix, PretrainConfig};

#[test]
fn predictions_are_deterministic() {
    let dbn = conv_network(3);
    let sample: Vec<f64> = (0..16).map(|i| (i % 5) as f64 / 4.0).collect();

    let first = dbn.predict(&sample);
    for _ in 0..5 {
        assert_eq!(dbn.predict(&sample), first);
    }
    assert_eq!(conv_network(3).activation_probabilities(&sample), dbn.activation_probabilities(&sample));
}

#[test]
fn batch_and_single_predictions_agree() {
    let dbn = rbm_network(5);
    let (samples, _) = two_class_data(6);
    let indices: Vec<usize> = (0..samples.len()).collect();
    let batch = dbn.predict_batch(&Matrix::from_rows(&samples, &indices));
    let single: Vec<usize> = samples.iter().map(|s| dbn.predict(s)).collect();
    assert_eq!(batch, single);
}

#[test]
fn output_probabilities_sum_to_one() {
    let dbn = conv_network(8);
    let probabilities = dbn.activation_probabilities(&[0.5; 16]);
    assert_eq!(probabilities.len(), dbn.output_size());
    approx::assert_relative_eq!(probabilities.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
}

#[test]
fn store_then_load_reproduces_parameters_and_predictions() {
    let path = temp_path("roundtrip.dat");
    let source = conv_network(1);
    source.store(&path).unwrap();

    let mut restored = conv_network(2);
    restored.load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(restored.snapshot().unwrap(), source.snapshot().unwrap());
    let sample: Vec<f64> = (0..16).map(|i| i as f64 / 16.0).collect();
    assert_eq!(restored.activation_probabilities(&sample), source.activation_probabilities(&sample));
    assert_eq!(restored.predict(&sample), source.predict(&sample));
}

#[test]
fn loading_weights_of_another_architecture_fails() {
    let path = temp_path("mismatch.dat");
    dense_network(0).store(&path).unwrap();

    let mut dbn = rbm_network(0);
    let before = dbn.snapshot().unwrap();
    let result = dbn.load(&path);
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(Error::Weights(_))));
    assert_eq!(dbn.snapshot().unwrap(), before);
}

#[test]
fn loading_a_missing_file_is_an_io_error() {
    let mut dbn = dense_network(0);
    assert!(matches!(dbn.load(temp_path("does-not-exist.dat")), Err(Error::Io(_))));
}

#[test]
fn pretraining_touches_only_pretrainable_layers() {
    let (samples, _) = two_class_data(20);
    let mut dbn = rbm_network(4);
    let dense_before = format!("{:?}", dbn.layers()[1]);
    let before = dbn.snapshot().unwrap();

    let config = PretrainConfig { batch_size: 5, ..PretrainConfig::default() };
    let report = dbn.pretrain(&samples, 3, &config).unwrap();

    assert_eq!(report.layers.len(), 1);
    assert_eq!(report.layers[0].layer, 0);
    assert_eq!(report.layers[0].epoch_errors.len(), 3);
    assert!(report.final_errors()[0].is_finite());
    assert_ne!(dbn.snapshot().unwrap(), before);
    assert_eq!(format!("{:?}", dbn.layers()[1]), dense_before);
}

#[test]
fn zero_pretraining_epochs_skip_the_phase() {
    let (samples, _) = two_class_data(10);
    let mut dbn = rbm_network(4);
    let before = dbn.snapshot().unwrap();
    let report = dbn.pretrain(&samples, 0, &PretrainConfig::default()).unwrap();
    assert!(report.layers.is_empty());
    assert_eq!(dbn.snapshot().unwrap(), before);
}

#[test]
fn pretraining_rejects_samples_of_the_wrong_size() {
    let mut dbn = rbm_network(0);
    let result = dbn.pretrain(&[vec![0.0; 5]], 1, &PretrainConfig::default());
    assert!(matches!(result, Err(Error::Data(_))));
}

#[test]
fn zero_gibbs_steps_are_a_configuration_error() {
    let (samples, _) = two_class_data(10);
    let mut dbn = rbm_network(0);
    let before = dbn.snapshot().unwrap();
    let config = PretrainConfig { cd_steps: Some(0), ..PretrainConfig::default() };
    let result = dbn.pretrain(&samples, 1, &config);
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert_eq!(dbn.snapshot().unwrap(), before);
}

#[test]
fn pretraining_is_reproducible() {
    let (samples, _) = two_class_data(20);
    let run = || {
        let mut dbn = rbm_network(6);
        dbn.pretrain(&samples, 2, &PretrainConfig::default()).unwrap();
        dbn.snapshot().unwrap()
    };
    assert_eq!(run(), run());
}
