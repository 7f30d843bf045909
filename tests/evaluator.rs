mod common;

use common::{rbm_network, two_class_data};
use ferrite_dbn::{evaluate, Error, TrainConfig};

#[test]
fn confusion_rows_sum_to_the_class_counts() {
    let (samples, labels) = two_class_data(11);
    let dbn = rbm_network(3);
    let evaluation = evaluate(&dbn, &samples, &labels).unwrap();

    for class in 0..2 {
        let expected = labels.iter().filter(|&&l| l == class).count();
        assert_eq!(evaluation.confusion.row_sum(class), expected);
        assert_eq!(evaluation.class_stats(class).samples, expected);
    }
    assert_eq!(evaluation.confusion.total(), samples.len());
    assert!((0.0..=1.0).contains(&evaluation.error_rate()));
    approx::assert_relative_eq!(evaluation.accuracy(), 1.0 - evaluation.error_rate());
}

#[test]
fn evaluation_of_a_trained_network_is_perfect_on_separable_data() {
    let (samples, labels) = two_class_data(20);
    let mut dbn = common::dense_network(1);
    dbn.fine_tune(&samples, &labels, 40, &TrainConfig::new(0.5, 5)).unwrap();

    let evaluation = evaluate(&dbn, &samples, &labels).unwrap();
    assert_eq!(evaluation.errors, 0);
    assert_eq!(evaluation.mean_class_error(), 0.0);
    assert_eq!(evaluation.confusion.get(0, 0), 10);
    assert_eq!(evaluation.confusion.get(1, 1), 10);

    let report = evaluation.to_string();
    assert!(report.contains("Error rate: 0.0000"));
    assert!(report.contains("100.00%"));
}

#[test]
fn labels_outside_the_output_range_are_rejected() {
    let (samples, mut labels) = two_class_data(4);
    labels[2] = 2;
    let dbn = rbm_network(0);
    assert!(matches!(evaluate(&dbn, &samples, &labels), Err(Error::Data(_))));
}

#[test]
fn mismatched_lengths_are_rejected() {
    let (samples, labels) = two_class_data(4);
    let dbn = rbm_network(0);
    assert!(matches!(evaluate(&dbn, &samples, &labels[..3]), Err(Error::Data(_))));
    assert!(matches!(evaluate(&dbn, &[], &[]), Err(Error::Data(_))));
}
