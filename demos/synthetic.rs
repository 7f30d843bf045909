use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ferrite_dbn::{evaluate, ActivationFunction, LayerSpec, NetworkSpec, PretrainConfig, TrainConfig};

/// Noisy copies of three 4x4 binary prototypes: a row, a column, a diagonal.
fn patterns(n: usize, rng: &mut StdRng) -> (Vec<Vec<f64>>, Vec<usize>) {
    let prototypes: [Vec<f64>; 3] = [
        (0..16).map(|i| if i / 4 == 1 { 1.0 } else { 0.0 }).collect(),
        (0..16).map(|i| if i % 4 == 2 { 1.0 } else { 0.0 }).collect(),
        (0..16).map(|i| if i / 4 == i % 4 { 1.0 } else { 0.0 }).collect(),
    ];

    let mut samples = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let class = i % 3;
        let sample = prototypes[class]
            .iter()
            .map(|&v| if rng.gen::<f64>() < 0.1 { 1.0 - v } else { v })
            .collect();
        samples.push(sample);
        labels.push(class);
    }
    (samples, labels)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut rng = StdRng::seed_from_u64(42);
    let (train_samples, train_labels) = patterns(300, &mut rng);
    let (test_samples, test_labels) = patterns(60, &mut rng);

    let spec = NetworkSpec::new(
        "synthetic",
        vec![
            LayerSpec::Rbm { visible: 16, hidden: 12, cd_steps: 1 },
            LayerSpec::Dense { input: 12, output: 3, activation: ActivationFunction::Softmax },
        ],
        42,
    );
    let mut dbn = match spec.build() {
        Ok(dbn) => dbn,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    println!("{}\n", dbn);

    let pretrain = PretrainConfig { learning_rate: 0.1, momentum: 0.5, ..PretrainConfig::default() };
    match dbn.pretrain(&train_samples, 10, &pretrain) {
        Ok(report) => println!("Reconstruction error after pretraining: {:?}", report.final_errors()),
        Err(e) => eprintln!("pretraining failed: {}", e),
    }

    let config = TrainConfig { momentum: 0.9, ..TrainConfig::new(0.1, 10) };
    match dbn.fine_tune(&train_samples, &train_labels, 20, &config) {
        Ok(error) => println!("Training error: {:.4}", error),
        Err(e) => eprintln!("fine-tuning failed: {}", e),
    }

    match evaluate(&dbn, &test_samples, &test_labels) {
        Ok(evaluation) => println!("\n{}", evaluation),
        Err(e) => eprintln!("evaluation failed: {}", e),
    }
}
