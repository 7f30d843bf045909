#![allow(dead_code)]

use std::path::PathBuf;

use ferrite_dbn::{ActivationFunction, Dbn, LayerSpec, NetworkSpec};

/// Two separable classes over four binary features.
pub fn two_class_data(n: usize) -> (Vec<Vec<f64>>, Vec<usize>) {
    let prototypes = [
        [[1.0, 1.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]],
        [[0.0, 0.0, 1.0, 1.0], [0.0, 0.0, 1.0, 0.0], [0.0, 0.0, 0.0, 1.0]],
    ];
    let mut samples = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let class = i % 2;
        samples.push(prototypes[class][(i / 2) % 3].to_vec());
        labels.push(class);
    }
    (samples, labels)
}

pub fn dense_network(seed: u64) -> Dbn {
    NetworkSpec::new(
        "dense",
        vec![LayerSpec::Dense { input: 4, output: 2, activation: ActivationFunction::Softmax }],
        seed,
    )
    .build()
    .unwrap()
}

pub fn rbm_network(seed: u64) -> Dbn {
    NetworkSpec::new(
        "rbm",
        vec![
            LayerSpec::Rbm { visible: 4, hidden: 3, cd_steps: 1 },
            LayerSpec::Dense { input: 3, output: 2, activation: ActivationFunction::Softmax },
        ],
        seed,
    )
    .build()
    .unwrap()
}

/// 1x4x4 input, two 3x3 filters, dense softmax over the 2x2x2 feature maps.
pub fn conv_network(seed: u64) -> Dbn {
    NetworkSpec::new(
        "conv",
        vec![
            LayerSpec::Conv {
                channels: 1,
                height: 4,
                width: 4,
                filters: 2,
                kernel: 3,
                kernel_h: None,
                kernel_w: None,
                stride: 1,
                activation: ActivationFunction::Sigmoid,
            },
            LayerSpec::Dense { input: 8, output: 2, activation: ActivationFunction::Softmax },
        ],
        seed,
    )
    .build()
    .unwrap()
}

/// A unique path in the system temp directory.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("ferrite-dbn-{}-{}", std::process::id(), name))
}
