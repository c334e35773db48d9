use std::{
    env,
    fs,
    path::PathBuf,
};

use qvpack::encode::EncodeSummary;
use qvpack::QvPack;

const SEED: [u32; 32] = [0x55555555; 32];

fn temp_path(name: &str) -> PathBuf {
    env::temp_dir().join(name)
}

/// Fixed-width lines over a 4-symbol alphabet covering every pattern
/// the same number of times, so every column and every transition is
/// exactly uniform.
fn uniform_lines(columns: u32, repeats: usize) -> Vec<u8> {
    let patterns = 4u64.pow(columns);
    let mut contents = Vec::new();
    for _ in 0..repeats {
        for i in 0..patterns {
            let mut v = i;
            for _ in 0..columns {
                contents.push(b'!' + (v % 4) as u8);
                v /= 4;
            }
            contents.push(b'\n');
        }
    }
    contents
}

fn roundtrip(name: &str, input: &[u8], ratio: f64, clusters: usize) -> (Vec<u8>, EncodeSummary) {
    let input_path = temp_path(&format!("qvpack_{}.qv", name));
    let coded_path = temp_path(&format!("qvpack_{}.qvp", name));
    let output_path = temp_path(&format!("qvpack_{}.out", name));
    fs::write(&input_path, input).unwrap();

    let summary = QvPack::default()
        .input(input_path.to_str().unwrap())
        .output(coded_path.to_str().unwrap())
        .ratio(ratio).unwrap()
        .clusters(clusters).unwrap()
        .training_cap(0)
        .seed(SEED)
        .encode().unwrap();

    QvPack::default()
        .input(coded_path.to_str().unwrap())
        .output(output_path.to_str().unwrap())
        .decode().unwrap();

    let decoded = fs::read(&output_path).unwrap();
    fs::remove_file(&input_path).unwrap();
    fs::remove_file(&coded_path).unwrap();
    fs::remove_file(&output_path).unwrap();
    (decoded, summary)
}

#[test]
fn identity_at_full_ratio() {
    // With the full entropy budget the selected quantizers are the
    // identity, so the decode is byte-exact.
    let input = uniform_lines(4, 39);
    let (decoded, summary) = roundtrip("identity", &input, 1.0, 1);
    assert_eq!(decoded, input);
    assert_eq!(summary.distortion, 0.0);
}

#[test]
fn lossy_at_half_ratio() {
    let input = uniform_lines(4, 39);
    let (decoded, summary) = roundtrip("lossy", &input, 0.5, 1);
    assert_eq!(decoded.len(), input.len());

    // Half the entropy of a uniform 4-symbol column is one bit, so
    // every column must collapse to at most 2 distinct symbols.
    for c in 0..4 {
        let mut seen: Vec<u8> = Vec::new();
        for line in decoded.chunks_exact(5) {
            if !seen.contains(&line[c]) {
                seen.push(line[c]);
            }
        }
        assert!(seen.len() <= 2, "column {} used {} symbols", c, seen.len());
    }

    // Measured distortion stays within 10% of the codebook's own
    // prediction, which for a two-state quantizer on uniform data
    // is an MSE of 0.5.
    let mut error = 0.0;
    let mut symbols = 0;
    for (orig, dec) in input.chunks_exact(5).zip(decoded.chunks_exact(5)) {
        for c in 0..4 {
            let diff = orig[c] as f64 - dec[c] as f64;
            error += diff * diff;
            symbols += 1;
        }
    }
    let mse = error / symbols as f64;
    assert!((summary.expected_mse - 0.5).abs() < 1e-9);
    assert!((mse - summary.expected_mse).abs() / summary.expected_mse <= 0.1, "mse = {}", mse);
    assert!((summary.distortion - mse).abs() < 1e-9);
}

#[test]
fn single_column_constant_input() {
    // Every line is the single symbol 20 ('5'); the codebook collapses
    // to one state and the decode reproduces the input exactly.
    let input: Vec<u8> = b"5\n".iter().cycle().take(2 * 1000).cloned().collect();
    let (decoded, summary) = roundtrip("constant", &input, 0.5, 1);
    assert_eq!(decoded, input);
    assert_eq!(summary.distortion, 0.0);
}

#[test]
fn forced_seed_is_deterministic() {
    let input = uniform_lines(3, 20);
    let input_path = temp_path("qvpack_seeded.qv");
    let out1 = temp_path("qvpack_seeded_1.qvp");
    let out2 = temp_path("qvpack_seeded_2.qvp");
    fs::write(&input_path, &input).unwrap();

    for out in [&out1, &out2].iter() {
        QvPack::default()
            .input(input_path.to_str().unwrap())
            .output(out.to_str().unwrap())
            .ratio(0.6).unwrap()
            .clusters(1).unwrap()
            .training_cap(0)
            .seed(SEED)
            .encode().unwrap();
    }

    let coded1 = fs::read(&out1).unwrap();
    let coded2 = fs::read(&out2).unwrap();
    fs::remove_file(&input_path).unwrap();
    fs::remove_file(&out1).unwrap();
    fs::remove_file(&out2).unwrap();
    assert_eq!(coded1, coded2);
}

#[test]
fn clustered_roundtrip() {
    // Two well-separated line families; with per-cluster codebooks at
    // full ratio the decode is still byte-exact, which exercises the
    // cluster id coding path end to end.
    fastrand::seed(33);
    let mut input = Vec::new();
    for family_mean in [10i32, 30].iter() {
        for _ in 0..300 {
            for _ in 0..8 {
                let noise = fastrand::i32(-1..=1);
                input.push((family_mean + noise + 33) as u8);
            }
            input.push(b'\n');
        }
    }
    let (decoded, _) = roundtrip("clustered", &input, 1.0, 2);
    assert_eq!(decoded, input);
}

#[test]
fn distortion_never_rises_with_ratio() {
    let input = uniform_lines(4, 20);
    let input_path = temp_path("qvpack_mono.qv");
    let coded_path = temp_path("qvpack_mono.qvp");
    fs::write(&input_path, &input).unwrap();

    let mut last = f64::MAX;
    for &ratio in [0.25, 0.5, 1.0].iter() {
        let summary = QvPack::default()
            .input(input_path.to_str().unwrap())
            .output(coded_path.to_str().unwrap())
            .ratio(ratio).unwrap()
            .clusters(1).unwrap()
            .training_cap(0)
            .seed(SEED)
            .encode().unwrap();
        assert!(summary.distortion <= last, "distortion rose at ratio {}", ratio);
        last = summary.distortion;

        // A ratio that lands between integer state counts mixes low
        // and high quantizers per draw; the decode must stay in
        // lockstep with the encoder's selections.
        let output_path = temp_path("qvpack_mono.out");
        QvPack::default()
            .input(coded_path.to_str().unwrap())
            .output(output_path.to_str().unwrap())
            .decode().unwrap();
        assert_eq!(fs::read(&output_path).unwrap().len(), input.len());
        fs::remove_file(&output_path).unwrap();
    }

    fs::remove_file(&input_path).unwrap();
    fs::remove_file(&coded_path).unwrap();
}

#[test]
fn truncated_container_is_fatal() {
    let input = uniform_lines(3, 10);
    let input_path = temp_path("qvpack_trunc.qv");
    let coded_path = temp_path("qvpack_trunc.qvp");
    let output_path = temp_path("qvpack_trunc.out");
    fs::write(&input_path, &input).unwrap();

    QvPack::default()
        .input(input_path.to_str().unwrap())
        .output(coded_path.to_str().unwrap())
        .ratio(0.9).unwrap()
        .clusters(1).unwrap()
        .training_cap(0)
        .seed(SEED)
        .encode().unwrap();

    // Cut the container inside the codebook payload.
    let coded = fs::read(&coded_path).unwrap();
    fs::write(&coded_path, &coded[..140]).unwrap();

    let result = QvPack::default()
        .input(coded_path.to_str().unwrap())
        .output(output_path.to_str().unwrap())
        .decode();
    assert!(result.is_err());

    fs::remove_file(&input_path).unwrap();
    fs::remove_file(&coded_path).unwrap();
    let _ = fs::remove_file(&output_path);
}

#[test]
fn missing_input_is_fatal() {
    let result = QvPack::default()
        .input("/definitely/not/here.qv")
        .output(temp_path("qvpack_missing.qvp").to_str().unwrap())
        .encode();
    assert!(result.is_err());
}
