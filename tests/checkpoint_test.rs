use puck::train::TrainingConfig;
use puck::{
    CharRnn, Checkpoint, MaxIterations, PuckError, RnnConfig, Trainer, TrainingLogger, Vocabulary,
};
use std::fs;
use std::path::PathBuf;

/// Create a scratch directory for one test
fn create_test_dir(name: &str) -> PathBuf {
    let dir_name = format!("puck_{}_{}", name, std::process::id());
    let test_dir = std::env::temp_dir().join(dir_name);
    if test_dir.exists() {
        fs::remove_dir_all(&test_dir).ok();
    }
    fs::create_dir_all(&test_dir).unwrap();
    test_dir
}

fn cleanup_test_dir(test_dir: &PathBuf) {
    if test_dir.exists() {
        fs::remove_dir_all(test_dir).ok();
    }
}

fn quiet_config() -> TrainingConfig {
    TrainingConfig {
        seq_length: 8,
        sample_every: 0,
        log_every: 0,
        ..TrainingConfig::default()
    }
}

fn corpus() -> (Vocabulary, Vec<usize>) {
    let text = "Now is the winter of our discontent\n".repeat(8);
    let vocab = Vocabulary::from_text(&text);
    let ids = vocab.encode(&text).unwrap();
    (vocab, ids)
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[test]
fn test_checkpoint_roundtrip() {
    let test_dir = create_test_dir("roundtrip");
    let path = test_dir.join("run.json");

    let (vocab, ids) = corpus();
    let model = CharRnn::from_seed(RnnConfig::new(vocab.size(), 12), 3)
        .unwrap();
    let mut trainer = Trainer::new(model, quiet_config()).unwrap();
    let mut logger = TrainingLogger::console().quiet();
    trainer
        .train(&ids, &vocab, &mut MaxIterations(25), &mut logger)
        .unwrap();

    Checkpoint::from_trainer(&trainer, &vocab)
        .save(&path)
        .unwrap();
    let loaded = Checkpoint::load(&path).unwrap();

    assert_eq!(loaded.vocabulary, vocab);
    assert_eq!(loaded.training, trainer.config);
    assert_eq!(loaded.model.config, trainer.model.config);
    assert_eq!(loaded.state.iteration, 25);
    assert_eq!(loaded.state.pointer, trainer.state().pointer);
    assert_eq!(loaded.optimizer.steps, 25);
    let pairs = loaded
        .model
        .parameters()
        .into_iter()
        .zip(trainer.model.parameters());
    for ((name, saved), (_, live)) in pairs {
        assert_eq!(saved.shape, live.shape, "{}", name);
        assert!(max_abs_diff(&saved.data, &live.data) < 1e-12, "{}", name);
    }

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_resumed_run_matches_uninterrupted_run() {
    let test_dir = create_test_dir("resume");
    let path = test_dir.join("run.json");

    let (vocab, ids) = corpus();
    let mut logger = TrainingLogger::console().quiet();

    let model = CharRnn::from_seed(RnnConfig::new(vocab.size(), 10), 5)
        .unwrap();
    let mut uninterrupted = Trainer::new(model.clone(), quiet_config()).unwrap();
    uninterrupted
        .train(&ids, &vocab, &mut MaxIterations(40), &mut logger)
        .unwrap();

    let mut first_half = Trainer::new(model, quiet_config()).unwrap();
    first_half
        .train(&ids, &vocab, &mut MaxIterations(20), &mut logger)
        .unwrap();
    Checkpoint::from_trainer(&first_half, &vocab)
        .save(&path)
        .unwrap();

    let mut resumed = Checkpoint::load(&path)
        .unwrap()
        .resume(&vocab, quiet_config())
        .unwrap();
    assert_eq!(resumed.iteration(), 20);
    resumed
        .train(&ids, &vocab, &mut MaxIterations(40), &mut logger)
        .unwrap();

    assert_eq!(resumed.state().pointer, uninterrupted.state().pointer);
    let loss_gap = (resumed.smooth_loss() - uninterrupted.smooth_loss()).abs();
    assert!(loss_gap < 1e-8);
    let hidden_gap = max_abs_diff(resumed.hidden(), uninterrupted.hidden());
    assert!(hidden_gap < 1e-8);
    let why_gap = max_abs_diff(&resumed.model.why.data, &uninterrupted.model.why.data);
    assert!(why_gap < 1e-8);

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_resume_with_other_corpus_fails() {
    let test_dir = create_test_dir("mismatch");
    let path = test_dir.join("run.json");

    let (vocab, _) = corpus();
    let model = CharRnn::from_seed(RnnConfig::new(vocab.size(), 6), 1)
        .unwrap();
    let trainer = Trainer::new(model, quiet_config()).unwrap();
    Checkpoint::from_trainer(&trainer, &vocab)
        .save(&path)
        .unwrap();

    let other = Vocabulary::from_text("Friends, Romans, countrymen");
    let result = Checkpoint::load(&path)
        .unwrap()
        .resume(&other, quiet_config());
    assert!(matches!(result, Err(PuckError::VocabularyMismatch { .. })));

    cleanup_test_dir(&test_dir);
}

#[test]
fn test_load_rejects_corrupt_file() {
    let test_dir = create_test_dir("corrupt");
    let path = test_dir.join("run.json");
    let truncated = "{ \"format_version\": 1, \"vocabulary\": ";
    fs::write(&path, truncated).unwrap();

    assert!(matches!(
        Checkpoint::load(&path),
        Err(PuckError::Serialization(_))
    ));
    assert!(matches!(
        Checkpoint::load(test_dir.join("missing.json")),
        Err(PuckError::Io(_))
    ));

    cleanup_test_dir(&test_dir);
}
