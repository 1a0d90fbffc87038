/// Integration tests for the complaint severity classifier
///
/// These tests exercise the complete pipeline from a CSV on disk:
/// - Training, evaluation and prediction
/// - Determinism under a fixed seed
/// - Model persistence round-trips
/// - Error reporting for bad data, bad artifacts and untrained use
mod common;

use common::{fast_config, realistic_rows, write_csv, write_raw_csv, Row};
use complaint_triage::ml::{FeatureSet, TriageService};
use complaint_triage::{ComplaintInput, SeverityClassifier, SeverityLabel, TriageError};

fn probe_inputs() -> Vec<ComplaintInput> {
    vec![
        ComplaintInput::new("No hay médicos en el hospital, es una emergencia")
            .with_city("Pasto")
            .with_urgency("Urgente")
            .with_age(Some(70)),
        ComplaintInput::new("Queremos más parques y bibliotecas")
            .with_city("Manizales")
            .with_category("Educación"),
        ComplaintInput::new("falta agua"),
        ComplaintInput::new("").with_age(None),
    ]
}

#[test]
fn test_two_row_dataset_predicts_grave() {
    let fixture = write_csv(&[
        Row::with_defaults("faltan médicos urgente", "GRAVE"),
        Row::with_defaults("necesitamos más bibliotecas", "MODERADO"),
    ]);

    let mut classifier = SeverityClassifier::new(fast_config());
    let report = classifier.train(&fixture.csv).unwrap();

    assert_eq!(report.n_train, 2);
    assert_eq!(report.n_test, 0);
    assert!(report.test_metrics.is_none());
    assert!(report.cross_validation.is_none());

    let prediction = classifier
        .predict(&ComplaintInput::new("faltan médicos urgente"))
        .unwrap();
    assert_eq!(prediction.label, SeverityLabel::Grave);
    assert!(prediction.confidence > 0.5);
}

#[test]
fn test_training_reports_honest_metrics() {
    let fixture = write_csv(&realistic_rows());

    let mut classifier = SeverityClassifier::new(fast_config());
    let report = classifier.train(&fixture.csv).unwrap();

    assert_eq!(report.n_train + report.n_test, 40);
    assert_eq!(report.n_test, 8);
    assert_eq!(report.class_distribution["GRAVE"], 16);
    assert_eq!(report.class_distribution["MODERADO"], 16);

    let metrics = report.test_metrics.as_ref().unwrap();
    assert!((0.0..=1.0).contains(&metrics.accuracy));
    assert!((0.0..=1.0).contains(&metrics.f1_score));
    assert!((0.0..=1.0).contains(&metrics.f1_weighted));
    assert_eq!(metrics.n_samples, 8);

    let confusion = metrics.confusion_matrix.as_ref().unwrap();
    assert_eq!(confusion.shape(), &[2, 2]);
    assert_eq!(confusion.sum(), 8);
    assert_eq!(confusion.row(0).sum(), 4);
    assert_eq!(confusion.row(1).sum(), 4);

    let cv = report.cross_validation.as_ref().unwrap();
    assert_eq!(cv.folds, 5);
    assert_eq!(cv.accuracy_scores.len(), 5);
    assert!(cv.accuracy_std >= 0.0);

    assert_eq!(classifier.metrics().unwrap(), &report);
}

#[test]
fn test_training_is_idempotent() {
    let fixture = write_csv(&realistic_rows());

    let mut first = SeverityClassifier::new(fast_config());
    let mut second = SeverityClassifier::new(fast_config());
    let a = first.train(&fixture.csv).unwrap();
    let b = second.train(&fixture.csv).unwrap();

    assert_eq!(
        a.test_metrics.unwrap().confusion_matrix,
        b.test_metrics.unwrap().confusion_matrix
    );
    assert_eq!(a.cross_validation, b.cross_validation);

    for input in probe_inputs() {
        assert_eq!(
            first.predict(&input).unwrap().probabilities,
            second.predict(&input).unwrap().probabilities
        );
    }
}

#[test]
fn test_prediction_on_training_rows() {
    let rows = realistic_rows();
    let fixture = write_csv(&rows);

    let mut classifier = SeverityClassifier::new(fast_config());
    classifier.train(&fixture.csv).unwrap();

    for row in rows.iter().take(5) {
        let prediction = classifier.predict(&ComplaintInput::new(row.comment)).unwrap();
        assert!(prediction.confidence >= 1.0 / SeverityLabel::COUNT as f64);
        assert!(prediction.confidence <= 1.0);
    }
}

#[test]
fn test_save_load_round_trip_is_exact() {
    let fixture = write_csv(&realistic_rows());
    let model_path = fixture.model_path();

    let mut trained = SeverityClassifier::new(fast_config());
    trained.train(&fixture.csv).unwrap();
    trained.save(&model_path).unwrap();

    let loaded = SeverityClassifier::from_file(&model_path, fast_config()).unwrap();
    assert!(loaded.is_trained());
    assert_eq!(loaded.metrics().unwrap(), trained.metrics().unwrap());
    assert_eq!(
        loaded.metadata().unwrap().n_features,
        trained.metadata().unwrap().n_features
    );

    for input in probe_inputs() {
        let before = trained.predict(&input).unwrap();
        let after = loaded.predict(&input).unwrap();
        assert_eq!(before, after);
    }
}

#[test]
fn test_unseen_categories_never_fail() {
    let fixture = write_csv(&realistic_rows());
    let mut classifier = SeverityClassifier::new(fast_config());
    classifier.train(&fixture.csv).unwrap();

    let prediction = classifier
        .predict(
            &ComplaintInput::new("el puesto de salud no tiene medicinas")
                .with_city("Leticia")
                .with_category("Vivienda")
                .with_gender("Otro"),
        )
        .unwrap();

    assert_eq!(prediction.unseen_categories.len(), 3);
    let total: f64 = prediction.probabilities.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn test_comment_only_prediction() {
    let fixture = write_csv(&realistic_rows());
    let mut classifier = SeverityClassifier::new(fast_config());
    classifier.train(&fixture.csv).unwrap();

    let prediction = classifier
        .predict(&ComplaintInput::new("Hace falta un doctor"))
        .unwrap();

    assert_eq!(prediction.probabilities.len(), 2);
    assert!(prediction.probabilities.contains_key("GRAVE"));
    assert!(prediction.probabilities.contains_key("MODERADO"));
    assert!(prediction.unseen_categories.is_empty());
    assert!(prediction.detected_features.large_city);
}

#[test]
fn test_empty_comment_has_zero_text_features() {
    let fixture = write_csv(&realistic_rows());
    let mut classifier = SeverityClassifier::new(fast_config());
    classifier.train(&fixture.csv).unwrap();

    let prediction = classifier.predict(&ComplaintInput::new("¡¿...?!")).unwrap();
    assert_eq!(prediction.detected_features.text_length, 0);
    assert_eq!(prediction.detected_features.urgent_keywords, 0);
    assert!(!prediction.detected_features.mentions_medical);
}

#[test]
fn test_text_only_training_from_two_columns() {
    let fixture =
        write_raw_csv("Comentario,Nivel_gravedad\nfaltan médicos urgente,GRAVE\nnecesitamos más bibliotecas,LEVE\n");

    let config = complaint_triage::ClassifierConfig {
        feature_set: FeatureSet::TextOnly,
        ..fast_config()
    };
    let mut classifier = SeverityClassifier::new(config);
    classifier.train(&fixture.csv).unwrap();

    let prediction = classifier
        .predict(&ComplaintInput::new("faltan médicos urgente"))
        .unwrap();
    assert_eq!(prediction.label, SeverityLabel::Grave);
}

#[test]
fn test_missing_file_is_data_error() {
    let mut classifier = SeverityClassifier::new(fast_config());
    let err = classifier
        .train(std::path::Path::new("/no/such/quejas.csv"))
        .unwrap_err();

    assert!(matches!(err, TriageError::Data(_)));
    assert!(!classifier.is_trained());
}

#[test]
fn test_missing_column_is_data_error() {
    let fixture = write_raw_csv("Comentario,Ciudad,Nivel_gravedad\nfalta agua,Cali,GRAVE\nhay luz,Cali,MODERADO\n");

    let mut classifier = SeverityClassifier::new(fast_config());
    let err = classifier.train(&fixture.csv).unwrap_err();

    assert!(matches!(err, TriageError::Data(_)));
    assert!(!classifier.is_trained());
}

#[test]
fn test_unknown_label_is_label_error() {
    let fixture = write_csv(&[
        Row::with_defaults("falta agua", "GRAVE"),
        Row::with_defaults("hay luz", "MEDIO"),
    ]);

    let mut classifier = SeverityClassifier::new(fast_config());
    let err = classifier.train(&fixture.csv).unwrap_err();
    assert!(matches!(err, TriageError::Label(_)));
}

#[test]
fn test_garbage_artifact_is_format_error() {
    let fixture = write_raw_csv("not a model at all");

    let mut classifier = SeverityClassifier::new(fast_config());
    let err = classifier.load(&fixture.csv).unwrap_err();

    assert!(matches!(err, TriageError::ModelFormat(_)));
    assert!(!classifier.is_trained());
}

#[test]
fn test_failed_load_keeps_trained_model() {
    let fixture = write_csv(&realistic_rows());
    let mut classifier = SeverityClassifier::new(fast_config());
    classifier.train(&fixture.csv).unwrap();

    let garbage = write_raw_csv("garbage");
    assert!(classifier.load(&garbage.csv).is_err());
    assert!(classifier.is_trained());
    assert!(classifier.predict(&ComplaintInput::new("falta agua")).is_ok());
}

#[test]
fn test_untrained_use_is_rejected() {
    let classifier = SeverityClassifier::new(fast_config());

    assert!(matches!(
        classifier.predict(&ComplaintInput::new("falta agua")),
        Err(TriageError::NotTrained(_))
    ));
    assert!(matches!(
        classifier.save(std::path::Path::new("model.bin")),
        Err(TriageError::NotTrained(_))
    ));
}

#[test]
fn test_service_concurrent_predictions() {
    let fixture = write_csv(&realistic_rows());
    let service = TriageService::new(fast_config());
    service.train_from_path(&fixture.csv).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = service.clone();
            std::thread::spawn(move || {
                let inputs = probe_inputs();
                service.predict(&inputs[i % inputs.len()]).unwrap()
            })
        })
        .collect();

    for handle in handles {
        let prediction = handle.join().unwrap();
        assert!((0.5..=1.0).contains(&prediction.confidence));
    }

    let stats = service.stats();
    assert!(stats.trained);
    assert_eq!(stats.predictions_served, 4);
    assert!(stats.n_features > stats.vocab_size);
    assert!(stats.last_accuracy.is_some());
}

#[test]
fn test_service_save_and_reload() {
    let fixture = write_csv(&realistic_rows());
    let model_path = fixture.model_path();

    let service = TriageService::new(fast_config());
    service.train_from_path(&fixture.csv).unwrap();
    service.save_model(&model_path).unwrap();

    let reloaded = TriageService::new(fast_config());
    reloaded.load_model(&model_path).unwrap();

    let input = ComplaintInput::new("no hay agua potable");
    assert_eq!(
        service.predict(&input).unwrap(),
        reloaded.predict(&input).unwrap()
    );
    assert_eq!(service.report().unwrap(), reloaded.report().unwrap());
}
