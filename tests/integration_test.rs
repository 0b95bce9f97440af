//! Integration tests: loading, fit/apply parity, state persistence, training, serving, run store.

use credit_risk::{
    config::{FeaturesConfig, PipelineConfig, TrainingConfig},
    data::{self, default_rate, RawDataset, RawTransaction},
    error::PipelineError,
    features::{
        FeaturePipeline, SchemaTag, AMOUNT, AVERAGE_AMOUNT, HOUR, NUMERIC_COLUMNS, TOTAL_AMOUNT, TRANSACTION_COUNT,
        YEAR,
    },
    model::{ForestParams, Hyperparams, LogisticParams, ModelKind, Penalty},
    risk::RiskLevel,
    serving::{self, ErrorResponse, ScoringService, ServingBundle},
    state::EncodingStateStore,
    storage::{RunRecord, RunStore},
    training::{Trainer, TrainingOutcome},
    RiskEngine,
};
use std::io::Write;
use std::path::{Path, PathBuf};

fn tx(id: &str, account: &str, amount: Option<f64>, category: &str, fraud: u8) -> RawTransaction {
    RawTransaction {
        transaction_id: id.to_string(),
        customer_id: format!("Customer_{account}"),
        account_id: account.to_string(),
        amount,
        currency_code: "UGX".to_string(),
        country_code: "256".to_string(),
        provider_id: "ProviderId_6".to_string(),
        product_category: category.to_string(),
        channel_id: "ChannelId_3".to_string(),
        fraud_result: Some(fraud),
        transaction_start_time: "2018-11-15T02:18:49Z".to_string(),
    }
}

/// 60 labelled rows; fraud rows carry large amounts and mostly one category.
fn training_rows() -> Vec<RawTransaction> {
    (0..60)
        .map(|i| {
            let fraud = u8::from(i % 4 == 0);
            let amount = if fraud == 1 { 5000.0 + i as f64 * 10.0 } else { 100.0 + i as f64 };
            let category = match (fraud, i % 5) {
                (1, 0) => "airtime",
                (1, _) => "financial_services",
                (_, 0) => "financial_services",
                (_, 1) | (_, 2) => "airtime",
                _ => "utility_bill",
            };
            let mut t = tx(&format!("TransactionId_{i}"), &format!("AccountId_{}", i % 7), Some(amount), category, fraud);
            t.provider_id = format!("ProviderId_{}", i % 3);
            t.channel_id = if fraud == 1 { "ChannelId_1" } else { "ChannelId_3" }.to_string();
            t.transaction_start_time = format!("2019-01-{:02}T{:02}:30:00Z", 1 + i % 28, i % 24);
            t
        })
        .collect()
}

fn training_set() -> RawDataset {
    RawDataset::new(training_rows()).unwrap()
}

fn unscaled_features() -> FeaturesConfig {
    FeaturesConfig {
        scaled_columns: Vec::new(),
        ..FeaturesConfig::default()
    }
}

fn write_csv(dir: &Path, name: &str, header: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "{header}").unwrap();
    for row in rows {
        writeln!(f, "{row}").unwrap();
    }
    path
}

const HEADER: &str = "TransactionId,BatchId,AccountId,SubscriptionId,CustomerId,CurrencyCode,CountryCode,ProviderId,ProductId,ProductCategory,ChannelId,Amount,Value,TransactionStartTime,PricingStrategy,FraudResult";

fn small_training_config() -> TrainingConfig {
    TrainingConfig::default()
}

fn small_grid(kind: ModelKind) -> Vec<Hyperparams> {
    match kind {
        ModelKind::LogisticRegression => [1.0, 10.0]
            .iter()
            .map(|&c| {
                Hyperparams::Logistic(LogisticParams {
                    c,
                    penalty: Penalty::L2,
                    ..LogisticParams::default()
                })
            })
            .collect(),
        ModelKind::RandomForest => vec![Hyperparams::Forest(ForestParams {
            n_estimators: 10,
            max_depth: Some(5),
            ..ForestParams::default()
        })],
    }
}

fn train_kind(pipeline: &FeaturePipeline, dataset: &RawDataset, kind: ModelKind) -> (TrainingOutcome, credit_risk::EncodingState) {
    let (vectors, state) = pipeline.fit_transform(dataset).unwrap();
    let labels = dataset.labels().unwrap();
    let trainer = Trainer::new(small_training_config(), state.schema_tag.clone(), 0.5);
    let outcome = trainer.train(&vectors, &labels, kind, &small_grid(kind)).unwrap();
    (outcome, state)
}

#[test]
fn config_load_default() {
    let c = PipelineConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.training.test_fraction, 0.2);
    assert_eq!(c.training.seed, 42);
    assert_eq!(c.training.cv_folds, 5);
    assert_eq!(c.training.grid(ModelKind::LogisticRegression).len(), 10);
    assert_eq!(c.training.grid(ModelKind::RandomForest).len(), 108);
    assert_eq!(c.features.target_column, "FraudResult");
    assert_eq!(c.features.woe_columns, vec!["ProductCategory", "ChannelId"]);
    assert_eq!(c.features.scaled_columns, NUMERIC_COLUMNS.to_vec());
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();
    let c = PipelineConfig::load(&path);
    assert_eq!(c.risk.label_threshold, 0.5);

    std::fs::write(&path, r#"{"training": {"seed": 7}}"#).unwrap();
    let c = PipelineConfig::load(&path);
    assert_eq!(c.training.seed, 7);
    assert_eq!(c.training.cv_folds, 5);
}

#[test]
fn try_load_reports_malformed_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let missing = PipelineConfig::try_load(&path).unwrap();
    assert_eq!(missing.training.seed, 42);

    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(PipelineConfig::try_load(&path), Err(PipelineError::Json(_))));
}

#[test]
fn load_missing_path_is_not_found() {
    let err = data::load(Path::new("does/not/exist.csv")).unwrap_err();
    assert!(matches!(err, PipelineError::NotFound(_)));
    assert_eq!(err.status(), 404);
}

#[test]
fn load_reports_missing_column_and_bad_rows() {
    let dir = tempfile::tempdir().unwrap();
    let no_channel = write_csv(
        dir.path(),
        "a.csv",
        "TransactionId,AccountId,CustomerId,CurrencyCode,CountryCode,ProviderId,ProductCategory,Amount,TransactionStartTime,FraudResult",
        &["T1,A1,C1,UGX,256,P1,airtime,100,2018-11-15T02:18:49Z,0"],
    );
    match data::load(&no_channel).unwrap_err() {
        PipelineError::MissingColumn(c) => assert_eq!(c, "ChannelId"),
        other => panic!("unexpected error {other:?}"),
    }

    let bad_label = write_csv(
        dir.path(),
        "b.csv",
        HEADER,
        &[
            "T1,B1,A1,S1,C1,UGX,256,P1,Pr1,airtime,Ch3,100,100,2018-11-15T02:18:49Z,2,0",
            "T2,B1,A1,S1,C1,UGX,256,P1,Pr1,airtime,Ch3,100,100,2018-11-15T02:18:49Z,2,yes",
        ],
    );
    match data::load(&bad_label).unwrap_err() {
        PipelineError::Parse { line, .. } => assert_eq!(line, 3),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn load_coerces_bad_amounts_to_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        dir.path(),
        "c.csv",
        HEADER,
        &[
            "T1,B1,A1,S1,C1,UGX,256,P1,Pr1,airtime,Ch3,100,100,2018-11-15T02:18:49Z,2,0",
            "T2,B1,A1,S1,C1,UGX,256,P1,Pr1,airtime,Ch3,n/a,100,2018-11-15T03:18:49Z,2,1",
        ],
    );
    let dataset = data::load(&path).unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.get("T1").unwrap().amount, Some(100.0));
    assert_eq!(dataset.get("T2").unwrap().amount, None);
}

#[test]
fn default_rate_matches_label_mean() {
    let rows = [0u8, 1, 0, 1, 1]
        .iter()
        .enumerate()
        .map(|(i, &y)| tx(&format!("T{i}"), "A", Some(10.0), "airtime", y))
        .collect();
    let dataset = RawDataset::new(rows).unwrap();
    assert!((default_rate(&dataset).unwrap() - 0.6).abs() < 1e-12);
}

#[test]
fn duplicate_transaction_ids_are_rejected() {
    let rows = vec![tx("T1", "A", Some(1.0), "airtime", 0), tx("T1", "B", Some(2.0), "airtime", 1)];
    assert!(matches!(RawDataset::new(rows), Err(PipelineError::Parse { .. })));
}

#[test]
fn account_aggregates_follow_the_account() {
    let rows = vec![
        tx("T1", "A", Some(100.0), "airtime", 0),
        tx("T2", "A", Some(50.0), "airtime", 1),
        tx("T3", "A", Some(200.0), "utility_bill", 0),
        tx("T4", "B", Some(10.0), "airtime", 0),
    ];
    let dataset = RawDataset::new(rows).unwrap();
    let pipeline = FeaturePipeline::new(&unscaled_features()).unwrap();
    let (vectors, state) = pipeline.fit_transform(&dataset).unwrap();

    let a = &state.account_aggregates["A"];
    assert_eq!(a.total_amount, 350.0);
    assert!((a.average_amount.unwrap() - 116.666_666_666_666_67).abs() < 1e-9);
    assert_eq!(a.count, 3);

    for v in &vectors[..3] {
        assert_eq!(v.get(TOTAL_AMOUNT), Some(350.0));
        assert_eq!(v.get(TRANSACTION_COUNT), Some(3.0));
    }
    assert_eq!(vectors[3].get(TOTAL_AMOUNT), Some(10.0));

    let accounts: Vec<&str> = state.account_aggregates.keys().map(String::as_str).collect();
    assert_eq!(accounts, dataset.accounts().into_iter().collect::<Vec<_>>());
}

#[test]
fn missing_amount_is_imputed_with_mean() {
    let rows = vec![
        tx("T1", "A", Some(10.0), "airtime", 0),
        tx("T2", "B", None, "airtime", 1),
        tx("T3", "C", Some(30.0), "airtime", 0),
    ];
    let dataset = RawDataset::new(rows).unwrap();
    let pipeline = FeaturePipeline::new(&unscaled_features()).unwrap();
    let (vectors, _) = pipeline.fit_transform(&dataset).unwrap();
    assert_eq!(vectors[1].get(AMOUNT), Some(20.0));
    // account B has no usable amount: average falls back to the column mean
    assert_eq!(vectors[1].get(AVERAGE_AMOUNT), Some(20.0));
}

#[test]
fn unparsable_timestamp_is_imputed_with_mean() {
    let mut rows = vec![
        tx("T1", "A", Some(10.0), "airtime", 0),
        tx("T2", "B", Some(20.0), "airtime", 1),
        tx("T3", "C", Some(30.0), "airtime", 0),
    ];
    rows[0].transaction_start_time = "2018-11-15T02:00:00Z".to_string();
    rows[1].transaction_start_time = "2019-01-10T04:00:00Z".to_string();
    rows[2].transaction_start_time = "garbage".to_string();
    let dataset = RawDataset::new(rows).unwrap();
    let pipeline = FeaturePipeline::new(&unscaled_features()).unwrap();
    let (vectors, state) = pipeline.fit_transform(&dataset).unwrap();
    assert_eq!(vectors[2].get(HOUR), Some(3.0));
    assert_eq!(vectors[2].get(YEAR), Some(2018.5));

    let mut request = tx("T_new", "A", Some(15.0), "airtime", 0);
    request.transaction_start_time = "not a date".to_string();
    request.fraud_result = None;
    let v = pipeline.transform(&request, &state).unwrap();
    assert_eq!(v.get(HOUR), Some(3.0));
    assert_eq!(v.get(YEAR), Some(2018.5));
}

#[test]
fn vectors_share_one_column_order() {
    let dataset = training_set();
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let (vectors, state) = pipeline.fit_transform(&dataset).unwrap();
    assert_eq!(vectors.len(), dataset.len());
    assert_eq!(pipeline.feature_count(), 14);
    assert_eq!(state.feature_names(), pipeline.feature_names());
    for v in &vectors {
        assert_eq!(&*v.columns, pipeline.feature_names());
        assert!(v.values.iter().all(|x| x.is_finite()));
    }
}

#[test]
fn scaled_columns_stay_in_unit_interval() {
    let dataset = training_set();
    let config = FeaturesConfig::default();
    let pipeline = FeaturePipeline::new(&config).unwrap();
    let (vectors, state) = pipeline.fit_transform(&dataset).unwrap();
    for v in &vectors {
        for col in &config.scaled_columns {
            let x = v.get(col).unwrap();
            assert!((0.0..=1.0).contains(&x), "{col} = {x}");
        }
    }

    let mut outlier = tx("T_new", "AccountId_0", Some(1e9), "airtime", 0);
    outlier.fraud_result = None;
    let v = pipeline.transform(&outlier, &state).unwrap();
    assert_eq!(v.get(AMOUNT), Some(1.0));

    let mut negative = tx("T_neg", "AccountId_0", Some(-1e9), "airtime", 0);
    negative.fraud_result = None;
    let v = pipeline.transform(&negative, &state).unwrap();
    assert_eq!(v.get(AMOUNT), Some(0.0));
}

#[test]
fn apply_mode_reproduces_fit_mode_rows() {
    let dataset = training_set();
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let (fitted, state) = pipeline.fit_transform(&dataset).unwrap();
    let applied = pipeline.transform_batch(&dataset, &state).unwrap();
    assert_eq!(fitted, applied);

    let single = pipeline.transform(&dataset.rows()[5], &state).unwrap();
    assert_eq!(single, fitted[5]);
    assert_eq!(pipeline.transform(&dataset.rows()[5], &state).unwrap(), single);
}

#[test]
fn unseen_category_maps_to_unknown_code() {
    let dataset = training_set();
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let (_, state) = pipeline.fit_transform(&dataset).unwrap();

    let mut request = tx("T_new", "AccountId_new", Some(120.0), "movies", 0);
    request.provider_id = "ProviderId_999".to_string();
    request.fraud_result = None;
    let v = pipeline.transform(&request, &state).unwrap();

    let unknown = state.category_codes["ProviderId"].unknown_code;
    assert_eq!(v.get("ProviderId"), Some(f64::from(unknown)));
    // WoE column with an unseen value carries no evidence
    assert_eq!(v.get("ProductCategory"), Some(0.0));
    // unseen account aggregates over the record alone
    assert_eq!(state.account_aggregates.get("AccountId_new"), None);
}

#[test]
fn state_round_trips_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state/encoding_state.json");
    let dataset = training_set();
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let (_, state) = pipeline.fit_transform(&dataset).unwrap();

    EncodingStateStore::save(&state, &path).unwrap();
    let loaded = EncodingStateStore::load(&path, pipeline.schema_tag()).unwrap();
    assert_eq!(loaded, state);
    assert_eq!(
        pipeline.transform_batch(&dataset, &loaded).unwrap(),
        pipeline.transform_batch(&dataset, &state).unwrap()
    );
}

#[test]
fn state_from_other_layout_is_incompatible() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encoding_state.json");
    let dataset = training_set();
    let v1 = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let v2 = FeaturePipeline::new(&FeaturesConfig {
        woe_columns: vec!["ProductCategory".to_string()],
        ..FeaturesConfig::default()
    })
    .unwrap();
    assert_ne!(v1.schema_tag(), v2.schema_tag());

    let (_, state) = v1.fit_transform(&dataset).unwrap();
    EncodingStateStore::save(&state, &path).unwrap();
    let err = EncodingStateStore::load(&path, v2.schema_tag()).unwrap_err();
    assert!(matches!(err, PipelineError::IncompatibleState { .. }));
    assert_eq!(err.status(), 409);

    let err = v2.transform(&dataset.rows()[0], &state).unwrap_err();
    assert!(matches!(err, PipelineError::IncompatibleState { .. }));

    let missing = EncodingStateStore::load(&dir.path().join("none.json"), v1.schema_tag()).unwrap_err();
    assert!(matches!(missing, PipelineError::NotFound(_)));
}

#[test]
fn empty_dataset_cannot_be_fitted() {
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let err = pipeline.fit_transform(&RawDataset::new(Vec::new()).unwrap()).unwrap_err();
    assert!(matches!(err, PipelineError::EmptyDataset));
}

#[test]
fn unknown_configured_column_is_rejected() {
    let err = FeaturePipeline::new(&FeaturesConfig {
        scaled_columns: vec!["Balance".to_string()],
        ..FeaturesConfig::default()
    })
    .err()
    .unwrap();
    assert!(matches!(err, PipelineError::MissingColumn(c) if c == "Balance"));
}

#[test]
fn unsupported_target_column_is_rejected() {
    let err = FeaturePipeline::new(&FeaturesConfig {
        target_column: "IsDefault".to_string(),
        ..FeaturesConfig::default()
    })
    .err()
    .unwrap();
    assert!(matches!(err, PipelineError::MissingColumn(c) if c == "IsDefault"));
}

#[test]
fn train_and_score_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = training_set();
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();

    let mut artifacts = Vec::new();
    let mut state = None;
    for kind in [ModelKind::LogisticRegression, ModelKind::RandomForest] {
        let (outcome, s) = train_kind(&pipeline, &dataset, kind);
        let m = outcome.metrics;
        for x in [m.accuracy, m.precision, m.recall, m.f1, m.roc_auc] {
            assert!((0.0..=1.0).contains(&x));
        }
        assert!(m.roc_auc > 0.7, "{kind}: {m}");
        assert_eq!(outcome.report.total(), 12);
        assert_eq!(outcome.artifact.feature_names, pipeline.feature_names());
        assert_eq!(&outcome.artifact.schema_tag, pipeline.schema_tag());

        let path = dir.path().join(format!("{kind}.json"));
        outcome.artifact.save(&path).unwrap();
        artifacts.push(credit_risk::ModelArtifact::load(&path).unwrap());
        state = Some(s);
    }
    let state = state.unwrap();

    let engine = RiskEngine::new(Default::default());
    let mut request = tx("T_req", "AccountId_3", Some(5400.0), "financial_services", 0);
    request.channel_id = "ChannelId_1".to_string();
    request.fraud_result = None;
    for artifact in &artifacts {
        let r = serving::score(&pipeline, &request, &state, artifact, &engine).unwrap();
        assert!((0.0..=1.0).contains(&r.score));
        assert_eq!(r.label, u8::from(r.score >= 0.5));
        assert_eq!(r.risk_level, RiskLevel::from_score(r.score, engine.config()));
    }

    let service = ScoringService::new(
        FeaturePipeline::new(&FeaturesConfig::default()).unwrap(),
        Default::default(),
        ServingBundle::new(state, artifacts).unwrap(),
    );
    let response = service.score_all(&request).unwrap();
    assert_eq!(response.transaction_id, "T_req");
    assert_eq!(
        response.scores.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["logistic_regression", "random_forest"]
    );
}

#[test]
fn mismatched_model_and_state_are_rejected() {
    let dataset = training_set();
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let (outcome, state) = train_kind(&pipeline, &dataset, ModelKind::LogisticRegression);

    let mut stale = outcome.artifact.clone();
    stale.schema_tag = SchemaTag::new("v0:0000000000000000");
    let engine = RiskEngine::new(Default::default());
    let err = serving::score(&pipeline, &dataset.rows()[0], &state, &stale, &engine).unwrap_err();
    assert!(matches!(err, PipelineError::ModelStateMismatch { .. }));
    assert_eq!(err.status(), 409);
    assert!(ServingBundle::new(state.clone(), vec![stale]).is_err());

    let mut vector = pipeline.transform(&dataset.rows()[0], &state).unwrap();
    let mut columns = vector.columns.to_vec();
    columns.swap(0, 1);
    vector.columns = columns.into();
    let err = outcome.artifact.predict_proba(&vector).unwrap_err();
    assert!(matches!(err, PipelineError::FeatureLayout { .. }));
    assert_eq!(err.status(), 400);
}

#[test]
fn service_swaps_bundles_under_concurrent_scoring() {
    let dataset = training_set();
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let (lr, state) = train_kind(&pipeline, &dataset, ModelKind::LogisticRegression);
    let (rf, _) = train_kind(&pipeline, &dataset, ModelKind::RandomForest);

    let service = ScoringService::new(
        FeaturePipeline::new(&FeaturesConfig::default()).unwrap(),
        Default::default(),
        ServingBundle::new(state.clone(), vec![lr.artifact.clone()]).unwrap(),
    );

    std::thread::scope(|scope| {
        for t in 0..4 {
            let service = &service;
            let rows = dataset.rows();
            scope.spawn(move || {
                for row in rows.iter().skip(t).step_by(4) {
                    let response = service.score_all(row).unwrap();
                    assert!(!response.scores.is_empty());
                }
            });
        }
        let previous = service
            .swap(ServingBundle::new(state.clone(), vec![lr.artifact.clone(), rf.artifact.clone()]).unwrap())
            .unwrap();
        assert_eq!(previous.models().len(), 1);
    });

    assert_eq!(service.snapshot().models().len(), 2);
    assert!(service.snapshot().model("random_forest").is_some());
}

#[test]
fn handle_line_always_answers_with_json() {
    let dataset = training_set();
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let (lr, state) = train_kind(&pipeline, &dataset, ModelKind::LogisticRegression);
    let service = ScoringService::new(
        FeaturePipeline::new(&FeaturesConfig::default()).unwrap(),
        Default::default(),
        ServingBundle::new(state, vec![lr.artifact]).unwrap(),
    );

    let bad: ErrorResponse = serde_json::from_str(&service.handle_line("{\"transaction_id\": 3")).unwrap();
    assert_eq!(bad.status, 400);

    let mut request = dataset.rows()[1].clone();
    request.fraud_result = None;
    let line = serde_json::to_string(&request).unwrap();
    let ok: serde_json::Value = serde_json::from_str(&service.handle_line(&line)).unwrap();
    assert_eq!(ok["transaction_id"], "TransactionId_1");
    assert!(ok["scores"]["logistic_regression"]["score"].is_f64());
}

#[test]
fn request_without_amount_key_is_rejected() {
    let dataset = training_set();
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let (lr, state) = train_kind(&pipeline, &dataset, ModelKind::LogisticRegression);
    let service = ScoringService::new(
        FeaturePipeline::new(&FeaturesConfig::default()).unwrap(),
        Default::default(),
        ServingBundle::new(state, vec![lr.artifact]).unwrap(),
    );

    let mut request = dataset.rows()[1].clone();
    request.fraud_result = None;
    let mut body = serde_json::to_value(&request).unwrap();
    body.as_object_mut().unwrap().remove("amount");
    assert!(serde_json::from_value::<RawTransaction>(body.clone()).is_err());

    let rejected: ErrorResponse = serde_json::from_str(&service.handle_line(&body.to_string())).unwrap();
    assert_eq!(rejected.status, 400);

    // an explicit null is a missing amount and is imputed
    body["amount"] = serde_json::Value::Null;
    let parsed: RawTransaction = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(parsed.amount, None);
    let ok: serde_json::Value = serde_json::from_str(&service.handle_line(&body.to_string())).unwrap();
    assert!(ok["scores"]["logistic_regression"]["score"].is_f64());
}

#[test]
fn run_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = RunStore::open(&dir.path().join("runs.db")).unwrap();
    let dataset = training_set();
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let (outcome, _) = train_kind(&pipeline, &dataset, ModelKind::RandomForest);

    let run = RunRecord::from_outcome(&outcome);
    store.insert_run(&run).unwrap();
    assert_eq!(store.get_run(&run.run_id).unwrap(), Some(run.clone()));
    assert_eq!(store.list_runs(10).unwrap().len(), 1);
    assert_eq!(store.best_run(ModelKind::RandomForest).unwrap().map(|r| r.run_id), Some(run.run_id));
    assert!(store.best_run(ModelKind::LogisticRegression).unwrap().is_none());
    assert_eq!(store.prune_before(run.trained_at + chrono::Duration::seconds(1)).unwrap(), 1);
    assert!(store.list_runs(10).unwrap().is_empty());
}
