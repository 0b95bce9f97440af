//! Inference benchmark: raw transaction → per-model score.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use credit_risk::config::{FeaturesConfig, RiskConfig, TrainingConfig};
use credit_risk::data::{RawDataset, RawTransaction};
use credit_risk::features::FeaturePipeline;
use credit_risk::model::{ForestParams, Hyperparams, LogisticParams, ModelKind};
use credit_risk::serving::{ScoringService, ServingBundle};
use credit_risk::training::Trainer;

fn make_transactions(n: usize) -> Vec<RawTransaction> {
    (0..n)
        .map(|i| {
            let fraud = u8::from(i % 5 == 0);
            RawTransaction {
                transaction_id: format!("TransactionId_{i}"),
                customer_id: format!("CustomerId_{}", i % 30),
                account_id: format!("AccountId_{}", i % 25),
                amount: Some(if fraud == 1 { 8000.0 + i as f64 } else { 150.0 + (i % 11) as f64 * 20.0 }),
                currency_code: "UGX".to_string(),
                country_code: "256".to_string(),
                provider_id: format!("ProviderId_{}", i % 4),
                product_category: if fraud == 1 { "financial_services" } else { "airtime" }.to_string(),
                channel_id: format!("ChannelId_{}", 1 + i % 3),
                fraud_result: Some(fraud),
                transaction_start_time: format!("2019-02-{:02}T{:02}:05:00Z", 1 + i % 28, i % 24),
            }
        })
        .collect()
}

fn service() -> (ScoringService, RawTransaction) {
    let pipeline = FeaturePipeline::new(&FeaturesConfig::default()).unwrap();
    let dataset = RawDataset::new(make_transactions(200)).unwrap();
    let (vectors, state) = pipeline.fit_transform(&dataset).unwrap();
    let labels = dataset.labels().unwrap();
    let trainer = Trainer::new(TrainingConfig::default(), state.schema_tag.clone(), 0.5);

    let lr = trainer
        .train(&vectors, &labels, ModelKind::LogisticRegression, &[Hyperparams::Logistic(LogisticParams::default())])
        .unwrap();
    let rf = trainer
        .train(
            &vectors,
            &labels,
            ModelKind::RandomForest,
            &[Hyperparams::Forest(ForestParams {
                n_estimators: 50,
                ..ForestParams::default()
            })],
        )
        .unwrap();

    let mut request = dataset.rows()[3].clone();
    request.fraud_result = None;
    let bundle = ServingBundle::new(state, vec![lr.artifact, rf.artifact]).unwrap();
    (ScoringService::new(pipeline, RiskConfig::default(), bundle), request)
}

fn bench_score_all(c: &mut Criterion) {
    let (service, request) = service();
    c.bench_function("score_all_two_models", |b| {
        b.iter(|| black_box(service.score_all(black_box(&request)).unwrap()))
    });
}

fn bench_handle_line(c: &mut Criterion) {
    let (service, request) = service();
    let line = serde_json::to_string(&request).unwrap();
    c.bench_function("handle_json_request", |b| b.iter(|| black_box(service.handle_line(black_box(&line)))));
}

criterion_group!(benches, bench_score_all, bench_handle_line);
criterion_main!(benches);
