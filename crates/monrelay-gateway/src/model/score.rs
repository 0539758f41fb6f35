use async_trait::async_trait;
use serde_json::{json, Value};

use monrelay_core::error::{RelayError, Result};
use monrelay_core::model::{ModelResponse, RequestContext};
use monrelay_core::protocol::ExtractedPayload;

use crate::model::MonitorModel;

/// Built-in reference model: accuracy for classification, MAE/RMSE for
/// regression. Lets the server run without an external scorer.
#[derive(Default)]
pub struct ScoreModel;

impl ScoreModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MonitorModel for ScoreModel {
    fn name(&self) -> &str {
        "score"
    }

    async fn process(&self, payload: ExtractedPayload, ctx: RequestContext) -> Result<ModelResponse> {
        let n = payload.predicted.len();
        let task = ctx.task_type.to_ascii_lowercase();

        let (data, gauges) = match task.as_str() {
            "classification" | "binary_classification" | "multiclass_classification" => {
                let accuracy = ratio(
                    payload
                        .predicted
                        .iter()
                        .zip(&payload.actual)
                        .filter(|(p, a)| (*p - *a).abs() < f64::EPSILON)
                        .count(),
                    n,
                );
                (
                    json!({ "task_type": task, "count": n, "accuracy": accuracy }),
                    vec![("model_accuracy", accuracy)],
                )
            }
            "regression" => {
                let errors: Vec<f64> = payload
                    .predicted
                    .iter()
                    .zip(&payload.actual)
                    .map(|(p, a)| p - a)
                    .collect();
                let mae = mean(errors.iter().map(|e| e.abs()), n);
                let rmse = mean(errors.iter().map(|e| e * e), n).map(f64::sqrt);
                (
                    json!({ "task_type": task, "count": n, "mae": mae, "rmse": rmse }),
                    vec![("model_mae", mae), ("model_rmse", rmse)],
                )
            }
            other => {
                return Err(RelayError::Model(format!("unsupported task type: {other}")));
            }
        };

        let mut metrics: Vec<Value> = gauges
            .into_iter()
            .filter_map(|(key, v)| v.map(|v| (key, v)))
            .map(|(key, v)| json!({ "key": key, "type": "GAUGE", "value": v, "tags": { "task_type": task } }))
            .collect();
        metrics.push(json!({ "key": "model_samples_total", "type": "COUNTER", "value": n, "tags": { "task_type": task } }));

        Ok(ModelResponse::with_data(data).metrics(Value::Array(metrics)))
    }
}

fn ratio(hits: usize, n: usize) -> Option<f64> {
    (n > 0).then(|| hits as f64 / n as f64)
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> Option<f64> {
    (n > 0).then(|| values.sum::<f64>() / n as f64)
}
