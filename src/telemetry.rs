// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional run tracing to a LangSmith-compatible endpoint.
//!
//! Each `ask` is posted as one `chain` run. Tracing never fails the caller:
//! errors are logged and dropped.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::config::TracingSettings;

const TRACE_TIMEOUT_SECS: u64 = 10;

/// One completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub name: String,
    pub run_type: &'static str,
    pub inputs: Value,
    pub outputs: Value,
    pub start_time: String,
    pub end_time: String,
    pub session_name: String,
}

/// Posts runs when tracing is enabled; a no-op otherwise.
pub struct RunTracer {
    target: Option<TraceTarget>,
}

struct TraceTarget {
    client: Client,
    runs_url: String,
    api_key: String,
    project: String,
}

impl RunTracer {
    pub fn disabled() -> Self {
        Self { target: None }
    }

    pub fn from_settings(settings: &TracingSettings) -> Self {
        let api_key = match &settings.api_key {
            Some(key) if settings.is_active() => key.clone(),
            _ => return Self::disabled(),
        };
        let client = match Client::builder()
            .timeout(Duration::from_secs(TRACE_TIMEOUT_SECS))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "run tracing disabled: failed to build HTTP client");
                return Self::disabled();
            }
        };
        Self {
            target: Some(TraceTarget {
                client,
                runs_url: format!("{}/runs", settings.endpoint.trim_end_matches('/')),
                api_key,
                project: settings.project.clone(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Records a finished run. Failures are logged, never returned.
    pub fn record(
        &self,
        name: &str,
        inputs: Value,
        outputs: Value,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
    ) {
        let Some(target) = &self.target else {
            return;
        };
        let run = RunRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            run_type: "chain",
            inputs,
            outputs,
            start_time: started.to_rfc3339(),
            end_time: finished.to_rfc3339(),
            session_name: target.project.clone(),
        };
        if let Err(e) = target.post(&run) {
            tracing::warn!(error = %e, run = %run.id, "failed to record trace run");
        }
    }
}

impl TraceTarget {
    fn post(&self, run: &RunRecord) -> Result<()> {
        let resp = self
            .client
            .post(&self.runs_url)
            .header("x-api-key", &self.api_key)
            .json(run)
            .send()
            .context("failed to reach tracing endpoint")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("tracing endpoint returned {}: {}", status, text);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn settings(endpoint: &str, enabled: bool, key: Option<&str>) -> TracingSettings {
        TracingSettings {
            enabled,
            api_key: key.map(str::to_string),
            endpoint: endpoint.to_string(),
            project: "rag-test".to_string(),
        }
    }

    #[test]
    fn disabled_without_flag_or_key() {
        assert!(!RunTracer::from_settings(&settings("http://x", false, Some("k"))).is_enabled());
        assert!(!RunTracer::from_settings(&settings("http://x", true, None)).is_enabled());
        assert!(RunTracer::from_settings(&settings("http://x", true, Some("k"))).is_enabled());
    }

    #[test]
    fn record_posts_chain_run() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/runs")
                .header("x-api-key", "ls-key")
                .header("content-type", "application/json");
            then.status(200).json_body(json!({}));
        });

        let tracer = RunTracer::from_settings(&settings(&server.base_url(), true, Some("ls-key")));
        let now = Utc::now();
        tracer.record(
            "docqa.ask",
            json!({"query": "q"}),
            json!({"answer": "a"}),
            now,
            now,
        );

        mock.assert();
    }

    #[test]
    fn run_record_shape() {
        let started = Utc::now();
        let run = RunRecord {
            id: Uuid::new_v4(),
            name: "docqa.ask".to_string(),
            run_type: "chain",
            inputs: json!({"query": "q"}),
            outputs: json!({"answer": "a"}),
            start_time: started.to_rfc3339(),
            end_time: started.to_rfc3339(),
            session_name: "rag-test".to_string(),
        };
        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(value["run_type"], "chain");
        assert_eq!(value["session_name"], "rag-test");
        assert_eq!(value["inputs"]["query"], "q");
        assert_eq!(value["id"].as_str().unwrap().len(), 36);
        assert!(DateTime::parse_from_rfc3339(value["start_time"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn endpoint_errors_are_swallowed() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/runs");
            then.status(500).body("boom");
        });

        let tracer = RunTracer::from_settings(&settings(&server.base_url(), true, Some("k")));
        let now = Utc::now();
        tracer.record("docqa.ask", json!({}), json!({}), now, now);

        mock.assert();
    }

    #[test]
    fn disabled_tracer_sends_nothing() {
        let tracer = RunTracer::disabled();
        let now = Utc::now();
        tracer.record("docqa.ask", json!({}), json!({}), now, now);
        assert!(!tracer.is_enabled());
    }
}
