//! CIP Safety trace analyzer
//!
//! Runs a captured trace through the analyzer several times and checks that
//! replay passes reproduce the first pass.

mod report;
mod trace;

use cipsafety_core::{AnalyzerEvent, SafetyAnalyzer};
use report::{MessageReport, PassSummary, Report};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use trace::Trace;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cipsafety_analyzer=debug,cipsafety_core=info,info".into()),
        )
        .init();

    tracing::info!("Starting CIP Safety analyzer");

    // Trace path from the command line or env
    let trace_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CIPSAFETY_TRACE").ok())
        .ok_or_else(|| anyhow::anyhow!("No trace file given (argument or CIPSAFETY_TRACE)"))?;
    let data_dir = std::env::var("CIPSAFETY_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let passes = std::env::var("CIPSAFETY_PASSES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(2)
        .max(1);

    let analyzer = SafetyAnalyzer::with_data_dir(&data_dir).await;
    let event_log = tokio::spawn(log_events(analyzer.subscribe()));

    let trace = Trace::load(&PathBuf::from(&trace_path)).await?;

    let added = trace.connections.len() + trace.forward_opens.len();
    for connection in trace.connections {
        analyzer.register(connection);
    }
    for open in &trace.forward_opens {
        if let Err(e) = analyzer.register_from_segment(
            open.id.clone(),
            open.triad,
            open.producer_direction,
            open.multicast,
            &open.segment,
        ) {
            tracing::warn!("Skipping forward open {}: {}", open.id, e);
        }
    }
    if added > 0 {
        if let Err(e) = analyzer.save().await {
            tracing::warn!("Failed to save connections: {}", e);
        }
    }

    let mut summaries = Vec::with_capacity(passes);
    let mut first_pass: Option<Vec<MessageReport>> = None;
    let mut replay_consistent = true;

    for pass in 1..=passes {
        let reports: Vec<MessageReport> = trace
            .messages
            .iter()
            .map(|m| {
                let result = analyzer.analyze(m.frame, &m.connection, m.direction, &m.payload);
                MessageReport::new(m, &result)
            })
            .collect();

        let summary = PassSummary::new(pass, &reports);
        tracing::info!(
            "Pass {}: {} decoded, {} intact, {} with anomalies, {} failed",
            pass,
            summary.decoded,
            summary.intact,
            summary.with_anomalies,
            summary.failed
        );
        summaries.push(summary);

        match &first_pass {
            None => first_pass = Some(reports),
            Some(first) => {
                if !report::replay_matches(first, &reports) {
                    tracing::warn!("Pass {} diverged from the first pass", pass);
                    replay_consistent = false;
                }
            }
        }
    }

    let report = Report {
        connections: analyzer.registry().len(),
        passes: summaries,
        replay_consistent,
        messages: first_pass.unwrap_or_default(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    // Dropping the analyzer closes the event channel
    drop(analyzer);
    let events = event_log.await?;
    tracing::debug!("Handled {} analyzer events", events);

    if !replay_consistent {
        anyhow::bail!("Replay passes did not reproduce the first pass");
    }
    Ok(())
}

/// Log analyzer events until the channel closes, returning how many were seen
async fn log_events(mut rx: tokio::sync::broadcast::Receiver<AnalyzerEvent>) -> usize {
    let mut count = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                count += 1;
                match event {
                    AnalyzerEvent::ConnectionRegistered { id } => {
                        tracing::debug!("Connection {} registered", id);
                    }
                    AnalyzerEvent::Malformed {
                        message,
                        connection,
                        reason,
                    } => {
                        tracing::debug!(
                            "Malformed message {} on {}: {}",
                            message,
                            connection,
                            reason
                        );
                    }
                    AnalyzerEvent::Anomalies { .. } | AnalyzerEvent::MessageDecoded { .. } => {}
                }
            }
            Err(RecvError::Lagged(n)) => {
                tracing::debug!("Event log lagged by {} events", n);
            }
            Err(RecvError::Closed) => break,
        }
    }
    count
}
