//! Text printed on stdout for a finished resolution.

use std::fmt::Write;
use std::time::Duration;

use crate::resolver::{Resolution, ResolutionOutcome};

/// Everything but the timing line.
pub fn render(resolution: &Resolution) -> String {
    let mut out = String::new();
    match &resolution.outcome {
        ResolutionOutcome::Answer(_) => {
            if let Some(response) = &resolution.response {
                for question in &response.packet.questions {
                    let _ = writeln!(out, "[[qury]] {}", question);
                }
                for rr in resolution.aliases.iter().flat_map(|set| set.records()) {
                    let _ = writeln!(out, "[[ansr]] {}", rr);
                }
                for rr in &response.packet.answers {
                    let _ = writeln!(out, "[[ansr]] {}", rr);
                }
                let _ = writeln!(out, "MSG SIZE rcvd: {}", response.size);
            }
        }
        ResolutionOutcome::NoDnssec => out.push_str("DNSSEC not supported\n"),
        ResolutionOutcome::VerifyFail(_) => out.push_str("DNSSec Verification failed\n"),
        ResolutionOutcome::NoAnswer => out.push_str("No answer\n"),
        ResolutionOutcome::UnknownError => out.push_str("Resolution failed\n"),
    }
    out
}

pub fn query_time_line(elapsed: Duration) -> String {
    format!("Query time: {} ms", elapsed.as_millis())
}
