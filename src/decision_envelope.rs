// =============================================================================
// Decision Envelope — auditable record of every scan decision
// =============================================================================
//
// Each tick produces one envelope per instrument when it is skipped, and one
// per direction slot when it is evaluated. The status API exposes the most
// recent envelopes so an operator can see why a zone did or did not fire.
// =============================================================================

use serde::Serialize;

use crate::strategy::{ScanReport, ScanVerdict, SlotOutcome};

/// Complete auditable record of a scan decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionEnvelope {
    /// Unique identifier for this decision (UUID v4).
    pub id: String,

    pub symbol: String,

    /// "Bullish" / "Bearish", absent when the whole instrument was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,

    /// Trend read on this tick.
    pub trend: String,

    /// Final decision: "FIRED", "PENDING", "IDLE", "SKIP".
    pub final_decision: String,

    /// Human-readable reason for the decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// ISO 8601 timestamp of when this decision was created.
    pub created_at: String,
}

impl DecisionEnvelope {
    fn new(
        symbol: impl Into<String>,
        direction: Option<String>,
        trend: impl Into<String>,
        final_decision: &str,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            direction,
            trend: trend.into(),
            final_decision: final_decision.to_string(),
            reason,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Flatten a scan report into envelopes.
    pub fn from_report(report: &ScanReport) -> Vec<Self> {
        let trend = report.trend.to_string();
        match &report.verdict {
            ScanVerdict::InsufficientData {
                required,
                available,
            } => vec![Self::new(
                &report.instrument,
                None,
                trend,
                "SKIP",
                Some(format!("Insufficient candles: {available} < {required}")),
            )],
            ScanVerdict::Sideways => vec![Self::new(
                &report.instrument,
                None,
                trend,
                "SKIP",
                Some("Sideways trend".to_string()),
            )],
            ScanVerdict::Evaluated { slots } => slots
                .iter()
                .map(|slot| {
                    let (decision, reason) = match &slot.outcome {
                        SlotOutcome::Idle => ("IDLE", None),
                        SlotOutcome::AwaitingTap {
                            zone_low,
                            zone_high,
                        } => (
                            "PENDING",
                            Some(format!("Awaiting tap of [{zone_low}, {zone_high}]")),
                        ),
                        SlotOutcome::ConfluenceFailed { bos, fvg, trend } => (
                            "PENDING",
                            Some(format!(
                                "Tapped without confluence | BOS {bos} | FVG {fvg} | Trend {trend}"
                            )),
                        ),
                        SlotOutcome::LevelsOverflow { entry, stop_loss } => (
                            "PENDING",
                            Some(format!(
                                "Take-profit out of range | Entry {entry} | SL {stop_loss}"
                            )),
                        ),
                        SlotOutcome::Fired(signal) => (
                            "FIRED",
                            Some(format!(
                                "Entry {} | SL {} | TP {}",
                                signal.entry, signal.stop_loss, signal.take_profit
                            )),
                        ),
                    };
                    Self::new(
                        &report.instrument,
                        Some(slot.direction.to_string()),
                        trend.clone(),
                        decision,
                        reason,
                    )
                })
                .collect(),
        }
    }
}
