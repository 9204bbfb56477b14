//! Policy evaluator
//!
//! Turns an LPR event plus vehicle attributes into an admission verdict. The
//! evaluator is a pure function over its configured context: no I/O, no
//! mutation, identical inputs always produce identical verdicts.
//!
//! Check order, strictly:
//!
//! 1. Blacklist - dominates everything, including whitelist membership.
//! 2. Confidence threshold - a low-confidence read is not a hard rejection;
//!    it asks the lane to solicit manual plate entry. Manual reads skip this.
//! 3. Regulatory rules - evaluated in configuration order, first match wins.
//!
//! Whitelist membership never changes the admit/reject outcome; it only marks
//! the verdict for billing (pass holders pay no per-use fee) and the UI badge.

use std::collections::HashMap;

use crate::config::PolicyConfig;
use crate::types::event::{LprEvent, LprSource};
use crate::types::policy::{
    BlacklistEntry, PolicyVerdict, RegulatoryRule, VehicleAttributes, VerdictReason,
    WhitelistEntry,
};
use crate::types::session::Plate;

/// Admission policy evaluator for one site
///
/// Built once from `PolicyConfig`; cheap to share across lanes behind an
/// `Arc`. All lookups are by normalized plate.
#[derive(Debug)]
pub struct PolicyEvaluator {
    confidence_threshold: f64,
    blacklist: HashMap<Plate, BlacklistEntry>,
    whitelist: HashMap<Plate, WhitelistEntry>,
    rules: Vec<RegulatoryRule>,
}

impl PolicyEvaluator {
    /// Build an evaluator from configuration
    pub fn new(config: &PolicyConfig) -> Self {
        let blacklist = config
            .blacklist
            .iter()
            .map(|entry| (entry.plate.clone(), entry.clone()))
            .collect();
        let whitelist = config
            .whitelist
            .iter()
            .map(|entry| (entry.plate.clone(), entry.clone()))
            .collect();

        PolicyEvaluator {
            confidence_threshold: config.confidence_threshold,
            blacklist,
            whitelist,
            rules: config.regulatory_rules.clone(),
        }
    }

    /// Evaluate one LPR event against the configured policy
    ///
    /// Never fails: an unreadable plate degrades to a manual-review verdict
    /// rather than an error, so the lane can fall back to operator input.
    pub fn evaluate(&self, event: &LprEvent, attrs: &VehicleAttributes) -> PolicyVerdict {
        let plate = match Plate::parse(&event.plate) {
            Ok(plate) => plate,
            Err(_) => {
                return PolicyVerdict::manual_review(
                    VerdictReason::ConfidenceTooLow,
                    format!("Plate '{}' is unreadable; manual entry required", event.plate),
                );
            }
        };

        // Blacklist dominates everything, whitelist included.
        if let Some(entry) = self.blacklist.get(&plate) {
            return PolicyVerdict::reject(
                VerdictReason::Blacklisted,
                format!("Plate {} is blacklisted: {}", plate, entry.reason),
            );
        }

        // Manual reads are operator-attested; the threshold applies to camera
        // reads only.
        if event.source == LprSource::Camera && event.confidence < self.confidence_threshold {
            return PolicyVerdict::manual_review(
                VerdictReason::ConfidenceTooLow,
                format!(
                    "Confidence {:.2} below threshold {:.2} for plate {}",
                    event.confidence, self.confidence_threshold, plate
                ),
            );
        }

        // First matching rule wins; order is configuration order.
        for rule in &self.rules {
            if rule.matches(attrs) {
                return PolicyVerdict::reject(
                    VerdictReason::RegulatoryViolation,
                    rule.description.clone(),
                );
            }
        }

        let whitelisted = self.is_whitelisted(&plate, event);
        PolicyVerdict::admit(format!("Plate {} admitted", plate), whitelisted)
    }

    /// Whether the plate holds an unexpired pass at the event's capture date
    pub fn is_whitelisted(&self, plate: &Plate, event: &LprEvent) -> bool {
        self.whitelist
            .get(plate)
            .map(|entry| entry.expires_on >= event.captured_at.date_naive())
            .unwrap_or(false)
    }

}
