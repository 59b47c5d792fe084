//! Prometheus metrics
//!
//! Exposed in text format on `GET /metrics`.

use crate::error::ControllerError;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    /// Allocations by outcome (`allocated`, `no_space`, `rejected`, `failed`)
    pub allocations_total: IntCounterVec,
    /// Admission decisions by webhook and decision
    pub admission_decisions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let allocations_total = IntCounterVec::new(
            Opts::new("ipam_allocations_total", "Range allocations by outcome"),
            &["outcome"],
        )?;
        let admission_decisions_total = IntCounterVec::new(
            Opts::new(
                "ipam_admission_decisions_total",
                "Admission review decisions by webhook and decision",
            ),
            &["webhook", "decision"],
        )?;

        registry.register(Box::new(allocations_total.clone()))?;
        registry.register(Box::new(admission_decisions_total.clone()))?;

        Ok(Self {
            registry,
            allocations_total,
            admission_decisions_total,
        })
    }

    /// Count one allocation attempt
    pub fn record_allocation<T>(&self, result: &Result<T, ipam_core::IpamError>) {
        let outcome = match result {
            Ok(_) => "allocated",
            Err(ipam_core::IpamError::NoSpaceAvailable { .. }) => "no_space",
            Err(err) if err.is_bad_request() => "rejected",
            Err(_) => "failed",
        };
        self.allocations_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_admission(&self, webhook: &str, allowed: bool) {
        let decision = if allowed { "allowed" } else { "denied" };
        self.admission_decisions_total
            .with_label_values(&[webhook, decision])
            .inc();
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, ControllerError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        let text = String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipam_core::IpamError;

    #[test]
    fn test_allocation_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_allocation::<()>(&Ok(()));
        metrics.record_allocation::<()>(&Ok(()));
        metrics.record_allocation::<()>(&Err(IpamError::InvalidInput("no parent".to_string())));
        metrics.record_allocation::<()>(&Err(IpamError::Repository("down".to_string())));

        let counter = |outcome: &str| {
            metrics
                .allocations_total
                .with_label_values(&[outcome])
                .get()
        };
        assert_eq!(counter("allocated"), 2);
        assert_eq!(counter("rejected"), 1);
        assert_eq!(counter("failed"), 1);
        assert_eq!(counter("no_space"), 0);
    }

    #[test]
    fn test_encode_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_admission("mutating", true);
        metrics.record_admission("validating", false);

        let text = metrics.encode().unwrap();
        assert!(text.contains("ipam_admission_decisions_total"));
        assert!(text.contains(r#"decision="denied""#));
        assert!(text.contains(r#"webhook="mutating""#));
    }
}
