//! Commission policy: resolves the platform's cut for a vendor at payment
//! creation time. The resolved percentage is stored immutably on the
//! Payment and every later adjustment reuses the stored value.

use crate::config::{Config, DEFAULT_COMMISSION_PERCENT};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-vendor commission configuration.
///
/// Precedence: vendor override > default. Percentages are the platform's
/// share; the vendor keeps the remainder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionPolicy {
    pub default_percent: f64,
    pub vendor_percent: HashMap<String, f64>,
}

impl CommissionPolicy {
    pub fn new(default_percent: f64) -> Result<Self> {
        check_percent(default_percent)?;
        Ok(CommissionPolicy {
            default_percent,
            vendor_percent: HashMap::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut policy = CommissionPolicy::new(config.default_commission_percent)?;
        for (vendor, percent) in &config.vendor_commission_percent {
            policy.set_vendor_percent(vendor.clone(), *percent)?;
        }
        Ok(policy)
    }

    pub fn set_vendor_percent(&mut self, vendor_id: String, percent: f64) -> Result<()> {
        check_percent(percent)?;
        self.vendor_percent.insert(vendor_id, percent);
        Ok(())
    }

    /// Platform commission for a vendor, in percent.
    pub fn resolve(&self, vendor_id: &str) -> f64 {
        self.vendor_percent
            .get(vendor_id)
            .copied()
            .unwrap_or(self.default_percent)
    }
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        CommissionPolicy {
            default_percent: DEFAULT_COMMISSION_PERCENT,
            vendor_percent: HashMap::new(),
        }
    }
}

fn check_percent(percent: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&percent) || !percent.is_finite() {
        return Err(Error::InvalidOperation(format!(
            "Commission percent out of range: {}",
            percent
        )));
    }
    Ok(())
}
