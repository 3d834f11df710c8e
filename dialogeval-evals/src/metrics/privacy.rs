// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Privacy residual metric
//!
//! Seeds are PII-free by construction, so any personal identifier in a
//! generated dialogue is a leak. A fixed battery of patterns is run over the
//! concatenated turn text; any match makes the dialogue unusable.
//!
//! Only the zero / non-zero distinction gates the composite score. The
//! magnitude (`0.1` per match, capped at `1.0`) is diagnostic.

use crate::{EvalError, Metric, MetricKind};
use dialogeval_core::{Dialogue, Seed};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Score contributed by each match
const PER_MATCH_PENALTY: f64 = 0.1;

/// Category of personal identifier a pattern detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiPattern {
    Email,
    InternationalPhone,
    LocalPhone,
    Ssn,
    /// Brazilian individual taxpayer id (CPF), `000.000.000-00`
    Cpf,
    /// Brazilian company registry id (CNPJ), `00.000.000/0000-00`
    Cnpj,
    CreditCard,
    Ipv4,
    Iban,
}

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());
static INTL_PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+\d{1,3}[\s.-]?\(?\d{1,4}\)?(?:[\s.-]?\d{2,5}){2,4}").unwrap()
});
static LOCAL_PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\(\d{2,3}\)\s?|\b\d{3}[\s.-])\d{3,5}[\s.-]\d{4}\b").unwrap());
static SSN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
static CPF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b").unwrap());
static CNPJ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}\b").unwrap());
static CC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{1,7}\b").unwrap());
static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b")
        .unwrap()
});
static IBAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2}\d{2}(?:\s?[A-Z0-9]{4}){2,7}(?:\s?[A-Z0-9]{1,4})?\b").unwrap());

impl PiiPattern {
    pub const ALL: [PiiPattern; 9] = [
        PiiPattern::Email,
        PiiPattern::InternationalPhone,
        PiiPattern::LocalPhone,
        PiiPattern::Ssn,
        PiiPattern::Cpf,
        PiiPattern::Cnpj,
        PiiPattern::CreditCard,
        PiiPattern::Ipv4,
        PiiPattern::Iban,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PiiPattern::Email => "email",
            PiiPattern::InternationalPhone => "phone_international",
            PiiPattern::LocalPhone => "phone_local",
            PiiPattern::Ssn => "ssn",
            PiiPattern::Cpf => "cpf",
            PiiPattern::Cnpj => "cnpj",
            PiiPattern::CreditCard => "credit_card",
            PiiPattern::Ipv4 => "ipv4",
            PiiPattern::Iban => "iban",
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            PiiPattern::Email => &*EMAIL_RE,
            PiiPattern::InternationalPhone => &*INTL_PHONE_RE,
            PiiPattern::LocalPhone => &*LOCAL_PHONE_RE,
            PiiPattern::Ssn => &*SSN_RE,
            PiiPattern::Cpf => &*CPF_RE,
            PiiPattern::Cnpj => &*CNPJ_RE,
            PiiPattern::CreditCard => &*CC_RE,
            PiiPattern::Ipv4 => &*IPV4_RE,
            PiiPattern::Iban => &*IBAN_RE,
        }
    }

    /// Number of non-overlapping matches in `text`
    pub fn count(&self, text: &str) -> usize {
        self.regex().find_iter(text).count()
    }
}

/// Residual personal data in the dialogue text
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivacyResidualMetric;

impl PrivacyResidualMetric {
    pub fn new() -> Self {
        Self
    }

    /// Matches per pattern, omitting patterns with none
    pub fn scan(&self, text: &str) -> Vec<(PiiPattern, usize)> {
        PiiPattern::ALL
            .iter()
            .map(|p| (*p, p.count(text)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    /// 0.0 for clean text, otherwise `min(1.0, 0.1 × matches)`
    pub fn score_text(&self, text: &str) -> f64 {
        let matches: usize = self.scan(text).iter().map(|(_, n)| n).sum();
        if matches == 0 {
            0.0
        } else {
            (PER_MATCH_PENALTY * matches as f64).min(1.0)
        }
    }
}

impl Metric for PrivacyResidualMetric {
    fn kind(&self) -> MetricKind {
        MetricKind::PrivacyResidual
    }

    fn compute(&self, dialogue: &Dialogue, _seed: &Seed) -> Result<f64, EvalError> {
        let text = dialogue.full_text();
        let hits = self.scan(&text);
        if hits.is_empty() {
            debug!(dialogue_id = %dialogue.id, "no residual pii");
            return Ok(0.0);
        }

        let matches: usize = hits.iter().map(|(_, n)| n).sum();
        let categories: Vec<&str> = hits.iter().map(|(p, _)| p.name()).collect();
        warn!(
            dialogue_id = %dialogue.id,
            matches,
            categories = ?categories,
            "residual pii detected"
        );
        Ok((PER_MATCH_PENALTY * matches as f64).min(1.0))
    }
}
