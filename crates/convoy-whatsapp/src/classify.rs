// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph API error classification.

use convoy_core::{ErrorClassifier, FailureClass, ProviderError};

/// Throttling and rate-limit codes.
const THROTTLING: &[i64] = &[4, 80007, 130429, 131048, 131056];

/// Temporary service-side failures.
const TEMPORARY: &[i64] = &[1, 2, 131000, 131016, 133004];

/// Policy, recipient, template and credential failures.
const PERMANENT: &[i64] = &[10, 100, 190, 200, 131026, 131047, 131051];

/// Template errors occupy a contiguous range.
const TEMPLATE_RANGE: std::ops::RangeInclusive<i64> = 132000..=132015;

/// Classifies Graph API failures by error code first, then by HTTP status.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphErrorClassifier;

impl ErrorClassifier for GraphErrorClassifier {
    fn classify(&self, error: &ProviderError) -> FailureClass {
        if let Some(code) = error.code {
            if THROTTLING.contains(&code) || TEMPORARY.contains(&code) {
                return FailureClass::Transient;
            }
            if PERMANENT.contains(&code) || TEMPLATE_RANGE.contains(&code) {
                return FailureClass::Permanent;
            }
        }
        match (error.http_status, error.code) {
            (Some(408 | 429), _) => FailureClass::Transient,
            (Some(s), _) if s >= 500 => FailureClass::Transient,
            (Some(_), _) => FailureClass::Permanent,
            // Status callbacks carry a code but no HTTP status.
            (None, Some(_)) => FailureClass::Permanent,
            (None, None) => FailureClass::Transient,
        }
    }
}
