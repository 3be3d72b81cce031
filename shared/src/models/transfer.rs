//! Transfer models and numbering

use serde::{Deserialize, Serialize};

/// Status of a transfer. Transfers execute atomically, so `Completed` is the
/// only state that is ever persisted; there is no pending or partial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Completed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Completed => "completed",
        }
    }
}

/// Format a human-readable transfer number, e.g. "TRF-2026-0042".
///
/// The sequence value comes from an atomic per-year counter, never from a
/// row count.
pub fn format_transfer_number(year: i32, sequence: i64) -> String {
    format!("TRF-{}-{:04}", year, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_number_is_zero_padded() {
        assert_eq!(format_transfer_number(2026, 1), "TRF-2026-0001");
        assert_eq!(format_transfer_number(2026, 42), "TRF-2026-0042");
    }

    #[test]
    fn transfer_number_grows_past_padding() {
        assert_eq!(format_transfer_number(2026, 12345), "TRF-2026-12345");
    }
}
