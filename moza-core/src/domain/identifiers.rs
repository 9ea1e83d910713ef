//! Identifier generation
//!
//! Account numbers, card numbers and CVVs are drawn uniformly from fixed
//! numeric ranges. None of this is cryptographically secured; uniqueness is
//! enforced by the store and collisions are handled by regenerating.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use rand::Rng;

pub const ACCOUNT_NUMBER_RANGE: RangeInclusive<u64> = 100_000_000..=999_999_999;
pub const CARD_NUMBER_RANGE: RangeInclusive<u64> = 1_000_000_000_000_000..=9_999_999_999_999_999;
pub const CVV_RANGE: RangeInclusive<u16> = 100..=999;

/// Prefix of every transaction reference
pub const REFERENCE_PREFIX: &str = "TXN";

/// 9-digit account number
pub fn account_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(ACCOUNT_NUMBER_RANGE).to_string()
}

/// 16-digit card number
pub fn card_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(CARD_NUMBER_RANGE).to_string()
}

/// 3-digit card verification value
pub fn cvv<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(CVV_RANGE).to_string()
}

/// Transaction reference: prefix plus nanoseconds since the epoch
///
/// Two calls within the same nanosecond produce the same reference.
pub fn transaction_reference(now: DateTime<Utc>) -> String {
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));
    format!("{}{}", REFERENCE_PREFIX, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_identifier_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let acct = account_number(&mut rng);
            assert_eq!(acct.len(), 9);
            assert!(acct.chars().all(|c| c.is_ascii_digit()));

            let card = card_number(&mut rng);
            assert_eq!(card.len(), 16);
            assert!(!card.starts_with('0'));

            let code = cvv(&mut rng);
            assert_eq!(code.len(), 3);
        }
    }

    #[test]
    fn test_reference_uses_nanosecond_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let reference = transaction_reference(now);
        assert_eq!(reference, format!("TXN{}", now.timestamp_nanos_opt().unwrap()));
        assert_eq!(transaction_reference(now), reference);
    }
}
