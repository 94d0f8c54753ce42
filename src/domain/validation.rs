//! Pure validation rules applied before any persistence write.
//!
//! No side effects, no I/O.

use rust_decimal::Decimal;

use super::error::ValidationError;
use super::types::RewardType;

/// Hex characters in a wallet address, excluding the `0x` prefix
pub const ADDRESS_HEX_LEN: usize = 40;

/// Check address well-formedness and return the lower-case canonical form.
///
/// Accepted shape: `0x` followed by exactly 40 hex characters.
pub fn normalize_address(address: &str) -> Result<String, ValidationError> {
    let trimmed = address.trim();
    let normalized = trimmed.to_lowercase();

    let hex_part = normalized
        .strip_prefix("0x")
        .ok_or_else(|| ValidationError::InvalidAddress(trimmed.to_string()))?;

    if hex_part.len() != ADDRESS_HEX_LEN || hex::decode(hex_part).is_err() {
        return Err(ValidationError::InvalidAddress(trimmed.to_string()));
    }

    Ok(normalized)
}

/// Parse a reward type, rejecting anything outside the closed enum
pub fn parse_reward_type(raw: &str) -> Result<RewardType, ValidationError> {
    raw.parse()
        .map_err(|_| ValidationError::InvalidRewardType(raw.to_string()))
}

/// Check that an amount is positive and within the configured bounds
pub fn validate_amount(
    amount: Decimal,
    min: Decimal,
    max: Decimal,
) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    if amount < min {
        return Err(ValidationError::BelowMinimum { amount, min });
    }
    if amount > max {
        return Err(ValidationError::AboveMaximum { amount, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const MIN: &str = "1";
    const MAX: &str = "1000";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_normalize_address_accepts_and_lowercases() {
        let addr = "0x3F5CE5FBFe3E9af3971dD833D26bA9b5C936f0bE";
        let normalized = normalize_address(addr).unwrap();
        assert_eq!(normalized, "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be");

        // already canonical
        assert_eq!(normalize_address(&normalized).unwrap(), normalized);
    }

    #[test]
    fn test_normalize_address_rejects_malformed() {
        let cases = [
            "",
            "0x",
            "3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be",    // missing prefix
            "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0b",   // 39 chars
            "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0be0", // 41 chars
            "0x3f5ce5fbfe3e9af3971dd833d26ba9b5c936f0bg",  // non-hex
        ];
        for case in cases {
            assert!(
                normalize_address(case).is_err(),
                "expected rejection for {case:?}"
            );
        }
    }

    #[test]
    fn test_parse_reward_type_closed_enum() {
        assert_eq!(parse_reward_type("bonus").unwrap(), RewardType::Bonus);
        assert!(parse_reward_type("jackpot").is_err());
        assert!(parse_reward_type("").is_err());
    }

    #[test]
    fn test_amount_boundaries_pass() {
        assert!(validate_amount(dec(MIN), dec(MIN), dec(MAX)).is_ok());
        assert!(validate_amount(dec(MAX), dec(MIN), dec(MAX)).is_ok());
        assert!(validate_amount(dec("500"), dec(MIN), dec(MAX)).is_ok());
    }

    #[test]
    fn test_amount_one_step_outside_bounds_fails() {
        let below = validate_amount(dec("0.9999999999"), dec(MIN), dec(MAX));
        assert!(matches!(below, Err(ValidationError::BelowMinimum { .. })));

        let above = validate_amount(dec("1000.0000000001"), dec(MIN), dec(MAX));
        assert!(matches!(above, Err(ValidationError::AboveMaximum { .. })));
    }

    #[test]
    fn test_amount_zero_and_negative_fail() {
        assert!(matches!(
            validate_amount(Decimal::ZERO, dec(MIN), dec(MAX)),
            Err(ValidationError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            validate_amount(dec("-5"), dec(MIN), dec(MAX)),
            Err(ValidationError::NonPositiveAmount(_))
        ));
    }
}
