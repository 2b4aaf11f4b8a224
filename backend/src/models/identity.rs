// backend/src/models/identity.rs
//
// DNI / CUIL checks applied when agents are ingested.

use crate::error::{CoreError, CoreResult};

const CUIL_WEIGHTS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];
const CUIL_PREFIXES: [&str; 7] = ["20", "23", "24", "27", "30", "33", "34"];

fn all_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// DNI must be 8 digits, CUIL 11 digits, and the CUIL body must repeat the DNI.
pub fn validate_identity(dni: Option<&str>, cuil: Option<&str>) -> CoreResult<()> {
    if let Some(dni) = dni {
        if !all_digits(dni, 8) {
            return Err(CoreError::invalid_filter(format!("DNI '{dni}' must have 8 digits")));
        }
    }
    if let Some(cuil) = cuil {
        if !all_digits(cuil, 11) {
            return Err(CoreError::invalid_filter(format!("CUIL '{cuil}' must have 11 digits")));
        }
        if check_digit(&cuil[..2], &cuil[2..10]) != Some(cuil[10..].to_string()) {
            return Err(CoreError::invalid_filter(format!("CUIL '{cuil}' has a wrong check digit")));
        }
    }
    if let (Some(dni), Some(cuil)) = (dni, cuil) {
        if cuil[2..10] != *dni {
            return Err(CoreError::invalid_filter(format!("CUIL '{cuil}' does not match DNI '{dni}'")));
        }
    }
    Ok(())
}

fn weighted_remainder(digits: &str) -> u32 {
    let sum: u32 = digits
        .bytes()
        .zip(CUIL_WEIGHTS)
        .map(|(b, w)| u32::from(b - b'0') * w)
        .sum();
    match 11 - sum % 11 {
        11 => 0,
        r => r,
    }
}

/// Check digit for `prefix + dni`, or `None` when the combination has no
/// valid digit under that prefix (remainder 10).
fn check_digit(prefix: &str, dni: &str) -> Option<String> {
    match weighted_remainder(&format!("{prefix}{dni}")) {
        10 => None,
        d => Some(d.to_string()),
    }
}

/// Build a CUIL from a prefix and a DNI. A remainder of 10 moves personal
/// prefixes to 23, following the AFIP rule.
pub fn derive_cuil(prefix: &str, dni: &str) -> CoreResult<String> {
    if !CUIL_PREFIXES.contains(&prefix) {
        return Err(CoreError::invalid_filter(format!("unknown CUIL prefix '{prefix}'")));
    }
    if !all_digits(dni, 8) {
        return Err(CoreError::invalid_filter(format!("DNI '{dni}' must have 8 digits")));
    }
    match check_digit(prefix, dni) {
        Some(d) => Ok(format!("{prefix}{dni}{d}")),
        None => match prefix {
            "20" => Ok(format!("23{dni}9")),
            "27" => Ok(format!("23{dni}4")),
            _ => Err(CoreError::invalid_filter(format!(
                "no valid CUIL for prefix '{prefix}' and DNI '{dni}'"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_known_cuil() {
        // 20 + 12345678: weighted sum 148, 148 % 11 = 5, 11 - 5 = 6
        assert_eq!(derive_cuil("20", "12345678").unwrap(), "20123456786");
    }

    #[test]
    fn derived_cuil_validates_against_dni() {
        let cuil = derive_cuil("27", "30111222").unwrap();
        assert!(validate_identity(Some("30111222"), Some(&cuil)).is_ok());
    }

    #[test]
    fn rejects_mismatched_dni() {
        let err = validate_identity(Some("87654321"), Some("20123456786")).unwrap_err();
        assert_eq!(err.kind(), "InvalidFilter");
    }

    #[test]
    fn rejects_short_dni_and_bad_digit() {
        assert!(validate_identity(Some("1234567"), None).is_err());
        assert!(validate_identity(None, Some("20123456780")).is_err());
    }

    #[test]
    fn missing_identity_is_allowed() {
        assert!(validate_identity(None, None).is_ok());
    }
}
