//! Phone-number normalization for the gateway's international format.

const COUNTRY_CODE: &str = "254";

/// Normalize a locally-formatted phone number into the gateway's required
/// `254XXXXXXXXX` shape.
///
/// Total over any input: strips whitespace and non-digits (keeping a leading
/// `+`), then rewrites the prefix. Unknown shapes pass through as their
/// normalized digits rather than erroring. Idempotent: feeding the output
/// back in returns it unchanged.
pub fn format_phone_number(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for (i, ch) in raw.chars().filter(|c| !c.is_whitespace()).enumerate() {
        if ch.is_ascii_digit() || (ch == '+' && i == 0) {
            cleaned.push(ch);
        }
    }

    // A leading `+` is dropped and the remaining digits re-enter the same
    // rules, so `+254…` and `+0…` both land on the canonical shape.
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    if let Some(rest) = digits.strip_prefix('0') {
        return format!("{COUNTRY_CODE}{rest}");
    }
    // Bare subscriber numbers: Safaricom mobile prefixes are 7xx and 1xx.
    if digits.starts_with('7') || digits.starts_with('1') {
        return format!("{COUNTRY_CODE}{digits}");
    }
    digits.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trunk_prefix_is_replaced_with_country_code() {
        assert_eq!(format_phone_number("0706276584"), "254706276584");
    }

    #[test]
    fn plus_country_code_drops_the_plus() {
        assert_eq!(format_phone_number("+254706276584"), "254706276584");
    }

    #[test]
    fn bare_subscriber_number_gains_country_code() {
        assert_eq!(format_phone_number("706276584"), "254706276584");
        assert_eq!(format_phone_number("110276584"), "254110276584");
    }

    #[test]
    fn whitespace_and_punctuation_are_stripped() {
        assert_eq!(format_phone_number("0706 276 584"), "254706276584");
        assert_eq!(format_phone_number("+254 (706) 276-584"), "254706276584");
    }

    #[test]
    fn already_normalized_input_passes_through() {
        assert_eq!(format_phone_number("254706276584"), "254706276584");
    }

    #[test]
    fn idempotent_on_representative_inputs() {
        for raw in ["0706276584", "+254706276584", "706276584", "garbage!!", ""] {
            let once = format_phone_number(raw);
            assert_eq!(format_phone_number(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn total_over_junk_input() {
        assert_eq!(format_phone_number(""), "");
        assert_eq!(format_phone_number("abc"), "");
        assert_eq!(format_phone_number("++707"), "254707");
    }
}
