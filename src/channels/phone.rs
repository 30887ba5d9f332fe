/// Normalize a phone destination to E.164 for the configured country.
///
/// Accepts international (`+254712345678`), local leading-zero
/// (`0712 345 678`) and bare nine-digit (`712345678`) forms. Pure and
/// idempotent: normalizing an already-normalized number is a no-op.
/// Returns `None` when the input cannot be mapped to a single number.
pub fn normalize_phone(raw: &str, country_code: &str) -> Option<String> {
    let country: String = country_code.chars().filter(char::is_ascii_digit).collect();
    if country.is_empty() {
        return None;
    }
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    // Already international for this country.
    if digits.starts_with(&country) && digits.len() >= country.len() + 9 {
        return Some(format!("+{digits}"));
    }
    // Local form: leading zero plus nine subscriber digits.
    if let Some(rest) = digits.strip_prefix('0')
        && rest.len() == 9
    {
        return Some(format!("+{country}{rest}"));
    }
    // Bare subscriber number.
    if digits.len() == 9 {
        return Some(format!("+{country}{digits}"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::normalize_phone;

    #[test]
    fn maps_local_leading_zero_form() {
        assert_eq!(
            normalize_phone("0712345678", "254").as_deref(),
            Some("+254712345678")
        );
    }

    #[test]
    fn maps_bare_nine_digit_form() {
        assert_eq!(
            normalize_phone("712345678", "254").as_deref(),
            Some("+254712345678")
        );
    }

    #[test]
    fn strips_formatting_characters() {
        assert_eq!(
            normalize_phone("+254 712-345-678", "254").as_deref(),
            Some("+254712345678")
        );
        assert_eq!(
            normalize_phone("(0712) 345 678", "254").as_deref(),
            Some("+254712345678")
        );
    }

    #[test]
    fn is_idempotent() {
        for input in ["0712345678", "712345678", "+254712345678", "254712345678"] {
            let once = normalize_phone(input, "254").expect("normalizes");
            let twice = normalize_phone(&once, "254").expect("normalizes again");
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rejects_unmappable_input() {
        assert_eq!(normalize_phone("", "254"), None);
        assert_eq!(normalize_phone("call me", "254"), None);
        assert_eq!(normalize_phone("12345", "254"), None);
        assert_eq!(normalize_phone("0712345678", ""), None);
    }
}
