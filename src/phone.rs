/// Phone number canonicalisation.
///
/// Every number that reaches the engine (webhook payloads, curated list
/// entries, simulation profiles) goes through here so that lookups compare
/// equal regardless of separators or prefix style.
pub struct PhoneNumber;

impl PhoneNumber {
    /// Digits-only comparison key. A bare 10-digit number gets the `1`
    /// country code so it matches its E.164 spelling.
    pub fn key(raw: &str) -> String {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() == 10 {
            format!("1{digits}")
        } else {
            digits
        }
    }

    /// Display form: `+1-201-637-4059` for NANP numbers, `+<digits>` otherwise.
    pub fn display(raw: &str) -> String {
        let d = Self::key(raw);
        if d.len() == 11 && d.starts_with('1') {
            format!("+{}-{}-{}-{}", &d[..1], &d[1..4], &d[4..7], &d[7..])
        } else {
            format!("+{d}")
        }
    }

    /// E.164 form: `+12016374059`.
    pub fn e164(raw: &str) -> String {
        format!("+{}", Self::key(raw))
    }

    pub fn same_number(a: &str, b: &str) -> bool {
        Self::key(a) == Self::key(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_ignores_formatting() {
        let expected = "12016374059";
        assert_eq!(PhoneNumber::key("201-637-4059"), expected);
        assert_eq!(PhoneNumber::key("+12016374059"), expected);
        assert_eq!(PhoneNumber::key("2016374059"), expected);
        assert_eq!(PhoneNumber::key("+1 (201) 637 4059"), expected);
        assert_eq!(PhoneNumber::key("+1-201-637-4059"), expected);
    }

    #[test]
    fn test_display_format() {
        assert_eq!(PhoneNumber::display("2016374059"), "+1-201-637-4059");
        assert_eq!(PhoneNumber::display("+12016374059"), "+1-201-637-4059");
        assert_eq!(PhoneNumber::display("1 201 637 4059"), "+1-201-637-4059");
    }

    #[test]
    fn test_display_passes_through_other_lengths() {
        assert_eq!(PhoneNumber::display("+44 20 7946 0958"), "+442079460958");
        assert_eq!(PhoneNumber::display("911"), "+911");
        assert_eq!(PhoneNumber::display("not a number"), "+");
    }

    #[test]
    fn test_e164() {
        assert_eq!(PhoneNumber::e164("201-637-4059"), "+12016374059");
        assert_eq!(PhoneNumber::e164("+1-201-637-4059"), "+12016374059");
    }

    #[test]
    fn test_same_number() {
        assert!(PhoneNumber::same_number("+1-201-637-4059", "2016374059"));
        assert!(!PhoneNumber::same_number("+1-201-637-4059", "2016374058"));
    }

    proptest! {
        #[test]
        fn prop_key_survives_display(raw in "[0-9+() .-]{0,20}") {
            let key = PhoneNumber::key(&raw);
            prop_assert_eq!(PhoneNumber::key(&PhoneNumber::display(&key)), key);
        }

        #[test]
        fn prop_display_is_idempotent(raw in "\\PC{0,24}") {
            let once = PhoneNumber::display(&raw);
            prop_assert_eq!(PhoneNumber::display(&once), once.clone());
        }

        #[test]
        fn prop_ten_digit_and_e164_agree(digits in "[2-9][0-9]{9}") {
            let e164 = format!("+1{digits}");
            prop_assert_eq!(PhoneNumber::key(&digits), PhoneNumber::key(&e164));
        }
    }
}
