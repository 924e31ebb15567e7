/// Lowest apartment number served by the building
pub const MIN_APARTMENT_NUMBER: i64 = 129;
/// Highest apartment number served by the building
pub const MAX_APARTMENT_NUMBER: i64 = 255;

/// Registered user: Telegram user id bound to an apartment.
/// Stored in users.json as `{ "<user_id>": <apartment_number> }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: String,
    pub apartment_number: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApartmentInputError {
    NotAnInteger,
    OutOfRange(i64),
}

/// Parses the registration message into an apartment number in
/// [MIN_APARTMENT_NUMBER, MAX_APARTMENT_NUMBER]
pub fn parse_apartment_number(input: &str) -> Result<i64, ApartmentInputError> {
    let number = input
        .trim()
        .parse::<i64>()
        .map_err(|_| ApartmentInputError::NotAnInteger)?;

    if (MIN_APARTMENT_NUMBER..=MAX_APARTMENT_NUMBER).contains(&number) {
        Ok(number)
    } else {
        Err(ApartmentInputError::OutOfRange(number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_valid_apartment_is_accepted() {
        for n in MIN_APARTMENT_NUMBER..=MAX_APARTMENT_NUMBER {
            assert_eq!(parse_apartment_number(&n.to_string()), Ok(n));
        }
    }

    #[test]
    fn test_out_of_range() {
        for n in [-1, 0, 1, 128, 256, 1000] {
            assert_eq!(
                parse_apartment_number(&n.to_string()),
                Err(ApartmentInputError::OutOfRange(n))
            );
        }
    }

    #[test]
    fn test_not_an_integer() {
        for input in ["", "abc", "12.5", "200a", "two hundred", "200 201"] {
            assert_eq!(
                parse_apartment_number(input),
                Err(ApartmentInputError::NotAnInteger),
                "input: {:?}",
                input
            );
        }
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(parse_apartment_number("  200\n"), Ok(200));
        assert_eq!(parse_apartment_number("+130"), Ok(130));
    }
}
