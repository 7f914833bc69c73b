use std::{collections::HashMap, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

use super::error::{Error, FieldErrors};
use crate::constants::{MAX_NAME_LENGTH, PRICE_DECIMAL_PLACES, PRICE_MAX_DIGITS};

pub type FormData = HashMap<String, Value>;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const NULL: &str = "This field may not be null.";

/// Typed access to a JSON request body. Every getter records its own
/// validation failures; `finish` reports them all at once.
pub struct Form {
    inner: FormData,
    errors: FieldErrors,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self {
            inner: data,
            errors: FieldErrors::new(),
        }
    }

    pub fn error(&mut self, key: &str, message: &str) {
        self.errors.add(key, message);
    }

    pub fn finish(self) -> Result<(), Error> {
        self.errors.into_result()
    }

    fn lookup(&mut self, key: &str, required: bool) -> Option<Value> {
        match self.inner.get(key) {
            Some(Value::Null) => {
                self.errors.add(key, NULL);
                None
            }
            Some(value) => Some(value.to_owned()),
            None => {
                if required {
                    self.errors.add(key, REQUIRED);
                }
                None
            }
        }
    }

    /// Non-blank string, trimmed, at most `MAX_NAME_LENGTH` characters.
    pub fn get_str(&mut self, key: &str, required: bool) -> Option<String> {
        let value = self.get_text(key, required)?;
        if value.is_empty() {
            self.errors.add(key, BLANK);
            return None;
        }
        Some(value)
    }

    /// Non-blank string shaped like `local@domain.tld`.
    pub fn get_email(&mut self, key: &str, required: bool) -> Option<String> {
        let value = self.get_str(key, required)?;
        if !is_valid_email(&value) {
            self.errors.add(key, "Enter a valid email address.");
            return None;
        }
        Some(value)
    }

    /// Like `get_str` but blank values are accepted.
    pub fn get_text(&mut self, key: &str, required: bool) -> Option<String> {
        let value = self.lookup(key, required)?;
        let Some(value) = value.as_str() else {
            self.errors.add(key, "Not a valid string.");
            return None;
        };

        let value = value.trim();
        if value.chars().count() > MAX_NAME_LENGTH {
            self.errors.add(
                key,
                &format!("Ensure this field has no more than {MAX_NAME_LENGTH} characters."),
            );
            return None;
        }
        Some(value.to_string())
    }

    /// Password fields are taken verbatim, whitespace included.
    pub fn get_password(&mut self, key: &str, required: bool, min_length: usize) -> Option<String> {
        let value = self.lookup(key, required)?;
        let Some(value) = value.as_str() else {
            self.errors.add(key, "Not a valid string.");
            return None;
        };

        if value.is_empty() {
            self.errors.add(key, BLANK);
            return None;
        }
        if value.chars().count() < min_length {
            self.errors.add(
                key,
                &format!("Ensure this field has at least {min_length} characters."),
            );
            return None;
        }
        Some(value.to_string())
    }

    /// Integer given either as a JSON number or a numeric string.
    pub fn get_number<T>(&mut self, key: &str, required: bool) -> Option<T>
    where
        T: FromStr,
    {
        let value = self.lookup(key, required)?;
        let parsed = match &value {
            Value::Number(n) => n.to_string().parse::<T>().ok(),
            Value::String(s) => s.trim().parse::<T>().ok(),
            _ => None,
        };

        if parsed.is_none() {
            self.errors.add(key, "A valid integer is required.");
        }
        parsed
    }

    pub fn get_bool(&mut self, key: &str, required: bool) -> Option<bool> {
        let value = self.lookup(key, required)?;
        let parsed = match &value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(s) => parse_flag(s),
            _ => None,
        };

        if parsed.is_none() {
            self.errors.add(key, "Must be a valid boolean.");
        }
        parsed
    }

    /// Money amount rounded to `PRICE_DECIMAL_PLACES`, non-negative and at
    /// most `PRICE_MAX_DIGITS` digits in total.
    pub fn get_price(&mut self, key: &str, required: bool) -> Option<Decimal> {
        let value = self.lookup(key, required)?;
        let parsed = match &value {
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .ok(),
            Value::String(s) => Decimal::from_str(s.trim()).ok(),
            _ => None,
        };

        let Some(parsed) = parsed else {
            self.errors.add(key, "A valid number is required.");
            return None;
        };

        match round_price(parsed) {
            Ok(price) => Some(price),
            Err(message) => {
                self.errors.add(key, message);
                None
            }
        }
    }

    /// List of record ids. Duplicates are dropped, order is kept.
    pub fn get_id_list(&mut self, key: &str) -> Option<Vec<i64>> {
        let value = self.lookup(key, false)?;
        let Some(items) = value.as_array() else {
            self.errors
                .add(key, "Expected a list of items but got a different type.");
            return None;
        };

        let mut ids: Vec<i64> = Vec::with_capacity(items.len());
        for item in items {
            let id = match item {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            };
            match id {
                Some(id) if !ids.contains(&id) => ids.push(id),
                Some(_) => {}
                None => {
                    self.errors
                        .add(key, "Incorrect type. Expected pk value.");
                    return None;
                }
            }
        }
        Some(ids)
    }
}

pub fn round_price(value: Decimal) -> Result<Decimal, &'static str> {
    let mut rounded =
        value.round_dp_with_strategy(PRICE_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(PRICE_DECIMAL_PLACES);

    if rounded.is_sign_negative() && !rounded.is_zero() {
        return Err("Ensure this value is greater than or equal to 0.");
    }
    if rounded.mantissa().unsigned_abs() >= 10u128.pow(PRICE_MAX_DIGITS) {
        return Err("Ensure that there are no more than 5 digits in total.");
    }
    Ok(rounded)
}

pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !value.chars().any(char::is_whitespace)
}

/// Query-string and form booleans.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Comma separated id list from a query string, e.g. `tags=1,2`.
pub fn parse_id_list(key: &str, value: &str) -> Result<Vec<i64>, Error> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| Error::validation(key, "Expected a comma separated list of ids."))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(value: Value) -> Form {
        let data: FormData = serde_json::from_value(value).unwrap();
        Form::from_data(data)
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let mut form = form(json!({}));
        assert_eq!(form.get_str("title", true), None);
        assert_eq!(form.get_number::<i32>("time_minutes", true), None);
        assert_eq!(form.get_str("link", false), None);

        let Err(Error::Validation(errors)) = form.finish() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.get("title"), Some(&[REQUIRED.to_string()][..]));
        assert!(errors.get("time_minutes").is_some());
        assert!(errors.get("link").is_none());
    }

    #[test]
    fn blank_names_are_rejected_but_blank_text_is_not() {
        let mut form = form(json!({ "name": "   ", "link": "" }));
        assert_eq!(form.get_str("name", true), None);
        assert_eq!(form.get_text("link", false), Some(String::new()));
        assert!(form.finish().is_err());
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        let mut form = form(json!({ "a": 30, "b": "19", "c": "soon" }));
        assert_eq!(form.get_number::<i32>("a", true), Some(30));
        assert_eq!(form.get_number::<i32>("b", true), Some(19));
        assert_eq!(form.get_number::<i32>("c", true), None);
        assert!(form.finish().is_err());
    }

    #[test]
    fn price_is_rounded_to_two_places() {
        let mut form = form(json!({ "a": 69.99, "b": "5.255", "c": 8 }));
        assert_eq!(form.get_price("a", true).unwrap().to_string(), "69.99");
        assert_eq!(form.get_price("b", true).unwrap().to_string(), "5.26");
        assert_eq!(form.get_price("c", true).unwrap().to_string(), "8.00");
        assert!(form.finish().is_ok());
    }

    #[test]
    fn price_limits() {
        assert!(round_price(Decimal::new(99999, 2)).is_ok());
        assert!(round_price(Decimal::new(100000, 2)).is_err());
        assert!(round_price(Decimal::new(-1, 2)).is_err());
        assert!(round_price(Decimal::new(-1, 3)).is_ok());
    }

    #[test]
    fn id_lists_deduplicate() {
        let mut form = form(json!({ "tags": [3, "1", 3], "ingredients": "1,2" }));
        assert_eq!(form.get_id_list("tags"), Some(vec![3, 1]));
        assert_eq!(form.get_id_list("ingredients"), None);
        assert!(form.finish().is_err());
    }

    #[test]
    fn passwords_enforce_min_length() {
        let mut form = form(json!({ "password": "pass" }));
        assert_eq!(form.get_password("password", true, 5), None);
        assert!(form.finish().is_err());
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("mail@mail.com"));
        assert!(is_valid_email("fake@EmAiL.CoM"));
        assert!(!is_valid_email("test"));
        assert!(!is_valid_email("@mail.com"));
        assert!(!is_valid_email("mail@com"));
        assert!(!is_valid_email("mail@.com"));
        assert!(!is_valid_email("ma il@mail.com"));
    }

    #[test]
    fn flags_and_query_ids() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("False"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_id_list("tags", "1, 2,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_id_list("tags", "1,a").is_err());
    }
}
