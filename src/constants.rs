pub const MIN_PASSWORD_LENGTH: usize = 5;
pub const MAX_NAME_LENGTH: usize = 255;

pub const PRICE_DECIMAL_PLACES: u32 = 2;
pub const PRICE_MAX_DIGITS: u32 = 5;

/// Recipe images live under this directory, relative to the media root.
pub const RECIPE_IMAGE_DIR: &str = "uploads/recipe";
pub const MEDIA_URL: &str = "/media/";

pub const JSON_BODY_LIMIT: u64 = 64 * 1024;

pub const AUTHORIZATION_SCHEMES: &[&str] = &["Token", "Bearer"];
