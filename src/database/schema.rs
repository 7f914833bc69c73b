use rust_decimal::Decimal;
use serde::Serialize;

use crate::constants::{MEDIA_URL, PRICE_DECIMAL_PLACES};

pub type Id = i64;

#[derive(Clone, Debug, PartialEq, PartialOrd, Serialize, Eq, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Staff,
    Superuser,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl User {
    pub fn role(&self) -> UserRole {
        if self.is_superuser {
            UserRole::Superuser
        } else if self.is_staff {
            UserRole::Staff
        } else {
            UserRole::User
        }
    }
}

/// What a user sees of themselves.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
        }
    }
}

/// What staff see of any user.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdminUser {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<User> for AdminUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
        }
    }
}

/// Tags and ingredients share one shape: a name owned by a user that
/// recipes link to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Tag,
    Ingredient,
}

impl AttributeKind {
    pub fn table(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    pub fn map_table(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "recipe_tags_map",
            AttributeKind::Ingredient => "recipe_ingredients_map",
        }
    }

    pub fn map_column(&self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag_id",
            AttributeKind::Ingredient => "ingredient_id",
        }
    }

    /// Path segment under `/recipe` and the field name on recipe payloads.
    pub fn plural(&self) -> &'static str {
        self.table()
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Attribute {
    pub id: Id,
    #[serde(skip_serializing)]
    pub user_id: Id,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRecord {
    pub id: Id,
    pub user_id: Id,
    pub title: String,
    pub time_minutes: i32,
    pub price_cents: i64,
    pub link: String,
    pub image: Option<String>,
}

impl RecipeRecord {
    pub fn price(&self) -> Decimal {
        Decimal::new(self.price_cents, PRICE_DECIMAL_PLACES)
    }

    pub fn image_url(&self) -> Option<String> {
        self.image
            .as_ref()
            .map(|path| format!("{MEDIA_URL}{path}"))
    }
}

/// Converts a rounded price into the stored integer amount.
pub fn price_to_cents(price: Decimal) -> i64 {
    let mut price = price;
    price.rescale(PRICE_DECIMAL_PLACES);
    price.mantissa() as i64
}

/// Flat representation used by list, create and update responses.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: Id,
    pub title: String,
    pub ingredients: Vec<Id>,
    pub tags: Vec<Id>,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
}

impl RecipeSummary {
    pub fn new(recipe: RecipeRecord, tags: Vec<Id>, ingredients: Vec<Id>) -> Self {
        Self {
            id: recipe.id,
            price: recipe.price(),
            image: recipe.image_url(),
            title: recipe.title,
            ingredients,
            tags,
            time_minutes: recipe.time_minutes,
            link: recipe.link,
        }
    }
}

/// Detail representation with tags and ingredients expanded.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: Id,
    pub title: String,
    pub ingredients: Vec<Attribute>,
    pub tags: Vec<Attribute>,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
}

impl RecipeDetail {
    pub fn new(recipe: RecipeRecord, tags: Vec<Attribute>, ingredients: Vec<Attribute>) -> Self {
        Self {
            id: recipe.id,
            price: recipe.price(),
            image: recipe.image_url(),
            title: recipe.title,
            ingredients,
            tags,
            time_minutes: recipe.time_minutes,
            link: recipe.link,
        }
    }
}
