use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{Pool, QueryBuilder, Sqlite};

use super::attributes::{ensure_owned, list_linked_attributes, replace_links};
use crate::{
    error::Error,
    schema::{
        price_to_cents, Attribute, AttributeKind, Id, RecipeDetail, RecipeRecord, RecipeSummary,
    },
};

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<Id>,
    pub ingredients: Vec<Id>,
}

/// Partial update of a recipe. A `Some` link list replaces the current set
/// wholesale.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<Id>>,
}

/// Recipes must reference at least one id from every non-empty list.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub tags: Vec<Id>,
    pub ingredients: Vec<Id>,
}

fn push_link_filter(builder: &mut QueryBuilder<'_, Sqlite>, kind: AttributeKind, ids: &[Id]) {
    if ids.is_empty() {
        return;
    }

    builder.push(format!(
        " AND id IN (SELECT recipe_id FROM {} WHERE {} IN (",
        kind.map_table(),
        kind.map_column()
    ));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated("))");
}

pub async fn fetch_recipes(
    user_id: Id,
    filter: &RecipeFilter,
    pool: &Pool<Sqlite>,
) -> Result<Vec<RecipeSummary>, Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM recipes WHERE user_id = ");
    builder.push_bind(user_id);
    push_link_filter(&mut builder, AttributeKind::Tag, &filter.tags);
    push_link_filter(&mut builder, AttributeKind::Ingredient, &filter.ingredients);
    builder.push(" ORDER BY id DESC");

    let rows: Vec<RecipeRecord> = builder.build_query_as().fetch_all(pool).await?;

    summarize(rows, pool).await
}

async fn linked_attributes(
    kind: AttributeKind,
    recipe_ids: &[Id],
    pool: &Pool<Sqlite>,
) -> Result<HashMap<Id, Vec<Attribute>>, Error> {
    let mut hashmap: HashMap<Id, Vec<Attribute>> = HashMap::new();
    list_linked_attributes(kind, recipe_ids, pool)
        .await?
        .into_iter()
        .for_each(|(recipe_id, attribute)| {
            hashmap.entry(recipe_id).or_default().push(attribute)
        });

    Ok(hashmap)
}

async fn summarize(rows: Vec<RecipeRecord>, pool: &Pool<Sqlite>) -> Result<Vec<RecipeSummary>, Error> {
    let ids: Vec<Id> = rows.iter().map(|r| r.id).collect();
    let mut tags = linked_attributes(AttributeKind::Tag, &ids, pool).await?;
    let mut ingredients = linked_attributes(AttributeKind::Ingredient, &ids, pool).await?;

    let only_ids = |attributes: Option<Vec<Attribute>>| -> Vec<Id> {
        attributes
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.id)
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            let tags = only_ids(tags.remove(&row.id));
            let ingredients = only_ids(ingredients.remove(&row.id));
            RecipeSummary::new(row, tags, ingredients)
        })
        .collect())
}

pub async fn get_recipe(
    user_id: Id,
    id: Id,
    pool: &Pool<Sqlite>,
) -> Result<Option<RecipeRecord>, Error> {
    let row: Option<RecipeRecord> =
        sqlx::query_as("SELECT * FROM recipes WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

pub async fn get_recipe_summary(
    user_id: Id,
    id: Id,
    pool: &Pool<Sqlite>,
) -> Result<RecipeSummary, Error> {
    let row = get_recipe(user_id, id, pool).await?.ok_or(Error::NotFound)?;

    summarize(vec![row], pool)
        .await?
        .pop()
        .ok_or(Error::NotFound)
}

pub async fn get_recipe_detail(
    user_id: Id,
    id: Id,
    pool: &Pool<Sqlite>,
) -> Result<RecipeDetail, Error> {
    let row = get_recipe(user_id, id, pool).await?.ok_or(Error::NotFound)?;

    let tags = linked_attributes(AttributeKind::Tag, &[row.id], pool)
        .await?
        .remove(&row.id)
        .unwrap_or_default();
    let ingredients = linked_attributes(AttributeKind::Ingredient, &[row.id], pool)
        .await?
        .remove(&row.id)
        .unwrap_or_default();

    Ok(RecipeDetail::new(row, tags, ingredients))
}

pub async fn create_recipe(
    user_id: Id,
    recipe: NewRecipe,
    pool: &Pool<Sqlite>,
) -> Result<RecipeSummary, Error> {
    let mut tx = pool.begin().await?;

    ensure_owned(AttributeKind::Tag, user_id, &recipe.tags, &mut tx).await?;
    ensure_owned(AttributeKind::Ingredient, user_id, &recipe.ingredients, &mut tx).await?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (user_id, title, time_minutes, price_cents, link)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
    ",
    )
    .bind(user_id)
    .bind(&recipe.title)
    .bind(recipe.time_minutes)
    .bind(price_to_cents(recipe.price))
    .bind(&recipe.link)
    .fetch_one(&mut *tx)
    .await?;

    replace_links(AttributeKind::Tag, id.0, &recipe.tags, &mut tx).await?;
    replace_links(AttributeKind::Ingredient, id.0, &recipe.ingredients, &mut tx).await?;

    tx.commit().await?;

    get_recipe_summary(user_id, id.0, pool).await
}

pub async fn update_recipe(
    user_id: Id,
    id: Id,
    changes: RecipeChanges,
    pool: &Pool<Sqlite>,
) -> Result<RecipeSummary, Error> {
    let mut tx = pool.begin().await?;

    let row: Option<(Id,)> = sqlx::query_as(
        "
        UPDATE recipes SET
            title = COALESCE(?, title),
            time_minutes = COALESCE(?, time_minutes),
            price_cents = COALESCE(?, price_cents),
            link = COALESCE(?, link)
        WHERE id = ? AND user_id = ?
        RETURNING id
    ",
    )
    .bind(changes.title)
    .bind(changes.time_minutes)
    .bind(changes.price.map(price_to_cents))
    .bind(changes.link)
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    if row.is_none() {
        return Err(Error::NotFound);
    }

    if let Some(tags) = &changes.tags {
        ensure_owned(AttributeKind::Tag, user_id, tags, &mut tx).await?;
        replace_links(AttributeKind::Tag, id, tags, &mut tx).await?;
    }
    if let Some(ingredients) = &changes.ingredients {
        ensure_owned(AttributeKind::Ingredient, user_id, ingredients, &mut tx).await?;
        replace_links(AttributeKind::Ingredient, id, ingredients, &mut tx).await?;
    }

    tx.commit().await?;

    get_recipe_summary(user_id, id, pool).await
}

/// Deletes the recipe and hands back the removed row so its image can be
/// cleaned up.
pub async fn delete_recipe(user_id: Id, id: Id, pool: &Pool<Sqlite>) -> Result<RecipeRecord, Error> {
    let row: Option<RecipeRecord> =
        sqlx::query_as("DELETE FROM recipes WHERE id = ? AND user_id = ? RETURNING *")
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    row.ok_or(Error::NotFound)
}

pub async fn set_recipe_image(
    user_id: Id,
    id: Id,
    image: &str,
    pool: &Pool<Sqlite>,
) -> Result<RecipeRecord, Error> {
    let row: Option<RecipeRecord> =
        sqlx::query_as("UPDATE recipes SET image = ? WHERE id = ? AND user_id = ? RETURNING *")
            .bind(image)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    row.ok_or(Error::NotFound)
}
