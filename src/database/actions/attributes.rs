use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    error::Error,
    schema::{Attribute, AttributeKind, Id},
};

pub async fn list_attributes(
    kind: AttributeKind,
    user_id: Id,
    assigned_only: bool,
    pool: &Pool<Sqlite>,
) -> Result<Vec<Attribute>, Error> {
    let table = kind.table();
    let map_table = kind.map_table();
    let map_column = kind.map_column();

    let rows: Vec<Attribute> = match assigned_only {
        true => {
            sqlx::query_as(&format!("
                SELECT DISTINCT a.id, a.user_id, a.name
                FROM {table} a
                INNER JOIN {map_table} m ON m.{map_column} = a.id
                INNER JOIN recipes r ON r.id = m.recipe_id
                WHERE a.user_id = ? AND r.user_id = ?
                ORDER BY a.name DESC, a.id DESC
            "))
                .bind(user_id)
                .bind(user_id)
                .fetch_all(pool).await?
        },
        false => {
            sqlx::query_as(&format!("SELECT * FROM {table} WHERE user_id = ? ORDER BY name DESC, id DESC"))
                .bind(user_id)
                .fetch_all(pool).await?
        },
    };

    Ok(rows)
}

pub async fn get_attribute(
    kind: AttributeKind,
    user_id: Id,
    id: Id,
    pool: &Pool<Sqlite>,
) -> Result<Option<Attribute>, Error> {
    let row: Option<Attribute> = sqlx::query_as(&format!(
        "SELECT * FROM {} WHERE id = ? AND user_id = ?",
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn create_attribute(
    kind: AttributeKind,
    user_id: Id,
    name: &str,
    pool: &Pool<Sqlite>,
) -> Result<Attribute, Error> {
    let row: Attribute = sqlx::query_as(&format!(
        "INSERT INTO {} (user_id, name) VALUES (?, ?) RETURNING *",
        kind.table()
    ))
    .bind(user_id)
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn rename_attribute(
    kind: AttributeKind,
    user_id: Id,
    id: Id,
    name: &str,
    pool: &Pool<Sqlite>,
) -> Result<Attribute, Error> {
    let row: Option<Attribute> = sqlx::query_as(&format!(
        "UPDATE {} SET name = ? WHERE id = ? AND user_id = ? RETURNING *",
        kind.table()
    ))
    .bind(name)
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(Error::NotFound)
}

pub async fn delete_attribute(
    kind: AttributeKind,
    user_id: Id,
    id: Id,
    pool: &Pool<Sqlite>,
) -> Result<(), Error> {
    let query = sqlx::query(&format!(
        "DELETE FROM {} WHERE id = ? AND user_id = ?",
        kind.table()
    ))
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if query.rows_affected() == 0 {
        return Err(Error::NotFound);
    }
    Ok(())
}

/// Attributes linked to any of `recipe_ids`, paired with the recipe they
/// belong to.
pub async fn list_linked_attributes(
    kind: AttributeKind,
    recipe_ids: &[Id],
    pool: &Pool<Sqlite>,
) -> Result<Vec<(Id, Attribute)>, Error> {
    if recipe_ids.is_empty() {
        return Ok(vec![]);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT m.recipe_id AS recipe_id, a.id AS id, a.user_id AS user_id, a.name AS name
         FROM {} m INNER JOIN {} a ON a.id = m.{} WHERE m.recipe_id IN (",
        kind.map_table(),
        kind.table(),
        kind.map_column()
    ));
    let mut separated = builder.separated(", ");
    for id in recipe_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY a.id");

    let rows: Vec<LinkedAttribute> = builder.build_query_as().fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.recipe_id,
                Attribute {
                    id: row.id,
                    user_id: row.user_id,
                    name: row.name,
                },
            )
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct LinkedAttribute {
    recipe_id: Id,
    id: Id,
    user_id: Id,
    name: String,
}

/// Checks that every id names an attribute owned by `user_id`.
pub async fn ensure_owned(
    kind: AttributeKind,
    user_id: Id,
    ids: &[Id],
    conn: &mut SqliteConnection,
) -> Result<(), Error> {
    if ids.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT id FROM {} WHERE user_id = ",
        kind.table()
    ));
    builder.push_bind(user_id);
    builder.push(" AND id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let found: Vec<(Id,)> = builder.build_query_as().fetch_all(&mut *conn).await?;

    if let Some(missing) = ids.iter().find(|id| !found.iter().any(|(f,)| f == *id)) {
        return Err(Error::validation(
            kind.plural(),
            &format!("Invalid pk \"{missing}\" - object does not exist."),
        ));
    }
    Ok(())
}

/// Replaces the whole set of `kind` links on a recipe.
pub async fn replace_links(
    kind: AttributeKind,
    recipe_id: Id,
    ids: &[Id],
    conn: &mut SqliteConnection,
) -> Result<(), Error> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE recipe_id = ?",
        kind.map_table()
    ))
    .bind(recipe_id)
    .execute(&mut *conn)
    .await?;

    if ids.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "INSERT INTO {} (recipe_id, {}) ",
        kind.map_table(),
        kind.map_column()
    ));
    builder.push_values(ids, |mut row, id| {
        row.push_bind(recipe_id).push_bind(*id);
    });
    builder.build().execute(&mut *conn).await?;

    Ok(())
}
