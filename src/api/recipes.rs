use std::sync::Arc;

use futures::TryStreamExt;
use serde::Deserialize;
use warp::{
    filters::{
        multipart::{FormData as MultipartData, Part},
        BoxedFilter,
    },
    http::StatusCode,
    hyper::body::Buf,
    reject::Rejection,
    reply::Response,
    Filter,
};

use super::routes::{json_form, no_content, reply};
use crate::{
    actions::recipes::{
        create_recipe, delete_recipe, fetch_recipes, get_recipe, get_recipe_detail,
        set_recipe_image, update_recipe, NewRecipe, RecipeChanges, RecipeFilter,
    },
    error::Error,
    form::{parse_id_list, Form},
    jwt::SessionData,
    media::{remove_media_file, store_recipe_image},
    middleware::with_session,
    schema::Id,
    state::{with_state, State},
};

#[derive(Debug, Deserialize)]
struct RecipeQuery {
    tags: Option<String>,
    ingredients: Option<String>,
}

impl RecipeQuery {
    fn into_filter(self) -> Result<RecipeFilter, Error> {
        let parse = |key: &str, value: Option<String>| match value {
            Some(value) => parse_id_list(key, &value),
            None => Ok(vec![]),
        };

        Ok(RecipeFilter {
            tags: parse("tags", self.tags)?,
            ingredients: parse("ingredients", self.ingredients)?,
        })
    }
}

pub fn routes(state: Arc<State>) -> BoxedFilter<(Response,)> {
    let list = warp::path!("recipe" / "recipes")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(warp::query::<RecipeQuery>())
        .and(with_state(state.clone()))
        .and_then(list);

    let create = warp::path!("recipe" / "recipes")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(create);

    let retrieve = warp::path!("recipe" / "recipes" / Id)
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(retrieve);

    let put = warp::path!("recipe" / "recipes" / Id)
        .and(warp::put())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(|id: Id, session: SessionData, form: Form, state: Arc<State>| {
            update(id, session, form, state, false)
        });

    let patch = warp::path!("recipe" / "recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_form())
        .and(with_state(state.clone()))
        .and_then(|id: Id, session: SessionData, form: Form, state: Arc<State>| {
            update(id, session, form, state, true)
        });

    let delete = warp::path!("recipe" / "recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(remove);

    let upload_image = warp::path!("recipe" / "recipes" / Id / "upload-image")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(warp::multipart::form().max_length(state.config.max_upload_bytes))
        .and(with_state(state))
        .and_then(upload_image);

    list.or(create)
        .unify()
        .or(retrieve)
        .unify()
        .or(put)
        .unify()
        .or(patch)
        .unify()
        .or(delete)
        .unify()
        .or(upload_image)
        .unify()
        .boxed()
}

async fn list(
    session: SessionData,
    query: RecipeQuery,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let filter = query.into_filter()?;
    let recipes = fetch_recipes(session.user_id, &filter, &state.pool).await?;

    Ok(reply(&recipes, StatusCode::OK))
}

fn get_time_minutes(form: &mut Form, required: bool) -> Option<i32> {
    let minutes = form.get_number::<i32>("time_minutes", required)?;
    if minutes < 0 {
        form.error("time_minutes", "Ensure this value is greater than or equal to 0.");
        return None;
    }
    Some(minutes)
}

async fn create(
    session: SessionData,
    mut form: Form,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let title = form.get_str("title", true);
    let time_minutes = get_time_minutes(&mut form, true);
    let price = form.get_price("price", true);
    let link = form.get_text("link", false);
    let tags = form.get_id_list("tags");
    let ingredients = form.get_id_list("ingredients");
    form.finish()?;

    let (Some(title), Some(time_minutes), Some(price)) = (title, time_minutes, price) else {
        return Err(Error::validation("non_field_errors", "Invalid input.").into());
    };

    let recipe = NewRecipe {
        title,
        time_minutes,
        price,
        link: link.unwrap_or_default(),
        tags: tags.unwrap_or_default(),
        ingredients: ingredients.unwrap_or_default(),
    };
    let summary = create_recipe(session.user_id, recipe, &state.pool).await?;

    Ok(reply(&summary, StatusCode::CREATED))
}

async fn retrieve(id: Id, session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    let detail = get_recipe_detail(session.user_id, id, &state.pool).await?;

    Ok(reply(&detail, StatusCode::OK))
}

/// PUT replaces every field, so omitted optional fields fall back to their
/// empty values. PATCH only touches what was sent.
async fn update(
    id: Id,
    session: SessionData,
    mut form: Form,
    state: Arc<State>,
    partial: bool,
) -> Result<Response, Rejection> {
    let mut changes = RecipeChanges {
        title: form.get_str("title", !partial),
        time_minutes: get_time_minutes(&mut form, !partial),
        price: form.get_price("price", !partial),
        link: form.get_text("link", false),
        tags: form.get_id_list("tags"),
        ingredients: form.get_id_list("ingredients"),
    };
    form.finish()?;

    if !partial {
        changes.link.get_or_insert_with(String::new);
        changes.tags.get_or_insert_with(Vec::new);
        changes.ingredients.get_or_insert_with(Vec::new);
    }

    let summary = update_recipe(session.user_id, id, changes, &state.pool).await?;

    Ok(reply(&summary, StatusCode::OK))
}

async fn remove(id: Id, session: SessionData, state: Arc<State>) -> Result<Response, Rejection> {
    let recipe = delete_recipe(session.user_id, id, &state.pool).await?;

    if let Some(image) = &recipe.image {
        remove_media_file(&state.config.media_root, image).await;
    }

    Ok(no_content())
}

async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut data, chunk| async move {
            data.extend_from_slice(chunk.chunk());
            Ok(data)
        })
        .await
}

/// Filename and bytes of the `image` field, if the form has one. Parts are
/// read in order, a part's body is gone once the next one is requested.
async fn image_field(mut form: MultipartData) -> Result<Option<(Option<String>, Vec<u8>)>, Error> {
    let malformed = |_: warp::Error| Error::validation("image", "The submitted data was not a file.");

    while let Some(part) = form.try_next().await.map_err(malformed)? {
        if part.name() != "image" {
            continue;
        }
        let filename = part.filename().map(str::to_string);
        let data = read_part(part).await.map_err(malformed)?;
        return Ok(Some((filename, data)));
    }

    Ok(None)
}

async fn upload_image(
    id: Id,
    session: SessionData,
    form: MultipartData,
    state: Arc<State>,
) -> Result<Response, Rejection> {
    let current = get_recipe(session.user_id, id, &state.pool)
        .await?
        .ok_or(Error::NotFound)?;

    let (filename, data) = image_field(form)
        .await?
        .ok_or_else(|| Error::validation("image", "No file was submitted."))?;

    let media_root = &state.config.media_root;
    let stored = store_recipe_image(media_root, filename.as_deref(), &data).await?;

    if let Err(e) = set_recipe_image(session.user_id, id, &stored, &state.pool).await {
        remove_media_file(media_root, &stored).await;
        return Err(e.into());
    }

    if let Some(previous) = &current.image {
        remove_media_file(media_root, previous).await;
    }

    let detail = get_recipe_detail(session.user_id, id, &state.pool).await?;

    Ok(reply(&detail, StatusCode::OK))
}
