use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use blog::{
    editor::{Draft, ImageUpload, IMAGE_MAX_BYTES, TITLE_MAX_CHARS},
    gate::SIGN_IN_ROUTE,
};
use entity::prelude::*;
use tracing::{info, warn};

use crate::{
    response::{render, WebError},
    templates::{CategoryOption, ConfirmDeleteTemplate, EditorTemplate, Nav},
    WebState,
};

const EDITOR_ROUTE: &str = "/yeni";

pub(super) async fn get_editor(
    State(state): State<WebState>,
    nav: Nav,
) -> Response {
    editor_page(&state, nav, form(&Draft::default()), String::new()).await
}

pub(super) async fn post_editor(
    State(state): State<WebState>,
    nav: Nav,
    multipart: Multipart,
) -> Response {
    let draft = match read_draft(multipart).await {
        Ok(draft) => draft,
        Err(e) => {
            warn!(task = "read editor form", error = e.body_text());
            return WebError::ClientError(e.body_text()).into_response();
        }
    };

    let template = form(&draft);
    match state.shell.editor().submit(draft).await {
        Ok(post) => {
            info!(task = "publish post", id = %post.id);
            Redirect::to("/").into_response()
        }
        Err(blog::Error::NotPrivileged) => {
            Redirect::to(SIGN_IN_ROUTE).into_response()
        }
        Err(e) => {
            let message = e.to_string();
            let status = WebError::from(e).status();
            (status, editor_page(&state, nav, template, message).await)
                .into_response()
        }
    }
}

pub(super) async fn get_delete(
    State(state): State<WebState>,
    nav: Nav,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = id.parse::<PostId>() else {
        return WebError::from(blog::Error::NotFound).into_response();
    };

    match state.shell.manager().request_delete(id).await {
        Ok(confirmation) => render(ConfirmDeleteTemplate {
            nav,
            confirmation,
        }),
        Err(e) => WebError::from(e).into_response(),
    }
}

pub(super) async fn post_delete(
    State(state): State<WebState>,
    nav: Nav,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = id.parse::<PostId>() else {
        return WebError::from(blog::Error::NotFound).into_response();
    };

    match state.shell.manager().confirm_delete(id).await {
        Ok(()) => Redirect::to(EDITOR_ROUTE).into_response(),
        Err(blog::Error::NotPrivileged) => {
            Redirect::to(SIGN_IN_ROUTE).into_response()
        }
        Err(e) => {
            let message = format!("Yazı silinirken hata oluştu: {e}");
            let status = WebError::from(e).status();
            let page =
                editor_page(&state, nav, form(&Draft::default()), message)
                    .await;
            (status, page).into_response()
        }
    }
}

pub(super) async fn cancel_delete(
    State(state): State<WebState>,
    Path(_id): Path<String>,
) -> Redirect {
    state.shell.manager().cancel_delete();

    Redirect::to(EDITOR_ROUTE)
}

/// Old links used `/createpost`.
pub(super) async fn redirect_legacy() -> Redirect {
    Redirect::permanent(EDITOR_ROUTE)
}

/// Form fields echoed back on a failed submit. The image is never echoed.
fn form(draft: &Draft) -> EditorTemplate {
    EditorTemplate {
        title: draft.title.clone(),
        categories: CategoryOption::all(&draft.category),
        content: draft.content.clone(),
        author_name: draft.author_name.clone(),
        author_status: draft.author_status.clone(),
        ..Default::default()
    }
}

async fn editor_page(
    state: &WebState,
    nav: Nav,
    mut template: EditorTemplate,
    error: String,
) -> Response {
    match state.shell.manager().load().await {
        Ok(posts) => template.posts = posts,
        Err(e) => template.archive_error = e.to_string(),
    }

    render(EditorTemplate {
        nav,
        error,
        title_max: TITLE_MAX_CHARS,
        image_max_mb: IMAGE_MAX_BYTES / (1024 * 1024),
        ..template
    })
}

async fn read_draft(mut multipart: Multipart) -> Result<Draft, MultipartError> {
    let mut draft = Draft::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => draft.title = field.text().await?,
            "category" => draft.category = field.text().await?,
            "content" => draft.content = field.text().await?,
            "author_name" => draft.author_name = field.text().await?,
            "author_status" => draft.author_status = field.text().await?,
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type =
                    field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;

                // An empty file input still arrives as a field.
                if !bytes.is_empty() {
                    draft.image = Some(ImageUpload {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(draft)
}
