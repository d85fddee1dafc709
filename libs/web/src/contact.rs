use axum::{extract::State, response::Response};

use crate::{
    response::render,
    templates::{ContactTemplate, Nav},
    WebState,
};

pub(super) async fn get_contact(
    State(state): State<WebState>,
    nav: Nav,
) -> Response {
    render(ContactTemplate {
        nav,
        instagram_url: state.site.instagram_url.clone(),
        form_action: state.site.contact_form_action.clone(),
    })
}
