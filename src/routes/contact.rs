//! Contact form intake.

use std::convert::Infallible;

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use maud::{html, Markup, DOCTYPE};
use serde::Serialize;
use tracing::warn;

use crate::models::{ContactForm, ContactSubmission};
use crate::state::AppState;

use super::ApiError;

/// A contact form body in any accepted encoding.
///
/// Bodies that fail to parse become an empty form: every field is
/// optional and the submission is still stored.
#[derive(Debug)]
pub(crate) struct SubmissionPayload {
    pub(crate) form: ContactForm,
    pub(crate) wants_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Multipart,
    Urlencoded,
}

fn body_kind(headers: &HeaderMap) -> BodyKind {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") {
        BodyKind::Json
    } else if mime == "multipart/form-data" {
        BodyKind::Multipart
    } else {
        BodyKind::Urlencoded
    }
}

/// Collect the text parts of a multipart body. File parts are skipped; a
/// broken part ends the read but keeps what was collected before it.
async fn read_multipart(mut multipart: Multipart) -> ContactForm {
    let mut fields = Vec::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.file_name().is_some() {
                    continue;
                }
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                match field.text().await {
                    Ok(text) => fields.push((name, text)),
                    Err(err) => {
                        warn!(error = %err, field = %name, "unreadable multipart field");
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "unreadable multipart submission");
                break;
            }
        }
    }

    ContactForm::from_fields(fields)
}

impl<S> FromRequest<S> for SubmissionPayload
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let kind = body_kind(req.headers());

        let form = match kind {
            BodyKind::Json => match Json::<ContactForm>::from_request(req, state).await {
                Ok(Json(form)) => form,
                Err(rejection) => {
                    warn!(error = %rejection.body_text(), "unreadable JSON submission, storing empty form");
                    ContactForm::default()
                }
            },
            BodyKind::Multipart => match Multipart::from_request(req, state).await {
                Ok(multipart) => read_multipart(multipart).await,
                Err(rejection) => {
                    warn!(error = %rejection.body_text(), "unreadable multipart submission, storing empty form");
                    ContactForm::default()
                }
            },
            BodyKind::Urlencoded => match Form::<ContactForm>::from_request(req, state).await {
                Ok(Form(form)) => form,
                Err(rejection) => {
                    warn!(error = %rejection.body_text(), "unreadable form submission, storing empty form");
                    ContactForm::default()
                }
            },
        };

        Ok(Self {
            form,
            wants_json: kind == BodyKind::Json,
        })
    }
}

#[derive(Debug, Serialize)]
struct SubmissionResponse {
    success: bool,
    message: &'static str,
}

const RECEIVED_MESSAGE: &str = "Formulario recibido correctamente";

/// `POST /formulario`
///
/// JSON callers get a JSON acknowledgement, form posts get a confirmation
/// page. Notification runs in the background and never affects the reply.
pub(crate) async fn submit_form(
    State(state): State<AppState>,
    payload: SubmissionPayload,
) -> Result<Response, ApiError> {
    let receipt = state.service.submit_contact(payload.form).await?;

    if payload.wants_json {
        return Ok(Json(SubmissionResponse {
            success: true,
            message: RECEIVED_MESSAGE,
        })
        .into_response());
    }

    Ok(Html(confirmation_page(&receipt.submission).into_string()).into_response())
}

fn confirmation_page(submission: &ContactSubmission) -> Markup {
    html! {
        (DOCTYPE)
        html lang="es" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Solicitud recibida" }
            }
            body {
                main {
                    h1 { "¡Gracias!" }
                    p {
                        "Hemos recibido tu solicitud"
                        @if let Some(name) = &submission.contact_name {
                            ", " (name)
                        }
                        "."
                    }
                    @if let Some(organization) = &submission.organization {
                        p { "Institución: " strong { (organization) } }
                    }
                    p { "Nos pondremos en contacto contigo pronto." }
                }
            }
        }
    }
}
