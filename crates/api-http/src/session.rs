//! Session cookie middleware
//!
//! Every request gets a `SessionId` extension. A missing or malformed cookie is replaced
//! by a freshly minted token, which is persisted on the response.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use mediapress_core::domain::SessionId;
use mediapress_core::port::IdProvider;
use std::sync::Arc;
use tracing::debug;

pub const SESSION_COOKIE: &str = "session_id";

pub async fn session_middleware(
    State(ids): State<Arc<dyn IdProvider>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let existing = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| SessionId::parse(cookie.value()));

    match existing {
        Some(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        None => {
            let session = ids.generate_session_id();
            debug!(session = %session, "Minted new session");
            req.extensions_mut().insert(session.clone());
            let response = next.run(req).await;
            (jar.add(session_cookie(&session)), response).into_response()
        }
    }
}

fn session_cookie(session: &SessionId) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.as_str().to_owned()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}
