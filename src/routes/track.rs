//! Tracking pixel endpoint.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

use super::ApiError;

/// 1x1 transparent GIF89a.
pub const PIXEL_GIF: &[u8; 43] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\xff\xff\xff\x00\x00\x00!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

const PIXEL_SUFFIX: &str = ".gif";

/// Request metadata recorded with an open.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClientInfo {
    pub(crate) forwarded_for: Option<String>,
    pub(crate) peer: Option<IpAddr>,
    pub(crate) user_agent: Option<String>,
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Peer address is only present when served with connect info.
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Self {
            forwarded_for: header_text(&parts.headers, "x-forwarded-for"),
            peer,
            user_agent: header_text(&parts.headers, "user-agent"),
        })
    }
}

/// `GET /track/{identifier}.gif`
///
/// Records the open, then answers with the pixel. A storage failure is
/// a server error and no pixel is served.
pub(crate) async fn track_pixel(
    State(state): State<AppState>,
    Path(file): Path<String>,
    client: ClientInfo,
) -> Result<Response, ApiError> {
    let identifier = file
        .strip_suffix(PIXEL_SUFFIX)
        .filter(|identifier| !identifier.is_empty())
        .ok_or_else(|| ApiError::NotFound(format!("tracking pixel '{file}'")))?;

    state
        .service
        .record_open(
            identifier,
            client.forwarded_for.as_deref(),
            client.peer,
            client.user_agent.as_deref(),
        )
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        &PIXEL_GIF[..],
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_is_a_gif89a_trailer_terminated() {
        assert!(PIXEL_GIF.starts_with(b"GIF89a"));
        assert_eq!(PIXEL_GIF.last(), Some(&b';'));
        // 1x1 logical screen
        assert_eq!(&PIXEL_GIF[6..10], &[1, 0, 1, 0]);
    }

    #[tokio::test]
    async fn client_info_reads_headers_and_peer() {
        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header(header::USER_AGENT, "Mail/16.0")
            .body(())
            .unwrap();
        let (mut parts, ()) = request.into_parts();
        let addr: SocketAddr = "192.0.2.10:51000".parse().unwrap();
        parts.extensions.insert(ConnectInfo(addr));

        let info = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(info.forwarded_for.as_deref(), Some("203.0.113.7, 10.0.0.1"));
        assert_eq!(info.user_agent.as_deref(), Some("Mail/16.0"));
        assert_eq!(info.peer, Some(addr.ip()));
    }

    #[tokio::test]
    async fn client_info_tolerates_missing_metadata() {
        let (mut parts, ()) = axum::http::Request::new(()).into_parts();
        let info = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(info.forwarded_for.is_none());
        assert!(info.peer.is_none());
        assert!(info.user_agent.is_none());
    }
}
