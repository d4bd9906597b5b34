use crate::error::Result;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

pub const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Socket to the Live service, TLS-wrapped for `wss://` endpoints.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the authenticated stream URL. The API key travels as the `key` query parameter.
///
/// # Errors
/// Returns an error if `endpoint` is not a valid URL.
#[allow(clippy::result_large_err)]
pub fn live_url(endpoint: &str, api_key: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

/// Establish a WebSocket connection to the Live API.
///
/// # Errors
/// Returns an error if the URL is invalid or the handshake fails.
pub async fn connect(endpoint: &str, api_key: &str) -> Result<WsStream> {
    let url = live_url(endpoint, api_key)?;
    let (stream, response) = connect_async(url.as_str()).await?;
    tracing::info!(
        host = url.host_str().unwrap_or_default(),
        status = %response.status(),
        "Connected to Gemini Live"
    );
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_url_appends_key() {
        let url = live_url(LIVE_ENDPOINT, "secret").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.query(), Some("key=secret"));
    }

    #[test]
    fn live_url_rejects_garbage() {
        assert!(live_url("not a url", "k").is_err());
    }
}
