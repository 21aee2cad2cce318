use async_trait::async_trait;
use client_core::{ChannelAddress, ClientError, ClientErrorCategory, classify_http_status};
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
};
use tracing::{debug, info};

use crate::transport::{Connection, Connector, Frame};

/// Connector backed by a real WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, address: &ChannelAddress) -> Result<Connection, ClientError> {
        let url = address.url().map_err(|err| {
            ClientError::new(
                ClientErrorCategory::Request,
                "invalid_channel_address",
                err.to_string(),
            )
        })?;

        debug!(url = %address.redacted(), "connecting websocket");
        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(map_ws_error)?;
        info!(url = %address.redacted(), "websocket connected");

        let (ws_sink, ws_stream) = ws.split();
        let sink = ws_sink
            .with(|text: String| future::ready(Ok::<_, tungstenite::Error>(Message::text(text))))
            .sink_map_err(map_ws_error);
        let stream = ws_stream.filter_map(|message| future::ready(frame_from_message(message)));

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

fn frame_from_message(
    message: Result<Message, tungstenite::Error>,
) -> Option<Result<Frame, ClientError>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
        Ok(Message::Binary(bytes)) => Some(Ok(Frame::Binary(bytes.to_vec()))),
        // Control frames are handled by tungstenite; the stream ends after Close.
        Ok(_) => None,
        Err(err) => Some(Err(map_ws_error(err))),
    }
}

fn map_ws_error(err: tungstenite::Error) -> ClientError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status().as_u16();
            ClientError::new(
                classify_http_status(status),
                "websocket_handshake_rejected",
                format!("websocket handshake rejected with status {status}"),
            )
        }
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ClientError::new(
                ClientErrorCategory::Network,
                "websocket_closed",
                err.to_string(),
            )
        }
        tungstenite::Error::Url(_) => ClientError::new(
            ClientErrorCategory::Request,
            "invalid_channel_address",
            err.to_string(),
        ),
        other => ClientError::new(
            ClientErrorCategory::Network,
            "websocket_error",
            other.to_string(),
        ),
    }
}
