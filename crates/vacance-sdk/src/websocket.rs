//! WebSocket transport backed by `tokio-tungstenite`.

use futures::future::{self, BoxFuture};
use futures::{FutureExt, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use crate::error::SdkError;
use crate::transport::{Connector, FrameSink, FrameStream};

/// [`Connector`] speaking WebSocket (`ws://` and `wss://`).
///
/// Text frames are passed through. Binary frames are decoded lossily as
/// UTF-8. Control frames are handled by the protocol layer and never
/// surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<(FrameSink, FrameStream), SdkError>> {
        let url = url.to_string();
        async move {
            let (socket, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
            debug!(%url, status = %response.status(), "websocket handshake complete");

            let (write, read) = socket.split();

            let sink: FrameSink = Box::pin(
                write
                    .with(|text: String| future::ready(Ok::<_, tungstenite::Error>(Message::Text(text))))
                    .sink_map_err(SdkError::from),
            );

            let stream: FrameStream = Box::pin(read.filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Binary(bytes)) => {
                        Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(SdkError::from(e))),
                })
            }));

            Ok((sink, stream))
        }
        .boxed()
    }
}
