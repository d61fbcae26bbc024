use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use super::error::ClientError;
use crate::models::{ClientMessage, ConnectionId, ServerMessage};

/// A client's end of the real-time channel
pub struct CollabConnection {
    connection_id: ConnectionId,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
    shutdown: Option<oneshot::Sender<()>>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl CollabConnection {
    /// Open the channel at `url` (e.g. `ws://localhost:5000/ws`) and wait
    /// for the server to announce this connection's identity
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _response) = connect_async(url).await?;
        let (mut sink, mut stream) = socket.split();

        let connection_id = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerMessage>(text.as_str())? {
                        ServerMessage::Connected(connected) => break connected.connection_id,
                        other => debug!("Ignoring {:?} before connected", other),
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Err(ClientError::ChannelClosed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        };

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (incoming_tx, incoming) = mpsc::unbounded_channel::<ServerMessage>();
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = outgoing_rx.recv() => {
                        let Some(message) = message else { break };
                        let text = match serde_json::to_string(&message) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("Failed to serialize {:?}: {}", message, e);
                                continue;
                            }
                        };
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            return;
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(text.as_str()) {
                        Ok(message) => {
                            if incoming_tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Ignoring malformed server message: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("Channel read error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            connection_id,
            outgoing,
            incoming,
            shutdown: Some(shutdown),
            writer,
            reader,
        })
    }

    /// Identity the server assigned to this channel
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// A handle for queueing events, e.g. for a [`super::sync::DocumentSync`]
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.outgoing.clone()
    }

    pub fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.outgoing.send(message).map_err(|_| ClientError::ChannelClosed)
    }

    /// Next event from the server, `None` once the channel is closed
    pub async fn next_event(&mut self) -> Option<ServerMessage> {
        self.incoming.recv().await
    }

    /// Close the channel with a close frame
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.writer).await;
        self.reader.abort();
    }
}

impl Drop for CollabConnection {
    fn drop(&mut self) {
        self.writer.abort();
        self.reader.abort();
    }
}
