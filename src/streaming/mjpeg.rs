// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! MJPEG frame encoding and the viewer HTTP server

use anyhow::Result;
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use base64::Engine as _;
use bytes::{BufMut, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::error::{ImageError, ParameterError, ParameterErrorKind};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};

use crate::capture::Frame;
use crate::error::EncodeError;

/// Multipart boundary between frames
pub const BOUNDARY: &str = "frame";

/// Response content type of every viewer route
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Turns annotated frames into transport-ready bytes
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn encode_jpeg(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(EncodeError(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            ))));
        }
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.quality).encode_image(frame)?;
        Ok(buffer)
    }

    /// One boundary-delimited multipart part
    pub fn encode_chunk(&self, frame: &Frame) -> Result<Bytes, EncodeError> {
        Ok(multipart_chunk(&self.encode_jpeg(frame)?))
    }

    /// `data:image/jpeg;base64,...` for inline images in events
    pub fn encode_data_uri(&self, frame: &Frame) -> Result<String, EncodeError> {
        let jpeg = self.encode_jpeg(frame)?;
        Ok(format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(jpeg)
        ))
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(80)
    }
}

/// Wrap one JPEG as `--frame\r\nContent-Type: image/jpeg\r\n\r\n<jpeg>\r\n`
pub fn multipart_chunk(jpeg: &[u8]) -> Bytes {
    let mut chunk = BytesMut::with_capacity(jpeg.len() + 48);
    chunk.put_slice(b"--");
    chunk.put_slice(BOUNDARY.as_bytes());
    chunk.put_slice(b"\r\nContent-Type: image/jpeg\r\n\r\n");
    chunk.put_slice(jpeg);
    chunk.put_slice(b"\r\n");
    chunk.freeze()
}

/// Encoded output of one pipeline, fanned out to its viewers
///
/// Viewers see chunks published after they attached. A viewer that falls
/// behind skips the frames it missed.
#[derive(Clone)]
pub struct FrameFeed {
    name: Arc<str>,
    tx: broadcast::Sender<Bytes>,
}

impl FrameFeed {
    pub fn new(name: &str, buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            name: Arc::from(name),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of viewers the chunk reached
    pub fn publish(&self, chunk: Bytes) -> usize {
        self.tx.send(chunk).unwrap_or(0)
    }

    pub fn viewer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Lazy, unbounded chunk sequence starting now
    pub fn viewer_stream(&self) -> impl Stream<Item = Bytes> + Send + 'static {
        let name = self.name.clone();
        futures::stream::unfold(self.tx.subscribe(), move |mut rx| {
            let name = name.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(chunk) => return Some((chunk, rx)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            trace!("Viewer of {} skipped {} frames", name, skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        })
    }
}

/// Serves each [`FrameFeed`] as an MJPEG stream on its own path
pub struct ViewerServer {
    port: u16,
    routes: HashMap<String, FrameFeed>,
}

/// State of one viewer route
#[derive(Clone)]
struct ViewerRoute {
    feed: FrameFeed,
    /// Ends open viewer streams so graceful shutdown can complete
    shutdown: broadcast::Sender<()>,
}

impl ViewerServer {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            routes: HashMap::new(),
        }
    }

    pub fn route(mut self, path: &str, feed: FrameFeed) -> Self {
        self.routes.insert(path.to_string(), feed);
        self
    }

    fn router(self, viewers_tx: &broadcast::Sender<()>) -> Router {
        let mut app = Router::new();
        for (path, feed) in self.routes {
            debug!("Viewer route {}", path);
            let route = ViewerRoute {
                feed,
                shutdown: viewers_tx.clone(),
            };
            app = app.route(&path, get(stream_feed).with_state(route));
        }
        app
    }

    /// Bind and serve in the background; returns the bound address
    pub async fn start(self, mut shutdown: broadcast::Receiver<()>) -> Result<SocketAddr> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;

        let (viewers_tx, _) = broadcast::channel::<()>(1);
        let app = self.router(&viewers_tx);

        info!("Viewer server listening on http://{}", local);

        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                info!("Viewer server shutting down");
                let _ = viewers_tx.send(());
            });

            if let Err(e) = server.await {
                error!("Viewer server failed: {}", e);
            }
        });

        Ok(local)
    }
}

async fn stream_feed(State(route): State<ViewerRoute>) -> Response {
    let mut shutdown = route.shutdown.subscribe();
    let chunks = route
        .feed
        .viewer_stream()
        .take_until(async move {
            let _ = shutdown.recv().await;
        })
        .map(Ok::<_, Infallible>);

    info!(
        "Viewer attached to {} ({} watching)",
        route.feed.name(),
        route.feed.viewer_count()
    );

    (
        [
            (header::CONTENT_TYPE, MJPEG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Body::from_stream(chunks),
    )
        .into_response()
}
