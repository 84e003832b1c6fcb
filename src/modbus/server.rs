// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the promonitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP connection server
//!
//! Accepts TCP connections and dedicates one tokio task to each. A
//! connection loops reading one frame, resolving the requested register
//! range against the shared [`SensorStore`], and writing the framed
//! response, so requests on one connection are always answered in order.
//! Connections share no state with each other beyond the store handle.
//!
//! Error policy: malformed or short frames are logged and the offending
//! connection is dropped without a response; unsupported function codes
//! are answered with an exception frame and the connection stays open;
//! store-level errors never reach the wire (the affected range reads as
//! zeros). Nothing here can take the process down.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::modbus::frame::{
    self, FrameError, MbapHeader, EXCEPTION_ILLEGAL_DATA_VALUE, EXCEPTION_ILLEGAL_FUNCTION,
};
use crate::sensor::SensorStore;

/// Largest PDU the server will read: function code + 252 data bytes.
const MAX_PDU_LEN: usize = 253;

/// The register server's listening socket.
pub struct ModbusServer {
    listener: TcpListener,
}

impl ModbusServer {
    /// Bind the listening socket. The server moves to `Running` only when
    /// [`ModbusServer::serve`] is awaited.
    pub async fn bind(address: &str, port: u16) -> Result<Self> {
        let bind_addr = format!("{}:{}", address, port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind Modbus server to {}", bind_addr))?;
        info!("Modbus server listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    /// Address the listener is bound to; useful when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read Modbus listener address")
    }

    /// Accept connections until `shutdown` flips to true.
    ///
    /// Stopping closes the listening socket (no new connections) while
    /// in-flight connection tasks run to completion on their own.
    pub async fn serve(
        self,
        store: Arc<SensorStore>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as a shutdown request.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Modbus listener stopping");
                        return Ok(());
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!("Modbus client connected: {}", peer);
                            let store = store.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, peer, store).await;
                                debug!("Modbus client disconnected: {}", peer);
                            });
                        }
                        Err(e) => {
                            // Accept failures are transient (fd pressure,
                            // aborted handshakes); keep serving.
                            warn!("Modbus accept error: {}", e);
                        }
                    }
                }
            }
        }
    }
}

/// Serve one connection until the peer disconnects or sends garbage.
async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, store: Arc<SensorStore>) {
    let mut header_buf = [0u8; MbapHeader::SIZE];
    let mut pdu_buf = [0u8; MAX_PDU_LEN];

    loop {
        match stream.read_exact(&mut header_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return,
            Err(e) => {
                warn!("Modbus read error from {}: {}", peer, e);
                return;
            }
        }
        let Some(header) = MbapHeader::from_bytes(&header_buf) else {
            return;
        };

        let pdu_len = usize::from(header.length.saturating_sub(1));
        if pdu_len == 0 || pdu_len > MAX_PDU_LEN {
            warn!(
                "Dropping {}: invalid frame length {} from header",
                peer, header.length
            );
            return;
        }
        if let Err(e) = stream.read_exact(&mut pdu_buf[..pdu_len]).await {
            warn!("Dropping {}: incomplete frame ({})", peer, e);
            return;
        }

        let mut request = Vec::with_capacity(MbapHeader::SIZE + pdu_len);
        request.extend_from_slice(&header_buf);
        request.extend_from_slice(&pdu_buf[..pdu_len]);

        let response = match frame::parse_request(&request) {
            Ok(req) => {
                let words = match store.read_register_range(req.start_address, req.count) {
                    Ok(words) => words,
                    Err(e) => {
                        // The wire has no representation for store errors;
                        // serve zeros and keep the connection alive.
                        warn!("Store unavailable for {}: {}", peer, e);
                        vec![0u16; usize::from(req.count)]
                    }
                };
                frame::build_read_response(
                    req.header.transaction_id,
                    req.header.unit_id,
                    &words,
                )
            }
            Err(FrameError::UnsupportedFunction { header, code }) => {
                debug!("Unsupported function 0x{:02x} from {}", code, peer);
                frame::build_exception(
                    header.transaction_id,
                    header.unit_id,
                    code,
                    EXCEPTION_ILLEGAL_FUNCTION,
                )
                .to_vec()
            }
            Err(FrameError::CountOutOfRange { header, count }) => {
                debug!("Register count {} out of range from {}", count, peer);
                frame::build_exception(
                    header.transaction_id,
                    header.unit_id,
                    frame::FC_READ_HOLDING_REGISTERS,
                    EXCEPTION_ILLEGAL_DATA_VALUE,
                )
                .to_vec()
            }
            Err(e) => {
                warn!("Dropping {}: {}", peer, e);
                return;
            }
        };

        if let Err(e) = stream.write_all(&response).await {
            warn!("Modbus write error to {}: {}", peer, e);
            return;
        }
    }
}
