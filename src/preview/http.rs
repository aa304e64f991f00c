//! HTTP transport for the preview server, built on `tiny_http`.

use super::server::PreviewServer;
use crate::log;
use anyhow::{Result, anyhow};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    thread::{self, JoinHandle},
};
use tiny_http::{Header, Request, Response, Server};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// A bound listener and the thread accepting on it.
pub struct Listener {
    server: Arc<Server>,
    addr: SocketAddr,
    accept: Option<JoinHandle<()>>,
}

impl Listener {
    /// Bind `interface:port` (or the next free port) and start accepting.
    pub fn start(preview: Arc<PreviewServer>, interface: &str, port: u16) -> Result<Self> {
        let interface: IpAddr = interface
            .parse()
            .map_err(|err| anyhow!("invalid interface `{interface}`: {err}"))?;
        let (server, addr) = try_bind_port(interface, port, MAX_PORT_RETRIES)?;
        let server = Arc::new(server);

        let accept = {
            let server = Arc::clone(&server);
            thread::Builder::new()
                .name("thicket-http".into())
                .spawn(move || accept_loop(&server, &preview))?
        };

        Ok(Self {
            server,
            addr,
            accept: Some(accept),
        })
    }

    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and wait for the accept thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.server.unblock();
        if let Some(accept) = self.accept.take()
            && accept.join().is_err()
        {
            log!("error"; "http accept thread panicked");
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(server: &Server, preview: &Arc<PreviewServer>) {
    for request in server.incoming_requests() {
        let preview = Arc::clone(preview);
        // requests may block on a running reload
        let spawned = thread::Builder::new()
            .name("thicket-request".into())
            .spawn(move || {
                if let Err(err) = respond(request, &preview) {
                    log!("preview"; "request error: {err}");
                }
            });
        if let Err(err) = spawned {
            log!("error"; "failed to spawn request thread: {err}");
        }
    }
}

fn respond(request: Request, preview: &PreviewServer) -> Result<()> {
    let reply = preview.handle(request.url());
    let content_type = Header::from_bytes("Content-Type", reply.content_type.as_bytes())
        .map_err(|()| anyhow!("invalid content type `{}`", reply.content_type))?;

    let response = Response::from_data(reply.body)
        .with_status_code(reply.status)
        .with_header(content_type);
    request.respond(response)?;
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("preview"; "port {} in use, using {} instead", base_port, port);
                }
                // port 0 asks the OS for a free port
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, addr));
            }
            Err(err) => last_error = Some(err),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map_or_else(|| "no attempts made".to_owned(), |err| err.to_string())
    ))
}
