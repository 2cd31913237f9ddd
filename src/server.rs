// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The acceptor: binds the listening socket, accepts connections and moves
//! them onto the handoff queue, and reacts to the operator's signals. The
//! listening socket carries 1-second receive/send timeouts so the loop
//! keeps polling the signal bits even when no clients connect.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};

use crate::cache::LruCache;
use crate::queue::RequestQueue;
use crate::session::{Session, IO_TIMEOUT};
use crate::settings::Settings;
use crate::signals;

pub struct Acceptor {
    addr: SocketAddr,
    listener: Socket,
    cache: Arc<LruCache>,
    queue: Arc<RequestQueue<Session>>,
}

impl Acceptor {
    /// Create an `Acceptor` bound to the configured port on all IPv4
    /// interfaces. The listen backlog is the cache size.
    pub fn new(
        settings: &Settings,
        cache: Arc<LruCache>,
        queue: Arc<RequestQueue<Session>>,
    ) -> Result<Self, std::io::Error> {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, settings.port));

        let listener = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        // SO_REUSEADDR so a restart does not trip over TIME_WAIT
        listener.set_reuse_address(true)?;
        // SO_RCVTIMEO bounds accept(); SO_SNDTIMEO is inherited by
        // accepted sockets on Linux but sessions re-apply both anyway
        listener.set_read_timeout(Some(IO_TIMEOUT))?;
        listener.set_write_timeout(Some(IO_TIMEOUT))?;
        listener.bind(&addr.into())?;
        listener.listen(settings.cache_size as i32)?;

        Ok(Self {
            addr,
            listener,
            cache,
            queue,
        })
    }

    /// Accept connections until the server leaves the enabled state. A
    /// pending flush request is honored at the top of each iteration.
    pub fn run(&mut self) {
        info!("running acceptor on: {}", self.addr);

        while signals::enabled() {
            if signals::take_flush_request() {
                self.flush();
            }

            let (socket, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                // timeouts and transient failures both just re-enter the
                // loop; the signal bits get re-checked either way
                Err(_) => continue,
            };

            let peer = match peer.as_socket() {
                Some(peer) => peer,
                None => continue,
            };

            trace!("accepted new session: {}", peer);

            let stream = TcpStream::from(socket);
            match Session::new(stream, peer) {
                Ok(session) => {
                    self.queue.push(session);
                    trace!("{} sessions pending hand-off", self.queue.len());
                }
                Err(e) => error!("error setting up session {}: {}", peer, e),
            }
        }

        debug!("acceptor exiting");
    }

    // flushing happens here, on the acceptor thread, never in signal
    // context
    fn flush(&mut self) {
        let entries = self.cache.len();
        self.cache.clear();
        info!("cache flushed ({} entries dropped)", entries);
        println!("Done!");
    }
}
