// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Digestcache is a concurrent TCP server that answers `get <msg>
//! <delay_ms>` requests with the MD5 digest of `<msg>`, memoized in a
//! bounded LRU cache. A miss computes the digest and sleeps for the
//! client-supplied delay before caching it, so the cache's effect is
//! observable end-to-end; a hit answers immediately.
//!
//! The moving parts are an acceptor thread feeding a FIFO handoff queue,
//! a pool of blocking workers draining it, and a process-wide signal
//! bitfield: `SIGUSR1` flushes the cache, `SIGTERM`/`SIGINT` drain the
//! pool and print the cache contents on the way out.

#[macro_use]
extern crate log;

use std::sync::Arc;
use std::thread::JoinHandle;

mod cache;
pub mod logger;
pub mod md5;
pub mod protocol;
mod queue;
mod server;
mod session;
pub mod settings;
mod signals;
mod worker;

use crate::cache::LruCache;
use crate::queue::RequestQueue;
use crate::server::Acceptor;
use crate::session::Session;
use crate::worker::Worker;

pub use crate::settings::Settings;

const THREAD_PREFIX: &str = "digestcache";

/// A digestcache instance which is not yet running.
pub struct DigestcacheBuilder {
    settings: Settings,
    cache: Arc<LruCache>,
    queue: Arc<RequestQueue<Session>>,
    acceptor: Acceptor,
}

impl DigestcacheBuilder {
    /// Set up signal handling, the shared cache and queue, and the
    /// listening socket.
    ///
    /// This function will terminate the program execution if the socket
    /// cannot be bound.
    pub fn new(settings: Settings) -> Self {
        signals::install();

        let cache = Arc::new(LruCache::new(settings.cache_size));
        let queue = Arc::new(RequestQueue::new());

        let acceptor = Acceptor::new(&settings, cache.clone(), queue.clone()).unwrap_or_else(|e| {
            error!("{}", e);
            std::process::exit(1);
        });

        Self {
            settings,
            cache,
            queue,
            acceptor,
        }
    }

    /// Spawn the worker pool and the acceptor, converting the builder
    /// into a running `Digestcache`.
    pub fn spawn(self) -> Digestcache {
        let mut workers = Vec::with_capacity(self.settings.threads);
        for id in 0..self.settings.threads {
            let mut worker = Worker::new(id, self.cache.clone(), self.queue.clone());
            let handle = std::thread::Builder::new()
                .name(format!("{}_worker{}", THREAD_PREFIX, id))
                .spawn(move || worker.run())
                .unwrap();
            workers.push(handle);
        }

        let mut acceptor = self.acceptor;
        let acceptor = std::thread::Builder::new()
            .name(format!("{}_acceptor", THREAD_PREFIX))
            .spawn(move || acceptor.run())
            .unwrap();

        Digestcache {
            acceptor,
            workers,
            cache: self.cache,
            queue: self.queue,
        }
    }
}

/// A running digestcache.
///
/// For a long-running daemon, call `wait()` to block until termination is
/// signalled. From tests, call `shutdown()` to terminate the threads and
/// block until they are drained.
pub struct Digestcache {
    acceptor: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    cache: Arc<LruCache>,
    queue: Arc<RequestQueue<Session>>,
}

impl Digestcache {
    /// Block until termination is signalled, then drain the pool and
    /// print the farewell: every cached entry in MRU-to-LRU order,
    /// followed by `Bye!`.
    pub fn wait(self) {
        // the acceptor returns once the enabled bit drops
        let _ = self.acceptor.join();

        // one close releases every parked worker; in-flight requests
        // finish normally
        self.queue.close();
        for worker in self.workers {
            let _ = worker.join();
        }

        // workers are joined, so the snapshot is quiescent
        for (key, digest) in self.cache.snapshot() {
            println!("Request: '{}' with hash: '{}'", key, digest);
        }
        println!("Bye!");
        info!("shutdown complete");
    }

    /// Request termination through the same state bits the `SIGTERM`
    /// handler sets, then wait for the drain to finish.
    pub fn shutdown(self) {
        signals::request_termination();
        self.wait()
    }
}
