// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A `Worker` pulls accepted sessions off the handoff queue, reads a
//! single request from each, answers it, and closes the connection.
//! Per-session failures are soft: the worker logs, closes, and moves on
//! to the next session. Nothing a client does can take a worker down.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::LruCache;
use crate::md5;
use crate::protocol::{Request, MAX_REQUEST_SIZE, RESPONSE_INVALID, RESPONSE_TIMEOUT, RESPONSE_TOO_LONG};
use crate::queue::RequestQueue;
use crate::session::Session;
use crate::signals;

pub struct Worker {
    id: usize,
    cache: Arc<LruCache>,
    queue: Arc<RequestQueue<Session>>,
}

impl Worker {
    pub fn new(id: usize, cache: Arc<LruCache>, queue: Arc<RequestQueue<Session>>) -> Self {
        Self { id, cache, queue }
    }

    /// Serve sessions until shutdown. Returns when the queue reports
    /// closed or the server leaves the enabled state.
    pub fn run(&mut self) {
        trace!("worker {} running", self.id);
        while signals::enabled() {
            match self.queue.pop_blocking() {
                Some(session) => self.handle_session(session),
                None => break,
            }
        }
        trace!("worker {} exiting", self.id);
    }

    fn handle_session(&mut self, mut session: Session) {
        let bytes = match session.receive() {
            Ok(0) => {
                // peer went away without sending anything
                session.close();
                return;
            }
            Ok(bytes) if bytes > MAX_REQUEST_SIZE => {
                session.drain();
                let _ = session.send(RESPONSE_TOO_LONG);
                session.close();
                return;
            }
            Ok(bytes) => bytes,
            Err(e) if Session::is_timeout(&e) => {
                let _ = session.send(RESPONSE_TIMEOUT);
                session.close();
                return;
            }
            Err(e) => {
                trace!("error reading from session {}: {}", session.addr(), e);
                session.close();
                return;
            }
        };

        let request = match Request::parse(session.payload(bytes)) {
            Ok(request) => request,
            Err(e) => {
                debug!("invalid request from {}: {}", session.addr(), e);
                let _ = session.send(RESPONSE_INVALID);
                session.close();
                return;
            }
        };

        let digest = self.lookup(&request);

        if session.send(digest.as_bytes()).is_ok() {
            let _ = session.send(b"\n");
        }
        session.close();
    }

    // On a miss the digest is computed and the worker sleeps for the
    // client-supplied delay before installing the entry. The sleep stands
    // in for expensive work; it never happens under a lock or on a hit.
    fn lookup(&self, request: &Request) -> String {
        if let Some(digest) = self.cache.get(&request.msg) {
            trace!("cache hit: '{}'", request.msg);
            return digest;
        }

        let digest = md5::hex_digest(request.msg.as_bytes());
        std::thread::sleep(Duration::from_millis(request.delay_ms));
        self.cache.put(&request.msg, digest.clone());
        digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    fn worker_fixture(capacity: usize) -> (Worker, Arc<LruCache>, Arc<RequestQueue<Session>>) {
        let cache = Arc::new(LruCache::new(capacity));
        let queue = Arc::new(RequestQueue::new());
        (Worker::new(0, cache.clone(), queue.clone()), cache, queue)
    }

    // run one request through a worker over a real socket pair
    fn roundtrip(worker: &mut Worker, request: &[u8]) -> Vec<u8> {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, addr) = listener.accept().unwrap();

        client.write_all(request).unwrap();
        worker.handle_session(Session::new(stream, addr).unwrap());

        let mut response = Vec::new();
        client.read_to_end(&mut response).unwrap();
        response
    }

    #[test]
    fn answers_with_the_digest() {
        let (mut worker, _cache, _queue) = worker_fixture(2);
        let response = roundtrip(&mut worker, b"get hello 0\n");
        assert_eq!(response, b"5d41402abc4b2a76b9719d911017c592\n");
    }

    #[test]
    fn miss_populates_the_cache() {
        let (mut worker, cache, _queue) = worker_fixture(2);
        roundtrip(&mut worker, b"get test1 0\n");
        assert_eq!(
            cache.get("test1"),
            Some("5a105e8b9d40e1329780d62ea2265d8a".to_string())
        );
    }

    #[test]
    fn hit_skips_the_delay() {
        let (mut worker, cache, _queue) = worker_fixture(2);
        cache.put("test1", md5::hex_digest(b"test1"));

        let start = std::time::Instant::now();
        let response = roundtrip(&mut worker, b"get test1 2000\n");
        assert_eq!(response, b"5a105e8b9d40e1329780d62ea2265d8a\n");
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn rejects_invalid_request() {
        let (mut worker, cache, _queue) = worker_fixture(2);
        let response = roundtrip(&mut worker, b"put foo 0\n");
        assert_eq!(response, RESPONSE_INVALID);
        assert!(cache.is_empty());
    }

    #[test]
    fn rejects_oversized_request() {
        let (mut worker, _cache, _queue) = worker_fixture(2);
        let response = roundtrip(&mut worker, &vec![b'x'; 5000]);
        assert_eq!(response, RESPONSE_TOO_LONG);
    }

    #[test]
    fn run_exits_on_queue_close() {
        let (mut worker, _cache, queue) = worker_fixture(2);
        let handle = std::thread::spawn(move || worker.run());
        queue.close();
        handle.join().unwrap();
    }
}
