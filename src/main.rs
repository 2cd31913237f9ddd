// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

#[macro_use]
extern crate log;

use backtrace::Backtrace;
use clap::{App, Arg};

use digestcache::fatal;
use digestcache::logger::{Level, Logger};
use digestcache::{DigestcacheBuilder, Settings};

/// The entry point into a running digestcache instance. Parses the
/// command line options and launches the acceptor and worker threads.
fn main() {
    // custom panic hook to terminate whole process after unwinding
    std::panic::set_hook(Box::new(|s| {
        error!("{}", s);
        eprintln!("{:?}", Backtrace::new());
        std::process::exit(101);
    }));

    // initialize logging
    Logger::new()
        .label("digestcache")
        .level(Level::Info)
        .init()
        .expect("Failed to initialize logger");

    // parse command line options
    let matches = App::new(env!("CARGO_BIN_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_about(
            "A concurrent TCP server which responds to each `get <msg> \
            <delay_ms>` request with the MD5 digest of the message, \
            memoizing digests in a bounded LRU cache. On a cache miss the \
            worker sleeps for the requested delay before replying, which \
            makes the cache observable from the client side.",
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .value_name("PORT")
                .help("Port to listen on")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("cache-size")
                .short("C")
                .value_name("AMOUNT")
                .help("Number of entries held by the LRU cache")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("threads")
                .short("t")
                .value_name("AMOUNT")
                .help("Number of threads used as thread pool (8 by default)")
                .takes_value(true),
        )
        .get_matches();

    let port: u16 = match matches.value_of("port").unwrap().parse() {
        Ok(port) if port > 0 => port,
        _ => {
            fatal!("a valid '-p <port>' argument is required");
        }
    };

    let cache_size: usize = match matches.value_of("cache-size").unwrap().parse() {
        Ok(size) if size > 0 => size,
        _ => {
            fatal!("a valid '-C <cache size>' argument is required");
        }
    };

    // an unparseable or out-of-range thread count falls back to the
    // default pool size
    let threads = matches.value_of("threads").and_then(|t| t.parse().ok());

    let settings = Settings::new(port, cache_size, threads);
    info!(
        "port: {} cache_size: {} threads: {}",
        settings.port, settings.cache_size, settings.threads
    );

    // launch digestcache
    DigestcacheBuilder::new(settings).spawn().wait()
}
