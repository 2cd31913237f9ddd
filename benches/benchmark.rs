// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use digestcache::{DigestcacheBuilder, Settings};

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

fn hit_benchmark(c: &mut Criterion) {
    // launch the server
    let _server = DigestcacheBuilder::new(Settings::new(14742, 64, Some(4))).spawn();

    // wait for server to startup. duration is chosen to be longer than
    // we'd expect startup to take in a slow ci environment.
    std::thread::sleep(Duration::from_secs(2));

    // prime the cache so the measured path is a pure hit
    let mut buffer = vec![0; 4096];
    roundtrip(b"get benchmark 0\n", &mut buffer);

    // define a benchmarking group and duration
    let mut group = c.benchmark_group("request");
    group.measurement_time(Duration::from_secs(30));
    group.throughput(Throughput::Elements(1));

    let expected = format!("{}\n", digestcache::md5::hex_digest(b"benchmark"));

    // each iteration is a full connect/request/response/close cycle, the
    // way real clients use the server
    group.bench_function("get/hit", |b| {
        b.iter(|| {
            let response = roundtrip(b"get benchmark 0\n", &mut buffer);
            if response != expected.as_bytes() {
                panic!("invalid response");
            }
        })
    });

    group.finish();
}

fn md5_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("md5");
    group.throughput(Throughput::Bytes(4096));
    let input = vec![0xa5u8; 4096];

    group.bench_function("hex_digest/4k", |b| {
        b.iter(|| digestcache::md5::hex_digest(&input))
    });

    group.finish();
}

fn roundtrip(request: &[u8], buffer: &mut [u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect("127.0.0.1:14742").expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("failed to set read timeout");
    assert!(stream.write(request).is_ok());

    let mut response = Vec::new();
    loop {
        match stream.read(buffer) {
            Ok(0) => break,
            Ok(bytes) => response.extend_from_slice(&buffer[..bytes]),
            Err(_) => panic!("read error"),
        }
    }
    response
}

criterion_group!(benches, hit_benchmark, md5_benchmark);
criterion_main!(benches);
