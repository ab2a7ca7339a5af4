// Signing & verification benchmarks for Trinity call envelopes.
//
// Covers Ed25519 keypair generation, raw message signing and
// verification, and envelope sign/verify at increasing payload sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use trinity_protocol::{Envelope, TrinityKeypair};

const CHAIN_ID: u64 = 31337;

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("ed25519/keypair_generate", |b| {
        b.iter(TrinityKeypair::generate);
    });
}

fn bench_sign_message(c: &mut Criterion) {
    let keypair = TrinityKeypair::generate();
    let message = b"enlist_employer value=1000000000000000 nonce=42";

    c.bench_function("ed25519/sign_message", |b| {
        b.iter(|| keypair.sign(message));
    });
}

fn bench_verify_signature(c: &mut Criterion) {
    let keypair = TrinityKeypair::generate();
    let message = b"enlist_employer value=1000000000000000 nonce=42";
    let signature = keypair.sign(message);
    let public_key = keypair.public_key();

    c.bench_function("ed25519/verify_signature", |b| {
        b.iter(|| public_key.verify(message, &signature));
    });
}

fn bench_envelope(c: &mut Criterion) {
    let keypair = TrinityKeypair::generate();
    let mut group = c.benchmark_group("envelope/sign_verify");

    for size in [16usize, 256, 4096] {
        let payload = "x".repeat(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                let env = Envelope::signed(&keypair, CHAIN_ID, 7, 0, payload.clone())
                    .expect("sign");
                env.verify().expect("verify")
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_sign_message,
    bench_verify_signature,
    bench_envelope,
);
criterion_main!(benches);
