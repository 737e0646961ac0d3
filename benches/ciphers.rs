//! Benchmarks for the block ciphers and resource decrypters.

extern crate dotunpack;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use dotunpack::{
    cipher::{CryptDecrypter, Decrypter6, LeBlowfish},
    deobfuscation::obfuscators::{reactor::EncryptedResource, ResourceDecrypter},
    utils::quicklz::decompress_quicklz,
};
use std::hint::black_box;

const SIZE: usize = 64 * 1024;

fn bench_block_ciphers(c: &mut Criterion) {
    let data = (0..SIZE).map(|i| i as u8).collect::<Vec<_>>();
    let key = (0..32u8).collect::<Vec<_>>();

    let mut group = c.benchmark_group("block_ciphers");
    group.throughput(Throughput::Bytes(SIZE as u64));

    let crypt = CryptDecrypter::new(&key[..16]).unwrap();
    group.bench_function("crypt_decrypter", |b| {
        b.iter(|| black_box(crypt.decrypt_blocks(black_box(&data)).unwrap()));
    });

    let decrypter6 = Decrypter6::new(&key).unwrap();
    group.bench_function("decrypter6", |b| {
        b.iter(|| black_box(decrypter6.decrypt_blocks(black_box(&data)).unwrap()));
    });

    let blowfish = LeBlowfish::from_key_blob(b"benchmark key blob");
    group.bench_function("blowfish_le", |b| {
        b.iter(|| {
            let mut buffer = data.clone();
            blowfish.decrypt(black_box(&mut buffer));
            black_box(buffer)
        });
    });
    group.finish();
}

fn bench_resources(c: &mut Criterion) {
    let data = (0..SIZE).map(|i| (i % 251) as u8).collect::<Vec<_>>();

    let resource = EncryptedResource::new(&[0x42; 32], &[0x24; 16]).unwrap();
    let encrypted = resource.encrypt(&data).unwrap();

    let mut stored = vec![0u8; 32];
    stored[0..4].copy_from_slice(b"QCLZ");
    stored[8..12].copy_from_slice(&((SIZE + 36) as i32).to_le_bytes());
    stored[12..16].copy_from_slice(&(SIZE as i32).to_le_bytes());
    stored.extend_from_slice(&data);
    stored.extend_from_slice(b"QCLZ");

    let mut group = c.benchmark_group("resources");
    group.throughput(Throughput::Bytes(SIZE as u64));
    group.bench_function("reactor_aes", |b| {
        b.iter(|| black_box(resource.decrypt(black_box(&encrypted)).unwrap()));
    });
    group.bench_function("quicklz_stored", |b| {
        b.iter(|| black_box(decompress_quicklz(black_box(&stored)).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_block_ciphers, bench_resources);
criterion_main!(benches);
