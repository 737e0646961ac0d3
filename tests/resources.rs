//! Resource decryption across all supported protectors.
//!
//! Every product envelope is built here with the public cipher helpers, then unwrapped through
//! the shared [`ResourceDecrypter`] interface.

use std::io::Write;

use dotunpack::{
    prelude::*,
    utils::crypto::{aes_encrypt, des_encrypt, public_key_token},
};
use flate2::{write::DeflateEncoder, Compression};

const PLAIN: &[u8] =
    b"\xCE\xCA\xEF\xBE resources header followed by a payload that compresses well well well";

const DES_KEY: [u8; 8] = [0x13, 0x37, 0xC0, 0xDE, 0x01, 0x02, 0x03, 0x04];
const DES_IV: [u8; 8] = [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7];

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn crypto_obfuscator_resource(key: &[u8; 8], encrypt_key: &[u8]) -> Vec<u8> {
    let inverted = PLAIN.iter().map(|b| !b).collect::<Vec<_>>();
    let mut data = vec![1 | 2 | 4];
    data.extend_from_slice(&DES_IV);
    data.extend_from_slice(key);
    data.extend(des_encrypt(encrypt_key, &DES_IV, &deflate(&inverted)).unwrap());
    data
}

fn smartassembly_resource() -> Vec<u8> {
    let mut zipped = 0x017D_7A7Bu32.to_le_bytes().to_vec();
    zipped.extend_from_slice(&(PLAIN.len() as i32).to_le_bytes());
    let compressed = deflate(PLAIN);
    zipped.extend_from_slice(&(compressed.len() as i32).to_le_bytes());
    zipped.extend_from_slice(&(PLAIN.len() as i32).to_le_bytes());
    zipped.extend(compressed);

    let mut data = 0x027D_7A7Bu32.to_le_bytes().to_vec();
    data.extend(des_encrypt(&DES_KEY, &DES_IV, &zipped).unwrap());
    data
}

fn babel_resource() -> Vec<u8> {
    let mut data = vec![8];
    data.extend_from_slice(&DES_IV);
    data.push(1);
    data.push(8);
    data.extend_from_slice(&DES_KEY);
    data.extend_from_slice(&0i32.to_le_bytes());
    data.extend(des_encrypt(&DES_KEY, &DES_IV, &deflate(PLAIN)).unwrap());
    data
}

#[test]
fn all_products() {
    let reactor = EncryptedResource::new(&[0x77; 32], &[0x33; 16]).unwrap();
    let cases: Vec<(&str, Box<dyn ResourceDecrypter>, Vec<u8>)> = vec![
        (
            "Crypto Obfuscator",
            Box::new(CoResourceDecrypter::new(None)),
            crypto_obfuscator_resource(&DES_KEY, &DES_KEY),
        ),
        (
            "SmartAssembly",
            Box::new(SaResourceDecrypter::new().with_des(&DES_KEY, &DES_IV)),
            smartassembly_resource(),
        ),
        (
            "Babel.NET",
            Box::new(BabelResourceDecrypter::new(None)),
            babel_resource(),
        ),
        (
            ".NET Reactor",
            Box::new(reactor.clone()),
            reactor.encrypt(PLAIN).unwrap(),
        ),
    ];

    for (product, decrypter, data) in cases {
        assert_eq!(decrypter.decrypt(&data).unwrap(), PLAIN, "{}", product);
    }
}

#[test]
fn crypto_obfuscator_public_key_token() {
    let public_key = (0..160u8).collect::<Vec<_>>();
    let token = public_key_token(&public_key);
    let data = crypto_obfuscator_resource(&[0; 8], &token);

    assert_eq!(
        CoResourceDecrypter::new(Some(&token[..])).decrypt(&data).unwrap(),
        PLAIN
    );
    match CoResourceDecrypter::new(None).decrypt(&data) {
        Err(Error::InvalidArgument(message)) => {
            assert_eq!(message, "PublicKeyToken is null, can't decrypt resources")
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn smartassembly_layers() {
    let zip = 0x0403_4B50u32.to_le_bytes();
    assert!(matches!(
        SaResourceDecrypter::new().decrypt(&zip),
        Err(Error::NotSupported)
    ));

    let aes_key = [9u8; 32];
    let aes_iv = [4u8; 16];
    let mut data = 0x037D_7A7Bu32.to_le_bytes().to_vec();
    data.extend(aes_encrypt(&aes_key, &aes_iv, &smartassembly_resource()).unwrap());

    let decrypter = SaResourceDecrypter::new()
        .with_des(&DES_KEY, &DES_IV)
        .with_aes(&aes_key, &aes_iv);
    assert_eq!(decrypter.decrypt(&data).unwrap(), PLAIN);
    assert!(SaResourceDecrypter::new()
        .with_des(&DES_KEY, &DES_IV)
        .decrypt(&data)
        .is_err());
}
