//! Block cipher engines used by MaxtoCode.

use dotunpack::prelude::*;

const DATA: [u8; 24] = *b"decrypted method bodies!";

#[test]
fn crypt_decrypter() {
    let key = b"0123456789ABCDEF";
    let encrypted = CryptDecrypter::encrypt(key, &DATA).unwrap();
    assert_ne!(encrypted, DATA);
    assert_eq!(CryptDecrypter::decrypt(key, &encrypted).unwrap(), DATA);

    let reference = [
        0x44, 0x60, 0xDF, 0x42, 0x87, 0x04, 0xC9, 0x57, 0xE4, 0x8F, 0x63, 0x34, 0x6F, 0xDC, 0x58,
        0x8C,
    ];
    assert_eq!(CryptDecrypter::decrypt(key, &DATA[..16]).unwrap(), reference);

    assert!(matches!(
        CryptDecrypter::decrypt(b"8 bytes!", &DATA),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        CryptDecrypter::decrypt(key, &DATA[..7]),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn decrypter6() {
    let key = (0..32u8).collect::<Vec<_>>();
    let cipher = Decrypter6::new(&key).unwrap();
    let encrypted = cipher.encrypt_blocks(&DATA).unwrap();
    assert_eq!(cipher.decrypt_blocks(&encrypted).unwrap(), DATA);

    assert!(Decrypter6::new(&key[..31]).is_err());
    assert!(cipher.decrypt_blocks(&DATA[..12]).is_err());
}

#[test]
fn blowfish_key_blob() {
    let blob = b"MaxtoCode key blob\0ignored after the terminator";
    let key = LeBlowfish::derive_key(blob);
    assert_eq!(&key[..18], b"MaxtoCode key blob");
    assert!(key[18..].iter().all(|&b| b == 0));

    let cipher = LeBlowfish::from_key_blob(blob);
    let mut data = DATA;
    cipher.encrypt(&mut data);
    assert_ne!(data, DATA);
    LeBlowfish::new(&key).decrypt(&mut data);
    assert_eq!(data, DATA);
}
