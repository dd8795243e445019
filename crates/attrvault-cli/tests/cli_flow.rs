use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_attrvault"))
}

const FIDO_KEY_HEX: &str = "be6b0ec7fc550d54e7dc2fbaed4bcdaa3424db01dbe36d1558e7af62338a7215\
                            c8b1f137aa60b271a8e01ba10d4a5bcfea71115cfd5f4bcaedc66e714bfe3021\
                            467d78e78e608c3b6845fe353327399b";

#[test]
fn test_keygen_produces_hex_key() {
    let output = Command::new(bin())
        .args(["keygen"])
        .output()
        .expect("keygen should run");
    assert!(output.status.success());
    let key = String::from_utf8(output.stdout).expect("stdout should be utf8");
    let raw = hex::decode(key.trim()).expect("output should be hex");
    assert_eq!(raw.len(), 32);
}

#[test]
fn test_keygen_rejects_short_key() {
    let output = Command::new(bin())
        .args(["keygen", "--bytes", "16"])
        .output()
        .expect("keygen should run");
    assert!(!output.status.success());
}

#[test]
fn test_encrypt_decrypt_round_trip() {
    let key = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

    let encrypted = Command::new(bin())
        .args(["--key", key, "encrypt", "top secret", "--attribute", "note"])
        .output()
        .expect("encrypt should run");
    assert!(encrypted.status.success());

    let mut decrypt = Command::new(bin())
        .args(["--key", key, "decrypt", "--attribute", "note"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("decrypt should spawn");
    decrypt
        .stdin
        .as_mut()
        .expect("stdin should be piped")
        .write_all(&encrypted.stdout)
        .expect("write should succeed");
    let output = decrypt.wait_with_output().expect("decrypt should finish");
    assert!(output.status.success());
    let plain = String::from_utf8(output.stdout).expect("stdout should be utf8");
    assert_eq!(plain.trim_end(), "top secret");
}

#[test]
fn test_decrypt_legacy_triple() {
    let output = Command::new(bin())
        .args([
            "--key",
            FIDO_KEY_HEX,
            "decrypt",
            "E4lJTxFG/EfkfPg5MpnriQ==",
            "--iv",
            "z4Q8deE4h7f6S8NNZcbPNg==",
            "--salt",
            "adcd833001a873db",
            "--insecure",
        ])
        .output()
        .expect("decrypt should run");
    assert!(output.status.success());
    let plain = String::from_utf8(output.stdout).expect("stdout should be utf8");
    assert_eq!(plain.trim_end(), "Fido the Dog");
}

#[test]
fn test_decrypt_wrong_key_fails() {
    let wrong = "ff112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
    let output = Command::new(bin())
        .args([
            "--key",
            wrong,
            "decrypt",
            "E4lJTxFG/EfkfPg5MpnriQ==",
            "--iv",
            "z4Q8deE4h7f6S8NNZcbPNg==",
            "--salt",
            "adcd833001a873db",
        ])
        .output()
        .expect("decrypt should run");
    assert!(!output.status.success());
}

#[test]
fn test_missing_key_is_an_error() {
    let output = Command::new(bin())
        .env_remove("ATTRVAULT_KEY")
        .args(["encrypt", "x"])
        .output()
        .expect("encrypt should run");
    assert!(!output.status.success());
}
