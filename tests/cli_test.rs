use assert_cmd::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

type STDRESULT = Result<(), Box<dyn std::error::Error>>;

#[test]
fn pack_then_unpack_round_trips_variant4() -> STDRESULT {
    let src = tempdir()?;
    fs::write(src.path().join("a.ogg"), [0x01, 0x02, 0x03])?;
    fs::write(src.path().join("b.dat"), vec![0x55u8; 1024])?;

    let archive = src.path().join("a.pac");
    Command::cargo_bin("nexas-pac")?
        .arg("pack")
        .arg(src.path())
        .arg(&archive)
        .assert()
        .success();

    let dest = tempdir()?;
    Command::cargo_bin("nexas-pac")?
        .arg("unpack")
        .arg(&archive)
        .arg(dest.path())
        .assert()
        .success();

    assert_eq!(fs::read(dest.path().join("a.ogg"))?, vec![0x01, 0x02, 0x03]);
    assert_eq!(fs::read(dest.path().join("b.dat"))?, vec![0x55u8; 1024]);
    Ok(())
}

#[test]
fn pack_bfe_then_unpack_round_trips_variant1() -> STDRESULT {
    let src = tempdir()?;
    fs::write(src.path().join("x.dat"), vec![0u8; 1024])?;

    let archive = src.path().join("a.pac");
    Command::cargo_bin("nexas-pac")?
        .arg("pack-bfe")
        .arg(src.path())
        .arg(&archive)
        .assert()
        .success();

    let dest = tempdir()?;
    Command::cargo_bin("nexas-pac")?
        .arg("unpack")
        .arg(&archive)
        .arg(dest.path())
        .assert()
        .success();

    assert_eq!(fs::read(dest.path().join("x.dat"))?, vec![0u8; 1024]);
    Ok(())
}

#[test]
fn unpack_defaults_target_to_source_without_extension() -> STDRESULT {
    let src = tempdir()?;
    fs::write(src.path().join("x.dat"), b"hi")?;
    let archive = src.path().join("bundle.pac");
    Command::cargo_bin("nexas-pac")?
        .arg("pack")
        .arg(src.path())
        .arg(&archive)
        .assert()
        .success();

    Command::cargo_bin("nexas-pac")?
        .current_dir(src.path())
        .arg("unpack")
        .arg(&archive)
        .assert()
        .success();

    assert_eq!(fs::read(src.path().join("bundle").join("x.dat"))?, b"hi");
    Ok(())
}

#[test]
fn pack_fails_on_missing_source_directory() -> STDRESULT {
    let dest = tempdir()?;
    Command::cargo_bin("nexas-pac")?
        .arg("pack")
        .arg(dest.path().join("does-not-exist"))
        .arg(dest.path().join("out.pac"))
        .assert()
        .failure();
    Ok(())
}

#[test]
fn script_extract_then_reinject_round_trips() -> STDRESULT {
    let dir = tempdir()?;
    let mut script = Vec::new();
    script.extend_from_slice(&0u64.to_le_bytes());
    script.extend_from_slice(b"hello\0");
    script.push(0xFF);
    script.extend_from_slice(b"TAIL");
    let script_path = dir.path().join("scene.bin");
    fs::write(&script_path, &script)?;

    let extracted = dir.path().join("scene");
    Command::cargo_bin("nexas-pac")?
        .arg("unpack-script")
        .arg(&script_path)
        .arg(&extracted)
        .assert()
        .success();
    assert!(extracted.join("script.txt").exists());

    let rebuilt = dir.path().join("scene_rebuilt.bin");
    Command::cargo_bin("nexas-pac")?
        .arg("pack-script")
        .arg(&extracted)
        .arg(&rebuilt)
        .assert()
        .success();

    assert_eq!(fs::read(rebuilt)?, script);
    Ok(())
}
