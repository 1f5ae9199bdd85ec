use std::path::{Path, PathBuf};

use clap::{arg, crate_version, Command};
use log::LevelFilter;
use nexas_pac::pac::{self, Options};
use nexas_pac::script;

const RCH: &str = "unreachable was reached";

/// `pack`/`pack-bfe` default to `<source>.pac`; `pack-script` defaults to
/// `<source>.bin`. `unpack`/`unpack-script` default to `<source>` with its
/// last extension removed (or `_` appended if it has none).
fn default_target(source: &Path, op: &str) -> PathBuf {
    match op {
        "pack" | "pack-bfe" => {
            let mut out = source.as_os_str().to_owned();
            out.push(".pac");
            PathBuf::from(out)
        }
        "pack-script" => {
            let mut out = source.as_os_str().to_owned();
            out.push(".bin");
            PathBuf::from(out)
        }
        _ => match source.extension() {
            Some(_) => source.with_extension(""),
            None => {
                let mut out = source.as_os_str().to_owned();
                out.push("_");
                PathBuf::from(out)
            }
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let long_help = "\
Examples:
---------
Pack a directory into an archive with a deflated+obfuscated index:
    nexas-pac pack assets assets.pac
Pack with a plain LZSS-compressed index instead:
    nexas-pac pack-bfe assets assets.pac
Unpack an archive:
    nexas-pac unpack assets.pac assets
Extract a compiled script's text for translation:
    nexas-pac unpack-script scene01.bin scene01
Reinject a translated transcript:
    nexas-pac pack-script scene01 scene01_translated.bin";

    let ops = ["pack", "pack-bfe", "unpack", "pack-script", "unpack-script"];

    let mut main_cmd = Command::new("nexas-pac")
        .about("Pack/unpack NeXaS PAC archives, and extract/reinject NeXaS script text")
        .after_long_help(long_help)
        .version(crate_version!())
        .arg(arg!(-q --quiet "only report errors").conflicts_with("verbose"))
        .arg(arg!(-v --verbose "report every codec and placement decision"));

    for op in ops {
        main_cmd = main_cmd.subcommand(
            Command::new(op)
                .arg(arg!(<source> "source path").required(true))
                .arg(arg!([target] "target path (defaults are derived from source)")),
        );
    }

    let matches = main_cmd.get_matches();

    let level = if matches.get_flag("quiet") {
        LevelFilter::Error
    } else if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new().filter_level(level).init();

    for op in ops {
        if let Some(cmd) = matches.subcommand_matches(op) {
            let source = PathBuf::from(cmd.get_one::<String>("source").expect(RCH));
            let target = cmd
                .get_one::<String>("target")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_target(&source, op));

            match op {
                "pack" => pac::pack_deflate(&source, &target, &Options::default())?,
                "pack-bfe" => pac::pack_lzss(&source, &target)?,
                "unpack" => pac::unpack(&source, &target)?,
                "pack-script" => {
                    script::reinject(
                        &source.join("script.txt"),
                        &source.join("head.bin"),
                        &source.join("tail.bin"),
                        &target,
                    )?;
                }
                "unpack-script" => {
                    let stats = script::extract(&source, &target)?;
                    log::info!(
                        "extracted {} segments ({} flagged NOT-TEXT) into {}",
                        stats.segment_count,
                        stats.not_text_count,
                        target.display()
                    );
                }
                _ => unreachable!("{RCH}"),
            }
            return Ok(());
        }
    }

    eprintln!("no operation given; try --help");
    std::process::exit(1);
}
