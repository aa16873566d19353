// clap 2 trips this lint on recent compilers
#![allow(dangerous_implicit_autorefs)]

use std::io;

use clap::{
    crate_authors, crate_description, crate_name, crate_version, App, AppSettings, Arg, SubCommand,
};
use frayfs::{dump, extract, list, ImageBuilder};
use frayfs::frayfs_core::DEFAULT_VOLUME_NAME;

fn app() -> App<'static, 'static> {
    let arg_image = Arg::with_name("image")
        .help("Image file")
        .required(true)
        .value_name("IMAGE");

    App::new(crate_name!())
        .author(crate_authors!(", "))
        .about(crate_description!())
        .version(crate_version!())
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Build an image from a directory")
                .arg(
                    Arg::with_name("source")
                        .help("Directory to archive, created if missing")
                        .required(true)
                        .value_name("DIR"),
                )
                .arg(&arg_image)
                .arg(
                    Arg::with_name("volume")
                        .help("Volume name stored in the superblock")
                        .short("v")
                        .long("volume")
                        .takes_value(true)
                        .value_name("NAME")
                        .default_value(DEFAULT_VOLUME_NAME),
                ),
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("List the files of an image")
                .arg(&arg_image),
        )
        .subcommand(
            SubCommand::with_name("extract")
                .about("Extract every file of an image")
                .arg(&arg_image)
                .arg(
                    Arg::with_name("output")
                        .help("Directory to extract to (defaults to 'extracted')")
                        .value_name("DIR")
                        .default_value("extracted"),
                ),
        )
        .subcommand(
            SubCommand::with_name("dump")
                .about("Hex dump the structure of an image")
                .arg(&arg_image),
        )
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = app().get_matches();

    let stdout = io::stdout();
    if let Some(matches) = matches.subcommand_matches("build") {
        let mut builder = ImageBuilder::new();
        builder.volume_name(matches.value_of("volume").unwrap_or(DEFAULT_VOLUME_NAME));
        let source = matches.value_of("source").unwrap_or_default();
        let image = matches.value_of("image").unwrap_or_default();
        if builder.build(source, image)?.is_none() {
            println!("Created empty source directory {}, nothing to build", source);
        }
    } else if let Some(matches) = matches.subcommand_matches("list") {
        list(matches.value_of("image").unwrap_or_default(), stdout.lock())?;
    } else if let Some(matches) = matches.subcommand_matches("extract") {
        let report = extract(
            matches.value_of("image").unwrap_or_default(),
            matches.value_of("output").unwrap_or_default(),
        )?;
        let mismatches = report.mismatches().count();
        if mismatches > 0 {
            println!("{} of {} files failed checksum verification", mismatches, report.files.len());
        }
    } else if let Some(matches) = matches.subcommand_matches("dump") {
        dump(matches.value_of("image").unwrap_or_default(), stdout.lock())?;
    }

    Ok(())
}
