// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: database path
fn db_path_arg() -> Arg {
    Arg::new("db_path")
        .short('d')
        .long("db-path")
        .value_name("PATH")
        .default_value("/var/lib/conary/conary.db")
        .help("Database path")
}

/// Common argument: install root directory
fn root_arg() -> Arg {
    Arg::new("root")
        .short('r')
        .long("root")
        .default_value("/")
        .help("Install root directory")
}

fn build_cli() -> Command {
    Command::new("conary")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Conary Contributors")
        .about("Transaction engine for RPM-based package installs")
        .subcommand_required(false)
        .subcommand(
            Command::new("init")
                .about("Initialize the record-store database")
                .arg(db_path_arg()),
        )
        .subcommand(
            Command::new("install")
                .about("Install an RPM package")
                .arg(Arg::new("package_path").required(true).help("Path to the RPM file"))
                .arg(db_path_arg())
                .arg(root_arg())
                .arg(
                    Arg::new("upgrade")
                        .long("upgrade")
                        .action(clap::ArgAction::SetTrue)
                        .help("Allow replacing an already-installed version"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("conary.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
