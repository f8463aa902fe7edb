// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conary::db;
use conary::filesystem::FileDeployer;
use conary::header::{Header, TagValue, WellKnownTag};
use conary::packages::rpm::RpmPackage;
use conary::packages::traits::{DependencyType, PackageFormat};
use conary::problem::ProblemFilter;
use conary::transaction::TransactionEngine;
use tracing::info;

#[derive(Parser)]
#[command(name = "conary")]
#[command(author, version, about = "Transaction engine for RPM-based package installs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the record-store database
    Init {
        #[arg(short, long, default_value = "/var/lib/conary/conary.db")]
        db_path: String,
    },
    /// Install an RPM package
    Install {
        package_path: String,
        #[arg(short, long, default_value = "/var/lib/conary/conary.db")]
        db_path: String,
        #[arg(long, default_value = "/")]
        root: String,
        #[arg(long)]
        upgrade: bool,
    },
}

/// Build the tag header the transaction engine operates on from an already
/// parsed RPM's metadata. The RPM parser reads its manifest through the
/// `rpm` crate and the `rpm`/`cpio` helper binaries; this just re-expresses
/// what it found in tag form.
fn header_from_rpm(pkg: &RpmPackage) -> Result<Header> {
    let mut header = Header::new();
    header.put(
        WellKnownTag::Name.id(),
        TagValue::String(pkg.name().to_string()),
    )?;
    header.put(
        WellKnownTag::Version.id(),
        TagValue::String(pkg.version().to_string()),
    )?;
    if let Some(arch) = pkg.architecture() {
        header.put(WellKnownTag::Arch.id(), TagValue::String(arch.to_string()))?;
    }
    if let Some(desc) = pkg.description() {
        header.put(
            WellKnownTag::Description.id(),
            TagValue::String(desc.to_string()),
        )?;
    }

    let base_names: Vec<String> = pkg
        .files()
        .iter()
        .map(|f| {
            std::path::Path::new(&f.path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| f.path.clone())
        })
        .collect();
    let dir_names: Vec<String> = pkg
        .files()
        .iter()
        .map(|f| {
            std::path::Path::new(&f.path)
                .parent()
                .map(|p| format!("{}/", p.to_string_lossy()))
                .unwrap_or_else(|| "/".to_string())
        })
        .collect();
    let dir_indexes: Vec<i32> = (0..pkg.files().len() as i32).collect();
    let modes: Vec<i32> = pkg.files().iter().map(|f| f.mode).collect();
    let digests: Vec<String> = pkg
        .files()
        .iter()
        .map(|f| f.sha256.clone().unwrap_or_default())
        .collect();

    if !base_names.is_empty() {
        header.put(WellKnownTag::BaseNames.id(), TagValue::StringArray(base_names))?;
        header.put(WellKnownTag::DirNames.id(), TagValue::StringArray(dir_names))?;
        header.put(WellKnownTag::DirIndexes.id(), TagValue::Int32(dir_indexes))?;
        header.put(WellKnownTag::FileModes.id(), TagValue::Int32(modes))?;
        header.put(WellKnownTag::FileDigests.id(), TagValue::StringArray(digests))?;
    }

    let requires: Vec<&str> = pkg
        .dependencies()
        .iter()
        .filter(|d| d.dep_type == DependencyType::Runtime)
        .map(|d| d.name.as_str())
        .collect();
    if !requires.is_empty() {
        header.put(
            WellKnownTag::RequireName.id(),
            TagValue::StringArray(requires.into_iter().map(String::from).collect()),
        )?;
    }

    Ok(header)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { db_path }) => {
            info!("Initializing record-store database at: {}", db_path);
            db::open_and_migrate(&db_path)?;
            println!("Database initialized successfully at: {}", db_path);
            Ok(())
        }
        Some(Commands::Install {
            package_path,
            db_path,
            root,
            upgrade,
        }) => {
            info!("Installing package: {}", package_path);

            let rpm = RpmPackage::parse(&package_path)
                .with_context(|| format!("failed to parse {}", package_path))?;
            let header = header_from_rpm(&rpm)?;

            let conn = db::open_and_migrate(&db_path)?;
            let deployer = FileDeployer::new(
                std::path::Path::new(&db_path)
                    .parent()
                    .unwrap_or(std::path::Path::new("/var/lib/conary"))
                    .join("objects"),
                std::path::PathBuf::from(&root),
            )?;

            let mut engine = TransactionEngine::new();
            let code = engine.add_install(&conn, header, None, upgrade)?;
            if code == conary::transaction::ADD_ALREADY_INSTALLED {
                println!("{} is already installed", rpm.name());
                return Ok(());
            }

            let unresolved = engine.check(&conn)?;
            if unresolved > 0 {
                for problem in engine.problems() {
                    if !problem.ignored {
                        eprintln!("problem: {}", problem);
                    }
                }
                anyhow::bail!("{} unresolved problem(s), aborting install", unresolved);
            }

            engine.order();
            engine.run(&conn, &deployer, &ProblemFilter::default())?;

            println!("Installed package: {} version {}", rpm.name(), rpm.version());
            println!("  Files: {}", rpm.files().len());
            println!("  Dependencies: {}", rpm.dependencies().len());
            Ok(())
        }
        None => {
            println!("Conary Package Manager v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'conary --help' for usage information");
            Ok(())
        }
    }
}
