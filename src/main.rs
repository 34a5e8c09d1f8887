use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use untar_light::{decode, FileEntry, UntarWorker, WorkerConfig};

/// untar_light
#[derive(Debug, Parser)]
#[clap(name = "untar_light", version)]
struct App {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List files in a tar archive
    List {
        tarfile: PathBuf,
        /// Prepended to every file name
        #[clap(long)]
        prefix: Option<String>,
        /// Decode on a worker thread
        #[clap(long)]
        worker: bool,
        /// Print entries as JSON
        #[clap(long)]
        json: bool,
    },
    /// Write the content of one file in a tar archive to stdout
    Cat { tarfile: PathBuf, name: String },
}

fn main() -> Result<()> {
    env_logger::init();

    let args = App::parse();
    match args.cmd {
        Command::List {
            tarfile,
            prefix,
            worker,
            json,
        } => {
            let files = if worker {
                decode_on_worker(&tarfile, prefix)?
            } else {
                let tar_data = read(&tarfile)?;
                decode(&tar_data, prefix.as_deref())?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                print_table(&tarfile, &files);
            }
        }
        Command::Cat { tarfile, name } => {
            let tar_data = read(&tarfile)?;
            let files = decode(&tar_data, None)?;
            let Some(file) = files.iter().find(|f| f.name.as_deref() == Some(name.as_str())) else {
                bail!("{name} not found in {}", tarfile.display());
            };
            if let Some(content) = &file.content {
                std::io::stdout().write_all(content.as_bytes())?;
            }
        }
    }
    Ok(())
}

fn read(tarfile: &Path) -> Result<Vec<u8>> {
    fs::read(tarfile).with_context(|| format!("reading {}", tarfile.display()))
}

fn decode_on_worker(tarfile: &Path, prefix: Option<String>) -> Result<Vec<FileEntry>> {
    let tar_data = read(tarfile)?;
    let mut config = WorkerConfig::new();
    if let Some(prefix) = prefix {
        config = config.prefix(prefix);
    }
    let mut worker = UntarWorker::new(config)?;

    let result = Rc::new(RefCell::new(None));
    let slot = result.clone();
    worker.submit(tar_data, move |files| {
        *slot.borrow_mut() = Some(files);
    })?;
    worker.wait();
    worker.destroy();

    let files = result.borrow_mut().take();
    match files {
        Some(files) => Ok(files?),
        None => bail!("untar worker produced no result"),
    }
}

fn print_table(tarfile: &Path, files: &[FileEntry]) {
    println!("Files in {}:", tarfile.display());
    println!("{:>10}  {:>10}  {}", "Size", "Start", "Name");
    println!("{}", "-".repeat(50));
    for file in files {
        println!(
            "{:>10}  {:>10}  {}",
            file.size,
            file.start,
            file.name.as_deref().unwrap_or("<unnamed>")
        );
    }
    println!("\nTotal: {} file(s)", files.len());
}
