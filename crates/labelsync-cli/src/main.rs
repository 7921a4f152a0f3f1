// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, PasswordDisplayMode};
use labelsync::{
    Client, Error, FileKeyStorage, ImportReport, KeyStorage, LocalDataset, Parser as _, Progress,
    Settings, UploadOptions, coco::CocoParser,
};
use log::debug;
use std::path::PathBuf;
use tokio::{sync::mpsc, task::JoinHandle};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Annotation service URL
    #[clap(long, env = "LABELSYNC_SERVER")]
    server: Option<String>,

    /// API key, falls back to the configured or stored key
    #[clap(long, env = "LABELSYNC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

/// Remote dataset and split an upload targets.
#[derive(clap::Args, PartialEq, Clone, Debug)]
struct Target {
    /// Remote dataset name, created if it does not exist
    #[clap(long)]
    dataset: String,

    /// Dataset split: /train, /test or /val
    #[clap(long)]
    split: Option<String>,

    /// Upload the image files before importing annotations
    #[clap(long)]
    push_images: bool,
}

/// Local images and annotations directories.
#[derive(clap::Args, PartialEq, Clone, Debug)]
struct Directories {
    /// Images directory
    #[clap(long)]
    images: PathBuf,

    /// Normalized annotations directory
    #[clap(long)]
    annotations: PathBuf,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Verify an API key and store it for later commands.
    Login,
    /// Remove the stored API key.
    Logout,
    /// Show the team the API key belongs to.
    Whoami,
    /// Upload every image and annotation file of a local dataset.
    Upload {
        #[clap(flatten)]
        dirs: Directories,
        #[clap(flatten)]
        target: Target,
    },
    /// Upload an explicit list of image and annotation files.
    UploadFiles {
        #[clap(flatten)]
        target: Target,

        /// Image file, may be repeated
        #[clap(long = "image")]
        images: Vec<PathBuf>,

        /// Annotation file, may be repeated
        #[clap(long = "annotation", required = true)]
        annotations: Vec<PathBuf>,
    },
    /// Upload the first N annotation files and the images they name.
    UploadSample {
        #[clap(flatten)]
        dirs: Directories,
        #[clap(flatten)]
        target: Target,

        /// Number of annotation files to upload
        #[clap(long, default_value_t = 10)]
        samples: usize,
    },
    /// Convert a foreign annotation format into normalized files.
    Convert {
        #[command(subcommand)]
        format: Format,
    },
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Format {
    /// COCO instances JSON file, directory of JSON files, or ZIP archive.
    Coco {
        input: PathBuf,
        #[clap(flatten)]
        dirs: Directories,

        /// Dataset name recorded with the output
        #[clap(long)]
        dataset: String,

        /// Dataset split: /train, /test or /val
        #[clap(long)]
        split: Option<String>,
    },
}

fn api_key(args: &Args) -> Result<String, Error> {
    if let Some(key) = &args.api_key {
        return Ok(key.clone());
    }
    if let Some(key) = Settings::load()?.api_key {
        debug!("Using API key from settings");
        return Ok(key);
    }
    match FileKeyStorage::new()?.load()? {
        Some(key) => {
            debug!("Using stored API key");
            Ok(key)
        }
        None => Err(Error::EmptyApiKey),
    }
}

/// Draws import progress until every sender is dropped.
fn progress_bar() -> Result<(mpsc::Sender<Progress>, JoinHandle<()>), Error> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise} ETA: {eta}] {msg}: {wide_bar:.yellow} {human_pos}/{human_len}",
        )
        .map_err(|e| Error::InvalidArgument(e.to_string()))?
        .progress_chars("█▇▆▅▄▃▂▁  "),
    );
    bar.set_message("Importing");

    let (tx, mut rx) = mpsc::channel::<Progress>(1);
    let task = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            if progress.total > 0 {
                bar.set_length(progress.total as u64);
                bar.set_position(progress.current as u64);
            }
        }
        bar.finish();
    });

    Ok((tx, task))
}

fn client(args: &Args) -> Result<Client, Error> {
    let client = Client::new()?;
    match &args.server {
        Some(server) => client.with_server(server),
        None => Ok(client),
    }
}

fn local_dataset(dirs: Option<&Directories>, target: &Target) -> Result<LocalDataset, Error> {
    let (images, annotations) = match dirs {
        Some(dirs) => (dirs.images.clone(), dirs.annotations.clone()),
        None => (PathBuf::from("."), PathBuf::from(".")),
    };
    LocalDataset::new(images, annotations, &target.dataset, target.split.as_deref())
}

async fn handle_login(client: &Client, api_key: Option<String>) -> Result<(), Error> {
    let api_key = match api_key {
        Some(api_key) => api_key,
        None => Password::new("API Key")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .map_err(|e| Error::InvalidArgument(e.to_string()))?,
    };

    let client = client.with_api_key(&api_key).await?;
    let storage = FileKeyStorage::new()?;
    storage.store(&api_key)?;

    println!("Logged into {} as team {}", client.server(), client.team());
    println!("API key stored in {}", storage.path().display());
    Ok(())
}

fn handle_logout() -> Result<(), Error> {
    FileKeyStorage::new()?.clear()?;
    println!("Stored API key removed");
    Ok(())
}

async fn handle_whoami(client: &Client, api_key: &str) -> Result<(), Error> {
    let client = client.with_api_key(api_key).await?;
    println!("{}", client.team());
    Ok(())
}

enum Selection {
    All,
    Files {
        images: Vec<PathBuf>,
        annotations: Vec<PathBuf>,
    },
    Sample(usize),
}

async fn handle_upload(
    client: &Client,
    args: &Args,
    local: LocalDataset,
    push_images: bool,
    selection: Selection,
) -> Result<(), Error> {
    let api_key = api_key(args)?;
    let (tx, bar) = progress_bar()?;
    let local = local.with_options(UploadOptions {
        push_images,
        progress: Some(tx),
    });

    let report: Result<ImportReport, Error> = match selection {
        Selection::All => local.upload(client, &api_key).await,
        Selection::Files {
            images,
            annotations,
        } => {
            local
                .upload_from_files(client, &api_key, &images, &annotations)
                .await
        }
        Selection::Sample(n) => local.upload_sample(client, &api_key, n).await,
    };

    drop(local);
    let _ = bar.await;

    println!("{}", report?);
    Ok(())
}

fn handle_convert(format: Format) -> Result<(), Error> {
    match format {
        Format::Coco {
            input,
            dirs,
            dataset,
            split,
        } => {
            let local =
                LocalDataset::new(dirs.images, dirs.annotations, &dataset, split.as_deref())?;
            let parser = CocoParser::new(local);
            let written = parser.parse(&input)?;
            println!(
                "Wrote {} annotation files to {}",
                written,
                parser.local().annotation_dir().display()
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.cmd.clone() {
        Command::Logout => handle_logout(),
        Command::Convert { format } => handle_convert(format),
        Command::Login => handle_login(&client(&args)?, args.api_key.clone()).await,
        Command::Whoami => handle_whoami(&client(&args)?, &api_key(&args)?).await,
        Command::Upload { dirs, target } => {
            let local = local_dataset(Some(&dirs), &target)?;
            let client = client(&args)?;
            handle_upload(&client, &args, local, target.push_images, Selection::All).await
        }
        Command::UploadFiles {
            target,
            images,
            annotations,
        } => {
            let local = local_dataset(None, &target)?;
            let client = client(&args)?;
            let selection = Selection::Files {
                images,
                annotations,
            };
            handle_upload(&client, &args, local, target.push_images, selection).await
        }
        Command::UploadSample {
            dirs,
            target,
            samples,
        } => {
            let local = local_dataset(Some(&dirs), &target)?;
            let client = client(&args)?;
            handle_upload(
                &client,
                &args,
                local,
                target.push_images,
                Selection::Sample(samples),
            )
            .await
        }
    }
}
