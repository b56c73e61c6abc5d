mod config;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use folio_model::{FolderAccess, FolderHandle, NamespaceKind, SpecialFolderKind};
use folio_store::{Alerts, Credentials, ImapStore, MailStore, MemoryRemote};

use config::*;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Talk to a built-in demo remote instead of the configured one
    #[clap(long)]
    dev: bool,

    #[clap(short, long, env = "FOLIO_CONFIG", default_value = "folio.toml")]
    /// Path to the Folio configuration file
    config_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the personal, shared and other users namespaces
    Namespaces,
    /// Resolve a folder path
    Folder { path: String },
    /// Look up the folder playing a special role (inbox, sent, trash...)
    Special { kind: SpecialFolderKind },
    /// List the folders below one namespace, or below all of them
    List {
        /// Prefix of the namespace to list
        prefix: Option<String>,
        #[clap(long)]
        subscribed: bool,
    },
    /// Open a folder and print its status
    Open {
        path: String,
        #[clap(long)]
        read_only: bool,
    },
    /// Print the alerts sent by the remote until interrupted
    Alerts,
}

#[cfg(tokio_unstable)]
fn tracer() {
    console_subscriber::init();
}

#[cfg(not(tokio_unstable))]
fn tracer() {
    tracing_subscriber::fmt::init();
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "main=info,folio=info,folio_store=info")
    }

    // Abort on panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{}", panic_info);
        eprintln!("{:?}", backtrace::Backtrace::new());
        std::process::abort();
    }));

    tracer();

    let args = Args::parse();
    let config = if args.dev {
        Config::dev()
    } else {
        read_config(args.config_file.clone()).context(format!(
            "unable to read configuration file {}",
            args.config_file.display()
        ))?
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            on_interrupt.cancel();
        }
    });

    let remote = MemoryRemote::new(config.remote.clone());
    let store = ImapStore::with_alert_queue(remote.transport(), config.session.alert_queue);
    let mut alerts = store.alerts();

    store.connect(&cancel).await.context("connect to the remote")?;
    let credentials = Credentials::new(
        config.account.username.clone(),
        config.account.password.clone(),
    );
    store
        .authenticate(&credentials, &cancel)
        .await
        .context("authenticate")?;

    if config.session.quick_resync {
        match store.enable_quick_resync(&cancel).await {
            Ok(()) => (),
            Err(e) if e.is_expected() => tracing::warn!(err=%e, "quick resync unavailable"),
            Err(e) => return Err(e).context("enable quick resync"),
        }
    }

    let res = run(&store, args.command, &mut alerts, &cancel).await;
    print_alerts(&mut alerts);

    if let Err(e) = store.disconnect(&CancellationToken::new()).await {
        tracing::warn!(err=%e, "logout failed");
    }
    store.dispose();
    res
}

async fn run<S: MailStore>(
    store: &S,
    command: Command,
    alerts: &mut Alerts,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Command::Namespaces => {
            for kind in NamespaceKind::ALL {
                let collection = store.namespaces(kind)?;
                for ns in collection.iter() {
                    println!(
                        "{}\t{:?}\t{}",
                        kind,
                        ns.prefix(),
                        ns.delimiter().map(String::from).unwrap_or_else(|| "NIL".into())
                    );
                }
            }
        }
        Command::Folder { path } => {
            let folder = store
                .get_folder(&path, cancel)
                .await
                .context(format!("resolve {}", path))?;
            print_folder(&folder);
        }
        Command::Special { kind } => match store.get_special_folder(kind)? {
            Some(folder) => print_folder(&folder),
            None => println!("{}: not provided by the remote", kind),
        },
        Command::List { prefix, subscribed } => {
            let mut namespaces = vec![];
            for kind in NamespaceKind::ALL {
                let collection = store.namespaces(kind)?;
                namespaces.extend(
                    collection
                        .iter()
                        .filter(|ns| prefix.as_deref().map_or(true, |p| ns.prefix() == p))
                        .cloned(),
                );
            }
            if let (Some(p), true) = (&prefix, namespaces.is_empty()) {
                bail!("no namespace with prefix {:?}", p);
            }

            for ns in namespaces.iter() {
                let folders = store
                    .get_folders(ns, subscribed, cancel)
                    .await
                    .context(format!("list namespace {:?}", ns.prefix()))?;
                for folder in folders.iter() {
                    println!("{}\t{}", folder.path(), folder.attributes().join(" "));
                }
            }
        }
        Command::Open { path, read_only } => {
            let folder = store
                .get_folder(&path, cancel)
                .await
                .context(format!("resolve {}", path))?;
            let access = if read_only {
                FolderAccess::ReadOnly
            } else {
                FolderAccess::ReadWrite
            };
            let open = store
                .open_folder(&folder, access, cancel)
                .await
                .context(format!("open {}", path))?;
            println!("folder\t{}", open.folder);
            println!("access\t{:?}", open.access);
            println!("exists\t{}", open.status.exists);
            println!("uidvalidity\t{}", open.status.uid_validity);
            println!("uidnext\t{}", open.status.uid_next);
            if let Some(modseq) = open.status.highest_modseq {
                println!("highestmodseq\t{}", modseq);
            }
            println!("expunges\t{:?}", open.expunge_reporting);
        }
        Command::Alerts => loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                alert = alerts.recv() => match alert {
                    Some(alert) => println!("* ALERT {}", alert.message),
                    None => break,
                },
            }
        },
    }
    Ok(())
}

fn print_folder(folder: &FolderHandle) {
    let namespace = match folder.namespace() {
        Some((kind, ns)) => format!("{} {:?}", kind, ns.prefix()),
        None => "inbox".to_string(),
    };
    println!("path\t{}", folder.path());
    println!("namespace\t{}", namespace);
    println!("subpath\t{}", folder.subpath());
    if let Some(special) = folder.special_use() {
        println!("role\t{}", special);
    }
    println!("attributes\t{}", folder.attributes().join(" "));
}

fn print_alerts(alerts: &mut Alerts) {
    while let Some(alert) = alerts.try_recv() {
        println!("* ALERT {}", alert.message);
    }
}
