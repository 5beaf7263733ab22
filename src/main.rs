use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tuuli_site::dom::{PageSpec, load_page_spec, render_document};
use tuuli_site::mailer::{EmailMessage, Mailer, ResendTransport, markdown_to_html};
use tuuli_site::page::{HostEnvironment, PageLifecycle, Services};
use tuuli_site::scenario::Scenario;
use tuuli_site::{config, output};
use walkdir::WalkDir;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "tuuli-site")]
#[command(about = "Headless runner for the tuuli.cz page behavior layer")]
#[command(long_about = "\
Headless runner for the tuuli.cz page behavior layer

Pages are JSON element trees; the widgets (scroll reveals, product modals,
galleries, slideshows, mobile spotlight, QR share, cookie consent) bind to
them exactly as they would in the browser, and a scenario replays clicks,
keys, scrolling and elapsed time against the result.

Fixture layout:

  fixtures/
  ├── config.toml              # Site config (optional, see gen-config)
  ├── pages/
  │   ├── home.json            # { \"url\": ..., \"body\": [ { \"tag\": ... } ] }
  │   └── aura.json
  └── scenarios/
      └── first-visit.toml     # viewport, stored consent, [[steps]]

Logging goes to stderr and is controlled by RUST_LOG (default: warn).

Run 'tuuli-site gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct EmailBody {
    /// HTML body file
    #[arg(long)]
    html: Option<PathBuf>,
    /// Markdown body file, rendered to HTML
    #[arg(long)]
    markdown: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Bootstrap a page, replay a scenario and print the widget state
    Simulate {
        /// Page description (JSON)
        page: PathBuf,
        /// Scenario to replay (TOML)
        #[arg(long)]
        scenario: Option<PathBuf>,
        /// Also print the final HTML
        #[arg(long)]
        html: bool,
        /// Keep the consent decision in this directory between runs
        #[arg(long, value_name = "DIR")]
        storage: Option<PathBuf>,
    },
    /// Bootstrap every page under a directory and report what bound
    Check {
        #[arg(default_value = "fixtures/pages")]
        dir: PathBuf,
    },
    /// Send one transactional email through Resend
    SendEmail {
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[command(flatten)]
        body: EmailBody,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Simulate {
            page,
            scenario,
            html,
            storage,
        } => {
            let site_config = config::load_config(&cli.config)?;
            let spec = load_page_spec(&page)?;
            let scenario = match scenario {
                Some(path) => Scenario::load(&path)?,
                None => Scenario::default(),
            };
            let run = match storage {
                Some(dir) => {
                    let services = scenario.services_in(&dir, &spec, &site_config);
                    scenario.run_with(&spec, site_config, services)?
                }
                None => scenario.run(&spec, site_config)?,
            };
            output::print_steps(&run.records);
            match run.lifecycle.page() {
                Some(page) => {
                    output::print_registry(page.registry());
                    output::print_page_state(page);
                    if html {
                        println!("{}", render_document(page.document()).into_string());
                    }
                }
                None => println!("==> {} is still loading", page.display()),
            }
        }
        Command::Check { dir } => {
            let site_config = config::load_config(&cli.config)?;
            println!("==> Checking {}", dir.display());
            let mut checked = 0;
            for path in page_files(&dir)? {
                let spec = load_page_spec(&path)?;
                check_page(&path, &spec, &site_config);
                checked += 1;
            }
            println!("==> Checked {checked} pages");
        }
        Command::SendEmail { to, subject, body } => {
            let site_config = config::load_config(&cli.config)?;
            let html = match (body.html, body.markdown) {
                (Some(path), _) => std::fs::read_to_string(path)?,
                (None, Some(path)) => markdown_to_html(&std::fs::read_to_string(path)?),
                (None, None) => return Err("an email body is required".into()),
            };
            let transport = ResendTransport::from_env(&site_config.email)?;
            let mailer = Mailer::new(transport, &site_config.email);
            let result = mailer.send(&EmailMessage {
                to: to.clone(),
                subject,
                html,
            });
            output::print_send_result(&to, &result);
            if !result.success {
                std::process::exit(1);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Every `*.json` file under `dir`, sorted by path.
fn page_files(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "json") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn check_page(path: &Path, spec: &PageSpec, site_config: &config::SiteConfig) {
    let lifecycle = PageLifecycle::start(
        spec.to_document(),
        site_config.clone(),
        Services::default(),
        HostEnvironment::default(),
    )
    .content_loaded();
    if let Some(page) = lifecycle.page() {
        output::print_check(path, page);
    }
}
