use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use wayfare_wizard::auth::AuthContext;
use wayfare_wizard::config::AppConfig;
use wayfare_wizard::error::WizardError;
use wayfare_wizard::store::{DataBackend, DraftStore, LibSqlStore, RestBackend};
use wayfare_wizard::wizard::{WizardController, WizardDeps};
use wayfare_wizard::workflows::{CampaignWorkflow, EventWorkflow, Workflow};

const HELP: &str = "Commands: field=value, :next, :back, :submit, :cancel, :quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let kind = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: wayfare <campaign|event>");
        std::process::exit(2);
    });

    let config = AppConfig::from_env()?;

    // ── Database ─────────────────────────────────────────────────────────
    let store = Arc::new(
        LibSqlStore::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );

    eprintln!("🧭 Wayfare wizard v{}", env!("CARGO_PKG_VERSION"));
    let backend: Arc<dyn DataBackend> = match (&config.api_url, &config.api_key) {
        (Some(url), Some(key)) => {
            eprintln!("   Backend: {}", url);
            Arc::new(RestBackend::new(url.clone(), key.clone()))
        }
        _ => {
            eprintln!(
                "   Backend: offline (records kept in {})",
                config.db_path.display()
            );
            store.clone()
        }
    };
    eprintln!("   {}\n", HELP);

    let deps = WizardDeps {
        backend,
        drafts: Some(store as Arc<dyn DraftStore>),
    };
    let auth = config.auth_context();

    match kind.as_str() {
        "campaign" => run(CampaignWorkflow::new()?, deps, &config, &auth).await,
        "event" => run(EventWorkflow::new()?, deps, &config, &auth).await,
        other => {
            eprintln!("Unknown wizard: {other} (expected campaign or event)");
            std::process::exit(2);
        }
    }
}

async fn run<W: Workflow>(
    workflow: W,
    deps: WizardDeps,
    config: &AppConfig,
    auth: &AuthContext,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = WizardController::resume(Arc::new(workflow), deps, &config.wizard).await;
    print_step(&mut controller)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            ":next" => match controller.next() {
                Ok(true) => print_step(&mut controller)?,
                Ok(false) => eprintln!("Complete this step first (or you are on the last step)."),
                Err(e) => eprintln!("❌ {e}"),
            },
            ":back" => match controller.previous() {
                Ok(true) => print_step(&mut controller)?,
                Ok(false) => eprintln!("Already on the first step."),
                Err(e) => eprintln!("❌ {e}"),
            },
            ":submit" => match controller.complete(auth).await {
                Ok(result) => {
                    println!("✅ Submitted.");
                    for (key, id) in &result.ids {
                        println!("   {key}: {id}");
                    }
                    return Ok(());
                }
                Err(e) => eprintln!("❌ {e}"),
            },
            ":cancel" => {
                controller.cancel().await;
                eprintln!("Draft discarded.");
                print_step(&mut controller)?;
            }
            ":quit" => break,
            input => match input.split_once('=') {
                Some((name, value)) => match controller.edit_field(name.trim(), value) {
                    Ok(_) => print_step(&mut controller)?,
                    Err(e) => eprintln!("❌ {e}"),
                },
                None => eprintln!("{HELP}"),
            },
        }
        eprint!("> ");
    }

    controller.flush_draft().await;
    eprintln!("Draft saved under {}.", controller.persistence_key());
    Ok(())
}

fn print_step<W: Workflow>(controller: &mut WizardController<W>) -> Result<(), WizardError> {
    let view = match controller.view() {
        Some(view) => view,
        None => controller.open_form()?,
    };
    let total = controller.workflow().steps().len();
    println!(
        "\nStep {} of {}",
        controller.session().current_step_index + 1,
        total
    );
    print!("{view}");
    if let Some(error) = controller.state().last_error() {
        println!("Last submission failed: {error}");
    }
    Ok(())
}
