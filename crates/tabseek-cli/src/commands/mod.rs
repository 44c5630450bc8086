use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tabseek_core::background::{BackgroundService, EventOutcome};
use tabseek_core::config::AppConfig;
use tabseek_core::host::{HostEvent, SimulatedBrowser, TabHost};
use tabseek_core::models::TransitionOutcome;
use tabseek_core::rpc::RpcClient;
use tabseek_core::synchronizer::LAST_INSTALL_SYNC_KEY;
use tabseek_core::{SearchEngine, TabEntry, TabId, TabIndexStore};

use crate::cli::Commands;

mod support;

use self::support::{load_session, open_storage, print_json, save_session, session_path};

#[derive(Debug, Serialize)]
struct TransitionReport {
    tab_id: TabId,
    outcome: Option<TransitionOutcome>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    backend: &'static str,
    session: PathBuf,
    window_tabs: usize,
    indexed_ids: Vec<TabId>,
    last_install_sync_at: Option<String>,
}

/// Background service bound to a simulated browser session and the state root.
struct Runtime {
    config: AppConfig,
    session: PathBuf,
    browser: SimulatedBrowser,
    service: Arc<BackgroundService>,
}

impl Runtime {
    fn open(root: &Path, session: Option<&Path>) -> Result<Self> {
        let config = AppConfig::from_env().context("invalid configuration")?;
        let session = session_path(root, session);
        let browser = SimulatedBrowser::from_fixture(load_session(&session)?);
        let index = TabIndexStore::new(open_storage(root, &config)?);
        let service = BackgroundService::new(
            Arc::new(browser.clone()),
            Arc::new(browser.clone()),
            Arc::new(browser.clone()),
            index,
            config.sync,
        );
        Ok(Self {
            config,
            session,
            browser,
            service: Arc::new(service),
        })
    }

    async fn deliver(&self, event: HostEvent) -> Result<EventOutcome> {
        let kind = event.kind();
        self.service
            .handle_event(event)
            .await
            .with_context(|| format!("failed to handle {kind} event"))
    }

    async fn deliver_transition(&self, tab_id: TabId, event: HostEvent) -> Result<()> {
        save_session(&self.session, &self.browser.to_fixture()?)?;
        let outcome = match self.deliver(event).await? {
            EventOutcome::Transition(outcome) => Some(outcome),
            _ => None,
        };
        print_json(&TransitionReport { tab_id, outcome })
    }

    /// Runs a search as the content context of the active tab would, over the RPC bus.
    async fn search(&self, query: &str) -> Result<Vec<TabEntry>> {
        let (tx, rx) = self.service.event_channel();
        let worker = tokio::spawn(Arc::clone(&self.service).run(rx));
        let sender = self.browser.active_tab().await?.map(|tab| tab.id);
        let engine = SearchEngine::new(RpcClient::new(tx, sender, &self.config.rpc));
        let results = engine.search(query).await?;
        drop(engine);
        worker.await.context("background loop panicked")?;
        Ok(results)
    }

    async fn status(&self) -> Result<StatusReport> {
        let index = self.service.index();
        Ok(StatusReport {
            backend: index.backend_name(),
            session: self.session.clone(),
            window_tabs: self.browser.query_window_tabs().await?.len(),
            indexed_ids: index.list_ids().await?,
            last_install_sync_at: index.metadata(LAST_INSTALL_SYNC_KEY).await?,
        })
    }
}

pub(crate) async fn run_from_root(
    root: &Path,
    session: Option<&Path>,
    command: Commands,
) -> Result<()> {
    if let Commands::Search(args) = &command
        && args.query.is_empty()
    {
        bail!("search query must not be empty");
    }

    let runtime = Runtime::open(root, session)?;
    match command {
        Commands::Install => match runtime.deliver(HostEvent::Installed).await? {
            EventOutcome::Installed(report) => print_json(&report)?,
            other => bail!("unexpected install outcome: {other:?}"),
        },
        Commands::Search(args) => {
            let results = runtime.search(&args.query).await?;
            print_json(&results)?;
        }
        Commands::Get(args) => {
            let snapshot = runtime.service.index().get(&args.ids).await?;
            print_json(&snapshot)?;
        }
        Commands::Open(args) => {
            let event = runtime.browser.open_tab(&args.url, &args.title, &args.text)?;
            let HostEvent::TabUpdated { tab_id, .. } = &event else {
                bail!("unexpected open event: {}", event.kind());
            };
            let tab_id = *tab_id;
            runtime.deliver_transition(tab_id, event).await?;
        }
        Commands::Close(args) => {
            let event = runtime.browser.close_tab(args.id)?;
            runtime.deliver_transition(args.id, event).await?;
        }
        Commands::Navigate(args) => {
            let event = runtime
                .browser
                .navigate(args.id, &args.url, &args.title, &args.text)?;
            runtime.deliver_transition(args.id, event).await?;
        }
        Commands::Status => {
            print_json(&runtime.status().await?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
